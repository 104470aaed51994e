//! End-to-end hop installation against an in-memory CDN
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use ssn_formats::DiffType;
use ssn_formats::container::{BuilderEntry, ContainerBuilder};
use ssn_formats::manifest::{ManifestRelease, PatchManifest};
use ssn_formats::solid::{SolidFile, SolidPackage, expected_file_names};
use ssn_patch::fetch::cache_path;
use ssn_patch::{
    Action, Fetcher, InlineInstaller, InstallRequest, Installer, PatchConfig, PatchError,
    PatchRequest, Patcher, Product, Result,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const PRODUCT: Product = Product::AssetsMain;
const VERSION: &str = "assets_swtor_main.version";

/// Serves files from a map and counts requests
#[derive(Default)]
struct MockCdn {
    files: HashMap<String, Bytes>,
    fetches: AtomicUsize,
    disk_fetches: AtomicUsize,
    hosts: Mutex<Vec<String>>,
}

impl MockCdn {
    fn get(&self, path: &str) -> Result<Bytes> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| PatchError::HttpStatus {
                url: path.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }

    /// Publish hop `from`→`to` with the given directory entries
    fn publish(&mut self, from: i32, to: i32, entries: Vec<BuilderEntry>) {
        let mut builder = ContainerBuilder::new();
        for entry in entries {
            builder.add(entry);
        }
        let split = builder.build_split(512).unwrap();

        let mut contents = split.disks;
        contents.push(split.directory);
        let names = expected_file_names(PRODUCT.name(), from, to, contents.len());

        let package = SolidPackage {
            title: format!("{PRODUCT}: {from}to{to}"),
            created: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            files: names
                .iter()
                .zip(&contents)
                .map(|(name, data)| SolidFile {
                    name: name.clone(),
                    length: data.len() as u64,
                })
                .collect(),
            piece_length: 0x4_0000,
            private: 0,
            closed: 1,
        };
        self.files.insert(
            PRODUCT.solidpkg_path(from, to),
            Bytes::from(package.to_container().unwrap()),
        );
        for (name, data) in names.iter().zip(contents) {
            self.files
                .insert(PRODUCT.hop_file_path(from, to, name), Bytes::from(data));
        }
    }
}

#[async_trait]
impl Fetcher for MockCdn {
    async fn fetch(&self, host: &str, path: &str) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().unwrap().push(host.to_string());
        self.get(path)
    }

    async fn fetch_to_file(
        &self,
        _host: &str,
        path: &str,
        expected_size: u64,
        destination: &Path,
    ) -> Result<PathBuf> {
        self.disk_fetches.fetch_add(1, Ordering::SeqCst);
        let data = self.get(path)?;
        if data.len() as u64 != expected_size {
            return Err(PatchError::SizeMismatch {
                url: path.to_string(),
                expected: expected_size,
                actual: data.len() as u64,
            });
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, &data)?;
        Ok(destination.to_path_buf())
    }
}

fn new_file(name: &str, data: &[u8]) -> BuilderEntry {
    BuilderEntry::new(name, data.to_vec()).with_diff(DiffType::NewFile, 0, data.len() as u64)
}

fn marked(name: &str, diff_type: DiffType) -> BuilderEntry {
    BuilderEntry::new(name, Vec::new()).with_diff(diff_type, 0, 0)
}

fn version(release: i32) -> BuilderEntry {
    new_file(VERSION, release.to_string().as_bytes())
}

fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x9E37_79B9u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// CDN with a fresh install `-1to0` and an update `0to1`
fn two_releases() -> MockCdn {
    let mut cdn = MockCdn::default();
    cdn.publish(
        -1,
        0,
        vec![
            new_file("a.txt", b"first release"),
            new_file("data/b.bin", &noise(2000)),
            version(0),
        ],
    );
    cdn.publish(
        0,
        1,
        vec![
            marked("a.txt", DiffType::Deleted),
            marked("data/b.bin", DiffType::Unchanged),
            new_file("c.txt", b"added in release one"),
            version(1),
        ],
    );
    cdn
}

fn patcher(cdn: &Arc<MockCdn>, cache: &Path, cleanup: bool) -> Patcher {
    patcher_with(cdn, cache, cleanup, Arc::new(InlineInstaller))
}

fn patcher_with(
    cdn: &Arc<MockCdn>,
    cache: &Path,
    cleanup: bool,
    installer: Arc<dyn Installer>,
) -> Patcher {
    let config = PatchConfig {
        cache_dir: cache.to_path_buf(),
        cleanup_disks: cleanup,
        ..PatchConfig::default()
    };
    let fetcher: Arc<dyn Fetcher> = cdn.clone();
    Patcher::new(config, fetcher, installer)
}

/// Applies "diffs" by appending a marker to the previous file
struct AppendInstaller;

#[async_trait]
impl Installer for AppendInstaller {
    async fn install(&self, request: InstallRequest) -> Result<()> {
        let Some(previous) = &request.previous else {
            return InlineInstaller.install(request).await;
        };
        let mut content = std::fs::read(previous)?;
        content.extend_from_slice(b"+patched");
        std::fs::write(&request.target, content)?;
        Ok(())
    }
}

/// CDN with a single update `0to1` that changes `a.txt`
fn changed_release() -> MockCdn {
    let mut cdn = MockCdn::default();
    cdn.publish(
        0,
        1,
        vec![
            BuilderEntry::new("a.txt", b"diff payload".to_vec()).with_diff(DiffType::Changed, 3, 11),
            version(1),
        ],
    );
    cdn
}

fn install_dir(root: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    for (file, content) in files {
        std::fs::write(dir.join(file), content).unwrap();
    }
    dir
}

fn request(from: i32, to: i32, source: Option<&Path>, target: &Path) -> PatchRequest {
    PatchRequest {
        product: PRODUCT,
        from,
        to,
        source_dir: source.map(Path::to_path_buf),
        target_dir: target.to_path_buf(),
    }
}

#[tokio::test]
async fn test_fresh_install() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");

    let report = patcher(&cdn, &dir.path().join("cache"), false)
        .install_patch(&request(-1, 0, None, &game))
        .await
        .unwrap();

    assert_eq!(report.extracted, 3);
    assert!(report.is_clean());
    assert_eq!(std::fs::read(game.join("a.txt")).unwrap(), b"first release");
    assert_eq!(std::fs::read(game.join("data/b.bin")).unwrap(), noise(2000));
    assert_eq!(std::fs::read_to_string(game.join(VERSION)).unwrap(), "0");
    assert!(cdn.disk_fetches.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_in_place_update_deletes_and_skips() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");
    let patcher = patcher(&cdn, &dir.path().join("cache"), false);

    patcher
        .install_patch(&request(-1, 0, None, &game))
        .await
        .unwrap();
    let report = patcher
        .install_patch(&request(0, 1, Some(&game), &game))
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.extracted, 2);
    assert!(!game.join("a.txt").exists());
    assert_eq!(std::fs::read(game.join("data/b.bin")).unwrap(), noise(2000));
    assert_eq!(
        std::fs::read(game.join("c.txt")).unwrap(),
        b"added in release one"
    );
    assert_eq!(std::fs::read_to_string(game.join(VERSION)).unwrap(), "1");
}

#[tokio::test]
async fn test_update_into_separate_directory_copies_unchanged() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    let patcher = patcher(&cdn, &dir.path().join("cache"), false);

    patcher
        .install_patch(&request(-1, 0, None, &old))
        .await
        .unwrap();
    let report = patcher
        .install_patch(&request(0, 1, Some(&old), &new))
        .await
        .unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(std::fs::read(new.join("data/b.bin")).unwrap(), noise(2000));
    assert!(!new.join("a.txt").exists());
    // The source installation is left untouched
    assert!(old.join("a.txt").exists());
    assert_eq!(std::fs::read_to_string(old.join(VERSION)).unwrap(), "0");
}

#[tokio::test]
async fn test_failed_file_is_reported_and_cleaned_up() {
    let mut cdn = MockCdn::default();
    cdn.publish(
        0,
        1,
        vec![
            BuilderEntry::new("a.txt", b"diff payload".to_vec()).with_diff(DiffType::Changed, 3, 5),
            version(1),
        ],
    );
    let cdn = Arc::new(cdn);
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");
    std::fs::create_dir_all(&game).unwrap();
    std::fs::write(game.join("a.txt"), b"abc").unwrap();

    let report = patcher(&cdn, &dir.path().join("cache"), false)
        .install_patch(&request(0, 1, Some(&game), &game))
        .await
        .unwrap();

    assert_eq!(report.extracted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "a.txt");
    assert_eq!(report.failures[0].action, Action::Patch);
    assert_eq!(std::fs::read(game.join("a.txt")).unwrap(), b"abc");
    assert!(!game.join("a.txt.tmp").exists());

    let error = report.into_result().unwrap_err();
    assert_eq!(error.to_string(), "1 file(s) failed: a.txt");
}

#[tokio::test]
async fn test_invalid_directory_aborts_before_installing() {
    let mut cdn = MockCdn::default();
    cdn.publish(-1, 0, vec![new_file("a.txt", b"no version marker")]);
    let cdn = Arc::new(cdn);
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");

    let error = patcher(&cdn, &dir.path().join("cache"), false)
        .install_patch(&request(-1, 0, None, &game))
        .await
        .unwrap_err();

    assert!(matches!(error, PatchError::Validation(_)), "{error}");
    assert!(!game.join("a.txt").exists());
}

#[tokio::test]
async fn test_update_requires_source_directory() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();

    let error = patcher(&cdn, &dir.path().join("cache"), false)
        .install_patch(&request(0, 1, None, &dir.path().join("game")))
        .await
        .unwrap_err();

    assert!(matches!(error, PatchError::MissingSourceDir(0)), "{error}");
    assert_eq!(cdn.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_install_path_walks_every_hop() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();
    let game = dir.path().join("game");

    let report = patcher(&cdn, &dir.path().join("cache"), false)
        .install_path(PRODUCT, -1, 1, None, &game)
        .await
        .unwrap();

    assert_eq!(report.extracted, 5);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped, 1);
    assert!(!game.join("a.txt").exists());
    assert!(game.join("c.txt").exists());
    assert_eq!(std::fs::read_to_string(game.join(VERSION)).unwrap(), "1");
}

#[tokio::test]
async fn test_install_path_rejects_empty_range() {
    let cdn = Arc::new(MockCdn::default());
    let dir = TempDir::new().unwrap();

    let error = patcher(&cdn, &dir.path().join("cache"), false)
        .install_path(PRODUCT, 3, 3, None, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(error, PatchError::InvalidRange { from: 3, to: 3 }), "{error}");
}

#[tokio::test]
async fn test_cleanup_removes_cached_disks() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cache");
    let config = PatchConfig::default();
    let cdn = two_releases();
    let package = SolidPackage::from_container(&cdn.files[&PRODUCT.solidpkg_path(-1, 0)]).unwrap();
    let disks: Vec<PathBuf> = package
        .disk_files()
        .iter()
        .map(|file| {
            cache_path(
                &cache,
                &config.patch_host,
                &PRODUCT.hop_file_path(-1, 0, &file.name),
            )
        })
        .collect();
    let cdn = Arc::new(cdn);

    patcher(&cdn, &cache, false)
        .install_patch(&request(-1, 0, None, &dir.path().join("kept")))
        .await
        .unwrap();
    assert!(disks.iter().all(|disk| disk.exists()));

    patcher(&cdn, &cache, true)
        .install_patch(&request(-1, 0, None, &dir.path().join("cleaned")))
        .await
        .unwrap();
    assert!(disks.iter().all(|disk| !disk.exists()));
}

#[tokio::test]
async fn test_patch_zip_lists_entries_without_disks() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();

    let entries = patcher(&cdn, dir.path(), false)
        .patch_zip(PRODUCT, 0, 1)
        .await
        .unwrap();

    let listing: Vec<(&str, Option<DiffType>)> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.diff_type))
        .collect();
    assert_eq!(
        listing,
        vec![
            ("a.txt", Some(DiffType::Deleted)),
            ("data/b.bin", Some(DiffType::Unchanged)),
            ("c.txt", Some(DiffType::NewFile)),
            (VERSION, Some(DiffType::NewFile)),
        ]
    );
    assert_eq!(cdn.disk_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unpublished_hop_is_not_found() {
    let cdn = Arc::new(two_releases());
    let dir = TempDir::new().unwrap();

    let error = patcher(&cdn, dir.path(), false)
        .solidpkg(Product::RetailSwtor, -1, 0)
        .await
        .unwrap_err();
    assert!(matches!(error, PatchError::HttpStatus { .. }), "{error}");
}

#[tokio::test]
async fn test_changed_file_patched_in_place() {
    let cdn = Arc::new(changed_release());
    let dir = TempDir::new().unwrap();
    let game = install_dir(dir.path(), "game", &[("a.txt", b"abc")]);

    let report = patcher_with(&cdn, &dir.path().join("cache"), false, Arc::new(AppendInstaller))
        .install_patch(&request(0, 1, Some(&game), &game))
        .await
        .unwrap();

    assert_eq!(report.patched, 1);
    assert_eq!(report.extracted, 1);
    assert!(report.is_clean());
    assert_eq!(std::fs::read(game.join("a.txt")).unwrap(), b"abc+patched");
    assert!(!game.join("a.txt.tmp").exists());
    assert_eq!(std::fs::read_to_string(game.join(VERSION)).unwrap(), "1");
}

#[tokio::test]
async fn test_changed_file_patched_into_separate_directory() {
    let cdn = Arc::new(changed_release());
    let dir = TempDir::new().unwrap();
    let old = install_dir(dir.path(), "old", &[("a.txt", b"abc")]);
    let new = dir.path().join("new");

    let report = patcher_with(&cdn, &dir.path().join("cache"), false, Arc::new(AppendInstaller))
        .install_patch(&request(0, 1, Some(&old), &new))
        .await
        .unwrap();

    assert_eq!(report.patched, 1);
    assert_eq!(std::fs::read(new.join("a.txt")).unwrap(), b"abc+patched");
    assert!(!new.join("a.txt.tmp").exists());
    assert_eq!(std::fs::read(old.join("a.txt")).unwrap(), b"abc");
}

#[tokio::test]
async fn test_deleting_an_absent_file_succeeds() {
    let mut cdn = MockCdn::default();
    cdn.publish(0, 1, vec![marked("gone.txt", DiffType::Deleted), version(1)]);
    let cdn = Arc::new(cdn);
    let dir = TempDir::new().unwrap();
    let game = install_dir(dir.path(), "game", &[]);

    let report = patcher(&cdn, &dir.path().join("cache"), false)
        .install_patch(&request(0, 1, Some(&game), &game))
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert!(report.is_clean());
}

fn sample_manifest(name: &str) -> PatchManifest {
    let release = |sha1: &str, from: Vec<i32>, to: Vec<i32>| ManifestRelease {
        sha1: sha1.to_string(),
        from,
        to,
    };
    PatchManifest {
        name: name.to_string(),
        current: 1,
        releases: BTreeMap::from([
            (0, release(&"0".repeat(40), vec![-1], vec![1])),
            (1, release(&"1".repeat(40), vec![0], vec![])),
        ]),
    }
}

#[tokio::test]
async fn test_manifest_is_read_from_manifest_host() {
    let mut cdn = MockCdn::default();
    let manifest = sample_manifest(PRODUCT.name());
    cdn.files.insert(
        PRODUCT.manifest_path(),
        Bytes::from(manifest.to_container().unwrap()),
    );
    let cdn = Arc::new(cdn);
    let dir = TempDir::new().unwrap();

    let read = patcher(&cdn, dir.path(), false)
        .manifest(PRODUCT)
        .await
        .unwrap();

    assert_eq!(read, manifest);
    assert_eq!(*cdn.hosts.lock().unwrap(), vec!["manifest.swtor.com".to_string()]);
}

#[tokio::test]
async fn test_manifest_of_another_product_is_rejected() {
    let mut cdn = MockCdn::default();
    cdn.files.insert(
        PRODUCT.manifest_path(),
        Bytes::from(sample_manifest("eualas").to_container().unwrap()),
    );
    let cdn = Arc::new(cdn);
    let dir = TempDir::new().unwrap();

    let error = patcher(&cdn, dir.path(), false)
        .manifest(PRODUCT)
        .await
        .unwrap_err();
    assert!(matches!(error, PatchError::Validation(_)), "{error}");
}
