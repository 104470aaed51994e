//! Downloading and applying patch hops
//!
//! A hop `from`→`to` is applied in three phases:
//!
//! 1. the `.solidpkg` is fetched and verified; it lists the hop's disk
//!    images and its directory `.zip`
//! 2. the `.zip` is fetched, parsed and validated while the disk images
//!    download; every disk must be present before installation starts
//! 3. each entry is turned into an [`Action`] and run through the bounded
//!    scheduler
//!
//! Outputs are written to `<name>.tmp` and renamed into place, so a failed
//! entry never leaves a partial file under its final name. Failures of
//! single entries are collected in the [`PatchReport`] instead of aborting
//! the hop.

use crate::config::PatchConfig;
use crate::error::{FileFailure, PatchError, Result};
use crate::fetch::{Fetcher, HttpFetcher, cache_path};
use crate::install::{InlineInstaller, InstallRequest, Installer, ProcessInstaller};
use crate::product::{Product, check_releases};
use crate::release::{ReleaseEdge, resolve};
use crate::scheduler::{CancellationToken, run_bounded};
use crate::validate::verify_patch;
use ssn_formats::{Container, DiffType, FileEntry, PatchManifest, SolidPackage};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What happens to one entry of a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// New file extracted from the disks
    Extract,
    /// Changed file rebuilt from the installed one
    Patch,
    /// File removed from the install
    Delete,
    /// Unchanged file copied into a separate target
    Copy,
}

impl Action {
    /// Action for an entry, `None` when nothing has to be done
    pub fn for_entry(diff_type: Option<DiffType>, in_place: bool) -> Option<Self> {
        match diff_type? {
            DiffType::NewFile => Some(Self::Extract),
            DiffType::Changed => Some(Self::Patch),
            DiffType::Deleted if in_place => Some(Self::Delete),
            DiffType::Unchanged if !in_place => Some(Self::Copy),
            DiffType::Deleted | DiffType::Unchanged => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extract => "extract",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Copy => "copy",
        })
    }
}

/// Arguments of a single hop installation
#[derive(Debug, Clone)]
pub struct PatchRequest {
    pub product: Product,
    pub from: i32,
    pub to: i32,
    /// Installed `from` release; required unless `from == -1`
    pub source_dir: Option<PathBuf>,
    /// Where the `to` release ends up
    pub target_dir: PathBuf,
}

/// Outcome of one or more hops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub extracted: usize,
    pub patched: usize,
    pub deleted: usize,
    pub copied: usize,
    /// Entries that needed no action
    pub skipped: usize,
    pub failures: Vec<FileFailure>,
}

impl PatchReport {
    fn record(&mut self, action: Action) {
        match action {
            Action::Extract => self.extracted += 1,
            Action::Patch => self.patched += 1,
            Action::Delete => self.deleted += 1,
            Action::Copy => self.copied += 1,
        }
    }

    /// Add the counts and failures of another report
    pub fn merge(&mut self, other: Self) {
        self.extracted += other.extracted;
        self.patched += other.patched;
        self.deleted += other.deleted;
        self.copied += other.copied;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    /// Whether every entry was handled
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into [`PatchError::FileFailures`]
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(PatchError::FileFailures(self.failures))
        }
    }
}

/// Join a `/`-separated entry name onto `base`
///
/// Absolute names and `..` components are rejected so that every output
/// stays below `base`.
pub fn entry_path(base: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let safe = !name.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(PatchError::Validation(format!(
            "entry name \"{name}\" escapes the install directory"
        )));
    }
    Ok(base.join(relative))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PatchError::at(parent))?;
    }
    Ok(())
}

/// Where one hop reads from and writes to
struct HopLayout {
    source_dir: Option<PathBuf>,
    target_dir: PathBuf,
    in_place: bool,
    disks: Arc<[PathBuf]>,
}

impl HopLayout {
    fn source(&self) -> Result<&Path> {
        self.source_dir.as_deref().ok_or_else(|| {
            PatchError::Validation("entry needs an installed source file".to_string())
        })
    }
}

/// Drives resolution, download and installation of patches
pub struct Patcher {
    config: PatchConfig,
    fetcher: Arc<dyn Fetcher>,
    installer: Arc<dyn Installer>,
    token: CancellationToken,
}

impl Patcher {
    pub fn new(
        config: PatchConfig,
        fetcher: Arc<dyn Fetcher>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            config,
            fetcher,
            installer,
            token: CancellationToken::new(),
        }
    }

    /// Patcher with the HTTP fetcher and the configured installer
    pub fn from_config(config: PatchConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let installer: Arc<dyn Installer> = match &config.installer {
            Some(program) => Arc::new(ProcessInstaller::new(program)),
            None => Arc::new(InlineInstaller),
        };
        Ok(Self::new(config, fetcher, installer))
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Token that stops all further work once cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fetch and read the `.patchmanifest` of a product
    pub async fn manifest(&self, product: Product) -> Result<PatchManifest> {
        let path = product.manifest_path();
        let data = self.fetcher.fetch(&self.config.manifest_host, &path).await?;
        let manifest = PatchManifest::from_container(&data)?;
        if manifest.name != product.name() {
            return Err(PatchError::Validation(format!(
                "manifest for {product} names \"{}\"",
                manifest.name
            )));
        }
        tracing::debug!(%product, current = manifest.current, releases = manifest.releases.len(), "manifest read");
        Ok(manifest)
    }

    /// Fetch and verify the `.solidpkg` of a hop
    pub async fn solidpkg(&self, product: Product, from: i32, to: i32) -> Result<SolidPackage> {
        check_releases(from, to)?;
        let path = product.solidpkg_path(from, to);
        let data = self.fetcher.fetch(&self.config.patch_host, &path).await?;
        let package = SolidPackage::from_container(&data)?;
        package.verify(product.name(), from, to)?;
        tracing::debug!(%product, from, to, files = package.files.len(), "solidpkg verified");
        Ok(package)
    }

    /// Entries of a hop, without downloading its disks
    pub async fn patch_zip(&self, product: Product, from: i32, to: i32) -> Result<Vec<FileEntry>> {
        let package = self.solidpkg(product, from, to).await?;
        self.directory(product, from, to, &package).await
    }

    /// Fetch, parse and validate the directory `.zip` of a hop
    async fn directory(
        &self,
        product: Product,
        from: i32,
        to: i32,
        package: &SolidPackage,
    ) -> Result<Vec<FileEntry>> {
        let file = package
            .directory_file()
            .ok_or_else(|| PatchError::Validation("solidpkg lists no files".to_string()))?;
        let path = product.hop_file_path(from, to, &file.name);
        let data = self.fetcher.fetch(&self.config.patch_host, &path).await?;
        if data.len() as u64 != file.length {
            return Err(PatchError::SizeMismatch {
                url: path,
                expected: file.length,
                actual: data.len() as u64,
            });
        }

        let entries = Container::parse(&data)?.into_entries();
        verify_patch(&entries, product, from)?;
        Ok(entries)
    }

    /// Download the disk images of a hop into the cache
    async fn download_disks(
        &self,
        product: Product,
        from: i32,
        to: i32,
        package: &SolidPackage,
    ) -> Result<Vec<PathBuf>> {
        let host = self.config.patch_host.as_str();
        let units = package.disk_files().iter().map(|file| {
            let path = product.hop_file_path(from, to, &file.name);
            let destination = cache_path(&self.config.cache_dir, host, &path);
            let length = file.length;
            move || async move {
                self.fetcher
                    .fetch_to_file(host, &path, length, &destination)
                    .await
            }
        });
        run_bounded(units, self.config.fetch_concurrency, &self.token).await
    }

    /// Download and install one hop
    pub async fn install_patch(&self, request: &PatchRequest) -> Result<PatchReport> {
        let PatchRequest {
            product,
            from,
            to,
            ..
        } = *request;
        check_releases(from, to)?;

        let source_dir = match (&request.source_dir, from) {
            (_, -1) => None,
            (Some(dir), _) => Some(std::path::absolute(dir)?),
            (None, _) => return Err(PatchError::MissingSourceDir(from)),
        };
        let target_dir = std::path::absolute(&request.target_dir)?;
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(PatchError::at(&target_dir))?;
        let in_place = source_dir.as_deref() == Some(target_dir.as_path());

        let package = self.solidpkg(product, from, to).await?;
        tracing::info!(
            %product,
            hop = %ReleaseEdge::new(from, to),
            disks = package.disk_files().len(),
            "downloading patch"
        );

        let (entries, disks) = futures::try_join!(
            self.directory(product, from, to, &package),
            self.download_disks(product, from, to, &package),
        )?;

        let layout = HopLayout {
            source_dir,
            target_dir,
            in_place,
            disks: disks.into(),
        };
        let report = self.apply(&entries, &layout).await?;

        if self.config.cleanup_disks && report.is_clean() {
            for disk in layout.disks.iter() {
                if let Err(error) = tokio::fs::remove_file(disk).await {
                    tracing::warn!(path = %disk.display(), %error, "could not remove disk file");
                }
            }
        }

        tracing::info!(
            %product,
            hop = %ReleaseEdge::new(from, to),
            extracted = report.extracted,
            patched = report.patched,
            deleted = report.deleted,
            copied = report.copied,
            failed = report.failures.len(),
            "hop installed"
        );
        Ok(report)
    }

    /// Resolve the hop chain `from`→`to` and install every hop in order
    ///
    /// The first hop reads from `source_dir`; later hops patch `target_dir`
    /// in place. The chain stops at the first hop with failed files.
    pub async fn install_path(
        &self,
        product: Product,
        from: i32,
        to: i32,
        source_dir: Option<&Path>,
        target_dir: &Path,
    ) -> Result<PatchReport> {
        check_releases(from, to)?;
        let path = resolve(product, from, to)?;
        if path.is_empty() {
            return Err(PatchError::NoRoute { product, from, to });
        }
        tracing::info!(%product, hops = path.len(), "resolved release path");

        let mut total = PatchReport::default();
        for (index, hop) in path.iter().enumerate() {
            let source = if index == 0 {
                source_dir.map(Path::to_path_buf)
            } else {
                Some(target_dir.to_path_buf())
            };
            let report = self
                .install_patch(&PatchRequest {
                    product,
                    from: hop.from,
                    to: hop.to,
                    source_dir: source,
                    target_dir: target_dir.to_path_buf(),
                })
                .await?
                .into_result()?;
            total.merge(report);
        }
        Ok(total)
    }

    /// Run the install actions of one hop
    async fn apply(&self, entries: &[FileEntry], layout: &HopLayout) -> Result<PatchReport> {
        let mut report = PatchReport::default();
        let mut planned: Vec<(Action, &FileEntry)> = Vec::new();
        for entry in entries {
            match Action::for_entry(entry.diff_type, layout.in_place) {
                Some(action) => planned.push((action, entry)),
                None => report.skipped += 1,
            }
        }
        // Stable sort keeps directory order within each action
        planned.sort_by_key(|(action, _)| *action as u8);

        tracing::info!(actions = planned.len(), skipped = report.skipped, "installing");
        let units = planned.into_iter().map(|(action, entry)| {
            move || async move {
                let outcome = self.run_action(action, entry, layout).await;
                Ok::<_, PatchError>((action, entry, outcome))
            }
        });
        let outcomes = run_bounded(units, self.config.install_concurrency, &self.token).await?;

        for (action, entry, outcome) in outcomes {
            match outcome {
                Ok(()) => report.record(action),
                Err(error) => {
                    tracing::warn!(entry = %entry.name, %action, %error, "file failed");
                    report.failures.push(FileFailure {
                        name: entry.name.clone(),
                        action,
                        reason: error.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn run_action(
        &self,
        action: Action,
        entry: &FileEntry,
        layout: &HopLayout,
    ) -> Result<()> {
        let target = entry_path(&layout.target_dir, &entry.name)?;
        match action {
            Action::Extract => self.produce(entry, layout, None, &target).await,
            Action::Patch => {
                let previous = entry_path(layout.source()?, &entry.name)?;
                self.produce(entry, layout, Some(previous), &target).await
            }
            Action::Delete => match tokio::fs::remove_file(&target).await {
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(entry = %entry.name, "already absent");
                    Ok(())
                }
                result => result.map_err(PatchError::at(&target)),
            },
            Action::Copy => {
                let source = entry_path(layout.source()?, &entry.name)?;
                create_parent(&target).await?;
                tokio::fs::copy(&source, &target)
                    .await
                    .map_err(PatchError::at(&source))?;
                Ok(())
            }
        }
    }

    /// Install into `<target>.tmp`, then move it over `target`
    async fn produce(
        &self,
        entry: &FileEntry,
        layout: &HopLayout,
        previous: Option<PathBuf>,
        target: &Path,
    ) -> Result<()> {
        let temp = temp_path(target);
        create_parent(&temp).await?;

        let result = async {
            self.installer
                .install(InstallRequest {
                    entry: entry.clone(),
                    disks: Arc::clone(&layout.disks),
                    previous: previous.clone(),
                    target: temp.clone(),
                })
                .await?;

            if let Some(previous) = previous.as_deref().filter(|_| layout.in_place) {
                tokio::fs::remove_file(previous)
                    .await
                    .map_err(PatchError::at(previous))?;
            }
            tokio::fs::rename(&temp, target)
                .await
                .map_err(PatchError::at(target))
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        result
    }
}
