//! Writing single patch entries to disk
//!
//! An [`Installer`] turns one entry of a downloaded patch hop into a file.
//! [`ProcessInstaller`] hands the work to the external helper, which also
//! applies binary diffs. [`InlineInstaller`] extracts new files in process.

use crate::error::{PatchError, Result};
use async_trait::async_trait;
use ssn_formats::{Container, FileEntry};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything needed to produce one output file
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Entry from the hop's directory
    pub entry: FileEntry,
    /// Downloaded disk files of the hop, in disk order
    pub disks: Arc<[PathBuf]>,
    /// Installed file the diff applies to, for changed entries
    pub previous: Option<PathBuf>,
    /// Where the output is written
    pub target: PathBuf,
}

impl InstallRequest {
    /// Disk file holding the start of the entry's payload
    pub fn disk_file(&self) -> Result<&Path> {
        self.disks
            .get(usize::from(self.entry.disk_number_start))
            .map(PathBuf::as_path)
            .ok_or_else(|| PatchError::MissingDisk {
                name: self.entry.name.clone(),
                disk: self.entry.disk_number_start,
            })
    }
}

/// Produces output files from patch entries
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, request: InstallRequest) -> Result<()>;
}

/// Runs the external installer helper once per entry
#[derive(Debug, Clone)]
pub struct ProcessInstaller {
    program: PathBuf,
}

impl ProcessInstaller {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for one request
    pub fn arguments(request: &InstallRequest) -> Result<Vec<String>> {
        let entry = &request.entry;
        let mut args = vec![
            "--disk".to_string(),
            request.disk_file()?.display().to_string(),
            "--offset".to_string(),
            entry.offset.to_string(),
            "--size".to_string(),
            entry.compressed_size.to_string(),
        ];
        if let Some(keys) = entry.encryption_keys {
            args.push("--keys".to_string());
            args.push(keys.to_string());
        }
        if let Some(previous) = &request.previous {
            args.push("--previous".to_string());
            args.push(previous.display().to_string());
        }
        args.push("--target".to_string());
        args.push(request.target.display().to_string());
        Ok(args)
    }
}

#[async_trait]
impl Installer for ProcessInstaller {
    async fn install(&self, request: InstallRequest) -> Result<()> {
        let args = Self::arguments(&request)?;
        tracing::debug!(program = %self.program.display(), ?args, "launching installer");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(PatchError::at(&self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(entry = %request.entry.name, "{line}");
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(PatchError::InstallerFailed {
                program: self.program.clone(),
                message: stderr.trim().to_string(),
            });
        }
        if !output.status.success() {
            return Err(PatchError::InstallerFailed {
                program: self.program.clone(),
                message: format!("exited with {}", output.status),
            });
        }
        Ok(())
    }
}

/// Sequential view over numbered disk files
///
/// Reading starts at `offset` inside the first disk and continues into the
/// following disks when one runs out.
pub struct DiskSpan {
    remaining: VecDeque<PathBuf>,
    current: Option<BufReader<File>>,
}

impl DiskSpan {
    /// Open `disks[start..]`, positioned at `offset` in `disks[start]`
    pub fn open(disks: &[PathBuf], start: usize, offset: u64) -> io::Result<Self> {
        let mut remaining: VecDeque<PathBuf> =
            disks.get(start..).unwrap_or_default().iter().cloned().collect();
        let first = remaining.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no disk file {start}"))
        })?;

        let mut file = File::open(&first)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            remaining,
            current: Some(BufReader::new(file)),
        })
    }
}

impl Read for DiskSpan {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(reader) = self.current.as_mut() else {
                return Ok(0);
            };
            let n = reader.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.current = match self.remaining.pop_front() {
                Some(next) => Some(BufReader::new(File::open(next)?)),
                None => None,
            };
        }
    }
}

/// Extracts new files without an external helper
///
/// Changed entries need a binary diff applied against the installed file,
/// which this installer does not do; such requests fail with
/// [`PatchError::DiffUnsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineInstaller;

impl InlineInstaller {
    fn extract(request: &InstallRequest) -> Result<u64> {
        let entry = &request.entry;
        let first = request.disk_file()?;
        let span = DiskSpan::open(
            &request.disks,
            usize::from(entry.disk_number_start),
            entry.offset,
        )
        .map_err(PatchError::at(first))?;

        let output = File::create(&request.target).map_err(PatchError::at(&request.target))?;
        let mut writer = BufWriter::new(output);
        let written = Container::open(entry, span)?.copy_to(&mut writer)?;
        writer.flush().map_err(PatchError::at(&request.target))?;

        if written != u64::from(entry.size) {
            return Err(PatchError::Validation(format!(
                "\"{}\" extracted to {written} bytes, expected {}",
                entry.name, entry.size
            )));
        }
        Ok(written)
    }
}

#[async_trait]
impl Installer for InlineInstaller {
    async fn install(&self, request: InstallRequest) -> Result<()> {
        if request.previous.is_some() {
            return Err(PatchError::DiffUnsupported(request.entry.name));
        }
        let name = request.entry.name.clone();
        let written = tokio::task::spawn_blocking(move || Self::extract(&request)).await??;
        tracing::debug!(entry = %name, bytes = written, "extracted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ssn_formats::container::{BuilderEntry, ContainerBuilder};
    use tempfile::TempDir;

    fn write_disks(dir: &Path, disks: &[Vec<u8>]) -> Arc<[PathBuf]> {
        disks
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let path = dir.join(format!("hop.z{:02}", i + 1));
                std::fs::write(&path, data).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_disk_span_crosses_files() {
        let dir = TempDir::new().unwrap();
        let disks = write_disks(dir.path(), &[b"abcd".to_vec(), b"efg".to_vec(), b"hi".to_vec()]);

        let mut out = String::new();
        DiskSpan::open(&disks, 0, 2)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "cdefghi");

        let mut out = String::new();
        DiskSpan::open(&disks, 2, 0)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hi");

        assert!(DiskSpan::open(&disks, 3, 0).is_err());
    }

    #[test]
    fn test_process_arguments() {
        let mut builder = ContainerBuilder::new();
        builder.add(BuilderEntry::new("a.tor", b"x".to_vec()).with_password(b"pw".to_vec()));
        let split = builder.build_split(1024).unwrap();
        let entry = Container::parse(&split.directory).unwrap().into_entries().remove(0);
        let keys = entry.encryption_keys.unwrap();

        let request = InstallRequest {
            entry,
            disks: Arc::from(vec![PathBuf::from("/cache/hop.z01")]),
            previous: Some(PathBuf::from("/game/a.tor")),
            target: PathBuf::from("/game/a.tor.tmp"),
        };
        let args = ProcessInstaller::arguments(&request).unwrap();
        assert_eq!(
            args,
            vec![
                "--disk".to_string(),
                "/cache/hop.z01".to_string(),
                "--offset".to_string(),
                "0".to_string(),
                "--size".to_string(),
                request.entry.compressed_size.to_string(),
                "--keys".to_string(),
                keys.to_string(),
                "--previous".to_string(),
                "/game/a.tor".to_string(),
                "--target".to_string(),
                "/game/a.tor.tmp".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_inline_install_across_disks() {
        let mut state = 0x2545_F491u32;
        let content: Vec<u8> = (0..5000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let mut builder = ContainerBuilder::new();
        builder.add_file("first.txt", b"short".to_vec());
        builder.add(BuilderEntry::new("data/big.bin", content.clone()).with_password(b"key".to_vec()));
        let split = builder.build_split(700).unwrap();
        assert!(split.disks.len() > 2);

        let dir = TempDir::new().unwrap();
        let disks = write_disks(dir.path(), &split.disks);
        let entries = Container::parse(&split.directory).unwrap().into_entries();

        let target = dir.path().join("big.bin");
        InlineInstaller
            .install(InstallRequest {
                entry: entries[1].clone(),
                disks,
                previous: None,
                target: target.clone(),
            })
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), content);
    }

    #[tokio::test]
    async fn test_inline_rejects_diffs_and_missing_disks() {
        let mut builder = ContainerBuilder::new();
        builder.add_file("a.txt", b"abc".to_vec());
        let split = builder.build_split(1024).unwrap();
        let entry = Container::parse(&split.directory).unwrap().into_entries().remove(0);

        let request = InstallRequest {
            entry,
            disks: Arc::from(Vec::new()),
            previous: Some(PathBuf::from("old")),
            target: PathBuf::from("new"),
        };
        assert!(matches!(
            InlineInstaller.install(request.clone()).await,
            Err(PatchError::DiffUnsupported(name)) if name == "a.txt"
        ));

        let request = InstallRequest {
            previous: None,
            ..request
        };
        assert!(matches!(
            InlineInstaller.install(request).await,
            Err(PatchError::MissingDisk { disk: 0, .. })
        ));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_installer_outcomes() {
        let dir = TempDir::new().unwrap();
        let mut builder = ContainerBuilder::new();
        builder.add_file("a.txt", b"abc".to_vec());
        let split = builder.build_split(1024).unwrap();
        let request = InstallRequest {
            entry: Container::parse(&split.directory).unwrap().into_entries().remove(0),
            disks: write_disks(dir.path(), &split.disks),
            previous: None,
            target: dir.path().join("a.txt.tmp"),
        };

        let quiet = script(dir.path(), "quiet.sh", "echo progress\nexit 0");
        ProcessInstaller::new(&quiet)
            .install(request.clone())
            .await
            .unwrap();

        let noisy = script(dir.path(), "noisy.sh", "echo oops >&2");
        match ProcessInstaller::new(&noisy).install(request.clone()).await {
            Err(PatchError::InstallerFailed { program, message }) => {
                assert_eq!(program, noisy);
                assert_eq!(message, "oops");
            }
            other => panic!("expected installer failure, got {other:?}"),
        }

        let failing = script(dir.path(), "failing.sh", "exit 1");
        match ProcessInstaller::new(&failing).install(request).await {
            Err(PatchError::InstallerFailed { program, message }) => {
                assert_eq!(program, failing);
                assert!(message.starts_with("exited with"), "{message}");
            }
            other => panic!("expected installer failure, got {other:?}"),
        }
    }
}
