//! `metafile.solid` model and verification

use crate::container::{Container, ContainerBuilder, ContainerResult};
use crate::solid::bencode::{self, Value};
use crate::solid::error::{SolidError, SolidResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Name of the only entry inside a `.solidpkg`
pub const METAFILE_NAME: &str = "metafile.solid";

/// Piece lengths the packaging pipeline uses (64 KiB to 4 MiB)
pub const PIECE_LENGTHS: [u64; 7] = [
    0x1_0000, 0x2_0000, 0x4_0000, 0x8_0000, 0x10_0000, 0x20_0000, 0x40_0000,
];

/// One file of a patch hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidFile {
    /// File name, e.g. `assets_swtor_main_21to22.z01`
    pub name: String,
    /// Size in bytes
    pub length: u64,
}

/// Decoded metafile of one patch hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidPackage {
    /// `"{product}: {from}to{to}"`
    pub title: String,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Disk images followed by the directory `.zip`
    pub files: Vec<SolidFile>,
    /// Piece length in bytes
    pub piece_length: u64,
    /// Private flag, 0 on every published package
    pub private: u64,
    /// Closed flag, 1 on every published package
    pub closed: u64,
}

/// `{product}_{from}to{to}`
pub fn hop_base_name(product: &str, from: i32, to: i32) -> String {
    format!("{product}_{from}to{to}")
}

/// Names the files of a hop must carry: `.z01`, `.z02`, ..., then `.zip`
pub fn expected_file_names(product: &str, from: i32, to: i32, count: usize) -> Vec<String> {
    let base = hop_base_name(product, from, to);
    (0..count)
        .map(|i| {
            if i + 1 == count {
                format!("{base}.zip")
            } else {
                format!("{base}.z{:02}", i + 1)
            }
        })
        .collect()
}

fn invalid(message: impl Into<String>) -> SolidError {
    SolidError::Invalid(message.into())
}

fn required<'a>(dict: &'a Value, key: &str) -> SolidResult<&'a Value> {
    dict.get(key)
        .ok_or_else(|| invalid(format!("missing field \"{key}\"")))
}

fn required_integer(dict: &Value, key: &str) -> SolidResult<u64> {
    required(dict, key)?
        .as_integer()
        .ok_or_else(|| invalid(format!("field \"{key}\" is not an integer")))
}

impl SolidPackage {
    /// Decode the Bencode metafile
    ///
    /// Only structure is checked here; use [`SolidPackage::verify`] to match
    /// it against an expected hop.
    pub fn from_metafile(data: &[u8]) -> SolidResult<Self> {
        let root = bencode::decode(data)?;
        if root.as_dict().is_none() {
            return Err(invalid("metafile is not a dictionary"));
        }

        let created_secs = required_integer(&root, "creation date")?;
        let created = i64::try_from(created_secs)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| invalid(format!("creation date {created_secs} is out of range")))?;

        let title = required(&root, "title")?
            .as_str()
            .ok_or_else(|| invalid("title is not a string"))?
            .to_string();

        let info = required(&root, "info")?;
        if info.as_dict().is_none() {
            return Err(invalid("info is not a dictionary"));
        }

        let files = required(info, "files")?
            .as_list()
            .ok_or_else(|| invalid("files is not a list"))?
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let length = required_integer(file, "length")
                    .map_err(|_| invalid(format!("file {i} has no integer length")))?;
                let name = match required(file, "path")?.as_list() {
                    Some([name]) => name
                        .as_str()
                        .ok_or_else(|| invalid(format!("file {i} name is not a string")))?,
                    _ => return Err(invalid(format!("file {i} path must have one element"))),
                };
                Ok(SolidFile {
                    name: name.to_string(),
                    length,
                })
            })
            .collect::<SolidResult<Vec<_>>>()?;

        Ok(Self {
            title,
            created,
            files,
            piece_length: required_integer(info, "piece length")?,
            private: required_integer(info, "private")?,
            closed: required_integer(info, "closed")?,
        })
    }

    /// Extract and decode `metafile.solid` from a `.solidpkg` container
    pub fn from_container(data: &[u8]) -> SolidResult<Self> {
        let container = Container::parse(data)?;
        let entry = match container.entries() {
            [entry] if entry.name == METAFILE_NAME => entry,
            [entry] => {
                return Err(SolidError::UnexpectedContents(format!(
                    "expected {METAFILE_NAME}, found {}",
                    entry.name
                )));
            }
            entries => {
                return Err(SolidError::UnexpectedContents(format!(
                    "expected 1 entry, found {}",
                    entries.len()
                )));
            }
        };

        let metafile = Container::open_embedded(data, entry)?.read_to_vec()?;
        Self::from_metafile(&metafile)
    }

    /// Check that the metafile describes hop `from`→`to` of `product`
    pub fn verify(&self, product: &str, from: i32, to: i32) -> SolidResult<()> {
        let title = format!("{product}: {from}to{to}");
        if self.title != title {
            return Err(invalid(format!(
                "expected title \"{title}\", found \"{}\"",
                self.title
            )));
        }

        if self.files.len() < 2 {
            return Err(invalid(format!(
                "expected at least two files, found {}",
                self.files.len()
            )));
        }
        let expected = expected_file_names(product, from, to, self.files.len());
        for (file, name) in self.files.iter().zip(&expected) {
            if &file.name != name {
                return Err(invalid(format!(
                    "expected file name \"{name}\", found \"{}\"",
                    file.name
                )));
            }
        }

        if !PIECE_LENGTHS.contains(&self.piece_length) {
            return Err(invalid(format!(
                "unexpected piece length {}",
                self.piece_length
            )));
        }
        if self.private != 0 {
            return Err(invalid(format!("private is {}, expected 0", self.private)));
        }
        if self.closed != 1 {
            return Err(invalid(format!("closed is {}, expected 1", self.closed)));
        }
        Ok(())
    }

    /// Disk images, all files but the last
    pub fn disk_files(&self) -> &[SolidFile] {
        match self.files.split_last() {
            Some((_, disks)) => disks,
            None => &[],
        }
    }

    /// Directory `.zip`, the last file
    pub fn directory_file(&self) -> Option<&SolidFile> {
        self.files.last()
    }

    /// Encode back into a Bencode metafile
    pub fn to_metafile(&self) -> Vec<u8> {
        let files = self
            .files
            .iter()
            .map(|file| {
                Value::Dict(BTreeMap::from([
                    ("length".to_string(), Value::from(file.length)),
                    (
                        "path".to_string(),
                        Value::List(vec![Value::from(file.name.as_str())]),
                    ),
                ]))
            })
            .collect();

        let info = BTreeMap::from([
            ("files".to_string(), Value::List(files)),
            ("piece length".to_string(), Value::from(self.piece_length)),
            ("private".to_string(), Value::from(self.private)),
            ("closed".to_string(), Value::from(self.closed)),
        ]);
        let root = BTreeMap::from([
            (
                "creation date".to_string(),
                Value::from(self.created.timestamp().max(0) as u64),
            ),
            ("title".to_string(), Value::from(self.title.as_str())),
            ("info".to_string(), Value::Dict(info)),
        ]);
        Value::Dict(root).encode()
    }

    /// Wrap the metafile in a `.solidpkg` container
    pub fn to_container(&self) -> ContainerResult<Vec<u8>> {
        let mut builder = ContainerBuilder::new();
        builder.add_file(METAFILE_NAME, self.to_metafile());
        builder.build()
    }
}
