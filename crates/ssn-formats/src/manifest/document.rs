//! `manifest.xml` model

use crate::container::{Container, ContainerBuilder, ContainerResult};
use crate::manifest::error::{ManifestError, ManifestResult};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Name of the only entry inside a `.patchmanifest`
pub const MANIFEST_NAME: &str = "manifest.xml";

/// One published release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRelease {
    /// SHA-1 of the release, lowercase hex
    pub sha1: String,
    /// Releases that have an update path into this one
    pub from: Vec<i32>,
    /// Releases this one has an update path to
    pub to: Vec<i32>,
}

/// Decoded `manifest.xml` of one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchManifest {
    /// Product name
    pub name: String,
    /// Release clients are required to be on
    pub current: i32,
    /// Every release, keyed by its number
    pub releases: BTreeMap<i32, ManifestRelease>,
}

fn invalid(message: impl Into<String>) -> ManifestError {
    ManifestError::Invalid(message.into())
}

fn xml_error(error: impl std::fmt::Display) -> ManifestError {
    ManifestError::Xml(error.to_string())
}

fn release_number(text: &str, field: &str) -> ManifestResult<i32> {
    text.parse()
        .map_err(|_| invalid(format!("{field} is not a release number: \"{text}\"")))
}

/// Values collected while walking the document
#[derive(Default)]
struct Collected {
    root: Option<String>,
    name: Option<String>,
    current: Option<i32>,
    releases: BTreeMap<i32, ManifestRelease>,
    paths: Vec<(i32, i32)>,
    id: Option<i32>,
    sha1: Option<String>,
    from: Option<i32>,
    to: Option<i32>,
}

impl Collected {
    /// Handle the end of the element at `path` whose text was `text`
    fn close(&mut self, path: &str, text: String) -> ManifestResult<()> {
        match path {
            "PatchManifest/Name" => self.name = Some(text),
            "PatchManifest/RequiredRelease" => {
                self.current = Some(release_number(&text, "RequiredRelease")?);
            }
            "PatchManifest/Releases/Release/Id" => {
                self.id = Some(release_number(&text, "Release Id")?);
            }
            "PatchManifest/Releases/Release/SHA1" => self.sha1 = Some(text),
            "PatchManifest/Releases/Release" => {
                let id = self.id.take().ok_or_else(|| invalid("Release without Id"))?;
                let sha1 = self
                    .sha1
                    .take()
                    .ok_or_else(|| invalid(format!("release {id} has no SHA1")))?;
                let release = ManifestRelease {
                    sha1,
                    ..ManifestRelease::default()
                };
                if self.releases.insert(id, release).is_some() {
                    return Err(invalid(format!("release {id} is listed twice")));
                }
            }
            "PatchManifest/ReleaseUpdatePaths/ReleaseUpdatePath/From" => {
                self.from = Some(release_number(&text, "From")?);
            }
            "PatchManifest/ReleaseUpdatePaths/ReleaseUpdatePath/To" => {
                self.to = Some(release_number(&text, "To")?);
            }
            "PatchManifest/ReleaseUpdatePaths/ReleaseUpdatePath" => {
                match (self.from.take(), self.to.take()) {
                    (Some(from), Some(to)) => self.paths.push((from, to)),
                    _ => return Err(invalid("ReleaseUpdatePath needs From and To")),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(mut self) -> ManifestResult<PatchManifest> {
        match self.root.as_deref() {
            Some("PatchManifest") => {}
            Some(other) => {
                return Err(invalid(format!(
                    "root element must be PatchManifest, found {other}"
                )));
            }
            None => return Err(invalid("document has no root element")),
        }
        let name = self.name.ok_or_else(|| invalid("missing Name"))?;
        let current = self
            .current
            .ok_or_else(|| invalid("missing RequiredRelease"))?;

        for (from, to) in self.paths {
            // -1 stands for "nothing installed" and is never a listed release
            if from != -1 {
                self.releases
                    .get_mut(&from)
                    .ok_or_else(|| invalid(format!("update path from unknown release {from}")))?
                    .to
                    .push(to);
            }
            self.releases
                .get_mut(&to)
                .ok_or_else(|| invalid(format!("update path to unknown release {to}")))?
                .from
                .push(from);
        }

        Ok(PatchManifest {
            name,
            current,
            releases: self.releases,
        })
    }
}

impl PatchManifest {
    /// Read the values of a `manifest.xml` document
    pub fn from_xml(xml: &str) -> ManifestResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut collected = Collected::default();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(element) => {
                    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                    if path.is_empty() {
                        collected.root.get_or_insert_with(|| name.clone());
                    }
                    path.push(name);
                    text.clear();
                }
                Event::Empty(element) if path.is_empty() => {
                    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                    collected.root.get_or_insert(name);
                }
                Event::Text(content) => text.push_str(&content.unescape().map_err(xml_error)?),
                Event::End(_) => {
                    collected.close(&path.join("/"), std::mem::take(&mut text))?;
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }
        collected.finish()
    }

    /// Extract and read `manifest.xml` from a `.patchmanifest` container
    pub fn from_container(data: &[u8]) -> ManifestResult<Self> {
        let container = Container::parse(data)?;
        let entry = match container.entries() {
            [entry] if entry.name == MANIFEST_NAME => entry,
            [entry] => {
                return Err(ManifestError::UnexpectedContents(format!(
                    "expected {MANIFEST_NAME}, found {}",
                    entry.name
                )));
            }
            entries => {
                return Err(ManifestError::UnexpectedContents(format!(
                    "expected 1 entry, found {}",
                    entries.len()
                )));
            }
        };

        let bytes = Container::open_embedded(data, entry)?.read_to_vec()?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| invalid(format!("{MANIFEST_NAME} is not UTF-8: {e}")))?;
        Self::from_xml(&xml)
    }

    /// Release numbers in ascending order
    pub fn release_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.releases.keys().copied()
    }

    /// Render as `manifest.xml` in the layout the CDN serves
    pub fn to_xml(&self) -> String {
        let name = escape(self.name.as_str());
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<PatchManifest \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n",
        );
        let _ = write!(
            xml,
            "  <Dependencies />\n  <Name>{name}</Name>\n  \
             <RequiredRelease>{current}</RequiredRelease>\n  \
             <UpcomingRelease>{current}</UpcomingRelease>\n  \
             <TargetDirectory>{name}</TargetDirectory>\n  \
             <RequiresElevation>false</RequiresElevation>\n  \
             <Maintenance>false</Maintenance>\n  <Releases>\n",
            current = self.current
        );
        for (id, release) in &self.releases {
            let _ = write!(
                xml,
                "    <Release>\n      <Id>{id}</Id>\n      <SHA1>{}</SHA1>\n      \
                 <Name>{name}_{id}</Name>\n    </Release>\n",
                escape(release.sha1.as_str())
            );
        }
        xml.push_str("  </Releases>\n  <ReleaseUpdatePaths>\n");
        for (to, release) in &self.releases {
            for from in &release.from {
                let _ = write!(
                    xml,
                    "    <ReleaseUpdatePath>\n      <From>{from}</From>\n      \
                     <To>{to}</To>\n      <ExtraData />\n    </ReleaseUpdatePath>\n"
                );
            }
        }
        xml.push_str("  </ReleaseUpdatePaths>\n</PatchManifest>\n");
        xml
    }

    /// Wrap `manifest.xml` in a `.patchmanifest` container
    pub fn to_container(&self) -> ContainerResult<Vec<u8>> {
        let mut builder = ContainerBuilder::new();
        builder.add_file(MANIFEST_NAME, self.to_xml().into_bytes());
        builder.build()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<PatchManifest xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <Dependencies />
  <Name>assets_swtor_de_de</Name>
  <RequiredRelease>2</RequiredRelease>
  <UpcomingRelease>2</UpcomingRelease>
  <TargetDirectory>assets_swtor_de_de</TargetDirectory>
  <RequiresElevation>false</RequiresElevation>
  <Maintenance>false</Maintenance>
  <Releases>
    <Release><Id>0</Id><SHA1>53678f8057e52896a8145dca5c188ab3f24fa55f</SHA1><Name>assets_swtor_de_de_0</Name></Release>
    <Release><Id>1</Id><SHA1>1111111111111111111111111111111111111111</SHA1><Name>assets_swtor_de_de_1</Name></Release>
    <Release><Id>2</Id><SHA1>2222222222222222222222222222222222222222</SHA1><Name>assets_swtor_de_de_2</Name></Release>
  </Releases>
  <ReleaseUpdatePaths>
    <ReleaseUpdatePath><From>-1</From><To>0</To><ExtraData /></ReleaseUpdatePath>
    <ReleaseUpdatePath><From>0</From><To>1</To><ExtraData><ExtraDataItem><Key>k</Key><Value>v</Value></ExtraDataItem></ExtraData></ReleaseUpdatePath>
    <ReleaseUpdatePath><From>0</From><To>2</To><ExtraData /></ReleaseUpdatePath>
    <ReleaseUpdatePath><From>1</From><To>2</To><ExtraData /></ReleaseUpdatePath>
  </ReleaseUpdatePaths>
</PatchManifest>"#;

    #[test]
    fn test_reads_releases_and_paths() {
        let manifest = PatchManifest::from_xml(SAMPLE).unwrap();
        assert_eq!(manifest.name, "assets_swtor_de_de");
        assert_eq!(manifest.current, 2);
        assert_eq!(manifest.release_ids().collect::<Vec<_>>(), vec![0, 1, 2]);

        let first = &manifest.releases[&0];
        assert_eq!(first.sha1, "53678f8057e52896a8145dca5c188ab3f24fa55f");
        assert_eq!(first.from, vec![-1]);
        assert_eq!(first.to, vec![1, 2]);
        assert_eq!(manifest.releases[&2].from, vec![0, 1]);
        assert!(manifest.releases[&2].to.is_empty());
    }

    #[test]
    fn test_container_round_trip() {
        let manifest = PatchManifest::from_xml(SAMPLE).unwrap();
        let data = manifest.to_container().unwrap();
        assert_eq!(PatchManifest::from_container(&data).unwrap(), manifest);
    }

    #[test]
    fn test_rejects_paths_to_unknown_releases() {
        let xml = SAMPLE.replace("<To>2</To>", "<To>7</To>");
        assert!(matches!(
            PatchManifest::from_xml(&xml),
            Err(ManifestError::Invalid(message)) if message.contains("unknown release 7")
        ));
    }

    #[test]
    fn test_rejects_bad_numbers_and_roots() {
        let xml = SAMPLE.replace("<RequiredRelease>2<", "<RequiredRelease>two<");
        assert!(matches!(
            PatchManifest::from_xml(&xml),
            Err(ManifestError::Invalid(_))
        ));
        assert!(matches!(
            PatchManifest::from_xml("<Other><Name>x</Name></Other>"),
            Err(ManifestError::Invalid(_))
        ));
        assert!(matches!(
            PatchManifest::from_xml("<PatchManifest><Name>x</PatchManifest>"),
            Err(ManifestError::Xml(_))
        ));
    }

    #[test]
    fn test_container_must_hold_only_the_manifest() {
        let mut builder = ContainerBuilder::new();
        builder.add_file("other.xml", SAMPLE.as_bytes().to_vec());
        let data = builder.build().unwrap();
        assert!(matches!(
            PatchManifest::from_container(&data),
            Err(ManifestError::UnexpectedContents(_))
        ));
    }
}
