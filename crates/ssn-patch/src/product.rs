//! Known products and their CDN locations

use crate::error::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest `from` release; `-1` means a fresh install
pub const MIN_FROM_RELEASE: i32 = -1;
/// Highest release number accepted anywhere
pub const MAX_RELEASE: i32 = 999;

macro_rules! products {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Product distributed through the patch CDN
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Product {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl Product {
            /// Every known product
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Name as used in CDN paths and file names
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

products! {
    AssetsDeDe => "assets_swtor_de_de",
    AssetsEnUs => "assets_swtor_en_us",
    AssetsFrFr => "assets_swtor_fr_fr",
    AssetsMain => "assets_swtor_main",
    AssetsTestDeDe => "assets_swtor_test_de_de",
    AssetsTestEnUs => "assets_swtor_test_en_us",
    AssetsTestFrFr => "assets_swtor_test_fr_fr",
    AssetsTestMain => "assets_swtor_test_main",
    Eualas => "eualas",
    MoviesDeDe => "movies_de_de",
    MoviesEnUs => "movies_en_us",
    MoviesFrFr => "movies_fr_fr",
    Patcher2014 => "patcher2014",
    Patcher2017 => "patcher2017",
    RetailBetaTest => "retailclient_betatest",
    RetailCsTraining => "retailclient_cstraining",
    RetailLiveEpTest => "retailclient_liveeptest",
    RetailLiveQaTest => "retailclient_liveqatest",
    RetailPublicTest => "retailclient_publictest",
    RetailSquadron157 => "retailclient_squadron157",
    RetailSwtor => "retailclient_swtor",
}

const RETAIL_PREFIX: &str = "retailclient_";

impl Product {
    /// Launcher products only ship fresh installs
    pub fn is_launcher(self) -> bool {
        self.name().starts_with("patcher")
    }

    /// Directory below `/patch/` holding this product's hops
    ///
    /// Retail clients live one level deeper, under the part of their name
    /// after `retailclient_`.
    pub fn cdn_directory(self) -> String {
        let name = self.name();
        match name.strip_prefix(RETAIL_PREFIX) {
            Some(sub) => format!("/patch/{sub}/{name}"),
            None => format!("/patch/{name}"),
        }
    }

    /// Path of the product's `.patchmanifest` on the manifest host
    pub fn manifest_path(self) -> String {
        format!("/patch/{}.patchmanifest", self.name())
    }

    /// Path of the `.solidpkg` describing hop `from`→`to`
    pub fn solidpkg_path(self, from: i32, to: i32) -> String {
        format!("{}/{}_{from}to{to}.solidpkg", self.cdn_directory(), self.name())
    }

    /// Path of one file of hop `from`→`to`
    pub fn hop_file_path(self, from: i32, to: i32, file: &str) -> String {
        format!(
            "{}/{}_{from}to{to}/{file}",
            self.cdn_directory(),
            self.name()
        )
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Product {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| PatchError::UnknownProduct(s.to_string()))
    }
}

/// Check a hop's release numbers against the accepted ranges
pub fn check_releases(from: i32, to: i32) -> Result<()> {
    if !(MIN_FROM_RELEASE..=MAX_RELEASE).contains(&from) {
        return Err(PatchError::InvalidRelease {
            what: "from",
            value: from,
        });
    }
    if !(0..=MAX_RELEASE).contains(&to) {
        return Err(PatchError::InvalidRelease {
            what: "to",
            value: to,
        });
    }
    Ok(())
}
