//! Checks on the entry list of a patch directory

use crate::error::{PatchError, Result};
use crate::product::Product;
use ssn_formats::{DiffType, FileEntry};

fn fail(message: String) -> Result<()> {
    Err(PatchError::Validation(message))
}

fn diff_label(diff_type: Option<DiffType>) -> String {
    diff_type.map_or_else(|| "none".to_string(), |d| d.to_string())
}

/// Validate the entries of hop `from`→`to` of `product`
///
/// The last entry must be `{product}.version` as a new file. Some early
/// patches end with `Assets/{product}_version.txt` instead, and then the
/// second-to-last entry must be `{product}.version` as a changed file.
/// Fresh installs (`from == -1`) may only contain new files.
pub fn verify_patch(entries: &[FileEntry], product: Product, from: i32) -> Result<()> {
    let version = format!("{product}.version");
    let alternate = format!("Assets/{product}_version.txt");

    let Some(last) = entries.last() else {
        return fail(format!("expected at least a {version} entry, found none"));
    };

    if last.name == version {
        if last.diff_type != Some(DiffType::NewFile) {
            return fail(format!(
                "{version} must be a new file, found {}",
                diff_label(last.diff_type)
            ));
        }
    } else if last.name == alternate {
        let Some(second) = entries.len().checked_sub(2).map(|i| &entries[i]) else {
            return fail(format!("expected {version} before {alternate}"));
        };
        if second.name != version {
            return fail(format!(
                "second to last entry must be {version}, found \"{}\"",
                second.name
            ));
        }
        if second.diff_type != Some(DiffType::Changed) {
            return fail(format!(
                "{version} before {alternate} must be changed, found {}",
                diff_label(second.diff_type)
            ));
        }
    } else {
        return fail(format!(
            "last entry must be {version} or {alternate}, found \"{}\"",
            last.name
        ));
    }

    if from == -1
        && let Some(entry) = entries
            .iter()
            .find(|e| e.diff_type != Some(DiffType::NewFile))
    {
        return fail(format!(
            "fresh install contains \"{}\" with diff type {}",
            entry.name,
            diff_label(entry.diff_type)
        ));
    }
    Ok(())
}
