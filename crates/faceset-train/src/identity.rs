//! Identity keys derived from folder names.
//!
//! An identity folder is named `<anything>_<id>`. The suffix after the last
//! underscore is the raw id; `-1` marks a junk folder whose images carry no
//! label.

use std::{
    fmt,
    num::{IntErrorKind, ParseIntError},
    path::Path,
};

use crate::error::{DatasetError, DatasetResult};

/// Raw id reserved for junk identity folders.
pub const JUNK_ID: i64 = -1;

/// Largest accepted raw id (inclusive).
pub const MAX_IDENTITY_ID: i64 = 200_000;

/// Composite key `"{database_name}_{raw_id}"` naming one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    fn compose(database_name: &str, raw_id: &str) -> Self {
        Self(format!("{database_name}_{raw_id}"))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of parsing an identity folder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderIdentity {
    /// A folder contributing a labelled identity.
    Registered(IdentityKey),
    /// A junk folder; its images are excluded from the label space.
    Junk,
}

/// Parse an identity folder name into its identity.
///
/// The key keeps the raw suffix text, so `person_00042` becomes
/// `GlintAsia_00042`. Range checks use the numeric value.
///
/// # Errors
///
/// Returns an error when the name has no underscore, when the suffix is not
/// an integer, or when the id lies outside `[0, MAX_IDENTITY_ID]`.
pub fn parse_folder(database_name: &str, folder: &str) -> DatasetResult<FolderIdentity> {
    let Some((_, token)) = folder.rsplit_once('_') else {
        return Err(DatasetError::MissingIdSuffix {
            folder: folder.to_string(),
        });
    };

    let out_of_range = || DatasetError::IdOutOfRange {
        folder: folder.to_string(),
        token: token.to_string(),
        max: MAX_IDENTITY_ID,
    };

    let id: i64 = token.parse().map_err(|err: ParseIntError| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => out_of_range(),
        _ => DatasetError::NonNumericId {
            folder: folder.to_string(),
            token: token.to_string(),
        },
    })?;

    if id == JUNK_ID {
        return Ok(FolderIdentity::Junk);
    }
    if !(0..=MAX_IDENTITY_ID).contains(&id) {
        return Err(out_of_range());
    }

    Ok(FolderIdentity::Registered(IdentityKey::compose(
        database_name,
        token,
    )))
}

/// Parse the identity of a sample from its parent folder name.
pub fn parse_sample(database_name: &str, sample: &Path) -> DatasetResult<FolderIdentity> {
    let folder = sample
        .parent()
        .and_then(Path::file_name)
        .ok_or_else(|| DatasetError::MissingIdSuffix {
            folder: sample.display().to_string(),
        })?
        .to_str()
        .ok_or_else(|| DatasetError::InvalidUtf8Path {
            path: sample.to_path_buf(),
        })?;

    parse_folder(database_name, folder)
}
