//! Portability checks for asset names.
//!
//! A name that works on Linux can still be impossible to create on Windows.
//! Strict-mode VFS reads reject such paths so they are caught on every
//! platform, whichever source would have served them.

use std::fmt;

use thiserror::Error;

use crate::path::VfsPath;

/// Characters Windows forbids in file names. Control characters are checked
/// separately.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnsafeReason {
    IllegalChar(char),
    ReservedName(String),
    TrailingDotOrSpace(String),
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeReason::IllegalChar(c) => write!(f, "illegal character {c:?}"),
            UnsafeReason::ReservedName(segment) => {
                write!(f, "`{segment}` is a reserved device name")
            }
            UnsafeReason::TrailingDotOrSpace(segment) => {
                write!(f, "`{segment}` ends with a dot or space")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unsafe path `{path}`: {reason}")]
pub struct UnsafePath {
    pub path: VfsPath,
    pub reason: UnsafeReason,
}

/// Checks that every segment of `path` could be materialized as a file name on
/// the least permissive supported platform.
pub fn validate_path(path: &VfsPath) -> Result<(), UnsafePath> {
    for segment in path.segments() {
        if let Some(reason) = check_segment(segment) {
            return Err(UnsafePath {
                path: path.clone(),
                reason,
            });
        }
    }
    Ok(())
}

pub fn is_safe_path(path: &VfsPath) -> bool {
    validate_path(path).is_ok()
}

fn check_segment(segment: &str) -> Option<UnsafeReason> {
    if let Some(c) = segment
        .chars()
        .find(|c| (*c as u32) < 0x20 || ILLEGAL_CHARS.contains(c))
    {
        return Some(UnsafeReason::IllegalChar(c));
    }

    if is_reserved_name(segment) {
        return Some(UnsafeReason::ReservedName(segment.to_owned()));
    }

    if segment.ends_with(['.', ' ']) {
        return Some(UnsafeReason::TrailingDotOrSpace(segment.to_owned()));
    }

    None
}

/// `NUL` and `nul.txt` both open the null device on Windows.
fn is_reserved_name(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment);
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}
