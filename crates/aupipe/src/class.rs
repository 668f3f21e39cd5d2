//! Audit class database access.
//!
//! Event preselection on the audit pipe is expressed as a pair of class
//! bitmasks (success and failure cases). Classes are named by short
//! mnemonics (`fc` = file create, `nt` = network, ...) and defined in
//! `/etc/security/audit_class`, one entry per line:
//!
//! ```text
//! 0x00000010:fc:file create
//! ```

use std::fs;
use std::path::Path;

use winnow::ascii::hex_uint;
use winnow::token::rest;
use winnow::prelude::*;
use winnow::token::take_while;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::parse::PResult;

/// Default location of the class database.
pub const AUDIT_CLASS_PATH: &str = "/etc/security/audit_class";

/// Preselection mask (`au_mask_t` from `bsm/audit.h`).
///
/// One bit set per audited class; `success` selects events that succeeded,
/// `failure` events that failed.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct AuMask {
    /// Classes delivered when the audited operation succeeds.
    pub success: u32,
    /// Classes delivered when the audited operation fails.
    pub failure: u32,
}

impl AuMask {
    /// Select a class for both success and failure cases, the way the
    /// harness always preselects.
    pub fn both(class: u32) -> Self {
        Self {
            success: class,
            failure: class,
        }
    }

    /// True if no class is selected at all.
    pub fn is_empty(&self) -> bool {
        self.success == 0 && self.failure == 0
    }
}

/// One entry of the class database.
#[derive(Debug, Clone)]
pub struct AuditClass {
    /// Class bit (e.g. `0x00000010`).
    pub mask: u32,
    /// Short mnemonic (e.g. `fc`).
    pub name: String,
    /// Human-readable description (e.g. `file create`).
    pub description: String,
}

/// Parsed view of the audit class database.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    entries: Vec<AuditClass>,
}

/// Parse one `mask:name:description` line.
fn class_line(input: &mut &str) -> PResult<AuditClass> {
    let _ = "0x".parse_next(input)?;
    let mask: u32 = hex_uint.parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let name = take_while(1.., |c: char| c != ':').parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let description = rest.parse_next(input)?;

    Ok(AuditClass {
        mask,
        name: name.to_string(),
        description: description.trim().to_string(),
    })
}

impl ClassTable {
    /// Load the system class database from [`AUDIT_CLASS_PATH`].
    pub fn load() -> Result<Self> {
        Self::load_from(AUDIT_CLASS_PATH)
    }

    /// Load a class database from an alternate path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, &path.to_string_lossy())
    }

    /// Parse database text. `path` is used for error reporting only.
    pub fn parse(text: &str, path: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = class_line.parse(line).map_err(|_| Error::Database {
                path: path.to_string(),
                line: idx + 1,
            })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Look up a class by mnemonic.
    pub fn get(&self, name: &str) -> Option<&AuditClass> {
        self.entries.iter().find(|c| c.name == name)
    }

    /// Resolve a mnemonic to a preselection mask with both the success and
    /// failure bit set, failing on unknown names.
    pub fn resolve(&self, name: &str) -> Result<AuMask> {
        self.get(name)
            .map(|c| AuMask::both(c.mask))
            .ok_or_else(|| Error::UnknownClass {
                name: name.to_string(),
            })
    }

    /// Iterate over all entries in database order.
    pub fn iter(&self) -> impl Iterator<Item = &AuditClass> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the database contained no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
