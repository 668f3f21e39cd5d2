//! Audit event database access.
//!
//! BSM record headers carry the event as a number; the mapping to names
//! lives in `/etc/security/audit_event`, one entry per line:
//!
//! ```text
//! 47:AUE_MKDIR:mkdir(2):fc
//! ```
//!
//! Rendered records use the description field (`mkdir(2)`), which is what
//! assertion patterns match against.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use winnow::ascii::dec_uint;
use winnow::token::rest;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::error::{Error, Result};
use crate::parse::PResult;

/// Default location of the event database.
pub const AUDIT_EVENT_PATH: &str = "/etc/security/audit_event";

/// One entry of the event database.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event number as it appears in record headers.
    pub number: u16,
    /// Symbolic name (e.g. `AUE_MKDIR`).
    pub name: String,
    /// Description used in rendered output (e.g. `mkdir(2)`).
    pub description: String,
    /// Comma-separated class mnemonics this event belongs to.
    pub classes: String,
}

/// Parsed view of the audit event database.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    entries: HashMap<u16, AuditEvent>,
}

/// Parse one `number:name:description:classes` line.
fn event_line(input: &mut &str) -> PResult<AuditEvent> {
    let number: u16 = dec_uint.parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let name = take_while(1.., |c: char| c != ':').parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let description = take_while(1.., |c: char| c != ':').parse_next(input)?;
    let _ = ':'.parse_next(input)?;
    let classes = rest.parse_next(input)?;

    Ok(AuditEvent {
        number,
        name: name.to_string(),
        description: description.to_string(),
        classes: classes.trim().to_string(),
    })
}

impl EventTable {
    /// Load the system event database from [`AUDIT_EVENT_PATH`].
    pub fn load() -> Result<Self> {
        Self::load_from(AUDIT_EVENT_PATH)
    }

    /// Load an event database from an alternate path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, &path.to_string_lossy())
    }

    /// Parse database text. `path` is used for error reporting only.
    pub fn parse(text: &str, path: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = event_line.parse(line).map_err(|_| Error::Database {
                path: path.to_string(),
                line: idx + 1,
            })?;
            entries.insert(entry.number, entry);
        }
        Ok(Self { entries })
    }

    /// Look up an event by number.
    pub fn get(&self, number: u16) -> Option<&AuditEvent> {
        self.entries.get(&number)
    }

    /// Description for a header event number, falling back to the decimal
    /// number for events missing from the database.
    pub fn describe(&self, number: u16) -> String {
        match self.get(number) {
            Some(event) => event.description.clone(),
            None => number.to_string(),
        }
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
