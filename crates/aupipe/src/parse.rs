//! Shared parsing helpers.

/// Result type used by the winnow parsers in this crate.
pub(crate) type PResult<T> = winnow::ModalResult<T>;
