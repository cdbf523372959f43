//! SQLSTATE classification
//!
//! A data-driven table decides which backend errors the whole-operation
//! retry wrapper may replay. Detection (`is_code`) and retry policy
//! (`is_transient`) are deliberately independent queries: `42501` is used
//! elsewhere as a capability probe without ever being retryable.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

pub const SERIALIZATION_FAILURE: &str = "40001";
pub const DEADLOCK_DETECTED: &str = "40P01";
pub const LOCK_NOT_AVAILABLE: &str = "55P03";
pub const SYNTAX_ERROR: &str = "42601";
pub const UNDEFINED_OBJECT: &str = "42704";
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

static CLASSIFICATION: Lazy<BTreeMap<&'static str, ErrorClass>> = Lazy::new(|| {
    BTreeMap::from([
        (SERIALIZATION_FAILURE, ErrorClass::Transient),
        (DEADLOCK_DETECTED, ErrorClass::Transient),
        (LOCK_NOT_AVAILABLE, ErrorClass::Transient),
        (SYNTAX_ERROR, ErrorClass::Fatal),
        (UNDEFINED_OBJECT, ErrorClass::Fatal),
        (INSUFFICIENT_PRIVILEGE, ErrorClass::Fatal),
    ])
});

/// Classify a SQLSTATE code. Unlisted codes are fatal.
pub fn classify(code: &str) -> ErrorClass {
    CLASSIFICATION
        .get(code)
        .copied()
        .unwrap_or(ErrorClass::Fatal)
}

/// Extract the SQLSTATE code from a driver error, when the backend sent one.
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Does this error carry exactly the given SQLSTATE code?
pub fn is_code(err: &sqlx::Error, code: &str) -> bool {
    sqlstate(err).as_deref() == Some(code)
}

/// Is this error worth retrying the whole operation for?
pub fn is_transient(err: &sqlx::Error) -> bool {
    sqlstate(err)
        .map(|code| classify(&code) == ErrorClass::Transient)
        .unwrap_or(false)
}
