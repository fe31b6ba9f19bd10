// SPDX-License-Identifier: AGPL-3.0

//! Console logging and diagnostics setup

use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Warnings base URL
pub const WARNINGS_BASE_URL: &str = "https://github.com/solcov/solcov/wiki/warnings";

/// Error codes for warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParsingError,
    InternalError,
    LibraryPlaceholder,
    MissingArtifact,
    UnknownSourceFile,
    UnattributedTrace,
    UnsupportedAssignment,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::ParsingError => "parsing-error",
            ErrorCode::InternalError => "internal-error",
            ErrorCode::LibraryPlaceholder => "library-placeholder",
            ErrorCode::MissingArtifact => "missing-artifact",
            ErrorCode::UnknownSourceFile => "unknown-source-file",
            ErrorCode::UnattributedTrace => "unattributed-trace",
            ErrorCode::UnsupportedAssignment => "unsupported-assignment",
        }
    }

    pub fn url(&self) -> String {
        format!("{}#{}", WARNINGS_BASE_URL, self.code())
    }
}

static UNIQUE_MESSAGES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn is_logged(message: &str) -> bool {
    UNIQUE_MESSAGES
        .lock()
        .map(|messages| messages.contains(message))
        .unwrap_or(false)
}

fn mark_logged(message: &str) {
    if let Ok(mut messages) = UNIQUE_MESSAGES.lock() {
        messages.insert(message.to_string());
    }
}

/// Returns true if the message should be printed, recording it when
/// duplicates are not allowed.
fn should_log(text: &str, allow_duplicate: bool) -> bool {
    if allow_duplicate {
        return true;
    }
    if is_logged(text) {
        return false;
    }
    mark_logged(text);
    true
}

pub fn debug(text: &str, allow_duplicate: bool) {
    if should_log(text, allow_duplicate) {
        eprintln!("{}", text.dimmed());
    }
}

pub fn warn(text: &str, allow_duplicate: bool) {
    if should_log(text, allow_duplicate) {
        eprintln!("{}", text.yellow());
    }
}

pub fn error(text: &str, allow_duplicate: bool) {
    if should_log(text, allow_duplicate) {
        eprintln!("{}", text.red());
    }
}

/// Log a warning with an error code
pub fn warn_code(error_code: ErrorCode, msg: &str, allow_duplicate: bool) {
    let full_msg = format!("{}\n(see {})", msg, error_code.url());
    warn(&full_msg, allow_duplicate);
}

/// Maps `-v` occurrences to a default filter directive.
pub fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` takes precedence
/// over the verbosity flag. Calling this twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
