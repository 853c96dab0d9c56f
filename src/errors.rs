use std::{num::ParseIntError, result};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read instance {path}: {io_error}")]
    FailedToReadInstance { path: String, io_error: std::io::Error },
    #[error("instance {path} has unrecognised extension (expected .ectt or .ctt)")]
    UnknownInstanceFormat { path: String },
    #[error("instance {path} is malformed: {reason}")]
    MalformedInstance { path: String, reason: String },
    #[error(
        "course {course} needs {lectures} lectures but only {available} periods are available to it"
    )]
    InfeasiblePrecheck {
        course: String,
        lectures: usize,
        available: usize,
    },
    #[error("failed to read config {path}: {io_error}")]
    FailedToReadConfig { path: String, io_error: std::io::Error },
    #[error("bad value {value:?} for config key {key}: {reason}")]
    MalformedConfig {
        key: String,
        value: String,
        reason: String,
    },
    #[error("bad integer in {context}: {err}")]
    BadInteger { context: String, err: ParseIntError },
    #[error("propagation wiped out the root domain: {reason}")]
    RootWipeout { reason: String },
}

pub type Result<T> = result::Result<T, Box<Error>>;
