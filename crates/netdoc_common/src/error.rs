//! Error types for netdoc.
//!
//! Gate refusals are not errors; they are [`crate::verdict::Rejection`]
//! values. The enums here cover loading and persistence failures.

use std::path::PathBuf;
use thiserror::Error;

/// Knowledge base loading and saving failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Knowledge base file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read knowledge base {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed knowledge base: {0}")]
    Malformed(String),

    #[error("Knowledge base contains no commands")]
    Empty,

    #[error("Duplicate command in knowledge base: {0}")]
    Duplicate(String),

    #[error("Failed to write knowledge base {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rule table loading failures.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed rules file: {0}")]
    Malformed(#[from] toml::de::Error),

    #[error("Invalid pattern '{pattern}' in {table} table: {message}")]
    InvalidPattern {
        table: String,
        pattern: String,
        message: String,
    },

    #[error("The {0} rule table is empty")]
    EmptyTable(String),
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Audit sink failures.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
