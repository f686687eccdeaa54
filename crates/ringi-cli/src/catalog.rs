//! Loading policy and flow catalogs from JSON files.
//!
//! A catalog file is a JSON array of records. Records are decoded once;
//! a malformed record fails the whole file.

use std::path::{Path, PathBuf};

use ringi_approval::{ApprovalFlow, InMemoryFlowRepository};
use ringi_config::CatalogSection;
use ringi_policy::{InMemoryPolicyRepository, Policy};
use thiserror::Error;
use tracing::info;

/// Catalog loading failures.
#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    /// The config names no file for this catalog.
    #[error("no {0} catalog configured (set [catalog] {0} or RINGI_{1}_PATH)")]
    NotConfigured(&'static str, &'static str),

    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON array of valid records.
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// File path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Records decoded but the catalog as a whole is invalid.
    #[error("invalid catalog {path}: {message}")]
    Invalid {
        /// File path.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },
}

pub(crate) type CatalogResult<T> = Result<T, CatalogError>;

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> CatalogResult<Vec<T>> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode `policies.json`.
fn load_policies(path: &Path) -> CatalogResult<Vec<Policy>> {
    let policies: Vec<Policy> = read_records(path)?;
    info!(path = %path.display(), count = policies.len(), "loaded policy catalog");
    Ok(policies)
}

/// Decode `flows.json` without validating the flows.
fn load_flows(path: &Path) -> CatalogResult<Vec<ApprovalFlow>> {
    let flows: Vec<ApprovalFlow> = read_records(path)?;
    info!(path = %path.display(), count = flows.len(), "loaded flow catalog");
    Ok(flows)
}

/// The configured policy catalog as a repository.
pub(crate) fn policy_repository(section: &CatalogSection) -> CatalogResult<InMemoryPolicyRepository> {
    let path = section
        .policies
        .as_deref()
        .ok_or(CatalogError::NotConfigured("policies", "POLICIES"))?;
    InMemoryPolicyRepository::from_policies(load_policies(path)?).map_err(|e| CatalogError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// The configured flow catalog as a repository; every flow is validated.
pub(crate) fn flow_repository(section: &CatalogSection) -> CatalogResult<InMemoryFlowRepository> {
    let path = section
        .flows
        .as_deref()
        .ok_or(CatalogError::NotConfigured("flows", "FLOWS"))?;
    InMemoryFlowRepository::from_flows(load_flows(path)?).map_err(|e| CatalogError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
