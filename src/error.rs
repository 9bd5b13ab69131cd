// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to parse manifest document #{index}: {source}")]
    ManifestParse {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid manifest document #{index}: {reason}")]
    InvalidManifest { index: usize, reason: String },

    #[error(
        "Namespace {namespace} is being terminated; wait for the deletion to finish or use a different namespace"
    )]
    NamespaceTerminating { namespace: String },

    #[error(
        "Admission webhook not ready while applying {kind} {namespace}/{name} (attempts={attempts}): {source}"
    )]
    WebhookNotReady {
        kind: String,
        name: String,
        namespace: String,
        attempts: u32,
        #[source]
        source: kube::Error,
    },

    #[error("{resource} {namespace}/{name} did not become Ready within {timeout:?}")]
    NotReady {
        resource: String,
        name: String,
        namespace: String,
        timeout: Duration,
    },

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Failed to apply {kind} {namespace}/{name}: {source}")]
    ApplyFailed {
        kind: String,
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },

    #[error("API discovery failed: {0}")]
    DiscoveryFailure(#[source] kube::Error),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rendering chart {} failed: {message}", .chart.display())]
    RenderFailed { chart: PathBuf, message: String },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Manifest document #{index} ({kind} {namespace}/{name}): {source}")]
    Document {
        index: usize,
        kind: String,
        name: String,
        namespace: String,
        #[source]
        source: Box<BootstrapError>,
    },
}

impl BootstrapError {
    /// The classified cause, looking through per-document wrappers.
    pub fn root(&self) -> &BootstrapError {
        match self {
            BootstrapError::Document { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
