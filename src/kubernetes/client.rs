// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster client construction and the shared handle used by every operation

use crate::error::{BootstrapError, Result};
use crate::kubernetes::resource::ResolvedKind;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Handle to a Kubernetes API server.
///
/// Built once per process and cloned freely; the underlying [`Client`] serves
/// both typed/dynamic requests and API discovery. Every sleep performed by an
/// operation (retry backoff, polling) races the cancellation token.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    cancel: CancellationToken,
    /// Kinds resolved through discovery, keyed by `apiVersion/kind`
    kinds: Arc<Mutex<HashMap<String, ResolvedKind>>>,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
            kinds: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Connect using a kubeconfig path and optional context.
    ///
    /// An empty path falls back to the loader's default search (KUBECONFIG, then
    /// `~/.kube/config`); an empty context selects the current context.
    #[instrument(skip_all, fields(kubeconfig = %kubeconfig, context = %context))]
    pub async fn connect(kubeconfig: &str, context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: (!context.is_empty()).then(|| context.to_string()),
            ..Default::default()
        };

        let config = if kubeconfig.is_empty() {
            KConfig::from_kubeconfig(&options).await.map_err(|e| {
                BootstrapError::KubeconfigError(format!("Failed to load default kubeconfig: {}", e))
            })?
        } else {
            create_config_from_path(Path::new(kubeconfig), &options).await?
        };

        debug!("Using cluster {}", config.cluster_url);

        let client = Client::try_from(config)
            .map_err(|e| BootstrapError::KubeconfigError(format!("Failed to create client: {}", e)))?;
        info!("Connected to Kubernetes cluster");

        Ok(Self::new(client))
    }

    /// Tie this handle to an externally owned token (e.g. cancelled on Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fail with `Cancelled` once the token has fired
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(BootstrapError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn cached_kind(&self, key: &str) -> Option<ResolvedKind> {
        self.kinds.lock().ok()?.get(key).cloned()
    }

    pub(crate) fn cache_kind(&self, key: String, kind: ResolvedKind) {
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.insert(key, kind);
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(BootstrapError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

async fn create_config_from_path(path: &Path, options: &KubeConfigOptions) -> Result<KConfig> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
        BootstrapError::KubeconfigError(format!(
            "Failed to read kubeconfig {}: {}",
            path.display(),
            e
        ))
    })?;

    KConfig::from_custom_kubeconfig(kubeconfig, options)
        .await
        .map_err(|e| BootstrapError::KubeconfigError(format!("Failed to create config: {}", e)))
}
