// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::constants::namespace::{POLL_INTERVAL_SECS, PROGRESS_EVERY_POLLS, WAIT_TIMEOUT_SECS};
use crate::error::{BootstrapError, Result};
use crate::kubernetes::apply::{apply_params, classify_write_error};
use crate::kubernetes::client::KubeClient;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{DeleteParams, ObjectMeta, Patch},
    Api,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Observed lifecycle phase of an existing namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespacePhase {
    Active,
    Terminating,
}

impl NamespacePhase {
    fn of(namespace: &Namespace) -> Self {
        let phase = namespace.status.as_ref().and_then(|s| s.phase.as_deref());
        if phase == Some("Terminating") || namespace.metadata.deletion_timestamp.is_some() {
            NamespacePhase::Terminating
        } else {
            NamespacePhase::Active
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BootstrapError::InvalidArgument(
            "namespace name must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl KubeClient {
    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client().clone())
    }

    /// Current phase of a namespace, `None` when it does not exist
    pub async fn namespace_phase(&self, name: &str) -> Result<Option<NamespacePhase>> {
        match self.namespaces().get(name).await {
            Ok(ns) => Ok(Some(NamespacePhase::of(&ns))),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure a namespace exists, waiting out a pending deletion first
    #[instrument(skip(self))]
    pub async fn ensure_namespace(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        if self.settle_namespace(name).await? {
            debug!("Namespace {} already exists", name);
            return Ok(());
        }

        info!("Creating namespace {}", name);
        self.apply_namespace(name, BTreeMap::new(), BTreeMap::new())
            .await
    }

    /// Server-side apply labels and annotations onto a namespace
    #[instrument(skip(self))]
    pub async fn set_labels_and_annotations(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<()> {
        validate_name(name)?;

        self.settle_namespace(name).await?;
        self.apply_namespace(name, labels.clone(), annotations.clone())
            .await
    }

    /// Delete a namespace and block until it is gone
    #[instrument(skip(self))]
    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        match self.namespaces().delete(name, &DeleteParams::default()).await {
            Ok(_) => info!("Deleting namespace {}", name),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("Namespace {} does not exist", name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.wait_namespace_gone(name).await?;
        info!("Namespace {} deleted", name);
        Ok(())
    }

    /// Poll until a namespace no longer exists, up to a fixed five minute deadline
    pub async fn wait_namespace_gone(&self, name: &str) -> Result<()> {
        let timeout = Duration::from_secs(WAIT_TIMEOUT_SECS);
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            if self.namespace_phase(name).await?.is_none() {
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(BootstrapError::Timeout {
                    what: format!("namespace {} to be removed", name),
                    after: timeout,
                });
            }

            polls += 1;
            if polls % PROGRESS_EVERY_POLLS == 0 {
                info!(
                    "Still waiting for namespace {} to finish terminating ({}s elapsed)",
                    name,
                    start.elapsed().as_secs()
                );
            }

            self.sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await?;
        }
    }

    /// Wait out a pending deletion; true when the namespace is already Active
    async fn settle_namespace(&self, name: &str) -> Result<bool> {
        match self.namespace_phase(name).await? {
            Some(NamespacePhase::Active) => Ok(true),
            Some(NamespacePhase::Terminating) => {
                info!("Namespace {} is terminating, waiting for it to be removed", name);
                self.wait_namespace_gone(name).await?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn apply_namespace(
        &self,
        name: &str,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: (!labels.is_empty()).then_some(labels),
                annotations: (!annotations.is_empty()).then_some(annotations),
                ..Default::default()
            },
            ..Default::default()
        };

        self.namespaces()
            .patch(name, &apply_params(), &Patch::Apply(&ns))
            .await
            .map_err(|e| classify_write_error(e, name, BootstrapError::KubeError))?;

        debug!("Namespace {} applied", name);
        Ok(())
    }
}
