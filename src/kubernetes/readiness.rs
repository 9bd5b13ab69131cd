// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Readiness polling for custom resources

use crate::constants::readiness::{CONDITION_READY, POLL_INTERVAL_SECS, STATUS_TRUE};
use crate::error::{BootstrapError, Result};
use crate::kubernetes::client::KubeClient;
use crate::kubernetes::resource::api_resource_for_plural;
use kube::api::{DynamicObject, ListParams};
use kube::{Api, ResourceExt};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Check `status.conditions` for `type=Ready, status=True`.
///
/// A missing status or condition list means not ready yet.
pub fn is_ready(object: &DynamicObject) -> bool {
    object
        .data
        .pointer("/status/conditions")
        .and_then(|c| c.as_array())
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some(CONDITION_READY)
                    && c.get("status").and_then(|s| s.as_str()) == Some(STATUS_TRUE)
            })
        })
}

impl KubeClient {
    /// Wait for every instance of a custom resource in `namespace` to report Ready.
    ///
    /// Instances are checked one after another in list order, each with its own
    /// `timeout`. No instances means nothing to wait for.
    #[instrument(skip(self, timeout))]
    pub async fn wait_custom_resources_ready(
        &self,
        namespace: &str,
        group: &str,
        version: &str,
        resource: &str,
        timeout: Duration,
    ) -> Result<()> {
        let api_resource = api_resource_for_plural(group, version, resource);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client().clone(), namespace, &api_resource);

        let instances = api.list(&ListParams::default()).await?;
        if instances.items.is_empty() {
            debug!("No {} found in {}, nothing to wait for", resource, namespace);
            return Ok(());
        }

        for instance in &instances.items {
            let name = instance.name_any();
            let start = Instant::now();

            loop {
                let current = api.get(&name).await?;
                if is_ready(&current) {
                    info!("{} {}/{} is Ready", resource, namespace, name);
                    break;
                }

                if start.elapsed() >= timeout {
                    return Err(BootstrapError::NotReady {
                        resource: resource.to_string(),
                        name,
                        namespace: namespace.to_string(),
                        timeout,
                    });
                }

                debug!("{} {}/{} not Ready yet", resource, namespace, name);
                self.sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await?;
            }
        }

        Ok(())
    }
}
