// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::error::{BootstrapError, Result};
use crate::kubernetes::client::KubeClient;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use tracing::{debug, instrument};

impl KubeClient {
    /// Check whether any served version of `group` exposes `kind`.
    ///
    /// Only a failure to list API groups is an error. Group versions that cannot
    /// be queried are logged and skipped, so a kind served solely by an
    /// unreachable group version is reported as absent.
    #[instrument(skip(self))]
    pub async fn has_crd(&self, group: &str, kind: &str) -> Result<bool> {
        let client = self.client();

        let group_versions: Vec<String> = if group.is_empty() {
            client
                .list_core_api_versions()
                .await
                .map_err(BootstrapError::DiscoveryFailure)?
                .versions
        } else {
            client
                .list_api_groups()
                .await
                .map_err(BootstrapError::DiscoveryFailure)?
                .groups
                .into_iter()
                .filter(|g| g.name == group)
                .flat_map(|g| g.versions.into_iter().map(|v| v.group_version))
                .collect()
        };

        if group_versions.is_empty() {
            debug!("API group {} is not served", group);
            return Ok(false);
        }

        for group_version in &group_versions {
            let listed = if group.is_empty() {
                client.list_core_api_resources(group_version).await
            } else {
                client.list_api_group_resources(group_version).await
            };

            let resources: APIResourceList = match listed {
                Ok(list) => list,
                Err(e) => {
                    debug!("Skipping unreachable group version {}: {}", group_version, e);
                    continue;
                }
            };

            if resources.resources.iter().any(|r| r.kind == kind) {
                debug!("Found {} in {}", kind, group_version);
                return Ok(true);
            }
        }

        debug!("{} not served by group {}", kind, group);
        Ok(false)
    }
}
