// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap server-side apply

use crate::error::{BootstrapError, Result};
use crate::kubernetes::apply::{apply_params, classify_write_error};
use crate::kubernetes::client::KubeClient;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ObjectMeta, Patch};
use kube::Api;
use std::collections::BTreeMap;
use tracing::{info, instrument};

impl KubeClient {
    /// Server-side apply a ConfigMap with the given data
    #[instrument(skip(self, data))]
    pub async fn apply_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()> {
        if namespace.is_empty() || name.is_empty() {
            return Err(BootstrapError::InvalidArgument(
                "config map namespace and name must not be empty".to_string(),
            ));
        }

        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(data.clone()),
            ..Default::default()
        };

        let config_maps: Api<ConfigMap> = Api::namespaced(self.client().clone(), namespace);
        config_maps
            .patch(name, &apply_params(), &Patch::Apply(&config_map))
            .await
            .map_err(|e| {
                classify_write_error(e, namespace, |source| BootstrapError::ApplyFailed {
                    kind: "ConfigMap".to_string(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    source,
                })
            })?;

        info!("Applied ConfigMap {}/{}", namespace, name);
        Ok(())
    }
}
