// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace + image pull secret for the Camunda registry

use crate::constants::registry;
use crate::error::{BootstrapError, Result};
use crate::kubernetes::apply::{apply_params, classify_write_error};
use crate::kubernetes::client::KubeClient;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, Patch};
use kube::Api;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

#[derive(Serialize)]
struct DockerConfigJson<'a> {
    auths: BTreeMap<&'a str, DockerAuth<'a>>,
}

#[derive(Serialize)]
struct DockerAuth<'a> {
    username: &'a str,
    password: &'a str,
    auth: String,
}

/// Render a one-registry `.dockerconfigjson` document
pub fn docker_config_json(registry: &str, username: &str, password: &str) -> Result<String> {
    let config = DockerConfigJson {
        auths: BTreeMap::from([(
            registry,
            DockerAuth {
                username,
                password,
                auth: STANDARD.encode(format!("{}:{}", username, password)),
            },
        )]),
    };
    serde_json::to_string(&config).map_err(|source| BootstrapError::Serialize {
        what: format!("docker config for {}", registry),
        source,
    })
}

/// Build the `registry-camunda-cloud` pull secret for a namespace
pub fn pull_secret(namespace: &str, username: &str, password: &str) -> Result<Secret> {
    let config = docker_config_json(registry::HOST, username, password)?;
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(registry::SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some(registry::SECRET_TYPE.to_string()),
        data: Some(BTreeMap::from([(
            registry::DATA_KEY.to_string(),
            ByteString(config.into_bytes()),
        )])),
        ..Default::default()
    })
}

impl KubeClient {
    /// Ensure the namespace exists and, when both credentials are set, apply the pull secret
    #[instrument(skip(self, username, password))]
    pub async fn ensure_namespace_with_pull_secret(
        &self,
        namespace: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.ensure_namespace(namespace).await?;

        if username.is_empty() || password.is_empty() {
            debug!("Registry credentials not set, skipping pull secret");
            return Ok(());
        }

        let secrets: Api<Secret> = Api::namespaced(self.client().clone(), namespace);
        let secret = pull_secret(namespace, username, password)?;
        secrets
            .patch(registry::SECRET_NAME, &apply_params(), &Patch::Apply(&secret))
            .await
            .map_err(|e| classify_write_error(e, namespace, BootstrapError::KubeError))?;

        info!(
            "Applied pull secret {}/{} for {}",
            namespace,
            registry::SECRET_NAME,
            registry::HOST
        );
        Ok(())
    }
}
