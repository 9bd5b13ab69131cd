// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kind → REST resource mapping

use crate::kubernetes::client::KubeClient;
use kube::api::{ApiResource, GroupVersionKind};
use kube::discovery::{self, Scope};
use tracing::debug;

/// Kinds known to live outside any namespace, used when discovery cannot answer.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "ClusterIssuer",
    "ClusterRole",
    "ClusterRoleBinding",
    "ClusterSecretStore",
    "ClusterExternalSecret",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeSnapshotClass",
];

/// Split an apiVersion into (group, version); the core group is empty.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Guess the plural resource name of a kind.
///
/// Lowercases the kind, then `s/x/z/ch/sh` → `+es`, consonant + `y` → `ies`,
/// anything else → `+s`.
pub fn guess_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if lower == "endpoints" {
        return lower;
    }

    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", lower)
    } else if let Some(stem) = lower.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'o', 'u']) {
            format!("{}s", lower)
        } else {
            format!("{}ies", stem)
        }
    } else {
        format!("{}s", lower)
    }
}

pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// REST resource and scope of a kind
#[derive(Debug, Clone)]
pub struct ResolvedKind {
    pub resource: ApiResource,
    pub namespaced: bool,
}

impl ResolvedKind {
    /// Plural guessing plus the known cluster-scoped kinds
    pub fn guessed(api_version: &str, kind: &str) -> Self {
        Self {
            resource: api_resource_for(api_version, kind),
            namespaced: !is_cluster_scoped(kind),
        }
    }
}

impl KubeClient {
    /// Resolve a kind's resource and scope through API discovery.
    ///
    /// Discovered kinds are cached for the lifetime of the client. When
    /// discovery fails the kind is guessed and not cached, so a CRD installed
    /// later in the same run is picked up on the next lookup.
    pub async fn resolve_kind(&self, api_version: &str, kind: &str) -> ResolvedKind {
        let key = format!("{}/{}", api_version, kind);
        if let Some(resolved) = self.cached_kind(&key) {
            return resolved;
        }

        let (group, version) = parse_api_version(api_version);
        let gvk = GroupVersionKind::gvk(&group, &version, kind);
        match discovery::pinned_kind(self.client(), &gvk).await {
            Ok((resource, capabilities)) => {
                let resolved = ResolvedKind {
                    resource,
                    namespaced: matches!(capabilities.scope, Scope::Namespaced),
                };
                self.cache_kind(key, resolved.clone());
                resolved
            }
            Err(e) => {
                debug!("Discovery could not resolve {}, guessing: {}", key, e);
                ResolvedKind::guessed(api_version, kind)
            }
        }
    }
}

/// Build the dynamic API resource for an apiVersion/kind pair
pub fn api_resource_for(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    let gvk = GroupVersionKind::gvk(&group, &version, kind);
    ApiResource::from_gvk_with_plural(&gvk, &guess_plural(kind))
}

/// Build the dynamic API resource for a group/version/plural triple
pub fn api_resource_for_plural(group: &str, version: &str, resource: &str) -> ApiResource {
    let api_version = if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    };
    ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version,
        kind: String::new(),
        plural: resource.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;

    fn resource_list(group_version: &str, resources: serde_json::Value) -> String {
        serde_json::json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": group_version,
            "resources": resources,
        })
        .to_string()
    }

    #[test]
    fn test_parse_api_version_with_group() {
        assert_eq!(
            parse_api_version("apps/v1"),
            ("apps".to_string(), "v1".to_string())
        );
    }

    #[test]
    fn test_parse_api_version_core() {
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
    }

    #[test]
    fn test_guess_plural_regular() {
        assert_eq!(guess_plural("Deployment"), "deployments");
        assert_eq!(guess_plural("ConfigMap"), "configmaps");
        assert_eq!(guess_plural("ExternalSecret"), "externalsecrets");
    }

    #[test]
    fn test_guess_plural_sibilant_endings() {
        assert_eq!(guess_plural("Ingress"), "ingresses");
        assert_eq!(guess_plural("Box"), "boxes");
        assert_eq!(guess_plural("Quiz"), "quizes");
        assert_eq!(guess_plural("Patch"), "patches");
        assert_eq!(guess_plural("Mesh"), "meshes");
    }

    #[test]
    fn test_guess_plural_y_ending() {
        assert_eq!(guess_plural("NetworkPolicy"), "networkpolicies");
        assert_eq!(guess_plural("Policy"), "policies");
        assert_eq!(guess_plural("Gateway"), "gateways");
    }

    #[test]
    fn test_guess_plural_endpoints() {
        assert_eq!(guess_plural("Endpoints"), "endpoints");
    }

    #[test]
    fn test_is_cluster_scoped() {
        assert!(is_cluster_scoped("Namespace"));
        assert!(is_cluster_scoped("ClusterSecretStore"));
        assert!(!is_cluster_scoped("ConfigMap"));
        assert!(!is_cluster_scoped("ExternalSecret"));
    }

    #[test]
    fn test_api_resource_for_group_kind() {
        let ar = api_resource_for("external-secrets.io/v1beta1", "ExternalSecret");
        assert_eq!(ar.group, "external-secrets.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.api_version, "external-secrets.io/v1beta1");
        assert_eq!(ar.plural, "externalsecrets");
    }

    #[test]
    fn test_api_resource_for_plural_core_group() {
        let ar = api_resource_for_plural("", "v1", "configmaps");
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.plural, "configmaps");
    }

    #[tokio::test]
    async fn test_resolve_kind_uses_discovery_scope() {
        let mock = MockService::new().on_get(
            "/apis/node.k8s.io/v1",
            200,
            &resource_list(
                "node.k8s.io/v1",
                serde_json::json!([{
                    "name": "runtimeclasses",
                    "singularName": "runtimeclass",
                    "namespaced": false,
                    "kind": "RuntimeClass",
                    "verbs": ["get", "patch"]
                }]),
            ),
        );
        let kube = KubeClient::new(mock.clone().into_client());

        let first = kube.resolve_kind("node.k8s.io/v1", "RuntimeClass").await;
        let second = kube.resolve_kind("node.k8s.io/v1", "RuntimeClass").await;

        assert!(!first.namespaced);
        assert_eq!(first.resource.plural, "runtimeclasses");
        assert!(!second.namespaced);
        assert_eq!(mock.requests_with_method("GET").len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_kind_falls_back_when_discovery_fails() {
        let kube = KubeClient::new(MockService::new().into_client());

        let role = kube
            .resolve_kind("rbac.authorization.k8s.io/v1", "ClusterRole")
            .await;
        let secret = kube.resolve_kind("v1", "Secret").await;

        assert!(!role.namespaced);
        assert_eq!(role.resource.plural, "clusterroles");
        assert!(secret.namespaced);
        assert_eq!(secret.resource.plural, "secrets");
    }
}
