// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Server-side apply of arbitrary manifests with webhook retry

use crate::constants::{retry, FIELD_MANAGER};
use crate::error::{BootstrapError, Result};
use crate::kubernetes::client::KubeClient;
use crate::kubernetes::manifest::{Manifest, ManifestStream};
use crate::kubernetes::resource::ResolvedKind;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::Api;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Substrings that, together with "webhook", mark an admission webhook as not yet reachable
const WEBHOOK_UNAVAILABLE_MARKERS: &[&str] = &[
    "no endpoints available",
    "connection refused",
    "failed to call webhook",
    "service unavailable",
    "Internal error occurred",
];

/// Apply parameters shared by every write: fixed field manager, conflicts forced.
pub fn apply_params() -> PatchParams {
    PatchParams::apply(FIELD_MANAGER).force()
}

/// Whether an error message means an admission webhook has no ready backend yet
pub fn is_webhook_not_ready(message: &str) -> bool {
    message.contains("webhook")
        && WEBHOOK_UNAVAILABLE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
}

/// Whether an error message is the API server refusing writes to a namespace being deleted
pub fn is_namespace_terminating(message: &str) -> bool {
    message.contains("because it is being terminated")
}

/// Map a write error to `NamespaceTerminating` when the API server reports deletion in progress
pub(crate) fn classify_write_error(
    error: kube::Error,
    namespace: &str,
    on_other: impl FnOnce(kube::Error) -> BootstrapError,
) -> BootstrapError {
    if is_namespace_terminating(&error.to_string()) {
        BootstrapError::NamespaceTerminating {
            namespace: namespace.to_string(),
        }
    } else {
        on_other(error)
    }
}

impl KubeClient {
    /// Apply every document in `data`, in order, defaulting to `namespace`.
    ///
    /// Documents are decoded one at a time; a failure stops the stream and is
    /// reported with the document's index, kind, name and namespace.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn apply_manifest_bytes(&self, namespace: &str, data: &[u8]) -> Result<()> {
        if namespace.is_empty() {
            return Err(BootstrapError::InvalidArgument(
                "default namespace must not be empty".to_string(),
            ));
        }

        let mut applied = 0usize;
        for document in ManifestStream::new(data) {
            self.ensure_not_cancelled()?;
            let mut manifest = document?;

            let kind = self
                .resolve_kind(&manifest.api_version, &manifest.kind)
                .await;
            if !kind.namespaced {
                manifest.clear_namespace();
            } else if manifest.namespace.is_none() {
                manifest.set_namespace(namespace);
            }

            self.apply_resolved(&manifest, &kind)
                .await
                .map_err(|e| BootstrapError::Document {
                    index: manifest.index,
                    kind: manifest.kind.clone(),
                    name: manifest.name.clone(),
                    namespace: manifest.namespace.clone().unwrap_or_default(),
                    source: Box::new(e),
                })?;
            applied += 1;
        }

        debug!("Applied {} manifest document(s)", applied);
        Ok(())
    }

    /// Read a manifest file and apply it
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn apply_manifest_file(&self, namespace: &str, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path).await.map_err(|source| BootstrapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_manifest_bytes(namespace, &data).await
    }

    /// Server-side apply a single object, retrying while admission webhooks are unavailable.
    ///
    /// Attempts are spaced 10s, 20s, 40s, 80s apart; the last failure is
    /// returned as `WebhookNotReady`. Any other error is returned at once.
    pub async fn apply_object(&self, manifest: &Manifest) -> Result<()> {
        let kind = self
            .resolve_kind(&manifest.api_version, &manifest.kind)
            .await;
        self.apply_resolved(manifest, &kind).await
    }

    async fn apply_resolved(&self, manifest: &Manifest, kind: &ResolvedKind) -> Result<()> {
        let namespace = manifest.namespace.as_deref().unwrap_or_default();
        let api: Api<DynamicObject> = match manifest.namespace.as_deref() {
            Some(ns) if kind.namespaced => {
                Api::namespaced_with(self.client().clone(), ns, &kind.resource)
            }
            _ => Api::all_with(self.client().clone(), &kind.resource),
        };
        let params = apply_params();

        let mut backoff = Duration::from_secs(retry::INITIAL_BACKOFF_SECS);
        let mut attempt = 1;
        loop {
            self.ensure_not_cancelled()?;
            debug!(
                "Applying {} {}/{} (attempt {}/{})",
                manifest.kind,
                namespace,
                manifest.name,
                attempt,
                retry::MAX_ATTEMPTS
            );

            let error = match api
                .patch(&manifest.name, &params, &Patch::Apply(&manifest.object))
                .await
            {
                Ok(_) => {
                    if attempt > 1 {
                        info!(
                            "Applied {} {}/{} after {} attempts",
                            manifest.kind, namespace, manifest.name, attempt
                        );
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            let message = error.to_string();
            if is_namespace_terminating(&message) {
                return Err(BootstrapError::NamespaceTerminating {
                    namespace: namespace.to_string(),
                });
            }

            if !is_webhook_not_ready(&message) {
                return Err(BootstrapError::ApplyFailed {
                    kind: manifest.kind.clone(),
                    name: manifest.name.clone(),
                    namespace: namespace.to_string(),
                    source: error,
                });
            }

            if attempt >= retry::MAX_ATTEMPTS {
                return Err(BootstrapError::WebhookNotReady {
                    kind: manifest.kind.clone(),
                    name: manifest.name.clone(),
                    namespace: namespace.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(
                "Webhook not ready applying {} {}/{}, retrying in {:?}: {}",
                manifest.kind, namespace, manifest.name, backoff, message
            );
            self.sleep(backoff).await?;

            backoff *= 2;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{status_json, MockService};
    use http::{Request, Response};
    use kube::client::Body;
    use kube::Client;
    use tokio_util::sync::CancellationToken;

    const CM_PATH: &str = "/api/v1/namespaces/ns-x/configmaps/cm-a";
    const CM_A: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm-a\ndata:\n  k: v\n";

    fn configmap_json(namespace: &str, name: &str) -> String {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": namespace},
        })
        .to_string()
    }

    fn core_resources_json() -> String {
        serde_json::json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": "v1",
            "resources": [{
                "name": "configmaps",
                "singularName": "configmap",
                "namespaced": true,
                "kind": "ConfigMap",
                "verbs": ["get", "patch"]
            }]
        })
        .to_string()
    }

    fn runtime_class_resources_json() -> String {
        serde_json::json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": "node.k8s.io/v1",
            "resources": [{
                "name": "runtimeclasses",
                "singularName": "runtimeclass",
                "namespaced": false,
                "kind": "RuntimeClass",
                "verbs": ["get", "patch"]
            }]
        })
        .to_string()
    }

    fn webhook_error() -> String {
        status_json(
            500,
            "InternalError",
            "Internal error occurred: failed calling webhook \"validate.external-secrets.io\": no endpoints available for service \"external-secrets-webhook\"",
        )
    }

    #[test]
    fn test_webhook_classification() {
        assert!(is_webhook_not_ready(
            "Internal error occurred: failed calling webhook \"x\": no endpoints available for service"
        ));
        assert!(is_webhook_not_ready(
            "failed to call webhook: Post \"https://svc:443\": dial tcp: connection refused"
        ));
        assert!(is_webhook_not_ready("webhook backend: service unavailable"));
        assert!(!is_webhook_not_ready("no endpoints available for service"));
        assert!(!is_webhook_not_ready(
            "configmaps \"cm-a\" is forbidden: User cannot patch resource"
        ));
        assert!(!is_webhook_not_ready("webhook denied the request"));
    }

    #[test]
    fn test_namespace_terminating_classification() {
        assert!(is_namespace_terminating(
            "unable to create new content in namespace ns-x because it is being terminated"
        ));
        assert!(!is_namespace_terminating("namespaces \"ns-x\" not found"));
    }

    #[tokio::test]
    async fn test_single_document_apply_request() {
        let (service, mut handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let kube = KubeClient::new(Client::new(service, "default"));

        let server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("discovery request");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(request.uri().path(), "/api/v1");
            send.send_response(
                Response::builder()
                    .body(Body::from(core_resources_json().into_bytes()))
                    .unwrap(),
            );

            let (request, send) = handle.next_request().await.expect("apply request");
            assert_eq!(request.method(), http::Method::PATCH);
            assert_eq!(request.uri().path(), CM_PATH);
            let query = request.uri().query().unwrap_or_default().to_string();
            assert!(query.contains("fieldManager=camunda-platform-helm"));
            assert!(query.contains("force=true"));
            assert_eq!(
                request.headers().get(http::header::CONTENT_TYPE).unwrap(),
                "application/apply-patch+yaml"
            );

            let body = request.into_body().collect_bytes().await.unwrap();
            let object: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(object["kind"], "ConfigMap");
            assert_eq!(object["metadata"]["name"], "cm-a");
            assert_eq!(object["metadata"]["namespace"], "ns-x");
            assert_eq!(object["data"]["k"], "v");

            send.send_response(
                Response::builder()
                    .body(Body::from(configmap_json("ns-x", "cm-a").into_bytes()))
                    .unwrap(),
            );
        });

        kube.apply_manifest_bytes("ns-x", CM_A.as_bytes()).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_documents_applied_in_order_with_namespace_injection() {
        let mock = MockService::new()
            .on_patch(CM_PATH, 200, &configmap_json("ns-x", "cm-a"))
            .on_patch(
                "/api/v1/namespaces/other/configmaps/cm-b",
                200,
                &configmap_json("other", "cm-b"),
            );
        let kube = KubeClient::new(mock.clone().into_client());

        let data = format!(
            "---\n{}---\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm-b\n  namespace: other\n",
            CM_A
        );
        kube.apply_manifest_bytes("ns-x", data.as_bytes()).await.unwrap();

        let requests = mock.requests_with_method("PATCH");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, CM_PATH);
        assert_eq!(requests[1].path, "/api/v1/namespaces/other/configmaps/cm-b");
        assert_eq!(requests[1].body["metadata"]["namespace"], "other");
    }

    #[tokio::test]
    async fn test_reapply_is_idempotent() {
        let mock = MockService::new().on_patch(CM_PATH, 200, &configmap_json("ns-x", "cm-a"));
        let kube = KubeClient::new(mock.clone().into_client());

        kube.apply_manifest_bytes("ns-x", CM_A.as_bytes()).await.unwrap();
        kube.apply_manifest_bytes("ns-x", CM_A.as_bytes()).await.unwrap();

        let requests = mock.requests_with_method("PATCH");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
    }

    #[tokio::test]
    async fn test_cluster_scoped_kind_has_no_namespace() {
        let mock = MockService::new().on_patch(
            "/apis/rbac.authorization.k8s.io/v1/clusterroles/reader",
            200,
            r#"{"apiVersion":"rbac.authorization.k8s.io/v1","kind":"ClusterRole","metadata":{"name":"reader"}}"#,
        );
        let kube = KubeClient::new(mock.clone().into_client());

        kube.apply_manifest_bytes(
            "ns-x",
            b"apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: reader\nrules: []\n",
        )
        .await
        .unwrap();

        let requests = mock.requests_with_method("PATCH");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body["metadata"].get("namespace").is_none());
    }

    #[tokio::test]
    async fn test_terminating_namespace_is_not_retried() {
        let mock = MockService::new().on_patch(
            CM_PATH,
            403,
            &status_json(
                403,
                "Forbidden",
                "configmaps \"cm-a\" is forbidden: unable to create new content in namespace ns-x because it is being terminated",
            ),
        );
        let kube = KubeClient::new(mock.clone().into_client());

        let err = kube
            .apply_manifest_bytes("ns-x", CM_A.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            BootstrapError::NamespaceTerminating { namespace } if namespace == "ns-x"
        ));
        assert!(err.to_string().contains("ns-x"));
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_errors_are_retried_with_backoff() {
        let mock = MockService::new()
            .on_patch(CM_PATH, 500, &webhook_error())
            .on_patch(CM_PATH, 500, &webhook_error())
            .on_patch(CM_PATH, 200, &configmap_json("ns-x", "cm-a"));
        let kube = KubeClient::new(mock.clone().into_client());

        kube.apply_manifest_bytes("ns-x", CM_A.as_bytes()).await.unwrap();

        let requests = mock.requests_with_method("PATCH");
        assert_eq!(requests.len(), 3);
        let first_gap = requests[1].at - requests[0].at;
        let second_gap = requests[2].at - requests[1].at;
        assert!(first_gap >= Duration::from_secs(10) && first_gap <= Duration::from_secs(11));
        assert!(second_gap >= Duration::from_secs(20) && second_gap <= Duration::from_secs(22));
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_errors_exhaust_after_five_attempts() {
        let mock = MockService::new().on_patch(CM_PATH, 500, &webhook_error());
        let kube = KubeClient::new(mock.clone().into_client());

        let err = kube
            .apply_manifest_bytes("ns-x", CM_A.as_bytes())
            .await
            .unwrap_err();

        match err.root() {
            BootstrapError::WebhookNotReady { attempts, name, .. } => {
                assert_eq!(*attempts, 5);
                assert_eq!(name, "cm-a");
            }
            other => panic!("expected WebhookNotReady, got {:?}", other),
        }
        assert!(err.to_string().contains("attempts=5"));

        let requests = mock.requests_with_method("PATCH");
        assert_eq!(requests.len(), 5);
        let gaps: Vec<u64> = requests
            .windows(2)
            .map(|w| (w[1].at - w[0].at).as_secs())
            .collect();
        assert_eq!(gaps, vec![10, 20, 40, 80]);
    }

    #[tokio::test]
    async fn test_forbidden_error_is_not_retried() {
        let mock = MockService::new().on_patch(
            CM_PATH,
            403,
            &status_json(403, "Forbidden", "configmaps \"cm-a\" is forbidden: User cannot patch resource"),
        );
        let kube = KubeClient::new(mock.clone().into_client());

        let err = kube
            .apply_manifest_bytes("ns-x", CM_A.as_bytes())
            .await
            .unwrap_err();

        match &err {
            BootstrapError::Document {
                index,
                kind,
                name,
                namespace,
                source,
            } => {
                assert_eq!(*index, 1);
                assert_eq!(kind, "ConfigMap");
                assert_eq!(name, "cm-a");
                assert_eq!(namespace, "ns-x");
                assert!(matches!(**source, BootstrapError::ApplyFailed { .. }));
            }
            other => panic!("expected Document error, got {:?}", other),
        }
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_backoff() {
        let mock = MockService::new().on_patch(CM_PATH, 500, &webhook_error());
        let token = CancellationToken::new();
        let kube = KubeClient::new(mock.clone().into_client()).with_cancellation(token.clone());

        let task = tokio::spawn(async move {
            let apply = kube.apply_manifest_bytes("ns-x", CM_A.as_bytes());
            assert_send(&apply);
            apply.await
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err.root(), BootstrapError::Cancelled));
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_cancelled_client_applies_nothing() {
        let mock = MockService::new()
            .on_patch(CM_PATH, 200, &configmap_json("ns-x", "cm-a"))
            .on_patch(
                "/api/v1/namespaces/ns-x/configmaps/cm-b",
                200,
                &configmap_json("ns-x", "cm-b"),
            );
        let token = CancellationToken::new();
        token.cancel();
        let kube = KubeClient::new(mock.clone().into_client()).with_cancellation(token);

        let data = format!("{}---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm-b\n", CM_A);
        let err = kube
            .apply_manifest_bytes("ns-x", data.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), BootstrapError::Cancelled));
        assert!(mock.requests_with_method("PATCH").is_empty());
    }

    #[tokio::test]
    async fn test_discovered_cluster_scoped_kind_is_applied_without_namespace() {
        let mock = MockService::new()
            .on_get("/apis/node.k8s.io/v1", 200, &runtime_class_resources_json())
            .on_patch(
                "/apis/node.k8s.io/v1/runtimeclasses/gvisor",
                200,
                r#"{"apiVersion":"node.k8s.io/v1","kind":"RuntimeClass","metadata":{"name":"gvisor"},"handler":"runsc"}"#,
            );
        let kube = KubeClient::new(mock.clone().into_client());

        let data = "apiVersion: node.k8s.io/v1\nkind: RuntimeClass\nmetadata:\n  name: gvisor\nhandler: runsc\n---\napiVersion: node.k8s.io/v1\nkind: RuntimeClass\nmetadata:\n  name: gvisor\n  namespace: stray\nhandler: runsc\n";
        kube.apply_manifest_bytes("ns-x", data.as_bytes()).await.unwrap();

        let patches = mock.requests_with_method("PATCH");
        assert_eq!(patches.len(), 2);
        for patch in &patches {
            assert_eq!(patch.path, "/apis/node.k8s.io/v1/runtimeclasses/gvisor");
            assert!(patch.body["metadata"].get("namespace").is_none());
        }
        assert_eq!(mock.requests_with_method("GET").len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_manifest_stops_before_apply() {
        let mock = MockService::new().on_patch(CM_PATH, 200, &configmap_json("ns-x", "cm-a"));
        let kube = KubeClient::new(mock.clone().into_client());

        let data = format!("{}---\nkind: ConfigMap\nmetadata:\n  name: no-version\n", CM_A);
        let err = kube
            .apply_manifest_bytes("ns-x", data.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(err, BootstrapError::InvalidManifest { index: 2, .. }));
        assert_eq!(mock.requests_with_method("PATCH").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_namespace_is_rejected() {
        let kube = KubeClient::new(MockService::new().into_client());
        let err = kube.apply_manifest_bytes("", CM_A.as_bytes()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_apply_manifest_file_missing() {
        let kube = KubeClient::new(MockService::new().into_client());
        let err = kube
            .apply_manifest_file("ns-x", Path::new("/nonexistent/manifest.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Io { .. }));
    }
}
