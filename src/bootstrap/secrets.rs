// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Platform-specific external secrets and certificates

use crate::constants::external_secrets::{
    CERTS_NAMESPACE_SUFFIX, EKS_TLS_SECRET, GROUP, KIND, VERSION,
};
use crate::error::{BootstrapError, Result};
use crate::kubernetes::client::KubeClient;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Manifest files looked up in a platform's certs directory, applied in this order
const CERT_MANIFEST_FILES: &[&str] = &[
    "secret-store.yaml",
    "external-secrets.yaml",
    "certificates.yaml",
];

/// Name of the SecretStore reading from the shared certs namespace on EKS
const EKS_CERTS_STORE: &str = "camunda-certs-store";

/// Target platform of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Platform {
    Gke,
    Rosa,
    Eks,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gke => "gke",
            Platform::Rosa => "rosa",
            Platform::Eks => "eks",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a provider's manifests come from and where they go
#[derive(Debug, Clone)]
pub struct ProviderContext<'a> {
    pub repo_root: &'a Path,
    pub chart_path: &'a str,
    pub namespace: &'a str,
    pub namespace_prefix: &'a str,
}

impl ProviderContext<'_> {
    fn certs_dir(&self, platform: Platform) -> PathBuf {
        self.repo_root
            .join(self.chart_path)
            .join("certs")
            .join(platform.as_str())
    }
}

/// A manifest to apply, either read from disk or generated
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestSource {
    /// Skipped silently when the file does not exist
    File(PathBuf),
    Inline { description: String, content: String },
}

pub trait SecretsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn manifests(&self, ctx: &ProviderContext<'_>) -> Vec<ManifestSource>;
}

/// Applies the manifests checked in under `<chart>/certs/<platform>/` as-is
pub struct CertsDirProvider {
    platform: Platform,
}

impl CertsDirProvider {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl SecretsProvider for CertsDirProvider {
    fn name(&self) -> &'static str {
        self.platform.as_str()
    }

    fn manifests(&self, ctx: &ProviderContext<'_>) -> Vec<ManifestSource> {
        let dir = ctx.certs_dir(self.platform);
        CERT_MANIFEST_FILES
            .iter()
            .map(|file| ManifestSource::File(dir.join(file)))
            .collect()
    }
}

/// EKS: the certs directory plus a cross-namespace copy of the shared TLS secret
pub struct EksProvider;

impl SecretsProvider for EksProvider {
    fn name(&self) -> &'static str {
        Platform::Eks.as_str()
    }

    fn manifests(&self, ctx: &ProviderContext<'_>) -> Vec<ManifestSource> {
        let mut manifests = CertsDirProvider::new(Platform::Eks).manifests(ctx);
        let source_namespace = certs_source_namespace(ctx.namespace_prefix);
        manifests.push(ManifestSource::Inline {
            description: format!("{} from namespace {}", EKS_TLS_SECRET, source_namespace),
            content: eks_tls_manifests(ctx.namespace, &source_namespace),
        });
        manifests
    }
}

pub fn provider_for(platform: Platform) -> Box<dyn SecretsProvider> {
    match platform {
        Platform::Gke | Platform::Rosa => Box::new(CertsDirProvider::new(platform)),
        Platform::Eks => Box::new(EksProvider),
    }
}

/// Namespace holding the shared certificates: `<prefix>-certs`, or `certs` without a prefix
pub fn certs_source_namespace(namespace_prefix: &str) -> String {
    if namespace_prefix.is_empty() {
        CERTS_NAMESPACE_SUFFIX.to_string()
    } else {
        format!("{}-{}", namespace_prefix, CERTS_NAMESPACE_SUFFIX)
    }
}

/// SecretStore + ExternalSecret projecting the shared TLS secret into `namespace`
fn eks_tls_manifests(namespace: &str, source_namespace: &str) -> String {
    let api_version = format!("{}/{}", GROUP, VERSION);

    let store = serde_json::json!({
        "apiVersion": api_version,
        "kind": "SecretStore",
        "metadata": {"name": EKS_CERTS_STORE, "namespace": namespace},
        "spec": {
            "provider": {
                "kubernetes": {
                    "remoteNamespace": source_namespace,
                    "server": {
                        "caProvider": {"type": "ConfigMap", "name": "kube-root-ca.crt", "key": "ca.crt"}
                    },
                    "auth": {"serviceAccount": {"name": "default"}}
                }
            }
        }
    });

    let external_secret = serde_json::json!({
        "apiVersion": api_version,
        "kind": KIND,
        "metadata": {"name": EKS_TLS_SECRET, "namespace": namespace},
        "spec": {
            "refreshInterval": "1h",
            "secretStoreRef": {"kind": "SecretStore", "name": EKS_CERTS_STORE},
            "target": {
                "name": EKS_TLS_SECRET,
                "creationPolicy": "Owner",
                "template": {"type": "kubernetes.io/tls"}
            },
            "dataFrom": [{"extract": {"key": EKS_TLS_SECRET}}]
        }
    });

    format!("{}\n---\n{}\n", store, external_secret)
}

impl KubeClient {
    /// Apply the platform's external secrets and certificates into `namespace`.
    ///
    /// Requires the ExternalSecret CRD; manifest files that do not exist are skipped.
    #[instrument(skip(self, repo_root), fields(repo_root = %repo_root.display()))]
    pub async fn apply_external_secrets_and_certs(
        &self,
        platform: Platform,
        repo_root: &Path,
        chart_path: &str,
        namespace: &str,
        namespace_prefix: &str,
    ) -> Result<()> {
        if !self.has_crd(GROUP, KIND).await? {
            return Err(BootstrapError::PreconditionFailed(format!(
                "{} CRD ({}) is not installed; install the External Secrets Operator before bootstrapping {}",
                KIND, GROUP, platform
            )));
        }

        let ctx = ProviderContext {
            repo_root,
            chart_path,
            namespace,
            namespace_prefix,
        };
        let provider = provider_for(platform);
        info!("Applying external secrets and certs using the {} provider", provider.name());

        for source in provider.manifests(&ctx) {
            match source {
                ManifestSource::File(path) => {
                    let exists = tokio::fs::try_exists(&path).await.map_err(|source| {
                        BootstrapError::Io {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    if !exists {
                        debug!("Skipping missing manifest {}", path.display());
                        continue;
                    }
                    self.apply_manifest_file(namespace, &path).await?;
                    info!("Applied {}", path.display());
                }
                ManifestSource::Inline {
                    description,
                    content,
                } => {
                    self.apply_manifest_bytes(namespace, content.as_bytes())
                        .await?;
                    info!("Applied {}", description);
                }
            }
        }

        Ok(())
    }
}
