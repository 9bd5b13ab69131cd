// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The field manager used for every server-side apply
pub const FIELD_MANAGER: &str = "camunda-platform-helm";

/// Webhook retry schedule for manifest apply
pub mod retry {
    /// Total apply attempts when an admission webhook is unavailable
    pub const MAX_ATTEMPTS: u32 = 5;
    /// Backoff before the second attempt; doubles after every failure
    pub const INITIAL_BACKOFF_SECS: u64 = 10;
}

/// Namespace lifecycle polling
pub mod namespace {
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Hard deadline for a Terminating namespace to disappear
    pub const WAIT_TIMEOUT_SECS: u64 = 300;
    /// Emit a progress line every this many polls (~10s)
    pub const PROGRESS_EVERY_POLLS: u32 = 5;
}

/// Custom resource readiness polling
pub mod readiness {
    pub const POLL_INTERVAL_SECS: u64 = 5;
    pub const CONDITION_READY: &str = "Ready";
    pub const STATUS_TRUE: &str = "True";
}

/// Image pull secret for the Camunda registry
pub mod registry {
    pub const SECRET_NAME: &str = "registry-camunda-cloud";
    pub const HOST: &str = "registry.camunda.cloud";
    pub const SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";
    pub const DATA_KEY: &str = ".dockerconfigjson";
}

/// External Secrets Operator resources
pub mod external_secrets {
    pub const GROUP: &str = "external-secrets.io";
    pub const VERSION: &str = "v1beta1";
    pub const KIND: &str = "ExternalSecret";
    pub const RESOURCE: &str = "externalsecrets";
    /// TLS secret mirrored into EKS namespaces from the certs namespace
    pub const EKS_TLS_SECRET: &str = "aws-camunda-cloud-tls";
    pub const CERTS_NAMESPACE_SUFFIX: &str = "certs";
}

/// Chart rendering for template tests
pub mod chart {
    pub const HELM_BINARY: &str = "helm";
    /// Key in a test case's extra args that is passed to `helm template`
    pub const TEMPLATE_ARGS_KEY: &str = "template";
    pub const DEFAULT_RELEASE: &str = "camunda-platform-test";
    pub const NAMESPACE_PREFIX: &str = "camunda-platform";
    pub const NAMESPACE_SUFFIX_LEN: usize = 6;
}
