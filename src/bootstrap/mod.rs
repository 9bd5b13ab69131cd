// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test-environment bootstrap: pull secrets, config maps and platform certificates.

pub mod config_map;
pub mod pull_secret;
pub mod secrets;

pub use pull_secret::{docker_config_json, pull_secret};
pub use secrets::{
    certs_source_namespace, provider_for, CertsDirProvider, EksProvider, ManifestSource,
    Platform, ProviderContext, SecretsProvider,
};
