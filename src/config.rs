// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::bootstrap::Platform;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Bootstrap a Kubernetes namespace for Camunda Platform chart tests
#[derive(Parser, Debug)]
#[command(name = "camunda-kube", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub kube: KubeArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Cluster connection settings
#[derive(Args, Debug, Clone)]
pub struct KubeArgs {
    /// Path to a kubeconfig file; defaults to $KUBECONFIG, then ~/.kube/config
    #[arg(long, global = true, default_value = "")]
    pub kubeconfig: String,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true, default_value = "")]
    pub context: String,

    /// Target namespace
    #[arg(short, long, global = true, default_value = "default")]
    pub namespace: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ensure the namespace and registry pull secret exist, then apply platform secrets
    Bootstrap(BootstrapArgs),

    /// Server-side apply a multi-document manifest file
    Apply {
        /// Manifest file, or `-` for stdin
        #[arg(short = 'f', long = "filename")]
        file: PathBuf,
    },

    /// Server-side apply a ConfigMap
    ConfigMap {
        #[arg(long)]
        name: String,

        /// Data entry as key=value; may be repeated
        #[arg(long = "from-literal", value_parser = parse_key_value)]
        literals: Vec<(String, String)>,
    },

    /// Set labels and annotations on the namespace
    LabelNamespace {
        /// Label as key=value; may be repeated
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,

        /// Annotation as key=value; may be repeated
        #[arg(long = "annotation", value_parser = parse_key_value)]
        annotations: Vec<(String, String)>,
    },

    /// Wait until every instance of a custom resource in the namespace is Ready
    WaitReady {
        #[arg(long)]
        group: String,

        #[arg(long)]
        version: String,

        /// Plural resource name, e.g. externalsecrets
        #[arg(long)]
        resource: String,

        #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },

    /// Delete the namespace and wait until it is gone
    DeleteNamespace,
}

#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    /// Camunda registry username
    #[arg(long, env = "CAMUNDA_REGISTRY_USERNAME", default_value = "", hide_env_values = true)]
    pub registry_username: String,

    /// Camunda registry password
    #[arg(long, env = "CAMUNDA_REGISTRY_PASSWORD", default_value = "", hide_env_values = true)]
    pub registry_password: String,

    /// Apply external secrets and certificates for this platform
    #[arg(long, value_enum)]
    pub platform: Option<Platform>,

    /// Root of the chart repository
    #[arg(long, default_value = ".")]
    pub repo_root: PathBuf,

    /// Chart directory relative to the repository root
    #[arg(long, default_value = "")]
    pub chart_path: String,

    /// Prefix of the shared certificates namespace (`<prefix>-certs`)
    #[arg(long, default_value = "")]
    pub namespace_prefix: String,

    /// How long to wait for ExternalSecrets to become Ready
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub ready_timeout: Duration,
}

/// Parse `key=value`; the value may itself contain `=`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Collect repeated key=value pairs; later keys win
pub fn into_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}
