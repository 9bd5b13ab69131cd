// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camunda_kube::config::{into_map, BootstrapArgs, Cli, Command};
use camunda_kube::constants::external_secrets;
use camunda_kube::error::BootstrapError;
use camunda_kube::kubernetes::KubeClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug,hyper=info,tower=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let client = KubeClient::connect(&cli.kube.kubeconfig, &cli.kube.context)
        .await?
        .with_cancellation(cancel.child_token());

    let result = tokio::select! {
        result = run(&client, &cli.kube.namespace, cli.command) => result,
        _ = cancel.cancelled() => Err(BootstrapError::Cancelled.into()),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(client: &KubeClient, namespace: &str, command: Command) -> Result<()> {
    match command {
        Command::Bootstrap(args) => bootstrap(client, namespace, args).await,
        Command::Apply { file } => {
            if file == Path::new("-") {
                let mut data = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut data)
                    .await
                    .context("Failed to read manifests from stdin")?;
                client.apply_manifest_bytes(namespace, &data).await?;
            } else {
                client.apply_manifest_file(namespace, &file).await?;
            }
            Ok(())
        }
        Command::ConfigMap { name, literals } => {
            client
                .apply_config_map(namespace, &name, &into_map(literals))
                .await?;
            Ok(())
        }
        Command::LabelNamespace {
            labels,
            annotations,
        } => {
            client
                .set_labels_and_annotations(namespace, &into_map(labels), &into_map(annotations))
                .await?;
            Ok(())
        }
        Command::WaitReady {
            group,
            version,
            resource,
            timeout,
        } => {
            client
                .wait_custom_resources_ready(namespace, &group, &version, &resource, timeout)
                .await?;
            Ok(())
        }
        Command::DeleteNamespace => {
            client.delete_namespace(namespace).await?;
            Ok(())
        }
    }
}

async fn bootstrap(client: &KubeClient, namespace: &str, args: BootstrapArgs) -> Result<()> {
    client
        .ensure_namespace_with_pull_secret(namespace, &args.registry_username, &args.registry_password)
        .await?;

    if let Some(platform) = args.platform {
        client
            .apply_external_secrets_and_certs(
                platform,
                &args.repo_root,
                &args.chart_path,
                namespace,
                &args.namespace_prefix,
            )
            .await?;

        client
            .wait_custom_resources_ready(
                namespace,
                external_secrets::GROUP,
                external_secrets::VERSION,
                external_secrets::RESOURCE,
                args.ready_timeout,
            )
            .await?;
    }

    info!("Namespace {} bootstrapped", namespace);
    Ok(())
}
