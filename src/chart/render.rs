// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering chart templates through `helm template`

use crate::constants::chart::HELM_BINARY;
use crate::error::{BootstrapError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Everything needed to render a set of templates once
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub chart_path: &'a Path,
    pub release: &'a str,
    pub namespace: &'a str,
    /// Chart-relative template paths, e.g. `templates/identity/deployment.yaml`
    pub templates: &'a [String],
    /// `--set` overrides in Helm's dotted key syntax
    pub values: &'a BTreeMap<String, String>,
    pub extra_args: &'a [String],
}

pub trait ChartRenderer {
    /// Render the requested templates to a multi-document YAML string
    fn render(&self, request: &RenderRequest<'_>) -> Result<String>;
}

/// Shells out to the `helm` binary
#[derive(Debug, Clone)]
pub struct HelmTemplate {
    binary: String,
}

impl Default for HelmTemplate {
    fn default() -> Self {
        Self {
            binary: HELM_BINARY.to_string(),
        }
    }
}

impl HelmTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn command(&self, request: &RenderRequest<'_>) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("template")
            .arg(request.release)
            .arg(request.chart_path)
            .arg("--namespace")
            .arg(request.namespace)
            .stdin(Stdio::null());

        for template in request.templates {
            command.arg("--show-only").arg(template);
        }
        for (key, value) in request.values {
            command.arg("--set").arg(format!("{}={}", key, value));
        }
        command.args(request.extra_args);
        command
    }
}

impl ChartRenderer for HelmTemplate {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String> {
        let mut command = self.command(request);
        debug!("Running {:?}", command);

        let output = command.output().map_err(|source| BootstrapError::Io {
            path: self.binary.clone().into(),
            source,
        })?;

        if !output.status.success() {
            return Err(BootstrapError::RenderFailed {
                chart: request.chart_path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
