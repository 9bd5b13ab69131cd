// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes primitives: manifest apply, namespace lifecycle, CRD discovery and readiness.

pub mod apply;
pub mod client;
pub mod crd;
pub mod manifest;
pub mod namespaces;
pub mod readiness;
pub mod resource;

pub use apply::{apply_params, is_webhook_not_ready};
pub use client::KubeClient;
pub use manifest::{Manifest, ManifestStream};
pub use namespaces::NamespacePhase;
pub use readiness::is_ready;
