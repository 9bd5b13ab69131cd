// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helm chart template tests.

pub mod harness;
pub mod jsonpath;
pub mod render;

pub use harness::{
    assert_test_cases, decode_documents, decode_rendered, run_test_case, run_test_cases,
    unique_namespace, CaseReport, ChartTarget, Outcome, TestCase, Verifier,
};
pub use render::{ChartRenderer, HelmTemplate, RenderRequest};
