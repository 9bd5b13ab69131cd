// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Table-driven template tests: render per case, then check selectors and verifiers.

use crate::chart::jsonpath::{scalar_string, select_first};
use crate::chart::render::{ChartRenderer, RenderRequest};
use crate::constants::chart::{
    DEFAULT_RELEASE, NAMESPACE_PREFIX, NAMESPACE_SUFFIX_LEN, TEMPLATE_ARGS_KEY,
};
use crate::error::{BootstrapError, Result};
use crate::kubernetes::manifest::ManifestStream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Ad-hoc assertions over the rendered output and the render error, if any
pub type Verifier =
    Box<dyn Fn(&str, Option<&BootstrapError>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct TestCase {
    pub name: String,
    pub values: BTreeMap<String, String>,
    /// Selector to expected value, compared as strings
    pub expected: BTreeMap<String, String>,
    pub verifier: Option<Verifier>,
    pub skip: bool,
    /// Extra arguments per helm subcommand; only `template` is used when rendering
    pub helm_options_extra_args: BTreeMap<String, Vec<String>>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("values", &self.values)
            .field("expected", &self.expected)
            .field("verifier", &self.verifier.is_some())
            .field("skip", &self.skip)
            .field("helm_options_extra_args", &self.helm_options_extra_args)
            .finish()
    }
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn expect(mut self, selector: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected.insert(selector.into(), value.into());
        self
    }

    pub fn verifier(
        mut self,
        verifier: impl Fn(&str, Option<&BootstrapError>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.verifier = Some(Box::new(verifier));
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn extra_args<I, S>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.helm_options_extra_args
            .entry(command.into())
            .or_default()
            .extend(args.into_iter().map(Into::into));
        self
    }

    fn template_args(&self) -> &[String] {
        self.helm_options_extra_args
            .get(TEMPLATE_ARGS_KEY)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// The chart, release and templates a suite of cases renders
#[derive(Debug, Clone)]
pub struct ChartTarget {
    pub chart_path: PathBuf,
    pub release: String,
    pub namespace: String,
    pub templates: Vec<String>,
}

impl ChartTarget {
    /// Target with the default release name and a fresh random namespace
    pub fn new<I, S>(chart_path: impl Into<PathBuf>, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chart_path: chart_path.into(),
            release: DEFAULT_RELEASE.to_string(),
            namespace: unique_namespace(NAMESPACE_PREFIX),
            templates: templates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = release.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    Skipped,
    Failed(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Outcome,
}

/// `prefix-` followed by six random lowercase characters
pub fn unique_namespace(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..NAMESPACE_SUFFIX_LEN])
}

/// Decode every non-empty document of rendered output
pub fn decode_documents(rendered: &str) -> Result<Vec<Value>> {
    ManifestStream::new(rendered.as_bytes())
        .map(|manifest| manifest.map(|m| m.object))
        .collect()
}

/// Decode the first rendered document into a typed object, e.g. a `Deployment`
pub fn decode_rendered<T: DeserializeOwned>(rendered: &str) -> Result<T> {
    let manifest = ManifestStream::new(rendered.as_bytes())
        .next()
        .ok_or_else(|| {
            BootstrapError::InvalidArgument("rendered output contains no documents".to_string())
        })??;

    let index = manifest.index;
    serde_json::from_value(manifest.object).map_err(|e| BootstrapError::ManifestParse {
        index,
        source: Box::new(e),
    })
}

/// Render and check a single case
pub fn run_test_case(
    renderer: &dyn ChartRenderer,
    target: &ChartTarget,
    case: &TestCase,
) -> Outcome {
    if case.skip {
        info!("Skipping test case {}", case.name);
        return Outcome::Skipped;
    }

    let request = RenderRequest {
        chart_path: &target.chart_path,
        release: &target.release,
        namespace: &target.namespace,
        templates: &target.templates,
        values: &case.values,
        extra_args: case.template_args(),
    };
    let (output, error) = match renderer.render(&request) {
        Ok(output) => (output, None),
        Err(e) => (String::new(), Some(e)),
    };

    let mut failures = Vec::new();

    if let Some(verifier) = &case.verifier {
        if let Err(e) = verifier(&output, error.as_ref()) {
            failures.push(format!("verifier: {:#}", e));
        }
    } else if let Some(e) = &error {
        failures.push(format!("render: {}", e));
    }

    if !case.expected.is_empty() {
        match &error {
            Some(e) if case.verifier.is_some() => {
                failures.push(format!("render: {}", e));
            }
            Some(_) => {}
            None => failures.extend(check_expected(&output, &case.expected)),
        }
    }

    if failures.is_empty() {
        debug!("Test case {} passed", case.name);
        Outcome::Passed
    } else {
        for failure in &failures {
            warn!("Test case {} failed: {}", case.name, failure);
        }
        Outcome::Failed(failures)
    }
}

fn check_expected(output: &str, expected: &BTreeMap<String, String>) -> Vec<String> {
    let documents = match decode_documents(output) {
        Ok(documents) => documents,
        Err(e) => return vec![format!("decode: {}", e)],
    };

    expected
        .iter()
        .filter_map(|(selector, want)| match select_first(&documents, selector) {
            Ok(Some(value)) => {
                let got = scalar_string(value);
                (got != *want).then(|| format!("{}: expected '{}', got '{}'", selector, want, got))
            }
            Ok(None) => Some(format!("{}: not found in rendered output", selector)),
            Err(e) => Some(e.to_string()),
        })
        .collect()
}

/// Run every case against `target`, in order
pub fn run_test_cases(
    renderer: &dyn ChartRenderer,
    target: &ChartTarget,
    cases: &[TestCase],
) -> Vec<CaseReport> {
    cases
        .iter()
        .map(|case| CaseReport {
            name: case.name.clone(),
            outcome: run_test_case(renderer, target, case),
        })
        .collect()
}

/// Run every case and panic with a summary if any failed
pub fn assert_test_cases(renderer: &dyn ChartRenderer, target: &ChartTarget, cases: &[TestCase]) {
    let reports = run_test_cases(renderer, target, cases);
    let failed: Vec<String> = reports
        .iter()
        .filter_map(|report| match &report.outcome {
            Outcome::Failed(failures) => Some(format!("{}:\n  {}", report.name, failures.join("\n  "))),
            _ => None,
        })
        .collect();

    if !failed.is_empty() {
        panic!(
            "{} of {} test cases failed\n{}",
            failed.len(),
            reports.len(),
            failed.join("\n")
        );
    }
}
