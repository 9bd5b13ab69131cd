// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Streaming decoder for multi-document YAML/JSON manifests

use crate::error::{BootstrapError, Result};
use serde_json::Value;

/// One validated manifest document
#[derive(Debug, Clone)]
pub struct Manifest {
    /// 1-based position of the document in its stream
    pub index: usize,
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub object: Value,
}

impl Manifest {
    /// Validate a decoded document; `apiVersion`, `kind` and `metadata.name` are required.
    pub fn from_value(index: usize, object: Value) -> Result<Self> {
        if !object.is_object() {
            return Err(BootstrapError::InvalidManifest {
                index,
                reason: "document is not a mapping".to_string(),
            });
        }

        let api_version = required_str(&object, "/apiVersion", index)?;
        let kind = required_str(&object, "/kind", index)?;
        let name = required_str(&object, "/metadata/name", index)?;
        let namespace = object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(Self {
            index,
            api_version,
            kind,
            name,
            namespace,
            object,
        })
    }

    /// Set `metadata.namespace`, creating `metadata` if needed
    pub fn set_namespace(&mut self, namespace: &str) {
        if let Some(obj) = self.object.as_object_mut() {
            let metadata = obj
                .entry("metadata")
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(metadata) = metadata.as_object_mut() {
                metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
            }
        }
        self.namespace = Some(namespace.to_string());
    }

    /// Drop `metadata.namespace`; used for cluster-scoped kinds
    pub fn clear_namespace(&mut self) {
        if let Some(metadata) = self
            .object
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
        {
            metadata.remove("namespace");
        }
        self.namespace = None;
    }
}

fn required_str(object: &Value, pointer: &str, index: usize) -> Result<String> {
    object
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BootstrapError::InvalidManifest {
            index,
            reason: format!("missing or empty {}", pointer.trim_start_matches('/').replace('/', ".")),
        })
}

/// Splits raw bytes on `---` separator lines without parsing the documents.
///
/// A separator line may be followed by a comment. Anything before the first
/// separator that is blank is not a document.
#[derive(Debug, Clone)]
pub struct DocumentChunks<'a> {
    rest: &'a [u8],
    started: bool,
    done: bool,
}

impl<'a> DocumentChunks<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            rest: data,
            started: false,
            done: false,
        }
    }
}

impl<'a> Iterator for DocumentChunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            let data = self.rest;
            let mut offset = 0;
            let mut separator = None;
            while offset < data.len() {
                let line_end = data[offset..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(data.len(), |p| offset + p + 1);
                if is_separator(&data[offset..line_end]) {
                    separator = Some((offset, line_end));
                    break;
                }
                offset = line_end;
            }

            let chunk = match separator {
                Some((end, next)) => {
                    self.rest = &data[next..];
                    &data[..end]
                }
                None => {
                    self.done = true;
                    data
                }
            };

            let first = !self.started;
            self.started = true;
            if first && separator.is_some() && is_blank(chunk) {
                continue;
            }
            return Some(chunk);
        }
    }
}

fn is_separator(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(b"---") else {
        return false;
    };
    match std::str::from_utf8(rest) {
        Ok(rest) => {
            let rest = rest.trim();
            rest.is_empty() || rest.starts_with('#')
        }
        Err(_) => false,
    }
}

fn is_blank(chunk: &[u8]) -> bool {
    std::str::from_utf8(chunk).is_ok_and(|text| {
        text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        })
    })
}

/// Lazily decodes `---` separated documents, yielding one [`Manifest`] at a time.
///
/// Each document is parsed on its own when the iterator reaches it, so no
/// parser state outlives a call to `next`. Empty documents are skipped but
/// still count towards the document index. Decoding stops after the first error.
pub struct ManifestStream<'a> {
    chunks: DocumentChunks<'a>,
    index: usize,
    failed: bool,
}

impl<'a> ManifestStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            chunks: DocumentChunks::new(data),
            index: 0,
            failed: false,
        }
    }

    fn decode(&self, chunk: &[u8]) -> Result<Option<Value>> {
        if is_blank(chunk) {
            return Ok(None);
        }

        let index = self.index;
        let yaml: serde_yaml::Value =
            serde_yaml::from_slice(chunk).map_err(|e| BootstrapError::ManifestParse {
                index,
                source: Box::new(e),
            })?;

        if is_empty_document(&yaml) {
            return Ok(None);
        }

        serde_json::to_value(&yaml)
            .map(Some)
            .map_err(|e| BootstrapError::ManifestParse {
                index,
                source: Box::new(e),
            })
    }
}

impl Iterator for ManifestStream<'_> {
    type Item = Result<Manifest>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let chunk = self.chunks.next()?;
            self.index += 1;

            let result = match self.decode(chunk) {
                Ok(None) => continue,
                Ok(Some(value)) => Manifest::from_value(self.index, value),
                Err(e) => Err(e),
            };

            self.failed = result.is_err();
            return Some(result);
        }
    }
}

fn is_empty_document(value: &serde_yaml::Value) -> bool {
    match value {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}
