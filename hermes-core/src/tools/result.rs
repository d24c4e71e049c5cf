//! Tool result envelope
//!
//! Every execution, fresh or cached, yields a [`ToolResult`]:
//! - `kind` mirrors the tool's declared output
//! - `data` is the normalized payload, empty on soft failure
//! - `meta` carries run provenance and snapshot manifests
//! - `errors` holds at most one message, present only on soft failure

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::spec::OutputKind;
use crate::error::{HermesError, Result};

/// Normalized payload of a tool
pub type Payload = Map<String, Value>;

/// Key under which binary payloads carry their base64 body
pub const RAW_BYTES_KEY: &str = "rawBytes";

/// Key under which binary payloads carry their file name
pub const FILENAME_KEY: &str = "filename";

/// Record of a payload snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Paths written by the snapshot; empty when nothing was persisted
    #[serde(default)]
    pub paths: Vec<String>,

    /// Hex SHA-256 of the payload's canonical JSON encoding
    pub checksum: String,
}

impl Manifest {
    /// Manifest for `data` with no written paths
    pub fn for_payload(data: &Payload) -> Self {
        Self {
            paths: Vec::new(),
            checksum: payload_checksum(data),
        }
    }
}

/// Provenance of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    /// Run that produced (or, for persistent hits, requested) the result
    pub run_id: String,

    /// Tool name
    pub tool_name: String,

    /// Hierarchical persistent-store key, when one was derivable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_key: Option<String>,

    /// Snapshot manifests, empty on failure and for persistent hits
    #[serde(default)]
    pub manifests: Vec<Manifest>,
}

impl ResultMeta {
    /// Meta for `tool_name` under `run_id`
    pub fn new(run_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            tool_name: tool_name.into(),
            db_key: None,
            manifests: Vec::new(),
        }
    }

    /// Attach the persistent-store key
    pub fn with_db_key(mut self, key: Option<String>) -> Self {
        self.db_key = key;
        self
    }

    /// Attach a manifest
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifests.push(manifest);
        self
    }
}

/// Result of one tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Output kind of the tool
    pub kind: OutputKind,

    /// Normalized payload
    pub data: Payload,

    /// Provenance
    pub meta: ResultMeta,

    /// Soft-failure messages; empty on success
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ToolResult {
    /// Successful result
    pub fn success(kind: OutputKind, data: Payload, meta: ResultMeta) -> Self {
        Self {
            kind,
            data,
            meta,
            errors: Vec::new(),
        }
    }

    /// Soft-failed result with empty data and a single error
    pub fn failure(kind: OutputKind, meta: ResultMeta, error: impl Into<String>) -> Self {
        Self {
            kind,
            data: Payload::new(),
            meta,
            errors: vec![error.into()],
        }
    }

    /// Whether the result carries no errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The `items` array of a dataset or bundle, if present
    pub fn items(&self) -> Option<&Vec<Value>> {
        self.data.get("items").and_then(Value::as_array)
    }

    /// Decoded body of a binary payload.
    ///
    /// Returns `None` when the payload has no `rawBytes` key.
    pub fn raw_bytes(&self) -> Option<Result<Vec<u8>>> {
        let encoded = self.data.get(RAW_BYTES_KEY)?.as_str()?;
        Some(
            BASE64
                .decode(encoded)
                .map_err(|e| HermesError::Other(format!("invalid rawBytes: {}", e))),
        )
    }
}

/// Payload describing a binary document: base64 body plus file name
pub fn binary_payload(bytes: &[u8], filename: impl Into<String>) -> Payload {
    let mut data = Payload::new();
    data.insert(RAW_BYTES_KEY.to_string(), Value::String(BASE64.encode(bytes)));
    data.insert(FILENAME_KEY.to_string(), Value::String(filename.into()));
    data
}

/// Shallow-merge `overlay` into `base`; overlay keys win
pub fn merge_payload(mut base: Payload, overlay: Payload) -> Payload {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

/// Hex SHA-256 of the canonical JSON encoding of `data`
pub fn payload_checksum(data: &Payload) -> String {
    let mut encoded = String::new();
    write_canonical(&Value::Object(data.clone()), &mut encoded);

    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compact JSON with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
