//! Feature-table schema: column catalogue, versioned fingerprint, shared errors.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDType {
    F64,
    I64,
    Bool,
    Text,
}

impl FeatureDType {
    fn as_str(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::I64 => "i64",
            Self::Bool => "bool",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dtype: FeatureDType,
}

impl FeatureColumn {
    pub fn new(name: impl Into<String>, dtype: FeatureDType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("invalid feature config: {0}")]
    InvalidConfig(String),
    #[error("duplicate feature column: {0}")]
    DuplicateColumn(String),
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

/// Builds a schema for the given ordered columns. `context` is folded into the
/// fingerprint so tables built under different parameters never compare equal.
pub fn build_feature_schema(
    version: u32,
    context: &str,
    columns: Vec<FeatureColumn>,
) -> Result<FeatureSchema, FeatureError> {
    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(FeatureError::DuplicateColumn(column.name.clone()));
        }
    }

    let fingerprint = schema_fingerprint(version, context, &columns);

    info!(
        component = "features",
        event = "features.schema.built",
        version,
        column_count = columns.len(),
        fingerprint = fingerprint
    );

    Ok(FeatureSchema {
        version,
        fingerprint,
        columns,
    })
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), FeatureError> {
    if expected_version != actual.version {
        return Err(FeatureError::SchemaVersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(FeatureError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn schema_fingerprint(version: u32, context: &str, columns: &[FeatureColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};"));
    hasher.update(format!("context:{context};"));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(format!(":{};", column.dtype.as_str()));
    }
    hex::encode(hasher.finalize())
}
