//! Scores a published quarterback feature table with a stored linear model.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::artifacts::{
    decode_schema_manifest, feature_table_key, predictions_key, schema_manifest_key,
    write_parquet,
};
use crate::features::{assert_schema_compatible, FeatureError, FEATURE_SCHEMA_VERSION};
use crate::grains::PlayerSlice;
use crate::observability::log_artifact_written;
use crate::secrets::{fetch_credentials, SecretStore, AWS_KEYS_SECRET_NAME};
use crate::storage::{ObjectStore, StorageError};

pub const LINEAR_MODEL_KEY: &str = "model/linear_model.json";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("model decode error: {0}")]
    Model(#[from] serde_json::Error),
    #[error("feature table is missing column '{0}'")]
    MissingColumn(String),
    #[error("feature table column '{column}' is not {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("feature table row {row}: column '{column}' is null")]
    NullFeature { row: usize, column: String },
    #[error("model does not match feature table: {0}")]
    Schema(#[from] FeatureError),
}

/// `intercept + Σ weight × feature` over the named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub schema_fingerprint: String,
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
}

fn default_schema_version() -> u32 {
    FEATURE_SCHEMA_VERSION
}

impl LinearModel {
    pub fn from_json(bytes: &[u8]) -> Result<Self, InferenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub player_name: String,
    pub team: String,
    pub predicted_fp: f64,
}

pub fn predict_fantasy_points(
    table: Bytes,
    model: &LinearModel,
) -> Result<Vec<Prediction>, InferenceError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(table)?;
    let schema = Arc::clone(builder.schema());
    let position = |name: &str| -> Result<usize, InferenceError> {
        schema
            .index_of(name)
            .map_err(|_| InferenceError::MissingColumn(name.to_string()))
    };

    let name_idx = position("player_name")?;
    let team_idx = position("team")?;
    let weighted = model
        .weights
        .iter()
        .map(|(column, weight)| Ok((column.as_str(), position(column)?, *weight)))
        .collect::<Result<Vec<_>, InferenceError>>()?;

    let mut predictions = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let names = text_column(&batch, name_idx, "player_name")?;
        let teams = text_column(&batch, team_idx, "team")?;
        let features = weighted
            .iter()
            .map(|(column, idx, weight)| {
                Ok((*column, float_column(&batch, *idx, column)?, *weight))
            })
            .collect::<Result<Vec<_>, InferenceError>>()?;

        for row in 0..batch.num_rows() {
            let mut score = model.intercept;
            for (column, values, weight) in &features {
                if values.is_null(row) {
                    return Err(InferenceError::NullFeature {
                        row: predictions.len(),
                        column: (*column).to_string(),
                    });
                }
                score += weight * values.value(row);
            }
            predictions.push(Prediction {
                player_name: names.value(row).to_string(),
                team: teams.value(row).to_string(),
                predicted_fp: score,
            });
        }
    }

    Ok(predictions)
}

fn text_column<'a>(
    batch: &'a RecordBatch,
    idx: usize,
    name: &str,
) -> Result<&'a StringArray, InferenceError> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| InferenceError::ColumnType {
            column: name.to_string(),
            expected: "text",
        })
}

fn float_column<'a>(
    batch: &'a RecordBatch,
    idx: usize,
    name: &str,
) -> Result<&'a Float64Array, InferenceError> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| InferenceError::ColumnType {
            column: name.to_string(),
            expected: "f64",
        })
}

/// Parquet with `player_name`, `team`, `predicted_fp`; no predictions still yields the schema.
pub fn encode_predictions(predictions: &[Prediction]) -> Result<Vec<u8>, InferenceError> {
    let schema = Schema::new(vec![
        Field::new("player_name", DataType::Utf8, false),
        Field::new("team", DataType::Utf8, false),
        Field::new("predicted_fp", DataType::Float64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            predictions.iter().map(|p| p.player_name.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            predictions.iter().map(|p| p.team.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(
            predictions.iter().map(|p| p.predicted_fp),
        )),
    ];
    Ok(write_parquet(Arc::new(schema), columns)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceSummary {
    pub input_key: String,
    pub output_key: String,
    pub predictions: u64,
}

/// Reads the run date's quarterback table, checks it against the model, writes predictions.
pub fn run_inference(
    store: &dyn ObjectStore,
    secrets: &dyn SecretStore,
    run_date: NaiveDate,
) -> Result<InferenceSummary, InferenceError> {
    let credentials = fetch_credentials(secrets, AWS_KEYS_SECRET_NAME)?;

    let model = LinearModel::from_json(&store.get_object(LINEAR_MODEL_KEY)?)?;
    let input_key = feature_table_key(PlayerSlice::Quarterback, run_date);
    let schema = decode_schema_manifest(&store.get_object(&schema_manifest_key(&input_key))?)?;
    assert_schema_compatible(model.schema_version, &model.schema_fingerprint, &schema)?;

    let table = store.get_object(&input_key)?;
    let predictions = predict_fantasy_points(Bytes::from(table), &model)?;
    let body = encode_predictions(&predictions)?;

    let output_key = predictions_key(PlayerSlice::Quarterback, run_date);
    store.put_object(&credentials, &output_key, &body)?;
    log_artifact_written(store.bucket(), &output_key, predictions.len(), body.len());

    info!(
        component = "inference",
        event = "inference.finish",
        input_key = %input_key,
        output_key = %output_key,
        predictions = predictions.len(),
        weights = model.weights.len()
    );

    Ok(InferenceSummary {
        input_key,
        output_key,
        predictions: predictions.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LinearModel {
        LinearModel {
            schema_version: FEATURE_SCHEMA_VERSION,
            schema_fingerprint: "fp".to_string(),
            intercept: 1.0,
            weights: BTreeMap::from([
                ("player_passing_yards_lagged_mean".to_string(), 0.04),
                ("team_rushing_tds_lagged_sum".to_string(), 2.0),
            ]),
        }
    }

    /// Parquet table with text columns first, then nullable f64 feature columns.
    fn table(text: &[(&str, &[&str])], floats: &[(&str, &[Option<f64>])]) -> Bytes {
        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();
        for (name, values) in text {
            fields.push(Field::new(*name, DataType::Utf8, false));
            columns.push(Arc::new(StringArray::from_iter_values(values.iter())));
        }
        for (name, values) in floats {
            fields.push(Field::new(*name, DataType::Float64, true));
            columns.push(Arc::new(values.iter().collect::<Float64Array>()));
        }
        Bytes::from(write_parquet(Arc::new(Schema::new(fields)), columns).unwrap())
    }

    #[test]
    fn scores_each_row_with_intercept_and_weights() {
        let body = table(
            &[
                ("player_id", &["00-1", "00-2"]),
                ("player_name", &["A. Passer", "B. Thrower"]),
                ("team", &["KC", "BUF"]),
            ],
            &[
                ("player_passing_yards_lagged_mean", &[Some(250.0), Some(200.0)]),
                ("team_rushing_tds_lagged_sum", &[Some(1.0), Some(0.0)]),
            ],
        );
        let preds = predict_fantasy_points(body, &model()).unwrap();

        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].player_name, "A. Passer");
        assert_eq!(preds[0].team, "KC");
        assert!((preds[0].predicted_fp - 13.0).abs() < 1e-9);
        assert!((preds[1].predicted_fp - 9.0).abs() < 1e-9);
    }

    #[test]
    fn missing_feature_column_is_reported() {
        let body = table(
            &[("player_name", &["A"]), ("team", &["KC"])],
            &[("player_passing_yards_lagged_mean", &[Some(1.0)])],
        );
        let err = predict_fantasy_points(body, &model()).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::MissingColumn(ref c) if c == "team_rushing_tds_lagged_sum"
        ));
    }

    #[test]
    fn null_feature_is_reported_with_row() {
        let body = table(
            &[("player_name", &["A", "B"]), ("team", &["KC", "BUF"])],
            &[
                ("player_passing_yards_lagged_mean", &[Some(1.0), None]),
                ("team_rushing_tds_lagged_sum", &[Some(1.0), Some(1.0)]),
            ],
        );
        let err = predict_fantasy_points(body, &model()).unwrap_err();
        assert!(matches!(err, InferenceError::NullFeature { row: 1, .. }));
    }

    #[test]
    fn text_feature_column_is_a_type_error() {
        let body = table(
            &[
                ("player_name", &["A"]),
                ("team", &["KC"]),
                ("team_rushing_tds_lagged_sum", &["1"]),
            ],
            &[("player_passing_yards_lagged_mean", &[Some(1.0)])],
        );
        let err = predict_fantasy_points(body, &model()).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ColumnType { ref column, expected: "f64" }
                if column == "team_rushing_tds_lagged_sum"
        ));
    }

    #[test]
    fn predictions_keep_their_schema_when_empty() {
        let empty = Bytes::from(encode_predictions(&[]).unwrap());
        let builder = ParquetRecordBatchReaderBuilder::try_new(empty).unwrap();
        let names: Vec<&str> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, ["player_name", "team", "predicted_fp"]);

        let body = Bytes::from(
            encode_predictions(&[Prediction {
                player_name: "A".to_string(),
                team: "KC".to_string(),
                predicted_fp: 12.5,
            }])
            .unwrap(),
        );
        let preds = predict_fantasy_points(
            body,
            &LinearModel {
                weights: BTreeMap::from([("predicted_fp".to_string(), 1.0)]),
                intercept: 0.0,
                ..model()
            },
        )
        .unwrap();
        assert_eq!(preds[0].player_name, "A");
        assert_eq!(preds[0].predicted_fp, 12.5);
    }

    #[test]
    fn model_json_defaults_schema_version() {
        let model = LinearModel::from_json(
            br#"{"schema_fingerprint":"abc","intercept":0.5,"weights":{"x":1.0}}"#,
        )
        .unwrap();
        assert_eq!(model.schema_version, FEATURE_SCHEMA_VERSION);
        assert_eq!(model.weights["x"], 1.0);
    }
}
