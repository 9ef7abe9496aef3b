//! Artifact naming and encoding for the published feature tables.
//!
//! Keys are partitioned by the run date:
//! - `data/processed/qb/weekly_stats_player_qb_<YYYY-MM-DD>.parquet`
//! - `data/processed/position/weekly_stats_player_position_<YYYY-MM-DD>.parquet`
//! - `data/model-output/qb/fantasy_point_preds_qb_<YYYY-MM-DD>.parquet`
//!
//! Every table is accompanied by `<key>.schema.json` holding its `FeatureSchema`.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::features::{FeatureDType, FeatureSchema};
use crate::grains::PlayerSlice;
use crate::merge::{FeatureTable, FeatureTableRow, SCHEDULE_COLUMNS};
use crate::storage::StorageError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of `now` on the US east coast, where the league schedules its games.
pub fn run_date_at(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&New_York).date_naive()
}

pub fn feature_table_key(slice: PlayerSlice, run_date: NaiveDate) -> String {
    let name = slice.as_str();
    format!(
        "data/processed/{name}/weekly_stats_player_{name}_{}.parquet",
        run_date.format(DATE_FORMAT)
    )
}

pub fn predictions_key(slice: PlayerSlice, run_date: NaiveDate) -> String {
    let name = slice.as_str();
    format!(
        "data/model-output/{name}/fantasy_point_preds_{name}_{}.parquet",
        run_date.format(DATE_FORMAT)
    )
}

pub fn schema_manifest_key(table_key: &str) -> String {
    format!("{table_key}.schema.json")
}

pub fn encode_schema_manifest(schema: &FeatureSchema) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec_pretty(schema)?)
}

pub fn decode_schema_manifest(bytes: &[u8]) -> Result<FeatureSchema, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Arrow schema for a feature table; only the schedule context may hold nulls.
pub fn arrow_schema(schema: &FeatureSchema) -> Schema {
    Schema::new(
        schema
            .columns
            .iter()
            .map(|column| {
                let dtype = match column.dtype {
                    FeatureDType::F64 => DataType::Float64,
                    FeatureDType::I64 => DataType::Int64,
                    FeatureDType::Bool => DataType::Boolean,
                    FeatureDType::Text => DataType::Utf8,
                };
                let nullable = SCHEDULE_COLUMNS.contains(&column.name.as_str());
                Field::new(column.name.as_str(), dtype, nullable)
            })
            .collect::<Vec<_>>(),
    )
}

/// One Parquet file in schema column order; an empty table still carries its schema.
pub fn encode_feature_table(table: &FeatureTable) -> Result<Vec<u8>, StorageError> {
    let rows = &table.rows;
    let text = |f: fn(&FeatureTableRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
    };
    let opt_text = |f: fn(&FeatureTableRow) -> Option<&str>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<StringArray>())
    };
    let opt_num = |f: fn(&FeatureTableRow) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<Float64Array>())
    };

    let mut columns: Vec<ArrayRef> = vec![
        text(|r| r.player_id.as_str()),
        text(|r| r.player_name.as_str()),
        text(|r| r.position.as_str()),
        text(|r| r.position_group.as_str()),
        text(|r| r.team.as_str()),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| i64::from(r.season)))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| i64::from(r.week)))),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.fantasy_points_actual),
        )),
    ];
    for idx in 0..table.feature_columns.len() {
        columns.push(Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.features[idx]),
        )));
    }
    columns.extend([
        text(|r| r.schedule.game_type.as_str()),
        opt_text(|r| r.schedule.gameday.as_deref()),
        opt_text(|r| r.schedule.gametime.as_deref()),
        Arc::new(rows.iter().map(|r| r.schedule.div_game).collect::<BooleanArray>()),
        opt_text(|r| r.schedule.roof.as_deref()),
        opt_text(|r| r.schedule.surface.as_deref()),
        opt_num(|r| r.schedule.temp),
        opt_num(|r| r.schedule.wind),
        opt_text(|r| r.schedule.stadium_id.as_deref()),
        Arc::new(
            rows.iter()
                .map(|r| r.schedule.rest.map(i64::from))
                .collect::<Int64Array>(),
        ),
        text(|r| r.schedule.home_away.as_str()),
    ]);

    write_parquet(Arc::new(arrow_schema(&table.schema)), columns)
}

pub(crate) fn write_parquet(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
) -> Result<Vec<u8>, StorageError> {
    let batch = RecordBatch::try_new(Arc::clone(&schema), columns)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
    if batch.num_rows() > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(buffer)
}
