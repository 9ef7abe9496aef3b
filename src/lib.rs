//! Gridiron weekly feature pipeline.
//!
//! Current implemented scope:
//! - lagged rolling aggregates of weekly player stats at player, team, position
//!   and team×position grains
//! - home/away schedule normalization and the merged quarterback / skill-position
//!   feature tables
//! - CSV and HTTP stats sources, file and SQLite object stores, credential lookup
//! - linear-model scoring of the published quarterback table

mod aggregate;
mod artifacts;
mod features;
mod grains;
mod inference;
mod merge;
mod observability;
mod pipeline;
mod records;
mod schedule;
mod schema;
mod secrets;
mod source;
mod storage;

pub use aggregate::{
    aggregate_series, lag_series, rolling_stat, AggregatedRow, AggregatedSeries,
    AggregationConfig, AggregationSpec, Grain, GrainKey, MissingStatPolicy, RollingStat,
    DEFAULT_WINDOW_MIN, DEFAULT_WINDOW_NUM, ROLLING_STATS,
};
pub use artifacts::{
    arrow_schema, decode_schema_manifest, encode_feature_table, encode_schema_manifest,
    feature_table_key, predictions_key, run_date_at, schema_manifest_key,
};
pub use features::{
    assert_schema_compatible, build_feature_schema, FeatureColumn, FeatureDType, FeatureError,
    FeatureSchema, FEATURE_SCHEMA_VERSION,
};
pub use grains::{
    build_grain_tables, build_slice_tables, GrainTables, PlayerSlice, SliceTables, ALL_SLICES,
};
pub use inference::{
    encode_predictions, predict_fantasy_points, run_inference, InferenceError, InferenceSummary,
    LinearModel, Prediction, LINEAR_MODEL_KEY,
};
pub use merge::{
    merge_features, CompletenessScope, FeatureTable, FeatureTableRow, MergeConfig, MergeInputs,
    MergeReport, IDENTITY_COLUMNS, LABEL_COLUMN, SCHEDULE_COLUMNS,
};
pub use observability::{
    init_logging, log_app_start, log_artifact_written, log_run_start, log_source_selected,
    logging_config_from_env, logging_config_from_lookup, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use pipeline::{
    build_feature_tables, current_run_date, load_inputs, publish_feature_tables,
    run_weekly_pipeline, ArtifactSummary, FeatureTables, PipelineConfig, PipelineError,
    PipelineInputs, RunSummary,
};
pub use records::{RawPlayerWeekStat, RawScheduleGameRow, ScheduleSide};
pub use schedule::{normalize_schedule, NormalizedScheduleRow, Perspective};
pub use schema::{
    Metric, MetricSet, ALL_METRICS, METRIC_COUNT, QUARTERBACK_METRICS,
    QUARTERBACK_POSITION_GROUPS, SKILL_POSITION_GROUPS, SKILL_POSITION_METRICS,
};
pub use secrets::{
    fetch_credentials, parse_credentials, Credentials, EnvSecretStore, FileSecretStore,
    SecretStore, AWS_KEYS_SECRET_NAME,
};
pub use source::{
    parse_player_week_stats, parse_schedule, HttpFetcher, LocalCsvSource, NflverseConfig,
    NflverseHttpSource, SeasonWindow, SourceError, StatsSource,
};
pub use storage::{
    validate_key, LocalObjectStore, ObjectStore, SqliteObjectStore, StorageError, DEFAULT_BUCKET,
};
