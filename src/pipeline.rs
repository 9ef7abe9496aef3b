//! Weekly run: load inputs, build both feature tables, publish them.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::aggregate::AggregationConfig;
use crate::artifacts::{
    encode_feature_table, encode_schema_manifest, feature_table_key, run_date_at,
    schema_manifest_key,
};
use crate::features::FeatureError;
use crate::grains::{build_grain_tables, PlayerSlice, ALL_SLICES};
use crate::merge::{merge_features, FeatureTable, MergeConfig, MergeInputs};
use crate::observability::{log_artifact_written, log_run_start, log_source_selected};
use crate::records::{RawPlayerWeekStat, RawScheduleGameRow};
use crate::schedule::normalize_schedule;
use crate::secrets::{fetch_credentials, Credentials, SecretStore, AWS_KEYS_SECRET_NAME};
use crate::source::{SeasonWindow, SourceError, StatsSource};
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub aggregation: AggregationConfig,
    pub merge: MergeConfig,
}

impl PipelineConfig {
    /// Parameters folded into each table's schema fingerprint.
    pub fn fingerprint_context(&self, slice: PlayerSlice) -> String {
        format!(
            "slice:{};window_num:{};window_min:{};missing_stats:{}",
            slice.as_str(),
            self.aggregation.window_num,
            self.aggregation.window_min,
            self.aggregation.missing_stats.as_str()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineInputs {
    pub player_stats: Vec<RawPlayerWeekStat>,
    pub schedule: Vec<RawScheduleGameRow>,
}

#[derive(Debug, Clone)]
pub struct FeatureTables {
    pub quarterback: FeatureTable,
    pub skill_position: FeatureTable,
}

impl FeatureTables {
    pub fn get(&self, slice: PlayerSlice) -> &FeatureTable {
        match slice {
            PlayerSlice::Quarterback => &self.quarterback,
            PlayerSlice::SkillPosition => &self.skill_position,
        }
    }
}

/// Pure transformation from raw rows to the quarterback and skill-position tables.
pub fn build_feature_tables(
    inputs: &PipelineInputs,
    cfg: &PipelineConfig,
) -> Result<FeatureTables, FeatureError> {
    let schedule = normalize_schedule(&inputs.schedule);
    let grains = build_grain_tables(&inputs.player_stats, &cfg.aggregation)?;

    let merge_slice = |slice: PlayerSlice| -> Result<FeatureTable, FeatureError> {
        let tables = grains.slice(slice);
        let merge_inputs = MergeInputs {
            players: &tables.rows,
            player: &tables.player,
            team_position: &tables.team_position,
            position: &tables.position,
            team: &grains.team,
            schedule: &schedule,
        };
        merge_features(&merge_inputs, &cfg.merge, &cfg.fingerprint_context(slice))
    };

    Ok(FeatureTables {
        quarterback: merge_slice(PlayerSlice::Quarterback)?,
        skill_position: merge_slice(PlayerSlice::SkillPosition)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub slice: PlayerSlice,
    pub key: String,
    pub manifest_key: String,
    pub rows: u64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub seasons: SeasonWindow,
    pub player_rows: u64,
    pub schedule_games: u64,
    pub artifacts: Vec<ArtifactSummary>,
}

pub fn current_run_date() -> NaiveDate {
    run_date_at(Utc::now())
}

pub fn load_inputs(
    source: &dyn StatsSource,
    seasons: &SeasonWindow,
) -> Result<PipelineInputs, SourceError> {
    let player_stats = source.player_week_stats(seasons)?;
    let schedule = source.schedule(seasons)?;
    Ok(PipelineInputs {
        player_stats,
        schedule,
    })
}

/// Writes each table followed by its schema manifest. Bodies are encoded up front so a
/// failed encode leaves the store untouched.
pub fn publish_feature_tables(
    store: &dyn ObjectStore,
    credentials: &Credentials,
    tables: &FeatureTables,
    run_date: NaiveDate,
) -> Result<Vec<ArtifactSummary>, StorageError> {
    let mut encoded = Vec::with_capacity(ALL_SLICES.len());
    for slice in ALL_SLICES {
        let table = tables.get(slice);
        let key = feature_table_key(slice, run_date);
        let manifest_key = schema_manifest_key(&key);
        encoded.push((
            slice,
            table,
            key,
            manifest_key,
            encode_feature_table(table)?,
            encode_schema_manifest(&table.schema)?,
        ));
    }

    let mut summaries = Vec::with_capacity(encoded.len());
    for (slice, table, key, manifest_key, body, manifest) in encoded {
        store.put_object(credentials, &key, &body)?;
        store.put_object(credentials, &manifest_key, &manifest)?;
        log_artifact_written(store.bucket(), &key, table.rows.len(), body.len());

        summaries.push(ArtifactSummary {
            slice,
            key,
            manifest_key,
            rows: table.rows.len() as u64,
            fingerprint: table.schema.fingerprint.clone(),
        });
    }
    Ok(summaries)
}

/// Credentials are resolved before any input is read so a missing secret never
/// produces a partial run.
pub fn run_weekly_pipeline(
    source: &dyn StatsSource,
    secrets: &dyn SecretStore,
    store: &dyn ObjectStore,
    cfg: &PipelineConfig,
    run_date: NaiveDate,
) -> Result<RunSummary, PipelineError> {
    let seasons = SeasonWindow::for_run_date(run_date);
    log_run_start(run_date, &seasons);

    let credentials = fetch_credentials(secrets, AWS_KEYS_SECRET_NAME)?;

    log_source_selected(source.name(), store.bucket());
    let inputs = load_inputs(source, &seasons)?;
    let tables = build_feature_tables(&inputs, cfg)?;
    let artifacts = publish_feature_tables(store, &credentials, &tables, run_date)?;

    let summary = RunSummary {
        run_date,
        seasons,
        player_rows: inputs.player_stats.len() as u64,
        schedule_games: inputs.schedule.len() as u64,
        artifacts,
    };

    info!(
        component = "pipeline",
        event = "pipeline.finish",
        run_date = %summary.run_date,
        player_rows = summary.player_rows,
        schedule_games = summary.schedule_games,
        quarterback_rows = tables.quarterback.rows.len(),
        skill_position_rows = tables.skill_position.rows.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MissingStatPolicy;
    use crate::merge::CompletenessScope;

    #[test]
    fn fingerprint_context_tracks_every_parameter() {
        let base = PipelineConfig::default();
        let changed_window = PipelineConfig {
            aggregation: AggregationConfig {
                window_num: 5,
                ..AggregationConfig::default()
            },
            ..base
        };
        let changed_policy = PipelineConfig {
            aggregation: AggregationConfig {
                missing_stats: MissingStatPolicy::Exclude,
                ..AggregationConfig::default()
            },
            ..base
        };

        let qb = base.fingerprint_context(PlayerSlice::Quarterback);
        assert_eq!(
            qb,
            "slice:qb;window_num:10;window_min:1;missing_stats:zero_fill"
        );
        assert_ne!(qb, base.fingerprint_context(PlayerSlice::SkillPosition));
        assert_ne!(qb, changed_window.fingerprint_context(PlayerSlice::Quarterback));
        assert_ne!(qb, changed_policy.fingerprint_context(PlayerSlice::Quarterback));
    }

    #[test]
    fn empty_inputs_build_empty_tables_with_schemas() {
        let tables =
            build_feature_tables(&PipelineInputs::default(), &PipelineConfig::default()).unwrap();
        assert!(tables.quarterback.is_empty());
        assert!(tables.skill_position.is_empty());
        assert!(tables
            .quarterback
            .feature_columns
            .iter()
            .any(|c| c == "player_passing_yards_lagged_mean"));
        assert_ne!(
            tables.quarterback.schema.fingerprint,
            tables.skill_position.schema.fingerprint
        );
    }

    #[test]
    fn completeness_scope_changes_fingerprint() {
        let strict =
            build_feature_tables(&PipelineInputs::default(), &PipelineConfig::default()).unwrap();
        let lenient = build_feature_tables(
            &PipelineInputs::default(),
            &PipelineConfig {
                merge: MergeConfig {
                    completeness: CompletenessScope::FeaturesOnly,
                    ..MergeConfig::default()
                },
                ..PipelineConfig::default()
            },
        )
        .unwrap();
        assert_ne!(
            strict.quarterback.schema.fingerprint,
            lenient.quarterback.schema.fingerprint
        );
    }

    #[test]
    fn invalid_window_is_rejected() {
        let cfg = PipelineConfig {
            aggregation: AggregationConfig {
                window_num: 2,
                window_min: 3,
                ..AggregationConfig::default()
            },
            ..PipelineConfig::default()
        };
        let err = build_feature_tables(&PipelineInputs::default(), &cfg).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidConfig(_)));
    }
}
