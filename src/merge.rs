//! Joins the per-grain aggregates and the schedule into one wide feature table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{AggregatedRow, AggregatedSeries};
use crate::features::{
    build_feature_schema, FeatureColumn, FeatureDType, FeatureError, FeatureSchema,
    FEATURE_SCHEMA_VERSION,
};
use crate::records::RawPlayerWeekStat;
use crate::schedule::NormalizedScheduleRow;

pub const IDENTITY_COLUMNS: [&str; 7] = [
    "player_id",
    "player_name",
    "position",
    "position_group",
    "team",
    "season",
    "week",
];

pub const LABEL_COLUMN: &str = "fantasy_points_actual";

pub const SCHEDULE_COLUMNS: [&str; 11] = [
    "game_type",
    "gameday",
    "gametime",
    "div_game",
    "roof",
    "surface",
    "temp",
    "wind",
    "stadium_id",
    "rest",
    "home_away",
];

/// Which columns the completeness filter inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessScope {
    /// Every column, schedule context included.
    AllColumns,
    /// Aggregate features and the label only.
    FeaturesOnly,
}

impl CompletenessScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllColumns => "all_columns",
            Self::FeaturesOnly => "features_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub completeness: CompletenessScope,
    pub schema_version: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            completeness: CompletenessScope::AllColumns,
            schema_version: FEATURE_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTableRow {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: String,
    pub team: String,
    pub season: i32,
    pub week: u32,
    pub fantasy_points_actual: f64,
    /// Aggregate features in schema order: player, team×position, position, team.
    pub features: Vec<f64>,
    pub schedule: NormalizedScheduleRow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub input_rows: u64,
    pub joined_rows: u64,
    pub unmatched_rows: u64,
    /// Raw rows folded into an earlier row for the same player and week.
    pub collapsed_rows: u64,
    pub dropped_incomplete: u64,
    pub output_rows: u64,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub schema: FeatureSchema,
    /// Names of the aggregate feature columns, aligned with `FeatureTableRow::features`.
    pub feature_columns: Vec<String>,
    pub rows: Vec<FeatureTableRow>,
    pub report: MergeReport,
}

impl FeatureTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature(&self, row: &FeatureTableRow, column: &str) -> Option<f64> {
        self.feature_columns
            .iter()
            .position(|name| name == column)
            .map(|idx| row.features[idx])
    }

    pub fn find(&self, player_id: &str, season: i32, week: u32) -> Option<&FeatureTableRow> {
        self.rows
            .iter()
            .find(|row| row.player_id == player_id && row.season == season && row.week == week)
    }
}

/// Left-hand player rows plus every table joined onto them.
#[derive(Debug, Clone, Copy)]
pub struct MergeInputs<'a> {
    pub players: &'a [&'a RawPlayerWeekStat],
    pub player: &'a AggregatedSeries,
    pub team_position: &'a AggregatedSeries,
    pub position: &'a AggregatedSeries,
    pub team: &'a AggregatedSeries,
    pub schedule: &'a [NormalizedScheduleRow],
}

impl<'a> MergeInputs<'a> {
    fn aggregates(&self) -> [&'a AggregatedSeries; 4] {
        [self.player, self.team_position, self.position, self.team]
    }
}

type ScheduleKey<'a> = (&'a str, i32, u32);

/// One output candidate per (player_id, season, week); identity comes from the first raw row.
struct PlayerWeek<'a> {
    first: &'a RawPlayerWeekStat,
    label: Option<f64>,
}

fn collapse_player_weeks<'a>(players: &[&'a RawPlayerWeekStat]) -> Vec<PlayerWeek<'a>> {
    let mut index: HashMap<(&str, i32, u32), usize> = HashMap::new();
    let mut out: Vec<PlayerWeek<'a>> = Vec::new();
    for &row in players {
        let key = (row.player_id.as_str(), row.season, row.week);
        match index.get(&key) {
            Some(&idx) => {
                let entry = &mut out[idx];
                entry.label = match (entry.label, row.fantasy_points_actual) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            None => {
                index.insert(key, out.len());
                out.push(PlayerWeek {
                    first: row,
                    label: row.fantasy_points_actual,
                });
            }
        }
    }
    out
}

pub fn merge_features(
    inputs: &MergeInputs<'_>,
    cfg: &MergeConfig,
    context: &str,
) -> Result<FeatureTable, FeatureError> {
    let feature_columns: Vec<String> = inputs
        .aggregates()
        .iter()
        .flat_map(|series| series.columns.iter().cloned())
        .collect();
    let schema = build_feature_schema(
        cfg.schema_version,
        &format!("{context};completeness:{}", cfg.completeness.as_str()),
        table_columns(&feature_columns),
    )?;

    let mut schedule_index: HashMap<ScheduleKey<'_>, Vec<&NormalizedScheduleRow>> = HashMap::new();
    for row in inputs.schedule {
        schedule_index
            .entry((row.team.as_str(), row.season, row.week))
            .or_default()
            .push(row);
    }

    let player_weeks = collapse_player_weeks(inputs.players);
    let mut report = MergeReport {
        input_rows: inputs.players.len() as u64,
        collapsed_rows: (inputs.players.len() - player_weeks.len()) as u64,
        ..MergeReport::default()
    };
    let mut rows = Vec::new();

    for player_week in &player_weeks {
        let player_row = player_week.first;
        let Some(joined) = join_aggregates(player_row, inputs) else {
            report.unmatched_rows += 1;
            continue;
        };
        let games = schedule_index
            .get(&(player_row.team.as_str(), player_row.season, player_row.week))
            .map(Vec::as_slice)
            .unwrap_or_default();
        if games.is_empty() {
            report.unmatched_rows += 1;
            continue;
        }

        for game in games {
            report.joined_rows += 1;
            match complete_row(player_week, &joined, game, cfg.completeness) {
                Some(row) => rows.push(row),
                None => report.dropped_incomplete += 1,
            }
        }
    }

    rows.sort_by(|a, b| {
        (a.season, a.week, &a.team, &a.player_id).cmp(&(b.season, b.week, &b.team, &b.player_id))
    });
    report.output_rows = rows.len() as u64;

    if rows.is_empty() {
        warn!(
            component = "merge",
            event = "merge.empty",
            input_rows = report.input_rows,
            joined_rows = report.joined_rows,
            dropped_incomplete = report.dropped_incomplete
        );
    }

    info!(
        component = "merge",
        event = "merge.finish",
        input_rows = report.input_rows,
        joined_rows = report.joined_rows,
        unmatched_rows = report.unmatched_rows,
        collapsed_rows = report.collapsed_rows,
        dropped_incomplete = report.dropped_incomplete,
        output_rows = report.output_rows,
        completeness = cfg.completeness.as_str()
    );

    Ok(FeatureTable {
        schema,
        feature_columns,
        rows,
        report,
    })
}

fn join_aggregates<'a>(
    row: &RawPlayerWeekStat,
    inputs: &MergeInputs<'a>,
) -> Option<[&'a AggregatedRow; 4]> {
    let [player, team_position, position, team] = inputs.aggregates();
    Some([
        player.lookup(row)?,
        team_position.lookup(row)?,
        position.lookup(row)?,
        team.lookup(row)?,
    ])
}

fn complete_row(
    player_week: &PlayerWeek<'_>,
    joined: &[&AggregatedRow; 4],
    game: &NormalizedScheduleRow,
    scope: CompletenessScope,
) -> Option<FeatureTableRow> {
    let row = player_week.first;
    let fantasy_points_actual = player_week.label?;
    let features = joined
        .iter()
        .flat_map(|agg| agg.values.iter().copied())
        .collect::<Option<Vec<f64>>>()?;
    if scope == CompletenessScope::AllColumns && !game.is_complete() {
        return None;
    }

    Some(FeatureTableRow {
        player_id: row.player_id.clone(),
        player_name: row.player_name.clone(),
        position: row.position.clone(),
        position_group: row.position_group.clone(),
        team: row.team.clone(),
        season: row.season,
        week: row.week,
        fantasy_points_actual,
        features,
        schedule: game.clone(),
    })
}

pub(crate) fn table_columns(feature_columns: &[String]) -> Vec<FeatureColumn> {
    let mut columns: Vec<FeatureColumn> = IDENTITY_COLUMNS
        .iter()
        .map(|name| {
            let dtype = match *name {
                "season" | "week" => FeatureDType::I64,
                _ => FeatureDType::Text,
            };
            FeatureColumn::new(*name, dtype)
        })
        .collect();
    columns.push(FeatureColumn::new(LABEL_COLUMN, FeatureDType::F64));
    columns.extend(
        feature_columns
            .iter()
            .map(|name| FeatureColumn::new(name.clone(), FeatureDType::F64)),
    );
    columns.extend(SCHEDULE_COLUMNS.iter().map(|name| {
        let dtype = match *name {
            "temp" | "wind" => FeatureDType::F64,
            "rest" => FeatureDType::I64,
            "div_game" => FeatureDType::Bool,
            _ => FeatureDType::Text,
        };
        FeatureColumn::new(*name, dtype)
    }));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate_series, AggregationConfig, AggregationSpec, Grain};
    use crate::schedule::Perspective;
    use crate::schema::{Metric, MetricSet};

    fn schedule_row(team: &str, season: i32, week: u32) -> NormalizedScheduleRow {
        NormalizedScheduleRow {
            season,
            week,
            game_type: "REG".to_string(),
            gameday: Some(format!("{season}-09-{:02}", week + 7)),
            gametime: Some("13:00".to_string()),
            div_game: Some(false),
            roof: Some("outdoors".to_string()),
            surface: Some("grass".to_string()),
            temp: Some(70.0),
            wind: Some(5.0),
            stadium_id: Some("STAD1".to_string()),
            team: team.to_string(),
            rest: Some(7),
            home_away: Perspective::Home,
        }
    }

    fn rb(id: &str, season: i32, week: u32, carries: f64) -> RawPlayerWeekStat {
        RawPlayerWeekStat::new(id, id, "RB", "KC", season, week)
            .with_metric(Metric::Carries, carries)
            .with_metric(Metric::FantasyPoints, carries / 2.0)
    }

    fn merge(
        stats: &[RawPlayerWeekStat],
        schedule: &[NormalizedScheduleRow],
        cfg: &MergeConfig,
    ) -> FeatureTable {
        let agg = AggregationConfig::default();
        let series = |grain, set| {
            aggregate_series(stats, &AggregationSpec::new(grain, set), &agg).unwrap()
        };
        let player = series(Grain::Player, MetricSet::SkillPosition);
        let tp = series(Grain::TeamPosition, MetricSet::SkillPosition);
        let pos = series(Grain::Position, MetricSet::SkillPosition);
        let team = series(Grain::Team, MetricSet::All);
        let players: Vec<&RawPlayerWeekStat> = stats.iter().collect();
        let inputs = MergeInputs {
            players: &players,
            player: &player,
            team_position: &tp,
            position: &pos,
            team: &team,
            schedule,
        };
        merge_features(&inputs, cfg, "test").unwrap()
    }

    #[test]
    fn keeps_only_complete_rows_and_orders_columns() {
        let stats: Vec<_> = (1..=4).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        let schedule: Vec<_> = (1..=4).map(|w| schedule_row("KC", 2023, w)).collect();
        let table = merge(&stats, &schedule, &MergeConfig::default());

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].week, 3);
        assert_eq!(table.rows[1].week, 4);
        assert_eq!(table.report.dropped_incomplete, 2);
        assert_eq!(table.feature_columns[0], "player_carries_lagged_min");
        assert_eq!(
            table.schema.columns.len(),
            IDENTITY_COLUMNS.len() + 1 + table.feature_columns.len() + SCHEDULE_COLUMNS.len()
        );
        assert_eq!(table.feature(&table.rows[0], "player_carries_lagged_mean"), Some(1.5));
    }

    #[test]
    fn schedule_gaps_follow_completeness_scope() {
        let stats: Vec<_> = (1..=3).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        let mut schedule: Vec<_> = (1..=3).map(|w| schedule_row("KC", 2023, w)).collect();
        schedule[2].temp = None;

        let strict = merge(&stats, &schedule, &MergeConfig::default());
        assert!(strict.is_empty());

        let lenient = merge(
            &stats,
            &schedule,
            &MergeConfig {
                completeness: CompletenessScope::FeaturesOnly,
                ..MergeConfig::default()
            },
        );
        assert_eq!(lenient.rows.len(), 1);
        assert_eq!(lenient.rows[0].schedule.temp, None);
    }

    #[test]
    fn never_joins_schedule_across_seasons() {
        let stats: Vec<_> = (1..=3).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        let schedule: Vec<_> = (1..=3).map(|w| schedule_row("KC", 2022, w)).collect();
        let table = merge(&stats, &schedule, &MergeConfig::default());
        assert!(table.is_empty());
        assert_eq!(table.report.unmatched_rows, 3);
    }

    #[test]
    fn missing_label_drops_row() {
        let mut stats: Vec<_> = (1..=3).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        stats[2].fantasy_points_actual = None;
        let schedule: Vec<_> = (1..=3).map(|w| schedule_row("KC", 2023, w)).collect();
        let table = merge(&stats, &schedule, &MergeConfig::default());
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_player_week_rows_merge_into_one_with_summed_label() {
        let mut stats: Vec<_> = (1..=3).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        stats.push(
            RawPlayerWeekStat::new("rb1", "rb1", "RB", "KC", 2023, 3)
                .with_metric(Metric::Carries, 4.0)
                .with_metric(Metric::FantasyPoints, 5.0),
        );
        let schedule: Vec<_> = (1..=3).map(|w| schedule_row("KC", 2023, w)).collect();
        let table = merge(&stats, &schedule, &MergeConfig::default());

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!((row.player_id.as_str(), row.week), ("rb1", 3));
        assert_eq!(row.fantasy_points_actual, 6.5);
        assert_eq!(table.report.input_rows, 4);
        assert_eq!(table.report.collapsed_rows, 1);
    }

    #[test]
    fn duplicate_row_with_missing_label_keeps_the_present_one() {
        let mut stats: Vec<_> = (1..=3).map(|w| rb("rb1", 2023, w, w as f64)).collect();
        stats.push(RawPlayerWeekStat::new("rb1", "rb1", "RB", "KC", 2023, 3));
        let schedule: Vec<_> = (1..=3).map(|w| schedule_row("KC", 2023, w)).collect();
        let table = merge(&stats, &schedule, &MergeConfig::default());

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].fantasy_points_actual, 1.5);
    }
}
