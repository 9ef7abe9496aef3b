//! Applies the temporal aggregator at team, position, team×position and player grains.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{
    aggregate_series, AggregatedSeries, AggregationConfig, AggregationSpec, Grain,
};
use crate::features::FeatureError;
use crate::records::RawPlayerWeekStat;
use crate::schema::{MetricSet, QUARTERBACK_POSITION_GROUPS, SKILL_POSITION_GROUPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlice {
    Quarterback,
    SkillPosition,
}

pub const ALL_SLICES: [PlayerSlice; 2] = [PlayerSlice::Quarterback, PlayerSlice::SkillPosition];

impl PlayerSlice {
    pub fn metric_set(self) -> MetricSet {
        match self {
            Self::Quarterback => MetricSet::Quarterback,
            Self::SkillPosition => MetricSet::SkillPosition,
        }
    }

    pub fn position_groups(self) -> &'static [&'static str] {
        match self {
            Self::Quarterback => &QUARTERBACK_POSITION_GROUPS,
            Self::SkillPosition => &SKILL_POSITION_GROUPS,
        }
    }

    /// Short name used in artifact paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quarterback => "qb",
            Self::SkillPosition => "position",
        }
    }

    pub fn select<'a>(self, stats: &'a [RawPlayerWeekStat]) -> Vec<&'a RawPlayerWeekStat> {
        let groups = self.position_groups();
        stats
            .iter()
            .filter(|row| row.in_position_groups(groups))
            .collect()
    }
}

/// Aggregates derived from one filtered slice of player rows.
#[derive(Debug, Clone)]
pub struct SliceTables<'a> {
    pub slice: PlayerSlice,
    pub rows: Vec<&'a RawPlayerWeekStat>,
    pub player: AggregatedSeries,
    pub position: AggregatedSeries,
    pub team_position: AggregatedSeries,
}

#[derive(Debug, Clone)]
pub struct GrainTables<'a> {
    pub team: AggregatedSeries,
    pub quarterback: SliceTables<'a>,
    pub skill_position: SliceTables<'a>,
}

impl<'a> GrainTables<'a> {
    pub fn slice(&self, slice: PlayerSlice) -> &SliceTables<'a> {
        match slice {
            PlayerSlice::Quarterback => &self.quarterback,
            PlayerSlice::SkillPosition => &self.skill_position,
        }
    }
}

pub fn build_slice_tables<'a>(
    stats: &'a [RawPlayerWeekStat],
    slice: PlayerSlice,
    cfg: &AggregationConfig,
) -> Result<SliceTables<'a>, FeatureError> {
    let rows = slice.select(stats);
    let metric_set = slice.metric_set();

    let position = aggregate_series(
        rows.iter().copied(),
        &AggregationSpec::new(Grain::Position, metric_set),
        cfg,
    )?;
    let team_position = aggregate_series(
        rows.iter().copied(),
        &AggregationSpec::new(Grain::TeamPosition, metric_set),
        cfg,
    )?;
    let player = aggregate_series(
        rows.iter().copied(),
        &AggregationSpec::new(Grain::Player, metric_set),
        cfg,
    )?;

    info!(
        component = "grains",
        event = "grains.slice.finish",
        slice = slice.as_str(),
        rows = rows.len(),
        player_rows = player.rows.len(),
        position_rows = position.rows.len(),
        team_position_rows = team_position.rows.len()
    );

    Ok(SliceTables {
        slice,
        rows,
        player,
        position,
        team_position,
    })
}

pub fn build_grain_tables<'a>(
    stats: &'a [RawPlayerWeekStat],
    cfg: &AggregationConfig,
) -> Result<GrainTables<'a>, FeatureError> {
    cfg.validate()?;

    let team_spec = AggregationSpec::new(Grain::Team, MetricSet::All);
    let team = aggregate_series(stats, &team_spec, cfg)?;
    let quarterback = build_slice_tables(stats, PlayerSlice::Quarterback, cfg)?;
    let skill_position = build_slice_tables(stats, PlayerSlice::SkillPosition, cfg)?;

    Ok(GrainTables {
        team,
        quarterback,
        skill_position,
    })
}
