//! Temporal aggregation: group-sum, one-step lag, trailing rolling statistics.
//!
//! For every (grain key, season) series ordered by ascending week:
//! 1. rows sharing (key, season, week) are summed per metric
//! 2. each summed metric is shifted back one observation; the first week of a
//!    series has no predecessor and is missing
//! 3. five statistics are computed over the trailing `window_num` lagged values
//!    (current week included), requiring `window_min` non-missing values
//!
//! Because the rolling step only sees lagged values, a statistic at week `w`
//! never depends on week `w` itself. Series never cross seasons.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::features::FeatureError;
use crate::records::RawPlayerWeekStat;
use crate::schema::{Metric, MetricSet};

pub const DEFAULT_WINDOW_NUM: usize = 10;
pub const DEFAULT_WINDOW_MIN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grain {
    Player,
    Team,
    Position,
    TeamPosition,
}

impl Grain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Team => "team",
            Self::Position => "position",
            Self::TeamPosition => "team_position",
        }
    }

    pub fn key_of(self, row: &RawPlayerWeekStat) -> GrainKey {
        match self {
            Self::Player => GrainKey::new([row.player_id.as_str()]),
            Self::Team => GrainKey::new([row.team.as_str()]),
            Self::Position => GrainKey::new([row.position_group.as_str()]),
            Self::TeamPosition => GrainKey::new([row.team.as_str(), row.position_group.as_str()]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrainKey(Vec<String>);

impl GrainKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

/// How a missing raw stat enters the group-sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingStatPolicy {
    /// Missing counts as 0; every group sum is present.
    ZeroFill,
    /// Missing is skipped; a group whose contributors are all missing stays missing.
    Exclude,
}

impl MissingStatPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroFill => "zero_fill",
            Self::Exclude => "exclude",
        }
    }

    fn empty_sum(self) -> Option<f64> {
        match self {
            Self::ZeroFill => Some(0.0),
            Self::Exclude => None,
        }
    }

    fn accumulate(self, acc: Option<f64>, value: Option<f64>) -> Option<f64> {
        match self {
            Self::ZeroFill => Some(acc.unwrap_or(0.0) + value.unwrap_or(0.0)),
            Self::Exclude => match (acc, value) {
                (acc, None) => acc,
                (None, Some(v)) => Some(v),
                (Some(a), Some(v)) => Some(a + v),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub window_num: usize,
    pub window_min: usize,
    pub missing_stats: MissingStatPolicy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_num: DEFAULT_WINDOW_NUM,
            window_min: DEFAULT_WINDOW_MIN,
            missing_stats: MissingStatPolicy::ZeroFill,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.window_num == 0 {
            return Err(FeatureError::InvalidConfig(
                "window_num must be > 0".to_string(),
            ));
        }
        if self.window_min == 0 {
            return Err(FeatureError::InvalidConfig(
                "window_min must be > 0".to_string(),
            ));
        }
        if self.window_min > self.window_num {
            return Err(FeatureError::InvalidConfig(format!(
                "window_min ({}) must not exceed window_num ({})",
                self.window_min, self.window_num
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollingStat {
    Min,
    Max,
    Mean,
    Std,
    Sum,
}

pub const ROLLING_STATS: [RollingStat; 5] = [
    RollingStat::Min,
    RollingStat::Max,
    RollingStat::Mean,
    RollingStat::Std,
    RollingStat::Sum,
];

impl RollingStat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Sum => "sum",
        }
    }

    /// Applies the statistic to the non-missing values of one window.
    pub fn compute(self, window: &[f64]) -> Option<f64> {
        if window.is_empty() {
            return None;
        }
        match self {
            Self::Min => Some(window.iter().copied().fold(f64::INFINITY, f64::min)),
            Self::Max => Some(window.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Self::Mean => Some(window.iter().sum::<f64>() / window.len() as f64),
            Self::Std => sample_std(window),
            Self::Sum => Some(window.iter().sum()),
        }
    }
}

fn sample_std(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    Some(variance.sqrt())
}

/// What to aggregate: the grain, the metric columns and the output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub grain: Grain,
    pub metrics: &'static [Metric],
    pub prefix: String,
}

impl AggregationSpec {
    pub fn new(grain: Grain, metric_set: MetricSet) -> Self {
        Self {
            grain,
            metrics: metric_set.metrics(),
            prefix: grain.as_str().to_string(),
        }
    }

    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.metrics.len() * ROLLING_STATS.len());
        for metric in self.metrics {
            for stat in ROLLING_STATS {
                columns.push(format!(
                    "{}_{}_lagged_{}",
                    self.prefix,
                    metric.as_str(),
                    stat.as_str()
                ));
            }
        }
        columns
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub key: GrainKey,
    pub season: i32,
    pub week: u32,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct AggregatedSeries {
    pub grain: Grain,
    pub prefix: String,
    pub columns: Vec<String>,
    pub rows: Vec<AggregatedRow>,
    index: HashMap<(GrainKey, i32, u32), usize>,
}

impl AggregatedSeries {
    fn new(spec: &AggregationSpec, rows: Vec<AggregatedRow>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| ((row.key.clone(), row.season, row.week), idx))
            .collect();
        Self {
            grain: spec.grain,
            prefix: spec.prefix.clone(),
            columns: spec.output_columns(),
            rows,
            index,
        }
    }

    pub fn get(&self, key: &GrainKey, season: i32, week: u32) -> Option<&AggregatedRow> {
        self.index
            .get(&(key.clone(), season, week))
            .map(|idx| &self.rows[*idx])
    }

    /// Row matching the grain key of a raw player row in the same season and week.
    pub fn lookup(&self, row: &RawPlayerWeekStat) -> Option<&AggregatedRow> {
        self.get(&self.grain.key_of(row), row.season, row.week)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn value(&self, row: &AggregatedRow, column: &str) -> Option<f64> {
        self.column_index(column).and_then(|idx| row.values[idx])
    }
}

/// Shifts a series back by one observation.
pub fn lag_series(raw: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut lagged = Vec::with_capacity(raw.len());
    if raw.is_empty() {
        return lagged;
    }
    lagged.push(None);
    lagged.extend_from_slice(&raw[..raw.len() - 1]);
    lagged
}

/// Trailing-window statistic over an already lagged series.
pub fn rolling_stat(
    lagged: &[Option<f64>],
    stat: RollingStat,
    window_num: usize,
    window_min: usize,
) -> Vec<Option<f64>> {
    (0..lagged.len())
        .map(|end| {
            let window = trailing_window(lagged, end, window_num);
            if window.len() < window_min {
                None
            } else {
                stat.compute(&window)
            }
        })
        .collect()
}

fn trailing_window(lagged: &[Option<f64>], end: usize, window_num: usize) -> Vec<f64> {
    let start = (end + 1).saturating_sub(window_num);
    lagged[start..=end].iter().flatten().copied().collect()
}

type SeriesId = (GrainKey, i32);

pub fn aggregate_series<'a, I>(
    rows: I,
    spec: &AggregationSpec,
    cfg: &AggregationConfig,
) -> Result<AggregatedSeries, FeatureError>
where
    I: IntoIterator<Item = &'a RawPlayerWeekStat>,
{
    cfg.validate()?;
    if spec.metrics.is_empty() {
        return Err(FeatureError::InvalidConfig(format!(
            "no metrics selected for {} aggregation",
            spec.prefix
        )));
    }

    let mut input_rows = 0_usize;
    let mut groups: BTreeMap<SeriesId, BTreeMap<u32, Vec<Option<f64>>>> = BTreeMap::new();
    for row in rows {
        input_rows += 1;
        let sums = groups
            .entry((spec.grain.key_of(row), row.season))
            .or_default()
            .entry(row.week)
            .or_insert_with(|| vec![cfg.missing_stats.empty_sum(); spec.metrics.len()]);
        for (slot, metric) in sums.iter_mut().zip(spec.metrics) {
            *slot = cfg.missing_stats.accumulate(*slot, row.metric(*metric));
        }
    }

    let series_count = groups.len();
    let mut out_rows = Vec::new();
    for ((key, season), weeks) in groups {
        out_rows.extend(summarize_series(key, season, &weeks, spec, cfg));
    }

    let series = AggregatedSeries::new(spec, out_rows);

    info!(
        component = "aggregate",
        event = "aggregate.series.finish",
        grain = spec.grain.as_str(),
        prefix = %spec.prefix,
        input_rows,
        series = series_count,
        output_rows = series.rows.len(),
        column_count = series.columns.len()
    );

    Ok(series)
}

fn summarize_series(
    key: GrainKey,
    season: i32,
    weeks: &BTreeMap<u32, Vec<Option<f64>>>,
    spec: &AggregationSpec,
    cfg: &AggregationConfig,
) -> Vec<AggregatedRow> {
    let week_numbers: Vec<u32> = weeks.keys().copied().collect();
    let mut values = vec![
        Vec::with_capacity(spec.metrics.len() * ROLLING_STATS.len());
        week_numbers.len()
    ];

    for metric_idx in 0..spec.metrics.len() {
        let raw: Vec<Option<f64>> = weeks.values().map(|sums| sums[metric_idx]).collect();
        let lagged = lag_series(&raw);
        let columns: Vec<Vec<Option<f64>>> = ROLLING_STATS
            .iter()
            .map(|stat| rolling_stat(&lagged, *stat, cfg.window_num, cfg.window_min))
            .collect();
        for (pos, out) in values.iter_mut().enumerate() {
            out.extend(columns.iter().map(|column| column[pos]));
        }
    }

    debug!(
        component = "aggregate",
        event = "aggregate.series.summarized",
        grain = spec.grain.as_str(),
        key = ?key.parts(),
        season,
        weeks = week_numbers.len()
    );

    week_numbers
        .into_iter()
        .zip(values)
        .map(|(week, values)| AggregatedRow {
            key: key.clone(),
            season,
            week,
            values,
        })
        .collect()
}
