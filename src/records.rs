//! Raw input rows supplied by the stats provider.

use serde::{Deserialize, Serialize};

use crate::schema::{Metric, METRIC_COUNT};

#[derive(Debug, Clone, PartialEq)]
pub struct RawPlayerWeekStat {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: String,
    pub team: String,
    pub season: i32,
    pub week: u32,
    pub metrics: [Option<f64>; METRIC_COUNT],
    /// Copy of `fantasy_points`, kept as the label column.
    pub fantasy_points_actual: Option<f64>,
}

impl RawPlayerWeekStat {
    /// Row with every metric missing. Useful as a base for synthetic data.
    pub fn new(
        player_id: impl Into<String>,
        player_name: impl Into<String>,
        position_group: impl Into<String>,
        team: impl Into<String>,
        season: i32,
        week: u32,
    ) -> Self {
        let position_group = position_group.into();
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            position: position_group.clone(),
            position_group,
            team: team.into(),
            season,
            week,
            metrics: [None; METRIC_COUNT],
            fantasy_points_actual: None,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics[metric.index()]
    }

    /// Sets a metric; setting `fantasy_points` also refreshes the label.
    pub fn set_metric(&mut self, metric: Metric, value: Option<f64>) {
        self.metrics[metric.index()] = value;
        if metric == Metric::FantasyPoints {
            self.fantasy_points_actual = value;
        }
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        self.set_metric(metric, Some(value));
        self
    }

    pub fn in_position_groups(&self, groups: &[&str]) -> bool {
        groups.iter().any(|g| *g == self.position_group)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSide {
    pub team: String,
    pub score: Option<f64>,
    pub rest: Option<u32>,
    pub qb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScheduleGameRow {
    pub season: i32,
    pub week: u32,
    pub game_type: String,
    pub gameday: Option<String>,
    pub gametime: Option<String>,
    pub div_game: Option<bool>,
    pub roof: Option<String>,
    pub surface: Option<String>,
    pub temp: Option<f64>,
    pub wind: Option<f64>,
    pub stadium_id: Option<String>,
    pub home: ScheduleSide,
    pub away: ScheduleSide,
}
