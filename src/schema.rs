//! Static metric-column registry for weekly player stats.
//!
//! Three ordered sets are exposed:
//! - `ALL_METRICS`: every tracked metric, used for the team baseline grain
//! - `QUARTERBACK_METRICS`: passing + rushing + shared usage metrics
//! - `SKILL_POSITION_METRICS`: rushing + receiving + shared usage metrics
//!
//! A skill-position grain never sees passing metrics and a quarterback grain
//! never sees receiving metrics.

use serde::{Deserialize, Serialize};

pub const METRIC_COUNT: usize = 41;

pub const QUARTERBACK_POSITION_GROUPS: [&str; 1] = ["QB"];
pub const SKILL_POSITION_GROUPS: [&str; 3] = ["WR", "RB", "TE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    Completions,
    Attempts,
    PassingYards,
    PassingTds,
    Interceptions,
    Sacks,
    SackYards,
    SackFumbles,
    SackFumblesLost,
    PassingAirYards,
    PassingYardsAfterCatch,
    PassingFirstDowns,
    PassingEpa,
    Passing2ptConversions,
    Pacr,
    Carries,
    RushingYards,
    RushingTds,
    RushingFumbles,
    RushingFumblesLost,
    RushingFirstDowns,
    RushingEpa,
    Rushing2ptConversions,
    AirYardsShare,
    Wopr,
    Receptions,
    Targets,
    ReceivingYards,
    ReceivingTds,
    ReceivingFumbles,
    ReceivingFumblesLost,
    ReceivingAirYards,
    ReceivingYardsAfterCatch,
    ReceivingFirstDowns,
    ReceivingEpa,
    Receiving2ptConversions,
    SpecialTeamsTds,
    Racr,
    TargetShare,
    FantasyPoints,
    FantasyPointsPpr,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completions => "completions",
            Self::Attempts => "attempts",
            Self::PassingYards => "passing_yards",
            Self::PassingTds => "passing_tds",
            Self::Interceptions => "interceptions",
            Self::Sacks => "sacks",
            Self::SackYards => "sack_yards",
            Self::SackFumbles => "sack_fumbles",
            Self::SackFumblesLost => "sack_fumbles_lost",
            Self::PassingAirYards => "passing_air_yards",
            Self::PassingYardsAfterCatch => "passing_yards_after_catch",
            Self::PassingFirstDowns => "passing_first_downs",
            Self::PassingEpa => "passing_epa",
            Self::Passing2ptConversions => "passing_2pt_conversions",
            Self::Pacr => "pacr",
            Self::Carries => "carries",
            Self::RushingYards => "rushing_yards",
            Self::RushingTds => "rushing_tds",
            Self::RushingFumbles => "rushing_fumbles",
            Self::RushingFumblesLost => "rushing_fumbles_lost",
            Self::RushingFirstDowns => "rushing_first_downs",
            Self::RushingEpa => "rushing_epa",
            Self::Rushing2ptConversions => "rushing_2pt_conversions",
            Self::AirYardsShare => "air_yards_share",
            Self::Wopr => "wopr",
            Self::Receptions => "receptions",
            Self::Targets => "targets",
            Self::ReceivingYards => "receiving_yards",
            Self::ReceivingTds => "receiving_tds",
            Self::ReceivingFumbles => "receiving_fumbles",
            Self::ReceivingFumblesLost => "receiving_fumbles_lost",
            Self::ReceivingAirYards => "receiving_air_yards",
            Self::ReceivingYardsAfterCatch => "receiving_yards_after_catch",
            Self::ReceivingFirstDowns => "receiving_first_downs",
            Self::ReceivingEpa => "receiving_epa",
            Self::Receiving2ptConversions => "receiving_2pt_conversions",
            Self::SpecialTeamsTds => "special_teams_tds",
            Self::Racr => "racr",
            Self::TargetShare => "target_share",
            Self::FantasyPoints => "fantasy_points",
            Self::FantasyPointsPpr => "fantasy_points_ppr",
        }
    }

    /// Position of this metric in a `RawPlayerWeekStat::metrics` array.
    pub fn index(self) -> usize {
        self as usize
    }
}

pub const ALL_METRICS: [Metric; METRIC_COUNT] = [
    Metric::Completions,
    Metric::Attempts,
    Metric::PassingYards,
    Metric::PassingTds,
    Metric::Interceptions,
    Metric::Sacks,
    Metric::SackYards,
    Metric::SackFumbles,
    Metric::SackFumblesLost,
    Metric::PassingAirYards,
    Metric::PassingYardsAfterCatch,
    Metric::PassingFirstDowns,
    Metric::PassingEpa,
    Metric::Passing2ptConversions,
    Metric::Pacr,
    Metric::Carries,
    Metric::RushingYards,
    Metric::RushingTds,
    Metric::RushingFumbles,
    Metric::RushingFumblesLost,
    Metric::RushingFirstDowns,
    Metric::RushingEpa,
    Metric::Rushing2ptConversions,
    Metric::AirYardsShare,
    Metric::Wopr,
    Metric::Receptions,
    Metric::Targets,
    Metric::ReceivingYards,
    Metric::ReceivingTds,
    Metric::ReceivingFumbles,
    Metric::ReceivingFumblesLost,
    Metric::ReceivingAirYards,
    Metric::ReceivingYardsAfterCatch,
    Metric::ReceivingFirstDowns,
    Metric::ReceivingEpa,
    Metric::Receiving2ptConversions,
    Metric::SpecialTeamsTds,
    Metric::Racr,
    Metric::TargetShare,
    Metric::FantasyPoints,
    Metric::FantasyPointsPpr,
];

pub const QUARTERBACK_METRICS: [Metric; 27] = [
    Metric::Completions,
    Metric::Attempts,
    Metric::PassingYards,
    Metric::PassingTds,
    Metric::Interceptions,
    Metric::Sacks,
    Metric::SackYards,
    Metric::SackFumbles,
    Metric::SackFumblesLost,
    Metric::PassingAirYards,
    Metric::PassingYardsAfterCatch,
    Metric::PassingFirstDowns,
    Metric::PassingEpa,
    Metric::Passing2ptConversions,
    Metric::Pacr,
    Metric::Carries,
    Metric::RushingYards,
    Metric::RushingTds,
    Metric::RushingFumbles,
    Metric::RushingFumblesLost,
    Metric::RushingFirstDowns,
    Metric::RushingEpa,
    Metric::Rushing2ptConversions,
    Metric::AirYardsShare,
    Metric::Wopr,
    Metric::FantasyPoints,
    Metric::FantasyPointsPpr,
];

pub const SKILL_POSITION_METRICS: [Metric; 26] = [
    Metric::Carries,
    Metric::RushingYards,
    Metric::RushingTds,
    Metric::RushingFumbles,
    Metric::RushingFumblesLost,
    Metric::RushingFirstDowns,
    Metric::RushingEpa,
    Metric::Rushing2ptConversions,
    Metric::Receptions,
    Metric::Targets,
    Metric::ReceivingYards,
    Metric::ReceivingTds,
    Metric::ReceivingFumbles,
    Metric::ReceivingFumblesLost,
    Metric::ReceivingAirYards,
    Metric::ReceivingYardsAfterCatch,
    Metric::AirYardsShare,
    Metric::ReceivingFirstDowns,
    Metric::ReceivingEpa,
    Metric::Receiving2ptConversions,
    Metric::SpecialTeamsTds,
    Metric::Racr,
    Metric::TargetShare,
    Metric::Wopr,
    Metric::FantasyPoints,
    Metric::FantasyPointsPpr,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricSet {
    All,
    Quarterback,
    SkillPosition,
}

impl MetricSet {
    pub fn metrics(self) -> &'static [Metric] {
        match self {
            Self::All => &ALL_METRICS,
            Self::Quarterback => &QUARTERBACK_METRICS,
            Self::SkillPosition => &SKILL_POSITION_METRICS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_index_matches_all_metrics_order() {
        for (idx, metric) in ALL_METRICS.iter().enumerate() {
            assert_eq!(metric.index(), idx, "{}", metric.as_str());
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let names: HashSet<&str> = ALL_METRICS.iter().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), METRIC_COUNT);
    }

    #[test]
    fn subsets_are_drawn_from_all_and_keep_purpose() {
        let all: HashSet<Metric> = ALL_METRICS.into_iter().collect();
        for metric in QUARTERBACK_METRICS.iter().chain(SKILL_POSITION_METRICS.iter()) {
            assert!(all.contains(metric));
        }

        assert!(!SKILL_POSITION_METRICS.contains(&Metric::Completions));
        assert!(!SKILL_POSITION_METRICS.contains(&Metric::PassingYards));
        assert!(!QUARTERBACK_METRICS.contains(&Metric::Receptions));
        assert!(!QUARTERBACK_METRICS.contains(&Metric::ReceivingYards));
    }

    #[test]
    fn metric_sets_expose_expected_lengths() {
        assert_eq!(MetricSet::All.metrics().len(), 41);
        assert_eq!(MetricSet::Quarterback.metrics().len(), 27);
        assert_eq!(MetricSet::SkillPosition.metrics().len(), 26);
        assert_eq!(MetricSet::SkillPosition.metrics()[0], Metric::Carries);
    }
}
