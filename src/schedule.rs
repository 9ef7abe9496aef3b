//! Home/away schedule normalization.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::records::{RawScheduleGameRow, ScheduleSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Perspective {
    Home,
    Away,
}

impl Perspective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

/// One team's view of a game. Score and quarterback id are not carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScheduleRow {
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
    pub team: String,
    pub rest: Option<u32>,
    pub home_away: Perspective,
}

impl NormalizedScheduleRow {
    fn from_side(game: &RawScheduleGameRow, side: &ScheduleSide, home_away: Perspective) -> Self {
        Self {
            season: game.season,
            week: game.week,
            game_type: game.game_type.clone(),
            gameday: game.gameday.clone(),
            gametime: game.gametime.clone(),
            div_game: game.div_game,
            roof: game.roof.clone(),
            surface: game.surface.clone(),
            temp: game.temp,
            wind: game.wind,
            stadium_id: game.stadium_id.clone(),
            team: side.team.clone(),
            rest: side.rest,
            home_away,
        }
    }

    /// True when every optional context field is populated.
    pub fn is_complete(&self) -> bool {
        self.gameday.is_some()
            && self.gametime.is_some()
            && self.div_game.is_some()
            && self.roof.is_some()
            && self.surface.is_some()
            && self.temp.is_some()
            && self.wind.is_some()
            && self.stadium_id.is_some()
            && self.rest.is_some()
    }
}

/// Emits an away row followed by a home row for every game.
pub fn normalize_schedule(games: &[RawScheduleGameRow]) -> Vec<NormalizedScheduleRow> {
    let mut out = Vec::with_capacity(games.len() * 2);
    for game in games {
        out.push(NormalizedScheduleRow::from_side(
            game,
            &game.away,
            Perspective::Away,
        ));
        out.push(NormalizedScheduleRow::from_side(
            game,
            &game.home,
            Perspective::Home,
        ));
    }

    info!(
        component = "schedule",
        event = "schedule.normalize.finish",
        games = games.len(),
        rows = out.len()
    );

    out
}
