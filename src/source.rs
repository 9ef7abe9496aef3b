//! Stats-provider ingestion: weekly player stats and game schedules as CSV.
//!
//! Columns are resolved by header name once per table; a required column that
//! is absent fails the whole load (`SourceError::MissingColumn`). Empty cells,
//! `NA` and `NaN` are read as missing.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::records::{RawPlayerWeekStat, RawScheduleGameRow, ScheduleSide};
use crate::schema::{Metric, ALL_METRICS, METRIC_COUNT};

const PLAYER_TABLE: &str = "weekly_player_stats";
const SCHEDULE_TABLE: &str = "schedule";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{table} is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: String },
    #[error("{table} line {line}: failed to parse column '{column}' value '{value}'")]
    ParseField {
        table: &'static str,
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
}

/// Half-open season range `[first, end_exclusive)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub first: i32,
    pub end_exclusive: i32,
}

impl SeasonWindow {
    /// `[year - 1, year)` for the calendar year of `run_date`.
    pub fn for_run_date(run_date: NaiveDate) -> Self {
        let year = run_date.year();
        Self {
            first: year - 1,
            end_exclusive: year,
        }
    }

    pub fn contains(&self, season: i32) -> bool {
        season >= self.first && season < self.end_exclusive
    }

    pub fn seasons(&self) -> impl Iterator<Item = i32> {
        self.first..self.end_exclusive
    }
}

/// Supplier of raw rows for a run.
pub trait StatsSource {
    fn name(&self) -> &str;

    fn player_week_stats(
        &self,
        seasons: &SeasonWindow,
    ) -> Result<Vec<RawPlayerWeekStat>, SourceError>;

    fn schedule(&self, seasons: &SeasonWindow) -> Result<Vec<RawScheduleGameRow>, SourceError>;
}

/// Reads `player_stats_<season>.csv` and `games.csv` from a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCsvSource {
    pub root: PathBuf,
}

impl LocalCsvSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn player_stats_path(&self, season: i32) -> PathBuf {
        self.root.join(format!("player_stats_{season}.csv"))
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.root.join("games.csv")
    }
}

impl StatsSource for LocalCsvSource {
    fn name(&self) -> &str {
        "local_csv"
    }

    fn player_week_stats(
        &self,
        seasons: &SeasonWindow,
    ) -> Result<Vec<RawPlayerWeekStat>, SourceError> {
        let mut rows = Vec::new();
        for season in seasons.seasons() {
            let path = self.player_stats_path(season);
            let file = fs::File::open(&path)?;
            let loaded = parse_player_week_stats(file)?;
            info!(
                component = "source",
                event = "source.player_stats.loaded",
                source = "local_csv",
                path = %path.display(),
                season,
                rows = loaded.len()
            );
            rows.extend(loaded.into_iter().filter(|row| seasons.contains(row.season)));
        }
        Ok(rows)
    }

    fn schedule(&self, seasons: &SeasonWindow) -> Result<Vec<RawScheduleGameRow>, SourceError> {
        load_schedule_file(&self.schedule_path(), seasons)
    }
}

fn load_schedule_file(
    path: &Path,
    seasons: &SeasonWindow,
) -> Result<Vec<RawScheduleGameRow>, SourceError> {
    let file = fs::File::open(path)?;
    let games: Vec<RawScheduleGameRow> = parse_schedule(file)?
        .into_iter()
        .filter(|game| seasons.contains(game.season))
        .collect();
    info!(
        component = "source",
        event = "source.schedule.loaded",
        path = %path.display(),
        games = games.len()
    );
    Ok(games)
}

struct HeaderIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(table: &'static str, headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        Self { table, positions }
    }

    fn require(&self, column: &str) -> Result<usize, SourceError> {
        self.positions
            .get(column)
            .copied()
            .ok_or_else(|| SourceError::MissingColumn {
                table: self.table,
                column: column.to_string(),
            })
    }

    fn require_any(&self, columns: &[&str]) -> Result<usize, SourceError> {
        columns
            .iter()
            .find_map(|column| self.positions.get(*column).copied())
            .ok_or_else(|| SourceError::MissingColumn {
                table: self.table,
                column: columns.join("|"),
            })
    }
}

struct PlayerColumns {
    player_id: usize,
    player_name: usize,
    position: usize,
    position_group: usize,
    team: usize,
    season: usize,
    week: usize,
    metrics: [usize; METRIC_COUNT],
}

impl PlayerColumns {
    fn resolve(index: &HeaderIndex) -> Result<Self, SourceError> {
        let mut metrics = [0_usize; METRIC_COUNT];
        for metric in ALL_METRICS {
            metrics[metric.index()] = index.require(metric.as_str())?;
        }
        Ok(Self {
            player_id: index.require("player_id")?,
            player_name: index.require("player_name")?,
            position: index.require("position")?,
            position_group: index.require("position_group")?,
            team: index.require_any(&["recent_team", "team"])?,
            season: index.require("season")?,
            week: index.require("week")?,
            metrics,
        })
    }
}

pub fn parse_player_week_stats<R: Read>(reader: R) -> Result<Vec<RawPlayerWeekStat>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);
    let index = HeaderIndex::new(PLAYER_TABLE, reader.headers()?);
    let cols = PlayerColumns::resolve(&index)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record_line(&record);
        let field = FieldReader {
            table: PLAYER_TABLE,
            record: &record,
            line,
        };

        let mut metrics = [None; METRIC_COUNT];
        for metric in ALL_METRICS {
            metrics[metric.index()] =
                field.opt_f64(cols.metrics[metric.index()], metric.as_str())?;
        }
        let fantasy_points_actual = metrics[Metric::FantasyPoints.index()];

        rows.push(RawPlayerWeekStat {
            player_id: field.text(cols.player_id),
            player_name: field.text(cols.player_name),
            position: field.text(cols.position),
            position_group: field.text(cols.position_group),
            team: field.text(cols.team),
            season: field.req_i32(cols.season, "season")?,
            week: field.req_u32(cols.week, "week")?,
            metrics,
            fantasy_points_actual,
        });
    }

    rows.sort_by(|a, b| (a.season, a.week).cmp(&(b.season, b.week)));
    Ok(rows)
}

struct SideColumns {
    team: usize,
    score: usize,
    rest: usize,
    qb_id: usize,
}

impl SideColumns {
    fn resolve(index: &HeaderIndex, prefix: &str) -> Result<Self, SourceError> {
        Ok(Self {
            team: index.require(&format!("{prefix}_team"))?,
            score: index.require(&format!("{prefix}_score"))?,
            rest: index.require(&format!("{prefix}_rest"))?,
            qb_id: index.require(&format!("{prefix}_qb_id"))?,
        })
    }

    fn read(&self, field: &FieldReader<'_>) -> Result<ScheduleSide, SourceError> {
        Ok(ScheduleSide {
            team: field.text(self.team),
            score: field.opt_f64(self.score, "score")?,
            rest: field.opt_u32(self.rest, "rest")?,
            qb_id: field.opt_text(self.qb_id),
        })
    }
}

pub fn parse_schedule<R: Read>(reader: R) -> Result<Vec<RawScheduleGameRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let index = HeaderIndex::new(SCHEDULE_TABLE, reader.headers()?);

    let season = index.require("season")?;
    let week = index.require("week")?;
    let game_type = index.require("game_type")?;
    let gameday = index.require("gameday")?;
    let gametime = index.require("gametime")?;
    let div_game = index.require("div_game")?;
    let roof = index.require("roof")?;
    let surface = index.require("surface")?;
    let temp = index.require("temp")?;
    let wind = index.require("wind")?;
    let stadium_id = index.require("stadium_id")?;
    let home = SideColumns::resolve(&index, "home")?;
    let away = SideColumns::resolve(&index, "away")?;

    let mut games = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = FieldReader {
            table: SCHEDULE_TABLE,
            record: &record,
            line: record_line(&record),
        };
        games.push(RawScheduleGameRow {
            season: field.req_i32(season, "season")?,
            week: field.req_u32(week, "week")?,
            game_type: field.text(game_type),
            gameday: field.opt_text(gameday),
            gametime: field.opt_text(gametime),
            div_game: field.opt_bool(div_game, "div_game")?,
            roof: field.opt_text(roof),
            surface: field.opt_text(surface),
            temp: field.opt_f64(temp, "temp")?,
            wind: field.opt_f64(wind, "wind")?,
            stadium_id: field.opt_text(stadium_id),
            home: home.read(&field)?,
            away: away.read(&field)?,
        });
    }

    Ok(games)
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

struct FieldReader<'a> {
    table: &'static str,
    record: &'a StringRecord,
    line: u64,
}

impl FieldReader<'_> {
    fn raw(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("").trim()
    }

    fn text(&self, idx: usize) -> String {
        self.raw(idx).to_string()
    }

    fn opt_text(&self, idx: usize) -> Option<String> {
        let raw = self.raw(idx);
        if is_missing(raw) {
            None
        } else {
            Some(raw.to_string())
        }
    }

    fn parse_error(&self, idx: usize, column: &'static str) -> SourceError {
        SourceError::ParseField {
            table: self.table,
            line: self.line,
            column,
            value: self.raw(idx).to_string(),
        }
    }

    fn opt_f64(&self, idx: usize, column: &'static str) -> Result<Option<f64>, SourceError> {
        let raw = self.raw(idx);
        if is_missing(raw) {
            return Ok(None);
        }
        let value: f64 = raw.parse().map_err(|_| self.parse_error(idx, column))?;
        Ok(value.is_finite().then_some(value))
    }

    fn opt_u32(&self, idx: usize, column: &'static str) -> Result<Option<u32>, SourceError> {
        match self.opt_f64(idx, column)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(Some(v as u32)),
            Some(_) => Err(self.parse_error(idx, column)),
        }
    }

    fn opt_bool(&self, idx: usize, column: &'static str) -> Result<Option<bool>, SourceError> {
        match self.raw(idx).to_ascii_lowercase().as_str() {
            "" | "na" => Ok(None),
            "1" | "true" => Ok(Some(true)),
            "0" | "false" => Ok(Some(false)),
            _ => Err(self.parse_error(idx, column)),
        }
    }

    fn req_i32(&self, idx: usize, column: &'static str) -> Result<i32, SourceError> {
        self.raw(idx)
            .parse()
            .map_err(|_| self.parse_error(idx, column))
    }

    fn req_u32(&self, idx: usize, column: &'static str) -> Result<u32, SourceError> {
        self.opt_u32(idx, column)?
            .ok_or_else(|| self.parse_error(idx, column))
    }
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan")
}

/// Minimal byte fetcher so HTTP access can be swapped out in tests.
pub trait HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NflverseConfig {
    pub player_stats_url_template: String,
    pub schedule_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NflverseConfig {
    fn default() -> Self {
        Self {
            player_stats_url_template:
                "https://github.com/nflverse/nflverse-data/releases/download/player_stats/player_stats_{season}.csv"
                    .to_string(),
            schedule_url: "https://raw.githubusercontent.com/nflverse/nfldata/master/data/games.csv"
                .to_string(),
            http_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl NflverseConfig {
    pub fn player_stats_url(&self, season: i32) -> String {
        self.player_stats_url_template
            .replace("{season}", &season.to_string())
    }
}

/// Downloads the public nflverse CSV releases.
pub struct NflverseHttpSource {
    cfg: NflverseConfig,
    fetcher: Box<dyn HttpFetcher>,
}

impl NflverseHttpSource {
    #[cfg(feature = "nflverse-http")]
    pub fn new(cfg: NflverseConfig) -> Result<Self, SourceError> {
        let fetcher = ReqwestBlockingFetcher::new(cfg.http_timeout_ms)?;
        Ok(Self::with_fetcher(cfg, Box::new(fetcher)))
    }

    pub fn with_fetcher(cfg: NflverseConfig, fetcher: Box<dyn HttpFetcher>) -> Self {
        Self { cfg, fetcher }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        retry(&self.cfg, url, || self.fetcher.get_bytes(url))
    }
}

impl StatsSource for NflverseHttpSource {
    fn name(&self) -> &str {
        "nflverse_http"
    }

    fn player_week_stats(
        &self,
        seasons: &SeasonWindow,
    ) -> Result<Vec<RawPlayerWeekStat>, SourceError> {
        let mut rows = Vec::new();
        for season in seasons.seasons() {
            let url = self.cfg.player_stats_url(season);
            let bytes = self.fetch(&url)?;
            let loaded = parse_player_week_stats(bytes.as_slice())?;
            info!(
                component = "source",
                event = "source.player_stats.loaded",
                source = "nflverse_http",
                url = %url,
                season,
                rows = loaded.len()
            );
            rows.extend(loaded.into_iter().filter(|row| seasons.contains(row.season)));
        }
        rows.sort_by(|a, b| (a.season, a.week).cmp(&(b.season, b.week)));
        Ok(rows)
    }

    fn schedule(&self, seasons: &SeasonWindow) -> Result<Vec<RawScheduleGameRow>, SourceError> {
        let bytes = self.fetch(&self.cfg.schedule_url)?;
        let games: Vec<RawScheduleGameRow> = parse_schedule(bytes.as_slice())?
            .into_iter()
            .filter(|game| seasons.contains(game.season))
            .collect();
        info!(
            component = "source",
            event = "source.schedule.loaded",
            url = %self.cfg.schedule_url,
            games = games.len()
        );
        Ok(games)
    }
}

#[cfg(feature = "nflverse-http")]
struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "nflverse-http")]
impl ReqwestBlockingFetcher {
    fn new(timeout_ms: u64) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| SourceError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "nflverse-http")]
impl HttpFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SourceError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| SourceError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

fn retry<T>(
    cfg: &NflverseConfig,
    url: &str,
    mut f: impl FnMut() -> Result<T, SourceError>,
) -> Result<T, SourceError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(err) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(1u64 << shift);
                warn!(
                    component = "source",
                    event = "source.fetch.retry",
                    url,
                    attempt,
                    sleep_ms,
                    error = %err
                );
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}
