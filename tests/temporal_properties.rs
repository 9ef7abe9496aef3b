use gridiron::{
    aggregate_series, build_feature_tables, lag_series, normalize_schedule, rolling_stat,
    AggregatedSeries, AggregationConfig, AggregationSpec, Grain, GrainKey, Metric, MetricSet,
    Perspective, PipelineConfig, PipelineInputs, RawPlayerWeekStat, RawScheduleGameRow,
    RollingStat, ScheduleSide,
};

const TEAMS: [&str; 2] = ["KC", "BUF"];
const SEASONS: [i32; 2] = [2022, 2023];

/// Deterministic per-player weekly value so every aggregate can be recomputed by hand.
fn raw_value(team_idx: usize, player_idx: usize, season: i32, week: u32) -> f64 {
    (season - 2020) as f64 * 100.0 + team_idx as f64 * 10.0 + player_idx as f64 + week as f64 * 3.0
}

/// Two teams × two seasons × three weeks, one QB and one RB per team.
fn scenario() -> Vec<RawPlayerWeekStat> {
    let mut rows = Vec::new();
    for season in SEASONS {
        for week in 1..=3 {
            for (team_idx, team) in TEAMS.iter().enumerate() {
                for (player_idx, group) in ["QB", "RB"].iter().enumerate() {
                    let id = format!("{team}-{group}");
                    let value = raw_value(team_idx, player_idx, season, week);
                    rows.push(
                        RawPlayerWeekStat::new(&id, &id, *group, *team, season, week)
                            .with_metric(Metric::Carries, value)
                            .with_metric(Metric::PassingYards, value * 2.0)
                            .with_metric(Metric::FantasyPoints, value / 10.0),
                    );
                }
            }
        }
    }
    rows
}

fn scenario_schedule() -> Vec<RawScheduleGameRow> {
    let mut games = Vec::new();
    for season in SEASONS {
        for week in 1..=3 {
            let (home, away) = if week % 2 == 1 { ("KC", "BUF") } else { ("BUF", "KC") };
            games.push(RawScheduleGameRow {
                season,
                week,
                game_type: "REG".to_string(),
                gameday: Some(format!("{season}-09-{:02}", 6 + week * 7)),
                gametime: Some("13:00".to_string()),
                div_game: Some(false),
                roof: Some("outdoors".to_string()),
                surface: Some("grass".to_string()),
                temp: Some(60.0 + week as f64),
                wind: Some(4.0),
                stadium_id: Some(format!("{home}00")),
                home: ScheduleSide {
                    team: home.to_string(),
                    score: Some(24.0),
                    rest: Some(7),
                    qb_id: Some(format!("{home}-QB")),
                },
                away: ScheduleSide {
                    team: away.to_string(),
                    score: Some(17.0),
                    rest: Some(6),
                    qb_id: Some(format!("{away}-QB")),
                },
            });
        }
    }
    games
}

fn team_series(stats: &[RawPlayerWeekStat]) -> AggregatedSeries {
    aggregate_series(
        stats,
        &AggregationSpec::new(Grain::Team, MetricSet::All),
        &AggregationConfig::default(),
    )
    .expect("team aggregation")
}

#[test]
fn team_week_three_mean_is_mean_of_raw_weeks_one_and_two() {
    let stats = scenario();
    let team = team_series(&stats);

    for (team_idx, name) in TEAMS.iter().enumerate() {
        for season in SEASONS {
            let total = |week| {
                raw_value(team_idx, 0, season, week) + raw_value(team_idx, 1, season, week)
            };
            let week3 = team
                .get(&GrainKey::new([*name]), season, 3)
                .expect("week 3 row");
            let expected = (total(1) + total(2)) / 2.0;
            assert_eq!(team.value(week3, "team_carries_lagged_mean"), Some(expected));

            let week1 = team.get(&GrainKey::new([*name]), season, 1).expect("week 1 row");
            assert_eq!(team.value(week1, "team_carries_lagged_mean"), None);
            assert_eq!(team.value(week1, "team_carries_lagged_sum"), None);
        }
    }
}

#[test]
fn lag_is_previous_observation_and_missing_first() {
    let raw = [Some(4.0), Some(7.0), None, Some(1.0)];
    assert_eq!(lag_series(&raw), vec![None, Some(4.0), Some(7.0), None]);
    assert!(lag_series(&[]).is_empty());
}

#[test]
fn std_needs_two_values() {
    assert_eq!(rolling_stat(&[None, Some(5.0)], RollingStat::Std, 10, 1), vec![None, None]);
    let both = rolling_stat(&[None, Some(1.0), Some(3.0)], RollingStat::Std, 10, 1);
    assert_eq!(both[0], None);
    assert_eq!(both[1], None);
    assert!((both[2].expect("std with two values") - 2.0_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn mutating_a_week_only_moves_later_weeks() {
    let base = scenario();
    let mut mutated = base.clone();
    for row in mutated.iter_mut().filter(|r| r.season == 2023 && r.week == 2) {
        row.set_metric(Metric::Carries, Some(999.0));
    }

    let before = team_series(&base);
    let after = team_series(&mutated);
    for name in TEAMS {
        let key = GrainKey::new([name]);
        for week in 1..=2 {
            let a = before.get(&key, 2023, week).expect("row");
            let b = after.get(&key, 2023, week).expect("row");
            assert_eq!(a.values, b.values, "{name} week {week} must not change");
        }
        let a = before.get(&key, 2023, 3).expect("row");
        let b = after.get(&key, 2023, 3).expect("row");
        assert_ne!(
            before.value(a, "team_carries_lagged_mean"),
            after.value(b, "team_carries_lagged_mean")
        );
        let other_season_a = before.get(&key, 2022, 3).expect("row");
        let other_season_b = after.get(&key, 2022, 3).expect("row");
        assert_eq!(other_season_a.values, other_season_b.values);
    }
}

#[test]
fn windows_never_reach_into_previous_season() {
    let stats = scenario();
    let team = team_series(&stats);
    let week2 = team
        .get(&GrainKey::new(["KC"]), 2023, 2)
        .expect("week 2 row");
    let week1_total = raw_value(0, 0, 2023, 1) + raw_value(0, 1, 2023, 1);

    assert_eq!(team.value(week2, "team_carries_lagged_mean"), Some(week1_total));
    assert_eq!(team.value(week2, "team_carries_lagged_std"), None);
}

#[test]
fn merged_tables_keep_week_three_rows_per_season() {
    let inputs = PipelineInputs {
        player_stats: scenario(),
        schedule: scenario_schedule(),
    };
    let tables = build_feature_tables(&inputs, &PipelineConfig::default()).expect("tables");

    let qb = &tables.quarterback;
    assert_eq!(qb.rows.len(), 4);
    assert!(qb.rows.iter().all(|row| row.week == 3 && row.position_group == "QB"));

    let kc_2023 = qb.find("KC-QB", 2023, 3).expect("KC QB week 3");
    let expected_player = (raw_value(0, 0, 2023, 1) + raw_value(0, 0, 2023, 2)) / 2.0;
    assert_eq!(qb.feature(kc_2023, "player_carries_lagged_mean"), Some(expected_player));
    assert_eq!(kc_2023.schedule.home_away, Perspective::Home);
    assert_eq!(kc_2023.schedule.rest, Some(7));

    let buf_2022 = qb.find("BUF-QB", 2022, 3).expect("BUF QB week 3");
    assert_eq!(buf_2022.schedule.home_away, Perspective::Away);
    assert_eq!(buf_2022.schedule.rest, Some(6));
    assert_eq!(buf_2022.schedule.season, 2022);

    let skill = &tables.skill_position;
    assert_eq!(skill.rows.len(), 4);
    assert!(skill.rows.iter().all(|row| row.position_group == "RB"));
}

#[test]
fn single_week_player_is_absent() {
    let mut stats = scenario();
    stats.push(
        RawPlayerWeekStat::new("KC-WR", "KC-WR", "WR", "KC", 2023, 2)
            .with_metric(Metric::Carries, 1.0)
            .with_metric(Metric::FantasyPoints, 3.0),
    );
    let inputs = PipelineInputs {
        player_stats: stats,
        schedule: scenario_schedule(),
    };
    let tables = build_feature_tables(&inputs, &PipelineConfig::default()).expect("tables");
    assert!(tables
        .skill_position
        .rows
        .iter()
        .all(|row| row.player_id != "KC-WR"));
}

#[test]
fn normalizer_emits_away_then_home_per_game() {
    let games = scenario_schedule();
    let rows = normalize_schedule(&games);
    assert_eq!(rows.len(), games.len() * 2);

    for (game, pair) in games.iter().zip(rows.chunks(2)) {
        let (away, home) = (&pair[0], &pair[1]);
        assert_eq!(away.home_away, Perspective::Away);
        assert_eq!(away.team, game.away.team);
        assert_eq!(away.rest, game.away.rest);
        assert_eq!(home.home_away, Perspective::Home);
        assert_eq!(home.team, game.home.team);
        assert_eq!(home.rest, game.home.rest);
        for side in pair {
            assert_eq!(side.season, game.season);
            assert_eq!(side.week, game.week);
            assert_eq!(side.temp, game.temp);
            assert_eq!(side.stadium_id, game.stadium_id);
            assert_eq!(side.gameday, game.gameday);
        }
    }
}
