use std::path::PathBuf;

use chrono::NaiveDate;
use gridiron::{
    current_run_date, init_logging, log_app_start, logging_config_from_env, run_weekly_pipeline,
    EnvSecretStore, FileSecretStore, LocalCsvSource, LocalObjectStore, ObjectStore,
    PipelineConfig, SecretStore, SqliteObjectStore, StatsSource, DEFAULT_BUCKET,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("gridiron-weekly-features", &logging_cfg);

    let run_date = run_date_from_env()?;
    let source = source_from_env()?;
    let secrets = secrets_from_env();
    let store = store_from_env()?;

    let summary = run_weekly_pipeline(
        source.as_ref(),
        secrets.as_ref(),
        store.as_ref(),
        &PipelineConfig::default(),
        run_date,
    )?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_date_from_env() -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match std::env::var("GRIDIRON_RUN_DATE") {
        Ok(raw) => Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?),
        Err(_) => Ok(current_run_date()),
    }
}

fn source_from_env() -> Result<Box<dyn StatsSource>, Box<dyn std::error::Error>> {
    if let Ok(dir) = std::env::var("GRIDIRON_DATA_DIR") {
        return Ok(Box::new(LocalCsvSource::new(dir)));
    }
    http_source()
}

#[cfg(feature = "nflverse-http")]
fn http_source() -> Result<Box<dyn StatsSource>, Box<dyn std::error::Error>> {
    let source = gridiron::NflverseHttpSource::new(gridiron::NflverseConfig::default())?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "nflverse-http"))]
fn http_source() -> Result<Box<dyn StatsSource>, Box<dyn std::error::Error>> {
    Err("GRIDIRON_DATA_DIR is required when built without nflverse-http".into())
}

fn secrets_from_env() -> Box<dyn SecretStore> {
    match std::env::var("GRIDIRON_SECRETS_DIR") {
        Ok(dir) => Box::new(FileSecretStore::new(dir)),
        Err(_) => Box::new(EnvSecretStore::default()),
    }
}

fn store_from_env() -> Result<Box<dyn ObjectStore>, Box<dyn std::error::Error>> {
    let bucket = std::env::var("GRIDIRON_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
    if let Ok(path) = std::env::var("GRIDIRON_STORE_SQLITE") {
        return Ok(Box::new(SqliteObjectStore::open(
            &PathBuf::from(path),
            bucket,
        )?));
    }
    let root = std::env::var("GRIDIRON_STORE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/store"));
    Ok(Box::new(LocalObjectStore::new(root, bucket)))
}
