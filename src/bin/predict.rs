use std::path::PathBuf;

use chrono::NaiveDate;
use gridiron::{
    current_run_date, init_logging, log_app_start, logging_config_from_env, run_inference,
    EnvSecretStore, FileSecretStore, LocalObjectStore, ObjectStore, SecretStore,
    SqliteObjectStore, DEFAULT_BUCKET,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("gridiron-predict", &logging_cfg);

    let run_date = match std::env::var("GRIDIRON_RUN_DATE") {
        Ok(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?,
        Err(_) => current_run_date(),
    };

    let secrets: Box<dyn SecretStore> = match std::env::var("GRIDIRON_SECRETS_DIR") {
        Ok(dir) => Box::new(FileSecretStore::new(dir)),
        Err(_) => Box::new(EnvSecretStore::default()),
    };

    let bucket = std::env::var("GRIDIRON_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
    let store: Box<dyn ObjectStore> = match std::env::var("GRIDIRON_STORE_SQLITE") {
        Ok(path) => Box::new(SqliteObjectStore::open(&PathBuf::from(path), bucket)?),
        Err(_) => {
            let root = std::env::var("GRIDIRON_STORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/store"));
            Box::new(LocalObjectStore::new(root, bucket))
        }
    };

    let summary = run_inference(store.as_ref(), secrets.as_ref(), run_date)?;
    println!(
        "Predictions written | input={} output={} rows={}",
        summary.input_key, summary.output_key, summary.predictions
    );
    Ok(())
}
