use std::{
    process::ExitCode,
    time::Duration,
};

use notion2anki::{
    anki::AnkiStore,
    core::{
        run_sync,
        store::SourceStore,
        SyncError,
    },
    notion::NotionClient,
    settings::SyncSettings,
};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            if e.is_configuration() {
                eprintln!("Check your settings: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let settings = SyncSettings::load()?;
    settings.require_credentials()?;

    let notion = NotionClient::new(&settings)?;
    let rows = notion.fetch_all_records().await?;

    let mut anki = AnkiStore::new(&settings)?;
    anki.api().wait_awake(Duration::from_secs(2), 3).await?;

    let report = run_sync(&mut anki, &rows, &settings).await?;
    if report.stats.failures() > 0 {
        log::warn!("{} operations failed, see the results file", report.stats.failures());
    }
    Ok(())
}
