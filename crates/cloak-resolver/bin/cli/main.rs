mod cli;

use crate::cli::{Command, LogFormat, StorageBackendArg, CLI, DATABASE_URL_ENV, ENCRYPTION_KEY_ENV};
use anyhow::Context;
use clap::Parser;
use cloak_cipher::{Cipher, CipherKey};
use cloak_generator::{RandomCodeGenerator, UniqueCodes};
use cloak_resolver::{ResolutionService, Resolver};
use cloak_storage::{
    FileSnapshotRepository, InMemoryRepository, PostgresOptions, PostgresRepository, Repository,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let key = config
        .encryption_key
        .as_deref()
        .with_context(|| format!("{ENCRYPTION_KEY_ENV} is not set"))?;
    let key = CipherKey::parse(key).context("invalid encryption key")?;
    let cipher = Arc::new(Cipher::new(key));

    info!(storage_backend = %config.storage, "starting cloak");

    match config.storage {
        StorageBackendArg::InMemory => {
            let repository = Arc::new(InMemoryRepository::new());
            run(&config, repository, cipher).await
        }
        StorageBackendArg::File => {
            let repository = Arc::new(FileSnapshotRepository::open(&config.snapshot_path).await?);
            let result = run(&config, Arc::clone(&repository), cipher).await;
            repository
                .flush()
                .await
                .context("failed to persist snapshot")?;
            result
        }
        StorageBackendArg::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .with_context(|| format!("{DATABASE_URL_ENV} is required for postgres storage"))?;
            let options = PostgresOptions::builder()
                .connect_attempts(config.db_connect_attempts)
                .connect_delay(Duration::from_secs(config.db_connect_delay_secs))
                .query_timeout(Duration::from_secs(config.db_query_timeout_secs))
                .build();
            let repository = PostgresRepository::connect(database_url, &options)
                .await
                .context("unable to connect to postgres")?;
            run(&config, Arc::new(repository), cipher).await
        }
    }
}

async fn run<R: Repository>(
    config: &CLI,
    repository: Arc<R>,
    cipher: Arc<Cipher>,
) -> anyhow::Result<()> {
    let service = ResolutionService::with_codes(
        repository,
        UniqueCodes::new(RandomCodeGenerator::new()),
        cipher,
    );

    let output = match &config.command {
        Command::Shorten { url } => {
            let shortened = service.shorten(url).await?;
            let mut output = serde_json::to_value(&shortened)?;
            if let Some(base_url) = &config.base_url {
                output["short_url"] = Value::from(shortened.code.to_url(base_url));
            }
            output
        }
        Command::Redirect { code } => {
            let destination = service.redirect(code).await?;
            json!({ "code": code, "destination_url": destination })
        }
        Command::Stats { code } => serde_json::to_value(service.stats(code).await?)?,
        Command::Health => serde_json::to_value(service.health().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
