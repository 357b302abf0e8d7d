mod cli;

use clap::Parser;
use std::process;

use keylime_export::client::{ClientError, KeylimeClient};
use keylime_export::config::{Config, ConfigError};
use keylime_export::export::{ExportError, ExportReport, Exporter};
use keylime_export::storage::{StorageClient, StorageError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = cli::Args::parse();

    let config = match configure(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    match export(&config).await {
        Ok(report) => {
            println!(
                "Exported {} report{} for {} site{} ({} skipped, {} written) in {:.1}s",
                report.reports_written,
                if report.reports_written == 1 { "" } else { "s" },
                report.sites,
                if report.sites == 1 { "" } else { "s" },
                report.reports_skipped,
                report.bytes_written,
                report.elapsed_seconds
            );
        }
        Err(ExportError::Client(ClientError::Unauthorized)) => {
            eprintln!(
                "Invalid credentials for the Keylime Toolbox API. Set the KEYLIME_TOOLBOX_EMAIL \
                 and KEYLIME_TOOLBOX_TOKEN environment variables. You can find these at \
                 https://app.keylime.io/settings/profile."
            );
            process::exit(1);
        }
        Err(ExportError::Storage(StorageError::RegionMismatch { region })) => {
            eprintln!(
                "The S3 bucket is not in the {region} AWS region. Correct this with the \
                 --region option."
            );
            process::exit(1);
        }
        Err(err) => {
            eprintln!("keylime-export error: {err}");
            process::exit(1);
        }
    }
}

/// Layered configuration with command-line overrides folded in
fn configure(args: &cli::Args) -> Result<Config, ConfigError> {
    let mut config = Config::load(args.config.clone())?;

    config.storage.bucket = Some(args.bucket.clone());
    if let Some(region) = &args.region {
        config.storage.region = Some(region.clone());
    }
    if let Some(path) = &args.path {
        config.storage.prefix = path.trim_start_matches('/').to_string();
    }

    config.validate()?;
    Ok(config)
}

async fn export(config: &Config) -> Result<ExportReport, ExportError> {
    let client = KeylimeClient::new(&config.api, &config.http)?;
    let storage = StorageClient::amazon_s3(&config.storage)?;
    Exporter::new(client, storage, config.storage.prefix.clone())
        .run()
        .await
}
