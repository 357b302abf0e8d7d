//! Export orchestrator: moves every available report from the API to storage

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ClientError, KeylimeClient, ReportRequest};
use crate::humanize::ByteSize;
use crate::observability::Metrics;
use crate::storage::{StorageClient, StorageError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Summary of one export run
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub sites: u64,
    pub dates: u64,
    pub reports_written: u64,
    pub reports_skipped: u64,
    pub bytes_written: ByteSize,
    pub elapsed_seconds: f64,
}

/// Drives the traversal: sites, then dates, then report requests. Holds no
/// retry logic of its own and no state beyond loop variables and counters.
pub struct Exporter {
    client: KeylimeClient,
    storage: StorageClient,
    prefix: String,
    metrics: Metrics,
}

impl Exporter {
    pub fn new(client: KeylimeClient, storage: StorageClient, prefix: String) -> Self {
        Self {
            client,
            storage,
            prefix,
            metrics: Metrics::new(),
        }
    }

    /// Transfer every report the API can serve. A report the client could not
    /// fetch is skipped; only rejected credentials or a misconfigured storage
    /// destination end the run early.
    pub async fn run(&self) -> Result<ExportReport> {
        let started = Instant::now();

        let sites = self.client.sites().await?;
        info!(sites = sites.len(), "Starting export");

        for site in &sites {
            self.metrics.site_seen();
            for date in self.client.dates(&site.slug).await {
                self.metrics.date_seen();
                for request in self.client.requests(&site.slug, &date).await {
                    match self.client.data(&request).await {
                        Some(data) => {
                            let key = object_key(&self.prefix, &request, &site.slug);
                            let size = data.len() as u64;
                            self.storage.write(&key, data, &site.url).await?;
                            self.metrics.report_written(size);
                        }
                        None => {
                            debug!(
                                site = %site.slug,
                                date = %date,
                                path = %request.path,
                                "Skipping report"
                            );
                            self.metrics.report_skipped();
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        Ok(ExportReport {
            sites: snapshot.sites_seen,
            dates: snapshot.dates_seen,
            reports_written: snapshot.reports_written,
            reports_skipped: snapshot.reports_skipped,
            bytes_written: ByteSize(snapshot.bytes_written),
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

/// Storage key for one report. The endpoint basename and the optional
/// appearance infix keep keys distinct across every request for a site/date.
pub fn object_key(prefix: &str, request: &ReportRequest, site_slug: &str) -> String {
    let appearance_infix = match &request.search_appearance {
        Some(appearance) => format!("search_appearance_{}_", appearance.to_lowercase()),
        None => String::new(),
    };

    format!(
        "{prefix}{}_{appearance_infix}{site_slug}_{}.csv",
        request.basename(),
        request.date
    )
}
