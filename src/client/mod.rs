//! Client for the Keylime Toolbox reporting API
//!
//! Enumerates sites, report dates and report requests, and downloads raw
//! report bytes. A failure on any single call is logged and reported as an
//! absent value so that one bad unit of work never aborts a whole export;
//! the only exception is rejected credentials on the initial group listing.

mod models;

pub use models::{DataPoint, Group, ReportRequest, Site};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{ApiConfig, HttpConfig};
use crate::retry::{self, RetryPolicy};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid credentials for the Keylime Toolbox API")]
    Unauthorized,

    #[error("credential is not usable in a request header: {0}")]
    Credentials(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Authenticated client, constructed once and held for the run
pub struct KeylimeClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl KeylimeClient {
    pub fn new(api: &ApiConfig, http: &HttpConfig) -> Result<Self> {
        let email = api
            .email
            .as_deref()
            .ok_or_else(|| ClientError::Credentials("KEYLIME_TOOLBOX_EMAIL is not set".to_string()))?;
        let token = api
            .token
            .as_deref()
            .ok_or_else(|| ClientError::Credentials("KEYLIME_TOOLBOX_TOKEN is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-User-Email",
            HeaderValue::from_str(email).map_err(|err| ClientError::Credentials(err.to_string()))?,
        );
        headers.insert(
            "X-User-Token",
            HeaderValue::from_str(token).map_err(|err| ClientError::Credentials(err.to_string()))?,
        );

        let client = Client::builder()
            .connect_timeout(http.connect_timeout())
            .timeout(http.request_timeout())
            .user_agent(http.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http: client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::report_api(),
        })
    }

    /// Every site the credential can reach, each exactly once. A 401 on the
    /// group listing means the credentials are wrong, which no amount of
    /// traversal can fix.
    pub async fn sites(&self) -> Result<Vec<Site>> {
        let groups = self.groups().await?;

        let mut sites: Vec<Site> = Vec::new();
        for group in &groups {
            let members: Vec<Site> = self
                .json_list(&format!("/site_groups/{}/sites", group.slug), &[])
                .await;
            for site in members {
                if !sites.contains(&site) {
                    sites.push(site);
                }
            }
        }

        debug!(groups = groups.len(), sites = sites.len(), "Enumerated sites");
        Ok(sites)
    }

    /// Dates with report data available for a site
    pub async fn dates(&self, site_slug: &str) -> Vec<String> {
        let points: Vec<DataPoint> = self
            .json_list(&format!("/sites/{site_slug}/data_points"), &[])
            .await;
        points.into_iter().map(|point| point.date).collect()
    }

    /// Every report download to attempt for one site and date
    pub async fn requests(&self, site_slug: &str, date: &str) -> Vec<ReportRequest> {
        let appearances = self.search_appearances(site_slug, date).await;
        report_requests(site_slug, date, &appearances)
    }

    /// Raw report bytes, or `None` when this one download should be skipped
    pub async fn data(&self, request: &ReportRequest) -> Option<Bytes> {
        let response = self.safe_get(&request.path, &request.query()).await?;
        match response.bytes().await {
            Ok(body) => Some(body),
            Err(err) => {
                error!(error = %err, path = %request.path, "Failed to read report body");
                None
            }
        }
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        let url = self.url("/site_groups");
        match self.get(&url, &[]).await {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                Err(ClientError::Unauthorized)
            }
            Ok(response) if response.status().is_success() => Ok(parse_list(response).await),
            Ok(response) => {
                error!(
                    status = response.status().as_u16(),
                    url = %response.url(),
                    "Got an error status listing site groups"
                );
                Ok(Vec::new())
            }
            Err(err) => {
                error!(error = %err, url = %url, "Request for site groups failed");
                Ok(Vec::new())
            }
        }
    }

    /// A missing appearance listing means the site has none for that date
    async fn search_appearances(&self, site_slug: &str, date: &str) -> Vec<String> {
        let url = self.url(&format!("/sites/{site_slug}/search_appearances"));
        let params = [("date", date)];
        match self.get(&url, &params).await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                debug!(site = site_slug, date, "No search appearances recorded");
                Vec::new()
            }
            Ok(response) if response.status().is_success() => parse_list(response).await,
            Ok(response) => {
                error!(
                    status = response.status().as_u16(),
                    url = %response.url(),
                    "Got an error status listing search appearances"
                );
                Vec::new()
            }
            Err(err) => {
                error!(error = %err, url = %url, date, "Request for search appearances failed");
                Vec::new()
            }
        }
    }

    async fn json_list<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Vec<T> {
        match self.safe_get(path, params).await {
            Some(response) => parse_list(response).await,
            None => Vec::new(),
        }
    }

    /// GET with any failure logged and reported as `None`
    async fn safe_get(&self, path: &str, params: &[(&str, &str)]) -> Option<Response> {
        let url = self.url(path);
        let response = match self.get(&url, params).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, url = %url, params = ?params, "Request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(
                status = status.as_u16(),
                url = %response.url(),
                "Got an error status from the report API"
            );
            return None;
        }

        Some(response)
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> reqwest::Result<Response> {
        retry::with_retries(&self.retry, "report-api", retry::is_transient, || {
            self.http.get(url).query(params).send()
        })
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn parse_list<T: DeserializeOwned>(response: Response) -> Vec<T> {
    let url = response.url().clone();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, url = %url, "Failed to read response body");
            return Vec::new();
        }
    };

    match serde_json::from_slice(&body) {
        Ok(list) => list,
        Err(err) => {
            error!(error = %err, url = %url, "Failed to parse JSON list");
            Vec::new()
        }
    }
}

/// Download list for one site and date: the two bare reports first, then one
/// request per (report, appearance) pair.
pub fn report_requests(site_slug: &str, date: &str, appearances: &[String]) -> Vec<ReportRequest> {
    let queries = format!("/sites/{site_slug}/gwt_downloads/queries");
    let urls = format!("/sites/{site_slug}/gwt_downloads/urls");

    let mut requests = Vec::with_capacity(2 * (1 + appearances.len()));
    for path in [&queries, &urls] {
        requests.push(ReportRequest {
            path: path.clone(),
            date: date.to_string(),
            search_appearance: None,
        });
    }
    for path in [&queries, &urls] {
        for appearance in appearances {
            requests.push(ReportRequest {
                path: path.clone(),
                date: date.to_string(),
                search_appearance: Some(appearance.clone()),
            });
        }
    }

    requests
}
