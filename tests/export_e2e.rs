//! End-to-end tests for keylime-export
//!
//! These tests drive the real client and orchestrator against an embedded
//! mock of the Keylime Toolbox API on a random local port, writing to an
//! in-memory object store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path as StoragePath;
use serde_json::json;

use keylime_export::client::{ClientError, KeylimeClient};
use keylime_export::config::{ApiConfig, HttpConfig};
use keylime_export::export::{ExportError, Exporter};
use keylime_export::storage::StorageClient;

const CSV: &[u8] = b"query,clicks,impressions\nrust,10,100\n";

struct MockUpstream {
    base_url: String,
    downloads: Arc<AtomicUsize>,
}

/// Mock of the report API. Every group contains the single site `ex1` with
/// one data point on 2023-01-01; `appearances: None` answers the appearance
/// listing with 404.
async fn start_upstream(
    groups: Vec<&'static str>,
    appearances: Option<Vec<&'static str>>,
    queries_status: StatusCode,
) -> MockUpstream {
    let downloads = Arc::new(AtomicUsize::new(0));
    let groups_body = json!(
        groups
            .iter()
            .map(|slug| json!({ "slug": slug }))
            .collect::<Vec<_>>()
    );

    let queries_counter = downloads.clone();
    let urls_counter = downloads.clone();

    let app = Router::new()
        .route(
            "/site_groups",
            get(move || {
                let body = groups_body.clone();
                async move { Json(body) }
            }),
        )
        .route(
            "/site_groups/{slug}/sites",
            get(|| async { Json(json!([{ "slug": "ex1", "url": "https://example.com/" }])) }),
        )
        .route(
            "/sites/{slug}/data_points",
            get(|| async { Json(json!([{ "date": "2023-01-01" }])) }),
        )
        .route(
            "/sites/{slug}/search_appearances",
            get(move || {
                let appearances = appearances.clone();
                async move {
                    match appearances {
                        Some(list) => Json(json!(list)).into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                }
            }),
        )
        .route(
            "/sites/{slug}/gwt_downloads/queries",
            get(move || {
                let counter = queries_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if queries_status == StatusCode::OK {
                        Bytes::from_static(CSV).into_response()
                    } else {
                        queries_status.into_response()
                    }
                }
            }),
        )
        .route(
            "/sites/{slug}/gwt_downloads/urls",
            get(move || {
                let counter = urls_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Bytes::from_static(CSV).into_response()
                }
            }),
        );

    MockUpstream {
        base_url: serve(app).await,
        downloads,
    }
}

async fn start_unauthorized_upstream() -> String {
    let app = Router::new().route("/site_groups", get(|| async { StatusCode::UNAUTHORIZED }));
    serve(app).await
}

/// Bind to a random available port and serve in a background task
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn exporter(base_url: &str, store: Arc<InMemory>, prefix: &str) -> Exporter {
    let api = ApiConfig {
        base_url: base_url.to_string(),
        email: Some("ops@example.com".to_string()),
        token: Some("secret".to_string()),
    };
    let client = KeylimeClient::new(&api, &HttpConfig::default()).unwrap();
    let storage = StorageClient::new(
        store,
        "search-analytics".to_string(),
        "us-east-1".to_string(),
    );

    Exporter::new(client, storage, prefix.to_string())
}

#[tokio::test]
async fn exports_both_reports_when_no_appearances_exist() {
    let upstream = start_upstream(vec!["g1"], None, StatusCode::OK).await;
    let store = Arc::new(InMemory::new());

    let report = exporter(&upstream.base_url, store.clone(), "")
        .run()
        .await
        .unwrap();

    assert_eq!(upstream.downloads.load(Ordering::SeqCst), 2);
    assert_eq!(report.sites, 1);
    assert_eq!(report.dates, 1);
    assert_eq!(report.reports_written, 2);
    assert_eq!(report.reports_skipped, 0);

    for key in ["queries_ex1_2023-01-01.csv", "urls_ex1_2023-01-01.csv"] {
        let stored = store
            .get(&StoragePath::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), CSV);
    }
}

#[tokio::test]
async fn expands_search_appearances_into_report_variants() {
    let upstream = start_upstream(
        vec!["g1"],
        Some(vec!["AMP_BLUE_LINK", "RICH_RESULT"]),
        StatusCode::OK,
    )
    .await;
    let store = Arc::new(InMemory::new());

    let report = exporter(&upstream.base_url, store.clone(), "")
        .run()
        .await
        .unwrap();

    assert_eq!(upstream.downloads.load(Ordering::SeqCst), 6);
    assert_eq!(report.reports_written, 6);

    let expected = [
        "queries_ex1_2023-01-01.csv",
        "urls_ex1_2023-01-01.csv",
        "queries_search_appearance_amp_blue_link_ex1_2023-01-01.csv",
        "queries_search_appearance_rich_result_ex1_2023-01-01.csv",
        "urls_search_appearance_amp_blue_link_ex1_2023-01-01.csv",
        "urls_search_appearance_rich_result_ex1_2023-01-01.csv",
    ];
    for key in expected {
        store.head(&StoragePath::from(key)).await.unwrap();
    }
}

#[tokio::test]
async fn overlapping_groups_yield_each_site_once() {
    let upstream = start_upstream(vec!["g1", "g2"], None, StatusCode::OK).await;
    let store = Arc::new(InMemory::new());

    let report = exporter(&upstream.base_url, store.clone(), "")
        .run()
        .await
        .unwrap();

    assert_eq!(report.sites, 1);
    assert_eq!(report.reports_written, 2);
    assert_eq!(upstream.downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_downloads_are_skipped_without_ending_the_run() {
    let upstream = start_upstream(vec!["g1"], None, StatusCode::INTERNAL_SERVER_ERROR).await;
    let store = Arc::new(InMemory::new());

    let report = exporter(&upstream.base_url, store.clone(), "")
        .run()
        .await
        .unwrap();

    // The queries download failed and was skipped; urls still made it
    assert_eq!(report.reports_written, 1);
    assert_eq!(report.reports_skipped, 1);

    store
        .head(&StoragePath::from("urls_ex1_2023-01-01.csv"))
        .await
        .unwrap();
    assert!(
        store
            .head(&StoragePath::from("queries_ex1_2023-01-01.csv"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn rejected_credentials_end_the_run() {
    let base_url = start_unauthorized_upstream().await;
    let store = Arc::new(InMemory::new());

    let err = exporter(&base_url, store.clone(), "")
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Client(ClientError::Unauthorized)));
}

#[tokio::test]
async fn prefix_is_prepended_to_every_key() {
    let upstream = start_upstream(vec!["g1"], None, StatusCode::OK).await;
    let store = Arc::new(InMemory::new());

    exporter(&upstream.base_url, store.clone(), "data/keylime-toolbox/")
        .run()
        .await
        .unwrap();

    store
        .head(&StoragePath::from(
            "data/keylime-toolbox/queries_ex1_2023-01-01.csv",
        ))
        .await
        .unwrap();
}
