//! Object storage writer
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StoragePath;
use object_store::{BackoffConfig, ClientOptions, ObjectStore, RetryConfig};
use reqwest::header::{HeaderMap, HeaderValue};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::StorageConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("the bucket is not in the {region} AWS region")]
    RegionMismatch { region: String },

    #[error("no target bucket configured")]
    MissingBucket,

    #[error("no AWS region configured")]
    MissingRegion,

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
}

impl StorageClient {
    /// Create a storage client over any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, region: String) -> Self {
        Self {
            store,
            bucket,
            region,
        }
    }

    /// S3 client using ambient AWS credentials. Every put carries the
    /// bucket-owner-full-control ACL, and transient transport failures are
    /// retried by the store itself under the object-store policy.
    pub fn amazon_s3(config: &StorageConfig) -> Result<Self> {
        let bucket = config.bucket.clone().ok_or(StorageError::MissingBucket)?;
        let region = config.region.clone().ok_or(StorageError::MissingRegion)?;

        let policy = RetryPolicy::object_store_api();
        let retry = RetryConfig {
            backoff: BackoffConfig {
                init_backoff: policy.base_interval,
                ..BackoffConfig::default()
            },
            max_retries: policy.max_tries as usize - 1,
            ..RetryConfig::default()
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-acl",
            HeaderValue::from_static("bucket-owner-full-control"),
        );

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(&bucket)
            .with_region(&region)
            .with_retry(retry)
            .with_client_options(ClientOptions::new().with_default_headers(headers))
            .build()?;

        Ok(Self::new(Arc::new(store), bucket, region))
    }

    /// Write one report, overwriting any previous object at the key
    pub async fn write(&self, key: &str, data: Bytes, source_label: &str) -> Result<()> {
        let path = StoragePath::from(key);
        let size = data.len();

        if let Err(err) = self.store.put(&path, data.into()).await {
            if is_region_mismatch(&err) {
                return Err(StorageError::RegionMismatch {
                    region: self.region.clone(),
                });
            }
            return Err(err.into());
        }

        info!(
            "Wrote {} bytes for {} to s3://{}/{}",
            size, source_label, self.bucket, key
        );
        Ok(())
    }
}

/// S3 answers a put against a bucket homed in another region with a permanent
/// redirect; the condition only shows up in the error text, so classify over
/// the rendered source chain.
fn is_region_mismatch(err: &object_store::Error) -> bool {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        rendered.push('\n');
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }

    rendered.contains("PermanentRedirect") || rendered.contains("301 Moved Permanently")
}
