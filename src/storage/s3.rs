//! S3-compatible storage backend.
//!
//! Compatible with AWS S3, MinIO, R2, etc. Repository trees are flat object
//! keys under a shared prefix; "directories" only exist as key prefixes, so
//! recursive delete is a paginated list + batched delete.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Builder, Region},
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
    Client,
};
use bytes::Bytes;

use super::backend::{StorageBackend, StorageError, StorageResult};

/// S3 storage backend configuration
#[derive(Clone, Debug)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Optional prefix for all keys
    pub prefix: Option<String>,
    /// AWS region
    pub region: String,
    /// Custom endpoint URL (for MinIO, R2, etc.)
    pub endpoint: Option<String>,
    /// Force path-style URLs (required for MinIO)
    pub force_path_style: bool,
}

impl S3Config {
    /// Create config for AWS S3
    pub fn aws(bucket: String, region: String) -> Self {
        Self {
            bucket,
            prefix: None,
            region,
            endpoint: None,
            force_path_style: false,
        }
    }

    /// Create config for MinIO or other S3-compatible storage
    pub fn minio(bucket: String, endpoint: String) -> Self {
        Self {
            bucket,
            prefix: None,
            region: "us-east-1".to_string(), // MinIO doesn't care about region
            endpoint: Some(endpoint),
            force_path_style: true,
        }
    }

    /// Set a key prefix
    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// S3-compatible storage backend
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    /// Create a new S3 storage backend from config
    pub async fn new(config: S3Config) -> Self {
        let mut builder = Builder::new()
            .region(Region::new(config.region))
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        // Load credentials from environment or use defaults
        let sdk_config = aws_config::load_from_env().await;
        if let Some(creds) = sdk_config.credentials_provider() {
            builder = builder.credentials_provider(creds);
        }

        let client = Client::from_conf(builder.build());

        Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        }
    }

    /// Full bucket key for a logical key
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}/{}", p.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }

    /// List every bucket key under a prefix (the `{prefix}/` form, so that
    /// `repo-1` never matches `repo-10`).
    async fn keys_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let bucket_prefix = format!("{}/", self.full_key(prefix).trim_end_matches('/'));
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&bucket_prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(service_err.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()> {
        let keys = self.keys_under(prefix).await?;

        // DeleteObjects accepts at most 1000 keys per call
        for chunk in keys.chunks(1000) {
            let mut objects = Vec::with_capacity(chunk.len());
            for key in chunk {
                let id = ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                objects.push(id);
            }

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .build()
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        Ok(())
    }

    async fn exists_prefix(&self, prefix: &str) -> StorageResult<bool> {
        let bucket_prefix = format!("{}/", self.full_key(prefix).trim_end_matches('/'));
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(bucket_prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(resp.key_count().unwrap_or(0) > 0)
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let bucket_prefix = format!("{}/", self.full_key(prefix).trim_end_matches('/'));
        let mut keys: Vec<String> = self
            .keys_under(prefix)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&bucket_prefix).map(|s| s.to_string()))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
