//! Photo storage. Buckets are created on first use.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::{config::MinioConfig, error::AppError};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError>;

    /// Stores `bytes` under `bucket/key` and returns the public URL.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError>;
}

pub fn content_type_for(key: &str) -> &'static str {
    let key = key.to_ascii_lowercase();
    if key.ends_with(".jpg") || key.ends_with(".jpeg") {
        "image/jpeg"
    } else if key.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

fn nanos_now() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1_000)
}

pub fn pole_image_key() -> String {
    format!("{}-poleimage.jpeg", nanos_now())
}

pub fn multiple_image_key(index: usize) -> String {
    format!("{}-multipleimage-{index}.jpeg", nanos_now())
}

/// Creates the bucket if needed, then uploads one object.
pub async fn upload(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    bytes: Vec<u8>,
) -> Result<String, AppError> {
    store.ensure_bucket(bucket).await?;
    let url = store
        .put_object(bucket, key, bytes, content_type_for(key))
        .await?;
    debug!("uploaded {bucket}/{key}");
    Ok(url)
}

/// Buckets are directories below `root`; `/objects` serves them back.
#[derive(Clone)]
pub struct LocalObjectStore {
    root: Arc<PathBuf>,
    public_base: Arc<String>,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, public_base: impl Into<String>) -> Self {
        let public_base: String = public_base.into();
        Self {
            root: Arc::new(root),
            public_base: Arc::new(public_base.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root().join(bucket).join(key)
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(AppError::Storage(format!("invalid {kind} name `{name}`")));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError> {
        check_name("bucket", bucket)?;
        let dir = self.root().join(bucket);
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir).await?;
            info!("created bucket {bucket} at {}", dir.display());
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, AppError> {
        check_name("bucket", bucket)?;
        check_name("object", key)?;
        fs::write(self.object_path(bucket, key), bytes).await?;
        Ok(format!("{}/objects/{bucket}/{key}", self.public_base))
    }
}

type HmacSha256 = Hmac<Sha256>;

/// S3-compatible client for MinIO using path-style URLs and SigV4 auth.
#[derive(Clone)]
pub struct MinioObjectStore {
    http: Client,
    config: Arc<MinioConfig>,
    /// `Host` exactly as reqwest will send it.
    host: Arc<String>,
}

impl MinioObjectStore {
    pub fn new(http: Client, config: MinioConfig) -> Result<Self, AppError> {
        let host = signing_host(&config.endpoint, config.use_ssl)?;
        Ok(Self {
            http,
            config: Arc::new(config),
            host: Arc::new(host),
        })
    }

    fn scheme(&self) -> &'static str {
        if self.config.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme(), self.host, path)
    }

    fn signed(
        &self,
        method: reqwest::Method,
        path: &str,
        payload: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, AppError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(&payload));

        let mut headers = vec![
            ("host", self.host.to_string()),
            ("x-amz-content-sha256", payload_hash.clone()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(content_type) = content_type {
            headers.push(("content-type", content_type.to_string()));
        }
        headers.sort_by(|a, b| a.0.cmp(b.0));

        let authorization = authorization_header(
            &SigningInput {
                method: method.as_str(),
                path,
                headers: &headers,
                payload_hash: &payload_hash,
                amz_date: &amz_date,
                date: &date,
                region: &self.config.region,
                service: "s3",
            },
            &self.config.access_key,
            &self.config.secret_key,
        )?;

        let mut request = self
            .http
            .request(method, self.url(path))
            .header("authorization", authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        Ok(request.body(payload))
    }
}

#[async_trait]
impl ObjectStore for MinioObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), AppError> {
        let path = format!("/{}", uri_encode(bucket, false));
        let head = self
            .signed(reqwest::Method::HEAD, &path, Vec::new(), None)?
            .send()
            .await?;
        match head.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(AppError::Storage(format!(
                    "failed to check if bucket {bucket} exists: {status}"
                )))
            }
        }

        let created = self
            .signed(reqwest::Method::PUT, &path, Vec::new(), None)?
            .send()
            .await?;
        if !created.status().is_success() {
            let status = created.status();
            let body = created.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "failed to create bucket {bucket}: {status} {body}"
            )));
        }
        info!("created bucket {bucket}");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let path = format!("/{}/{}", uri_encode(bucket, false), uri_encode(key, false));
        let response = self
            .signed(reqwest::Method::PUT, &path, bytes, Some(content_type))?
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "failed to upload object {key}: {status} {body}"
            )));
        }
        Ok(self.url(&path))
    }
}

/// Normalises `endpoint` to `host[:port]`, dropping the scheme's default port.
pub(crate) fn signing_host(endpoint: &str, use_ssl: bool) -> Result<String, AppError> {
    let scheme = if use_ssl { "https" } else { "http" };
    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("{scheme}://{endpoint}")
    };
    let url = Url::parse(&raw)
        .map_err(|err| AppError::Config(format!("invalid MINIO_ENDPOINT `{endpoint}`: {err}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Config(format!("MINIO_ENDPOINT `{endpoint}` has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

pub(crate) struct SigningInput<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Lowercase names, sorted.
    pub headers: &'a [(&'a str, String)],
    pub payload_hash: &'a str,
    pub amz_date: &'a str,
    pub date: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| AppError::Storage(format!("invalid signing key: {err}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, AppError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

pub(crate) fn authorization_header(
    input: &SigningInput<'_>,
    access_key: &str,
    secret: &str,
) -> Result<String, AppError> {
    let canonical_headers: String = input
        .headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = input
        .headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{canonical_headers}\n{signed_headers}\n{}",
        input.method, input.path, input.payload_hash
    );
    let scope = format!(
        "{}/{}/{}/aws4_request",
        input.date, input.region, input.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{scope}\n{}",
        input.amz_date,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );
    let key = signing_key(secret, input.date, input.region, input.service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{scope}, SignedHeaders={signed_headers}, Signature={signature}"
    ))
}

/// Percent-encodes everything outside the SigV4 unreserved set.
pub(crate) fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
