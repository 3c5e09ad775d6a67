//! Media downloads for handles emitted by the bridge.

use std::{io::ErrorKind, path::Path, time::Duration};

use async_trait::async_trait;
use tgwatch_core::{errors::Error, ports::MediaSource, protocol::MediaHandle, Result};

/// Resolves `file://` URLs / absolute paths from disk and `http(s)://` URLs
/// over the network.
#[derive(Clone, Debug)]
pub struct LocalOrHttpMediaSource {
    http: reqwest::Client,
}

impl LocalOrHttpMediaSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }

    async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("media request error: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::External(format!("media download failed: {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("media body error: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }
}

#[async_trait]
impl MediaSource for LocalOrHttpMediaSource {
    async fn download(&self, handle: &MediaHandle) -> Result<Option<Vec<u8>>> {
        let raw = handle.0.as_str();
        if let Some(path) = raw.strip_prefix("file://") {
            return self.read_file(Path::new(path)).await;
        }
        if raw.starts_with('/') {
            return self.read_file(Path::new(raw)).await;
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return self.fetch(raw).await;
        }
        Err(Error::External(format!("unsupported media handle: {raw}")))
    }
}
