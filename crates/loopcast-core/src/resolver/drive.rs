//! Google Drive implementation of [`Transfer`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use super::{Transfer, TransferError};

/// Public Drive host used by default.
pub const DRIVE_BASE_URL: &str = "https://drive.google.com/";
const DOWNLOAD_PATH: &str = "uc";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Downloads public Drive files through the `uc?export=download` endpoint.
///
/// Large files are answered with an HTML "can't scan for viruses" page first; the
/// transfer retries once with `confirm=t` before giving up.
#[derive(Clone)]
pub struct DriveTransfer {
    client: Client,
    base_url: Url,
}

impl DriveTransfer {
    /// Construct a transfer against the public Drive host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, TransferError> {
        let base_url = Url::parse(DRIVE_BASE_URL).map_err(|source| TransferError::InvalidUrl {
            url: DRIVE_BASE_URL.to_string(),
            source,
        })?;
        Self::with_base_url(base_url)
    }

    /// Construct a transfer against an alternative host (mirrors, tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: Url) -> Result<Self, TransferError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| TransferError::Client { source })?;
        Ok(Self { client, base_url })
    }

    fn download_url(&self, identifier: &str, confirm: bool) -> Result<Url, TransferError> {
        let mut url = self
            .base_url
            .join(DOWNLOAD_PATH)
            .map_err(|source| TransferError::InvalidUrl {
                url: self.base_url.to_string(),
                source,
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("export", "download");
            pairs.append_pair("id", identifier);
            if confirm {
                pairs.append_pair("confirm", "t");
            }
        }
        Ok(url)
    }

    async fn request(&self, url: &Url) -> Result<Response, TransferError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TransferError::Http {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transfer for DriveTransfer {
    async fn fetch(&self, identifier: &str, target: &Path) -> Result<(), TransferError> {
        let url = self.download_url(identifier, false)?;
        let mut response = self.request(&url).await?;

        if is_html(&response) {
            debug!(identifier, "drive answered with an interstitial page; confirming");
            let confirmed = self.download_url(identifier, true)?;
            response = self.request(&confirmed).await?;
            if is_html(&response) {
                return Err(TransferError::HtmlResponse {
                    url: confirmed.to_string(),
                });
            }
        }

        let bytes = write_body(response, target).await?;
        info!(identifier, bytes, path = %target.display(), "transfer complete");
        Ok(())
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with("text/html"))
}

async fn write_body(response: Response, target: &Path) -> Result<u64, TransferError> {
    let url = response.url().to_string();
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|source| TransferError::io("create_target", target, source))?;
    let mut written = 0_u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| TransferError::Http {
            url: url.clone(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|source| TransferError::io("write_target", target, source))?;
        written = written.saturating_add(chunk.len() as u64);
    }
    file.flush()
        .await
        .map_err(|source| TransferError::io("flush_target", target, source))?;
    file.sync_all()
        .await
        .map_err(|source| TransferError::io("sync_target", target, source))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    const ID: &str = "1AbCdEfGhIjKlMnOpQ";

    fn transfer_for(server: &MockServer) -> anyhow::Result<DriveTransfer> {
        Ok(DriveTransfer::with_base_url(Url::parse(&server.base_url())?)?)
    }

    #[tokio::test]
    async fn fetch_writes_body_to_target() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/uc")
                .query_param("export", "download")
                .query_param("id", ID);
            then.status(200)
                .header("content-type", "video/mp4")
                .body("video-bytes");
        });
        let dir = TempDir::new()?;
        let target = dir.path().join("clip.mp4.part");

        transfer_for(&server)?.fetch(ID, &target).await?;

        mock.assert();
        assert_eq!(tokio::fs::read(&target).await?, b"video-bytes");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_confirms_interstitial_page() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let confirmed = server.mock(|when, then| {
            when.method(GET).path("/uc").query_param("confirm", "t");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("large-video");
        });
        let warning = server.mock(|when, then| {
            when.method(GET)
                .path("/uc")
                .query_param("id", ID)
                .query_param_missing("confirm");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html>virus scan warning</html>");
        });
        let dir = TempDir::new()?;
        let target = dir.path().join("large.mp4.part");

        transfer_for(&server)?.fetch(ID, &target).await?;

        warning.assert();
        confirmed.assert();
        assert_eq!(tokio::fs::read(&target).await?, b"large-video");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_reports_status_errors() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/uc");
            then.status(404);
        });
        let dir = TempDir::new()?;
        let target = dir.path().join("missing.mp4.part");

        let err = transfer_for(&server)?
            .fetch(ID, &target)
            .await
            .expect_err("404 should fail");
        assert!(matches!(err, TransferError::Status { status: 404, .. }));
        assert!(!target.exists());
        Ok(())
    }
}
