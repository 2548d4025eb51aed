use std::sync::Arc;

use anyhow::Result;
use httpmock::prelude::*;
use loopcast_core::{
    DriveTransfer, PlaylistBuilder, SessionError, SourceReference, SourceResolver, TransferError,
};
use loopcast_test_support::fixtures::share_link;
use tempfile::TempDir;
use url::Url;

const ID: &str = "1ZyXwVuTsRqPoNmLk";

#[tokio::test]
async fn drive_links_download_once_and_feed_the_playlist() -> Result<()> {
    let server = MockServer::start_async().await;
    let download = server.mock(|when, then| {
        when.method(GET).path("/uc").query_param("id", ID);
        then.status(200)
            .header("content-type", "video/mp4")
            .body("drive-bytes");
    });
    let dir = TempDir::new()?;
    let transfer = DriveTransfer::with_base_url(Url::parse(&server.base_url())?)?;
    let resolver = SourceResolver::new(dir.path().join("media"), Arc::new(transfer));
    let references = vec![
        SourceReference::remote(share_link(ID)),
        SourceReference::remote(format!("https://drive.google.com/open?id={ID}")),
    ];

    let assets = resolver.resolve_all(&references).await?;
    download.assert_hits(1);
    assert_eq!(assets[0].path(), assets[1].path());
    assert_eq!(tokio::fs::read(assets[0].path()).await?, b"drive-bytes");

    let descriptor = PlaylistBuilder::new(dir.path().join("playlist.txt"))
        .build(&assets)
        .await?;
    assert_eq!(descriptor.len(), 2);
    let body = tokio::fs::read_to_string(descriptor.location()).await?;
    assert_eq!(body.lines().count(), 2);
    assert!(body.lines().all(|line| line.contains(&format!("drive_{ID}.mp4"))));
    Ok(())
}

#[tokio::test]
async fn persistent_interstitial_fails_without_caching() -> Result<()> {
    let server = MockServer::start_async().await;
    let page = server.mock(|when, then| {
        when.method(GET).path("/uc");
        then.status(200)
            .header("content-type", "text/html")
            .body("<html>quota exceeded</html>");
    });
    let dir = TempDir::new()?;
    let transfer = DriveTransfer::with_base_url(Url::parse(&server.base_url())?)?;
    let resolver = SourceResolver::new(dir.path().join("media"), Arc::new(transfer));

    let err = resolver
        .resolve(&SourceReference::remote(share_link(ID)))
        .await
        .expect_err("html page is not a video");
    assert!(matches!(
        err,
        SessionError::TransferFailed {
            source: TransferError::HtmlResponse { .. },
            ..
        }
    ));
    page.assert_hits(2);
    assert!(!resolver.target_path(ID).exists());
    Ok(())
}
