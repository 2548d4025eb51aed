use anyhow::anyhow;
use loopcast_api::{PlaylistRequest, PlaylistResponse};

use crate::cli::{OutputFormat, PrepareArgs};
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::commands::source_inputs;
use crate::output::render_playlist;

const PLAYLIST_PATH: &str = "/v1/playlist";

pub(crate) async fn handle_prepare(
    ctx: &AppContext,
    args: PrepareArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let request = PlaylistRequest {
        sources: source_inputs(&args.sources)?,
    };
    let playlist = prepare_playlist(ctx, &request).await?;
    render_playlist(&playlist, output)
}

pub(crate) async fn prepare_playlist(
    ctx: &AppContext,
    request: &PlaylistRequest,
) -> CliResult<PlaylistResponse> {
    let response = ctx
        .client
        .post(ctx.endpoint(PLAYLIST_PATH)?)
        .json(request)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {PLAYLIST_PATH} failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    response
        .json::<PlaylistResponse>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse playlist summary: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use loopcast_api::SourceInput;
    use reqwest::Client;
    use serde_json::json;

    #[tokio::test]
    async fn prepare_posts_sources() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/playlist")
                .json_body(json!({ "sources": ["/srv/a.mp4", "/srv/b.mp4"] }));
            then.status(200).json_body(json!({
                "location": "/srv/playlist.txt",
                "entries": ["/srv/a.mp4", "/srv/b.mp4"]
            }));
        });
        let ctx = AppContext {
            client: Client::new(),
            base_url: server.base_url().parse()?,
        };
        let request = PlaylistRequest {
            sources: vec![SourceInput::from("/srv/a.mp4"), SourceInput::from("/srv/b.mp4")],
        };

        let playlist = prepare_playlist(&ctx, &request)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        mock.assert();
        assert_eq!(playlist.entries.len(), 2);
        assert_eq!(playlist.location, "/srv/playlist.txt");
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_source_is_a_validation_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/playlist");
            then.status(422).json_body(json!({
                "type": "https://loopcast.dev/problems/source-unresolvable",
                "title": "source could not be resolved",
                "status": 422,
                "detail": "/srv/missing.mp4 is missing or unreadable"
            }));
        });
        let ctx = AppContext {
            client: Client::new(),
            base_url: server.base_url().parse()?,
        };
        let request = PlaylistRequest {
            sources: vec![SourceInput::from("/srv/missing.mp4")],
        };

        let err = prepare_playlist(&ctx, &request)
            .await
            .expect_err("422 should fail");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("missing.mp4"));
        Ok(())
    }
}
