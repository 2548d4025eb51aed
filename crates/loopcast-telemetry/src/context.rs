//! Process and request context for log events.
//!
//! The host enters one `app` span for its whole lifetime; every API request runs with
//! its `x-request-id` in task-local storage so error responses can log it.

use std::future::Future;
use std::sync::Arc;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the `app` span entered until dropped.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter an `app` span tagged with `mode` and the recorded build SHA.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Request identifier of the request being handled, if any.
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE_REQUEST_ID
        .try_with(|request_id| request_id.as_ref().to_string())
        .ok()
}

/// Run `fut` with `request_id` visible to [`current_request_id`].
pub async fn with_request_context<Fut, T>(request_id: impl Into<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    ACTIVE_REQUEST_ID
        .scope(Arc::from(request_id.into()), fut)
        .await
}

tokio::task_local! {
    static ACTIVE_REQUEST_ID: Arc<str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_can_be_entered_outside_a_runtime() {
        let guard = GlobalContextGuard::new("test");
        drop(guard);
        assert!(current_request_id().is_none());
    }

    #[tokio::test]
    async fn with_request_context_exposes_identifier() {
        let output = with_request_context("req-42", async {
            assert_eq!(current_request_id().as_deref(), Some("req-42"));
            "done"
        })
        .await;
        assert_eq!(output, "done");
        assert!(current_request_id().is_none());
    }
}
