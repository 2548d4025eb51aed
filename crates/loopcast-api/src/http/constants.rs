//! Shared HTTP constants (headers, problem URIs, streaming defaults).

/// Request identifier header set or propagated on every response.
pub const HEADER_REQUEST_ID: &str = "x-request-id";
/// Header carrying the last delivered log id when an SSE client reconnects.
pub const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 15;

pub(crate) const PROBLEM_INTERNAL: &str = "https://loopcast.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://loopcast.dev/problems/bad-request";
pub(crate) const PROBLEM_CONFLICT: &str = "https://loopcast.dev/problems/conflict";
pub(crate) const PROBLEM_UNRESOLVABLE: &str = "https://loopcast.dev/problems/source-unresolvable";
pub(crate) const PROBLEM_LAUNCH_FAILED: &str = "https://loopcast.dev/problems/launch-failed";
