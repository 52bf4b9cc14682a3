//! Shared HTTP constants (headers, problem URIs, limits).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const BEARER_PREFIX: &str = "Bearer ";

pub(crate) const PROBLEM_INTERNAL: &str = "https://tormeta.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://tormeta.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://tormeta.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://tormeta.dev/problems/not-found";
pub(crate) const PROBLEM_BAD_GATEWAY: &str = "https://tormeta.dev/problems/bad-gateway";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://tormeta.dev/problems/service-unavailable";

pub(crate) const MAX_METAINFO_BYTES: usize = 5 * 1024 * 1024;
pub(crate) const RECENT_LIMIT: u32 = 100;
pub(crate) const WS_POLICY_VIOLATION: u16 = 1008;
pub(crate) const WS_GOING_AWAY: u16 = 1001;
