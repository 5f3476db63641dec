pub mod allowlist;
pub mod locks;
pub mod middleware;
pub mod rate_limit;
