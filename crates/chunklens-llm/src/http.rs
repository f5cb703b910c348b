//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create an HTTP client for completion backends.
///
/// Config: 10s connect timeout, `request_timeout` per request, rustls TLS,
/// `chunklens/{version}` user-agent.
#[must_use]
pub fn client_with_timeout(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(request_timeout)
        .user_agent(concat!("chunklens/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("HTTP client construction with static options must not fail")
}

#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeout(Duration::from_secs(60))
}
