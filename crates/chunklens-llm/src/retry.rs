use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;

/// Delay before the next attempt: `Retry-After` seconds when present, otherwise
/// exponential backoff capped at [`MAX_BACKOFF_SECS`].
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get(reqwest::header::RETRY_AFTER)
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs.min(MAX_BACKOFF_SECS));
    }
    Duration::from_secs(backoff_secs(attempt))
}

fn backoff_secs(attempt: u32) -> u64 {
    BASE_BACKOFF_SECS
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS)
}

/// Send a request, retrying up to `max_retries` times on HTTP 429.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` once retries are exhausted, `LlmError::Timeout` when the
/// client deadline fires, or `LlmError::Http` for other transport failures.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    timeout_secs: u64,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = f().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout_secs)
            } else {
                LlmError::Http(e)
            }
        })?;

        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt == max_retries {
            break;
        }
        let delay = retry_delay(&response, attempt);
        tracing::warn!(
            provider = provider_name,
            attempt = attempt + 1,
            max_retries,
            delay_secs = delay.as_secs(),
            "rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
    }

    Err(LlmError::RateLimited)
}
