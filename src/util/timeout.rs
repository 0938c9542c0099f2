//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ChatError;

/// Run `future`, failing with `ChatError::Timeout` once `duration` elapses.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ChatError>>,
) -> Result<T, ChatError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout(duration.as_millis() as u64)),
    }
}
