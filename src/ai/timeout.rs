//! Bounded waits for classification calls.
//!
//! ```ignore
//! let reply = with_timeout(
//!     Duration::from_secs(config.material_llm.timeout_secs),
//!     classifier.classify(&request),
//!     "material classification",
//! )
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{LcaError, Result};

/// Execute an async operation with a timeout
///
/// An elapsed timer yields [`LcaError::Timeout`], which the caller counts
/// separately from other failures and never retries.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LcaError::timeout(operation_name, timeout)),
    }
}

/// Per-call timeout derived from a provider timeout in seconds
pub fn call_timeout(timeout_secs: u64) -> Duration {
    Duration::from_secs(timeout_secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, LcaError>(42) },
            "category classification",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, LcaError>(42)
            },
            "material classification",
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_call_timeout_never_zero() {
        assert_eq!(call_timeout(0), Duration::from_secs(1));
        assert_eq!(call_timeout(120), Duration::from_secs(120));
    }
}
