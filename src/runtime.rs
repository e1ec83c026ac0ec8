//! Runtime helpers for the advisory async work (host projections, sprite prefetch).
//!
//! With the `tokio-runtime` feature, deadlines are enforced by tokio's timer.
//! Without it, futures simply run to completion on whatever executor the host uses.

use crate::{MarkerError, Result};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// Runs `future`, failing with [`MarkerError::Timeout`] once `duration` elapses
pub async fn with_timeout<T, F>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    #[cfg(feature = "tokio-runtime")]
    {
        match tokio::time::timeout(duration, future).await {
            Ok(result) => result,
            Err(_) => Err(MarkerError::Timeout),
        }
    }

    #[cfg(not(feature = "tokio-runtime"))]
    {
        let _ = duration;
        future.await
    }
}

/// Runs all futures concurrently under one shared deadline.
///
/// Each slot in the output is the result of the matching input future; all of
/// them become `Timeout` if the deadline passes first.
pub async fn join_with_timeout<T, F>(futures: Vec<F>, duration: Duration) -> Vec<Result<T>>
where
    F: Future<Output = Result<T>>,
{
    let count = futures.len();
    match with_timeout(async { Ok(join_all(futures).await) }, duration).await {
        Ok(results) => results,
        Err(_) => {
            log::debug!("{} async host calls timed out after {:?}", count, duration);
            (0..count).map(|_| Err(MarkerError::Timeout)).collect()
        }
    }
}

#[cfg(all(test, feature = "tokio-runtime"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_fires() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, MarkerError>(1)
        };
        let result = with_timeout(slow, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(MarkerError::Timeout)));
    }

    #[tokio::test]
    async fn test_join_keeps_order() {
        let futures: Vec<_> = (0..3)
            .map(|i| async move {
                if i == 1 {
                    Err(MarkerError::Host("no".to_string()))
                } else {
                    Ok(i)
                }
            })
            .collect();
        let results = join_with_timeout(futures, Duration::from_secs(1)).await;
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Ok(0)));
        assert!(results[1].is_err());
        assert!(matches!(results[2], Ok(2)));
    }
}
