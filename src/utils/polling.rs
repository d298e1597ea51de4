use std::future::Future;
use std::time::Duration;

/// What a single poll observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Ready(T),
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollError<E> {
    Failed(String),
    Exhausted { attempts: u32 },
    Check(E),
}

/// Calls `check` until it reports `Ready`, sleeping `interval` between polls.
///
/// Gives up after `max_attempts` checks. A `Failed` state or an error from
/// `check` stops immediately.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    max_attempts: u32,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>, E>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match check().await.map_err(PollError::Check)? {
            PollState::Ready(value) => return Ok(value),
            PollState::Failed(reason) => return Err(PollError::Failed(reason)),
            PollState::Pending => {
                log::debug!("⏳ Still pending (attempt {}/{})", attempt, max_attempts);
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(PollError::Exhausted { attempts: max_attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_once_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<&str, PollError<String>> = poll_until(Duration::from_millis(1), 10, || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok(PollState::Pending)
                } else {
                    Ok(PollState::Ready("ACTIVE"))
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ACTIVE"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_state_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), PollError<String>> = poll_until(Duration::from_millis(1), 10, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(PollState::Failed("FAILED".to_string())) }
        })
        .await;

        assert_eq!(result, Err(PollError::Failed("FAILED".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), PollError<String>> = poll_until(Duration::from_millis(1), 4, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(PollState::Pending) }
        })
        .await;

        assert_eq!(result, Err(PollError::Exhausted { attempts: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let result: Result<(), PollError<String>> = poll_until(Duration::from_millis(1), 3, || async {
            Err("connection reset".to_string())
        })
        .await;

        assert_eq!(result, Err(PollError::Check("connection reset".to_string())));
    }
}
