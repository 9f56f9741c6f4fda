//! Single-flight coalescing of concurrent asynchronous operations
//!
//! A [`SingleFlight`] guarantees that at most one instance of an operation is
//! running at any time. The first caller (the leader) starts the operation;
//! every caller that arrives while it is still running awaits the same
//! result instead of starting its own. Once the operation settles the slot is
//! cleared and the next caller starts a fresh flight.
//!
//! The operation runs on its own tokio task. Dropping any waiter, the leader
//! included, does not cancel the flight: the remaining waiters still receive
//! the outcome and the slot is still cleared.
//!
//! ```rust,ignore
//! let flight: SingleFlight<String, MyError> = SingleFlight::new();
//! let (a, b) = tokio::join!(
//!     flight.run(|| async { fetch_token().await }),
//!     flight.run(|| async { fetch_token().await }),
//! );
//! // fetch_token ran once; a and b hold the same result
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// The flight's task ended without producing a result (panic or runtime
/// shutdown)
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("in-flight operation was aborted before completing")]
pub struct FlightAborted;

type SharedFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Flight<T, E> {
    id: u64,
    future: SharedFlight<T, E>,
}

type Slot<T, E> = Arc<Mutex<Option<Flight<T, E>>>>;

/// Clears the slot when the flight's task ends, including by panic
struct SlotGuard<T, E> {
    slot: Slot<T, E>,
    id: u64,
}

impl<T, E> Drop for SlotGuard<T, E> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == self.id) {
            *slot = None;
        }
    }
}

/// Coalesces concurrent calls into one shared in-flight operation
pub struct SingleFlight<T, E> {
    slot: Slot<T, E>,
    started: AtomicU64,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for SingleFlight<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.slot.lock().is_some())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T, E> SingleFlight<T, E> {
    /// Create an idle single-flight slot
    pub fn new() -> Self {
        Self { slot: Arc::new(Mutex::new(None)), started: AtomicU64::new(0) }
    }

    /// Whether an operation is currently running
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of operations actually started (joins are not counted)
    pub fn flights_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FlightAborted> + 'static,
{
    /// Run `operation` unless a flight is already underway, in which case
    /// join it
    ///
    /// `operation` is only invoked by the leader. Joiners never call it.
    pub async fn run<F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let future = {
            let mut slot = self.slot.lock();
            if let Some(flight) = slot.as_ref() {
                debug!(flight_id = flight.id, "Joining in-flight operation");
                flight.future.clone()
            } else {
                let id = self.started.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(flight_id = id, "Starting new flight");

                let guard = SlotGuard { slot: Arc::clone(&self.slot), id };
                let work = operation();
                // The task cannot clear the slot before it is populated: the
                // guard's drop needs the lock held here.
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });

                let future = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            warn!(flight_id = id, error = %join_error, "Flight task ended abnormally");
                            Err(E::from(FlightAborted))
                        }
                    }
                }
                .boxed()
                .shared();

                *slot = Some(Flight { id, future: future.clone() });
                future
            }
        };

        future.await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Failed(String),
        Aborted,
    }

    impl From<FlightAborted> for TestError {
        fn from(_: FlightAborted) -> Self {
            Self::Aborted
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_flight() {
        let flight: Arc<SingleFlight<u32, TestError>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.flights_started(), 1);
        assert!(!flight.is_in_flight());
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_slot_cleared() {
        let flight: SingleFlight<u32, TestError> = SingleFlight::new();

        let (a, b) = tokio::join!(
            flight.run(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(TestError::Failed("boom".into()))
            }),
            flight.run(|| async { Ok(7) }),
        );

        assert_eq!(a, Err(TestError::Failed("boom".into())));
        assert_eq!(b, Err(TestError::Failed("boom".into())));

        // Next caller starts fresh
        assert_eq!(flight.run(|| async { Ok(7) }).await, Ok(7));
        assert_eq!(flight.flights_started(), 2);
    }

    #[tokio::test]
    async fn test_dropping_leader_does_not_cancel_flight() {
        let flight: Arc<SingleFlight<&'static str, TestError>> = Arc::new(SingleFlight::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let leader = {
            let flight = Arc::clone(&flight);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                flight
                    .run(move || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        Ok("fresh")
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(flight.is_in_flight());

        let follower = flight.run(|| async { Ok("unused") });
        leader.abort();

        assert_eq!(follower.await, Ok("fresh"));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_operation_reports_aborted() {
        let flight: SingleFlight<u32, TestError> = SingleFlight::new();

        let result = flight
            .run(|| async {
                if true {
                    panic!("operation blew up");
                }
                Ok(1)
            })
            .await;

        assert_eq!(result, Err(TestError::Aborted));
        assert!(!flight.is_in_flight());
        assert_eq!(flight.run(|| async { Ok(5) }).await, Ok(5));
    }
}
