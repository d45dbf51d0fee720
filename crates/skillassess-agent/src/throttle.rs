use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

use crate::{ModelClient, ModelError, ModelRequest, ModelResponse};

/// Concurrency and spacing limits for outbound model calls.
///
/// At most `max_concurrent` calls are in flight, and consecutive call starts
/// are at least `min_interval` apart. One `Throttle` may back several clients
/// (e.g. a generator and a critic on different models of the same provider).
pub struct Throttle {
    permits: Semaphore,
    min_interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    /// Wait until this call is allowed to start under the spacing rule
    async fn wait_for_slot(&self) {
        let wait_until = {
            let mut next = self.next_start.lock().await;
            let now = Instant::now();
            let start = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(start + self.min_interval);
            start
        };
        if wait_until > Instant::now() {
            trace!(
                wait_ms = (wait_until - Instant::now()).as_millis() as u64,
                "Throttling model call"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

/// Rate-limited wrapper shared by every pipeline run in a process
pub struct ThrottledClient {
    inner: Arc<dyn ModelClient>,
    throttle: Arc<Throttle>,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn ModelClient>, max_concurrent: usize, min_interval: Duration) -> Self {
        Self::sharing(inner, Arc::new(Throttle::new(max_concurrent, min_interval)))
    }

    /// Wrap `inner` under limits shared with other clients
    pub fn sharing(inner: Arc<dyn ModelClient>, throttle: Arc<Throttle>) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait]
impl ModelClient for ThrottledClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let _permit = self
            .throttle
            .permits
            .acquire()
            .await
            .map_err(|e| ModelError::Config(format!("Throttle closed: {}", e)))?;
        self.throttle.wait_for_slot().await;
        self.inner.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the peak number of concurrent calls
    struct CountingClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for CountingClient {
        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ModelResponse::new("{}".into(), Duration::ZERO))
        }
    }

    #[tokio::test]
    async fn test_limits_concurrency() {
        let inner = Arc::new(CountingClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let throttled = Arc::new(ThrottledClient::new(inner.clone(), 2, Duration::ZERO));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let client = throttled.clone();
            handles.push(tokio::spawn(async move {
                client
                    .complete(&ModelRequest::critique("p".into()))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shared_throttle_spans_clients() {
        let inner = Arc::new(CountingClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let throttle = Arc::new(Throttle::new(1, Duration::ZERO));
        let first = Arc::new(ThrottledClient::sharing(inner.clone(), throttle.clone()));
        let second = Arc::new(ThrottledClient::sharing(inner.clone(), throttle));

        let request = ModelRequest::critique("p".into());
        let (a, b) = tokio::join!(first.complete(&request), second.complete(&request));
        a.unwrap();
        b.unwrap();

        assert_eq!(inner.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spaces_call_starts() {
        let inner = Arc::new(CountingClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let throttled = ThrottledClient::new(inner, 4, Duration::from_millis(30));

        let start = Instant::now();
        for _ in 0..3 {
            throttled
                .complete(&ModelRequest::critique("p".into()))
                .await
                .unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
