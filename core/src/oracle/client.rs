use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ChoiceOracle, ChoiceQuery, ChoiceResponse, GenerationTracker, OracleError, UnavailableOracle};
use crate::config::DEFAULT_ORACLE_TIMEOUT;

/// Wraps a backend with the timeout guard and generation check every request goes through.
/// The backend can be swapped at runtime when the host changes transport.
pub struct OracleClient {
    backend: RwLock<Arc<dyn ChoiceOracle>>,
    generations: GenerationTracker,
    timeout_ms: AtomicU64,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("backend", &self.backend_name())
            .field("timeout", &self.timeout())
            .finish()
    }
}

impl Default for OracleClient {
    fn default() -> Self {
        Self::new(Arc::new(UnavailableOracle::default()))
    }
}

impl OracleClient {
    pub fn new(backend: Arc<dyn ChoiceOracle>) -> Self {
        Self {
            backend: RwLock::new(backend),
            generations: GenerationTracker::new(),
            timeout_ms: AtomicU64::new(DEFAULT_ORACLE_TIMEOUT.as_millis() as u64),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    pub fn set_backend(&self, backend: Arc<dyn ChoiceOracle>) {
        let mut guard = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        debug!(from = guard.name(), to = backend.name(), "oracle backend replaced");
        *guard = backend;
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn backend_name(&self) -> &'static str {
        self.current_backend().name()
    }

    pub fn generations(&self) -> &GenerationTracker {
        &self.generations
    }

    fn current_backend(&self) -> Arc<dyn ChoiceOracle> {
        self.backend.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// One request for `field` of `document`. No retry. Returns [`OracleError::Stale`]
    /// when a newer request for the same key was issued while this one was in flight.
    pub async fn fetch(&self, document: &str, field: &str, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
        let generation = self.generations.issue(document, field);
        let backend = self.current_backend();
        let budget = self.timeout();

        let result = match tokio::time::timeout(budget, backend.fetch(query)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(budget)),
        };

        if !self.generations.is_current(document, field, generation) {
            debug!(document, field, generation, "dropping stale oracle response");
            return Err(OracleError::Stale);
        }

        match &result {
            Ok(response) => {
                for message in &response.messages {
                    info!(backend = backend.name(), %message, "oracle notice");
                }
            }
            Err(err) => warn!(backend = backend.name(), document, field, "{err}"),
        }
        result
    }

    pub fn forget(&self, document: &str) {
        self.generations.forget(document);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ChoiceKind, StaticOracle};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct SlowOracle {
        delay: Duration,
    }

    #[async_trait]
    impl ChoiceOracle for SlowOracle {
        async fn fetch(&self, _query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
            tokio::time::sleep(self.delay).await;
            Ok(ChoiceResponse::with_choices("Keyword", ["late"]))
        }
    }

    /// Holds the first request until released so a second one can overtake it.
    struct GatedOracle {
        gate: Notify,
    }

    #[async_trait]
    impl ChoiceOracle for GatedOracle {
        async fn fetch(&self, query: &ChoiceQuery) -> Result<ChoiceResponse, OracleError> {
            if query.line_so_far.ends_with("first") {
                self.gate.notified().await;
            }
            Ok(ChoiceResponse::with_choices("Keyword", [query.line_so_far.clone()]))
        }
    }

    fn query(line: &str) -> ChoiceQuery {
        ChoiceQuery::new(ChoiceKind::Field, "ENV", line)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let client = OracleClient::new(Arc::new(SlowOracle {
            delay: Duration::from_secs(10),
        }))
        .with_timeout(Duration::from_millis(50));
        let err = client.fetch("a.tst", "VALUE", &query("TEST.VALUE:")).await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn unavailable_backend_reports_unavailable() {
        let client = OracleClient::default();
        let err = client.fetch("a.tst", "VALUE", &query("TEST.VALUE:")).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn overtaken_request_is_stale() {
        let backend = Arc::new(GatedOracle { gate: Notify::new() });
        let client = Arc::new(OracleClient::new(backend.clone()));

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.fetch("a.tst", "VALUE", &query("TEST.VALUE:first")).await })
        };
        // let the first request register its generation before the second is issued
        while client.generations().tracked_keys() == 0 {
            tokio::task::yield_now().await;
        }
        let second = client.fetch("a.tst", "VALUE", &query("TEST.VALUE:second")).await.expect("second");
        assert_eq!(second.choice_list, vec!["TEST.VALUE:second"]);

        backend.gate.notify_one();
        let first = first.await.expect("join");
        assert!(matches!(first, Err(OracleError::Stale)));
    }

    #[tokio::test]
    async fn backend_can_be_swapped() {
        let client = OracleClient::default();
        let oracle = StaticOracle::new().with("TEST.UNIT:", ChoiceResponse::with_choices("File", ["manager"]));
        client.set_backend(Arc::new(oracle));
        let resp = client.fetch("a.tst", "UNIT", &query("TEST.UNIT:")).await.expect("response");
        assert_eq!(resp.choice_list, vec!["manager"]);
        assert_eq!(client.backend_name(), "static");
    }
}
