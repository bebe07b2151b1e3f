//! External terminology validator.
//!
//! Queries a clinical-terminology concept search endpoint (snowstorm-style
//! `/concepts?term=...`) to validate terms and fetch preferred-term
//! suggestions. Every call carries a bounded timeout, and the whole service
//! sits behind a circuit breaker: after enough consecutive failures within
//! a rolling window, calls are skipped for a cooldown and affected spans
//! stay unvalidated. Breaker trips are logged, never surfaced to callers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Circuit breaker open, call skipped")]
    CircuitOpen,
}

/// What the terminology source said about a term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether any active concept matched the term
    pub valid: bool,

    /// Preferred terms of the closest concepts, best first
    pub suggestions: Vec<String>,
}

/// Terminology lookup seam. The HTTP implementation is the production
/// service; tests inject scripted fakes.
#[async_trait]
pub trait TerminologyService: Send + Sync {
    /// Search concepts matching `term`, returning validity and up to
    /// `limit` preferred-term suggestions
    async fn lookup(&self, term: &str, limit: usize) -> Result<ValidationOutcome, ValidatorError>;
}

#[derive(Debug, Deserialize)]
struct ConceptSearchResponse {
    #[serde(default)]
    items: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
struct Concept {
    pt: Option<Description>,
    fsn: Option<Description>,
}

#[derive(Debug, Deserialize)]
struct Description {
    term: Option<String>,
}

/// HTTP client for a snowstorm-style concept search endpoint
pub struct HttpTerminologyService {
    client: reqwest::Client,
    base_url: String,
    call_timeout: Duration,
}

impl HttpTerminologyService {
    pub fn new(base_url: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            call_timeout,
        }
    }

    /// Extract suggestion strings from concepts: preferred term first,
    /// then the fully-specified name with its semantic tag stripped.
    fn extract_suggestions(items: &[Concept], limit: usize) -> Vec<String> {
        let mut suggestions = Vec::new();

        for concept in items {
            if let Some(term) = concept.pt.as_ref().and_then(|d| d.term.as_deref()) {
                if !suggestions.iter().any(|s: &String| s == term) {
                    suggestions.push(term.to_string());
                }
            }
            if let Some(fsn) = concept.fsn.as_ref().and_then(|d| d.term.as_deref()) {
                // "Warfarin (substance)" -> "Warfarin"
                let stripped = fsn.split('(').next().unwrap_or(fsn).trim();
                if !stripped.is_empty() && !suggestions.iter().any(|s| s == stripped) {
                    suggestions.push(stripped.to_string());
                }
            }
        }

        suggestions.truncate(limit);
        suggestions
    }
}

#[async_trait]
impl TerminologyService for HttpTerminologyService {
    async fn lookup(&self, term: &str, limit: usize) -> Result<ValidationOutcome, ValidatorError> {
        let url = format!("{}/concepts", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .get(&url)
            .query(&[
                ("term", term),
                ("activeFilter", "true"),
                ("limit", &limit.to_string()),
            ])
            .send();

        let response = timeout(self.call_timeout, request)
            .await
            .map_err(|_| ValidatorError::Timeout(self.call_timeout))??;

        if !response.status().is_success() {
            return Err(ValidatorError::Status(response.status().as_u16()));
        }

        let body: ConceptSearchResponse = response.json().await?;
        Ok(ValidationOutcome {
            valid: !body.items.is_empty(),
            suggestions: Self::extract_suggestions(&body.items, limit),
        })
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker (default 3)
    pub failure_threshold: u32,

    /// Rolling window for counting failures (default 60s)
    pub window: Duration,

    /// How long calls are skipped once open (default 30s)
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    window_start: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Failure-counting circuit breaker with a rolling window and cooldown
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether a call may proceed. An open breaker closes again once the
    /// cooldown elapses, with its failure count reset.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().expect("breaker lock poisoned");

        if let Some(opened_at) = state.opened_at {
            if opened_at.elapsed() < self.settings.cooldown {
                return false;
            }
            tracing::info!("Validator circuit breaker cooldown elapsed, resuming calls");
            *state = BreakerState::default();
        }
        true
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures = 0;
        state.window_start = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");

        // Restart the rolling window if the previous one has lapsed
        match state.window_start {
            Some(start) if start.elapsed() <= self.settings.window => {}
            _ => {
                state.window_start = Some(Instant::now());
                state.failures = 0;
            }
        }

        state.failures += 1;
        if state.failures >= self.settings.failure_threshold && state.opened_at.is_none() {
            state.opened_at = Some(Instant::now());
            tracing::warn!(
                "Validator circuit breaker opened after {} consecutive failures",
                state.failures
            );
        }
    }

    pub fn is_open(&self) -> bool {
        !self.allow()
    }
}

/// A terminology service guarded by a circuit breaker.
///
/// This is what the resolver talks to: when the breaker is open the call
/// fails fast with [`ValidatorError::CircuitOpen`] and the caller degrades
/// the span to unvalidated.
pub struct GuardedValidator {
    service: Box<dyn TerminologyService>,
    breaker: CircuitBreaker,
}

impl GuardedValidator {
    pub fn new(service: Box<dyn TerminologyService>, settings: BreakerSettings) -> Self {
        Self {
            service,
            breaker: CircuitBreaker::new(settings),
        }
    }

    pub async fn lookup(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<ValidationOutcome, ValidatorError> {
        if !self.breaker.allow() {
            return Err(ValidatorError::CircuitOpen);
        }

        match self.service.lookup(term, limit).await {
            Ok(outcome) => {
                self.breaker.record_success();
                Ok(outcome)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
