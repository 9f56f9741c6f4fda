//! Generic retry orchestration with exponential backoff and jitter
//!
//! This module wraps an arbitrary asynchronous operation with bounded
//! attempts, a retry predicate and a backoff schedule. Unlike a typical
//! "retry wrapper" it never invents its own error type: when the executor
//! gives up, the caller receives the operation's last error unchanged, so
//! classification done upstream survives the retry layer.
//!
//! Retry state ([`RetryContext`]) is local to a single `execute` call;
//! nothing is shared between logically distinct operations.
//!
//! The executor does not know which operations are safe to repeat. Callers
//! declare it with [`RetryConfig::idempotent`]; a non-idempotent config runs
//! the operation exactly once regardless of `max_attempts`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::error::ErrorClassification;

/// Errors raised while validating a [`RetryConfig`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryConfigError {
    /// `max_attempts` was zero
    #[error("max_attempts must be greater than 0")]
    ZeroAttempts,

    /// The exponential multiplier would shrink delays
    #[error("backoff multiplier must be at least 1.0, got {0}")]
    InvalidMultiplier(String),

    /// Jitter ratio outside `0.0..=1.0`
    #[error("jitter ratio must be within 0.0..=1.0, got {0}")]
    InvalidJitter(String),
}

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Get the average delay between attempts (excludes operation execution
    /// time).
    pub fn average_delay(&self) -> Duration {
        if self.attempts <= 1 {
            return Duration::ZERO;
        }
        self.total_delay / (self.attempts - 1)
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: `initial_delay * multiplier^retry`, capped at
    /// `max_delay`
    Exponential { initial_delay: Duration, multiplier: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay before the given retry (0-based: the wait after
    /// the first failed attempt is retry 0)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, multiplier, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let delay = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                if !delay.is_finite() || delay >= max_delay.as_secs_f64() {
                    *max_delay
                } else {
                    Duration::from_secs_f64(delay)
                }
            }
        }
    }
}

/// Jitter applied on top of the computed backoff delay
///
/// Jitter only ever lengthens a delay, so the schedule's lower bound
/// (`base + base * multiplier + ...`) still holds with jitter enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Add a uniformly random `0..=ratio * delay` on top of the delay
    Additive { ratio: f64 },
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Additive { ratio } => {
                let spread = delay.as_secs_f64() * ratio;
                if spread <= 0.0 || !spread.is_finite() {
                    return delay;
                }
                let extra = rand::thread_rng().gen_range(0.0..=spread);
                delay + Duration::from_secs_f64(extra)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (initial try included)
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
    /// Maximum total time to spend retrying
    pub max_total_time: Option<Duration>,
    /// Whether the wrapped operation may safely run more than once
    pub idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(500),
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
            },
            jitter: Jitter::Additive { ratio: 0.2 },
            max_total_time: None,
            idempotent: true,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Attempts the executor will actually make
    ///
    /// Non-idempotent operations are attempted exactly once.
    pub fn effective_attempts(&self) -> u32 {
        if self.idempotent {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Copy of this config with the idempotency flag replaced
    #[must_use]
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }

        if let BackoffStrategy::Exponential { multiplier, .. } = &self.backoff {
            if !multiplier.is_finite() || *multiplier < 1.0 {
                return Err(RetryConfigError::InvalidMultiplier(multiplier.to_string()));
            }
        }

        if let Jitter::Additive { ratio } = &self.jitter {
            if !(0.0..=1.0).contains(ratio) {
                return Err(RetryConfigError::InvalidJitter(ratio.to_string()));
            }
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, multiplier, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn additive_jitter(mut self, ratio: f64) -> Self {
        self.config.jitter = Jitter::Additive { ratio };
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.config.idempotent = idempotent;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Context for tracking retry state
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (0-based)
    pub attempt: u32,
    /// Start time of retry sequence
    pub start_time: Instant,
    /// Last delay used
    pub last_delay: Option<Duration>,
    /// Total accumulated delay across attempts
    pub total_delay: Duration,
}

impl RetryContext {
    fn new() -> Self {
        Self { attempt: 0, start_time: Instant::now(), last_delay: None, total_delay: Duration::ZERO }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// The main retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    /// The configuration this executor runs with
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<P> RetryExecutor<P> {
    /// Execute an operation with retry logic
    ///
    /// Returns the first success, or the last error once attempts are
    /// exhausted or the policy stops.
    #[instrument(
        skip(self, operation),
        fields(max_attempts = self.config.effective_attempts(), idempotent = self.config.idempotent)
    )]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut context = RetryContext::new();
        let max_attempts = self.config.effective_attempts();

        loop {
            let attempt_number = context.attempt + 1;
            debug!("Executing operation (attempt {}/{})", attempt_number, max_attempts);

            let error = match operation().await {
                Ok(value) => {
                    if context.attempt > 0 {
                        debug!("Operation succeeded after {} retries", context.attempt);
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt_number,
                        total_delay: context.total_delay,
                    };
                }
                Err(error) => error,
            };

            if attempt_number >= max_attempts {
                if max_attempts > 1 {
                    warn!(attempts = attempt_number, error = %error, "Retry attempts exhausted");
                }
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt_number,
                    total_delay: context.total_delay,
                };
            }

            let delay = match self.policy.should_retry(&error, context.attempt) {
                RetryDecision::Stop => {
                    debug!(error = %error, "Retry policy determined not to retry");
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt_number,
                        total_delay: context.total_delay,
                    };
                }
                RetryDecision::Retry => {
                    let delay = self.config.backoff.calculate_delay(context.attempt);
                    self.config.jitter.apply(delay)
                }
                RetryDecision::RetryAfter(custom_delay) => custom_delay,
            };

            if let Some(max_time) = self.config.max_total_time {
                if context.elapsed() + delay > max_time {
                    warn!(
                        elapsed = ?context.elapsed(),
                        attempts = attempt_number,
                        "Retry time budget exceeded"
                    );
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt_number,
                        total_delay: context.total_delay,
                    };
                }
            }

            warn!(attempt = attempt_number, ?delay, error = %error, "Operation failed, retrying");
            Self::sleep_and_update(&mut context, delay).await;
        }
    }

    async fn sleep_and_update(context: &mut RetryContext, delay: Duration) {
        context.last_delay = Some(delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        context.total_delay += delay;
        context.attempt += 1;
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{ErrorClassification, RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    /// Retries exactly the errors that classify themselves as retryable
    ///
    /// An error-supplied `retry_after` hint overrides the backoff delay.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            match error.retry_after() {
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            }
        }
    }
}
