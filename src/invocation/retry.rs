//! Retry controller
//!
//! Wraps [`Dispatcher::dispatch`] with a per-attempt timeout and a bounded
//! number of resends. Only timeouts and lost connections are retried, and
//! only for envelopes marked retryable; everything else surfaces on the
//! first failure. Each resend carries the very same envelope.
//!
//! Dropping the future returned by [`RetryController::execute`] abandons the
//! invocation: no further attempt is started and any reply still in flight
//! is ignored.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use super::state::{InvocationPhase, InvocationState};
use super::{Dispatcher, InvocationError, InvocationResult, Operation, RequestEnvelope};
use crate::cluster::Member;
use crate::portable::{FieldValue, ResultValue};

/// Resend budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends, the first included; at least 1
    pub max_attempts: u32,
    /// How long to wait for each reply
    pub attempt_timeout: Duration,
    /// Pause before each resend
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            backoff: Duration::from_millis(100),
        }
    }
}

/// Picks the member each attempt goes to
pub trait TargetResolver: Send + Sync {
    /// Target for the 1-based `attempt`, or `None` if nobody is available
    fn target(&self, attempt: u32) -> Option<SocketAddr>;
}

/// Always the same member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTarget(pub SocketAddr);

impl TargetResolver for FixedTarget {
    fn target(&self, _attempt: u32) -> Option<SocketAddr> {
        Some(self.0)
    }
}

/// Cycles through a fixed set of members
#[derive(Debug, Default)]
pub struct RoundRobinTargets {
    targets: Vec<SocketAddr>,
    next: AtomicUsize,
}

impl RoundRobinTargets {
    pub fn new(targets: Vec<SocketAddr>) -> Self {
        Self {
            targets,
            next: AtomicUsize::new(0),
        }
    }

    /// Every member's socket address, in the given order
    pub fn from_members<'a>(members: impl IntoIterator<Item = &'a Member>) -> Self {
        Self::new(members.into_iter().map(Member::socket_address).collect())
    }
}

impl TargetResolver for RoundRobinTargets {
    fn target(&self, _attempt: u32) -> Option<SocketAddr> {
        if self.targets.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        Some(self.targets[index])
    }
}

/// Dispatch with resends
#[derive(Debug, Clone)]
pub struct RetryController {
    dispatcher: Dispatcher,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(dispatcher: Dispatcher, policy: RetryPolicy) -> Self {
        Self { dispatcher, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch `envelope`, resending on transient failures if allowed
    pub async fn execute(
        &self,
        envelope: &RequestEnvelope,
        resolver: &dyn TargetResolver,
    ) -> InvocationResult<FieldValue> {
        let mut state = InvocationState::new();
        self.execute_tracked(envelope, resolver, &mut state).await
    }

    /// Like [`execute`](Self::execute), recording every phase in `state`
    pub async fn execute_tracked(
        &self,
        envelope: &RequestEnvelope,
        resolver: &dyn TargetResolver,
        state: &mut InvocationState,
    ) -> InvocationResult<FieldValue> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure: Option<InvocationError> = None;

        loop {
            let attempt = state.attempts() + 1;
            let target = match resolver.target(attempt) {
                Some(target) => target,
                None => match last_failure {
                    // Nobody left to resend to; surface what went wrong before
                    Some(last) => {
                        warn!(
                            service = envelope.service_name(),
                            attempts = state.attempts(),
                            error = %last,
                            "no target for resend"
                        );
                        state.transition(InvocationPhase::Failed)?;
                        return Err(InvocationError::RetryExhausted {
                            attempts: state.attempts(),
                            last: Box::new(last),
                        });
                    }
                    None => return Err(InvocationError::NoTarget { attempt }),
                },
            };

            state.transition(InvocationPhase::Sent)?;
            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.dispatcher.dispatch(envelope, target))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(InvocationError::Timeout {
                        target,
                        after: self.policy.attempt_timeout,
                    }),
                };

            let failure = match outcome {
                Ok(value) => {
                    state.transition(InvocationPhase::Completed)?;
                    return Ok(value);
                }
                Err(err @ InvocationError::Remote(_)) => {
                    state.transition(InvocationPhase::Completed)?;
                    return Err(err);
                }
                Err(err) if !err.is_transient() => {
                    state.transition(InvocationPhase::Failed)?;
                    return Err(err);
                }
                Err(err) => err,
            };

            let phase = match failure {
                InvocationError::Timeout { .. } => InvocationPhase::TimedOut,
                _ => InvocationPhase::ConnectionLost,
            };
            state.transition(phase)?;

            if !envelope.is_retryable() {
                debug!(service = envelope.service_name(), error = %failure, "not retryable");
                state.transition(InvocationPhase::Failed)?;
                return Err(failure);
            }

            if state.attempts() >= max_attempts {
                warn!(
                    service = envelope.service_name(),
                    attempts = state.attempts(),
                    error = %failure,
                    "retries exhausted"
                );
                state.transition(InvocationPhase::Failed)?;
                return Err(InvocationError::RetryExhausted {
                    attempts: state.attempts(),
                    last: Box::new(failure),
                });
            }

            warn!(
                service = envelope.service_name(),
                attempt = state.attempts(),
                error = %failure,
                "retrying invocation"
            );
            last_failure = Some(failure);
            if !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }
    }

    /// Encode `operation` once and execute it with resends
    pub async fn invoke<Op: Operation>(
        &self,
        operation: &Op,
        resolver: &dyn TargetResolver,
    ) -> InvocationResult<Op::Output> {
        let envelope = RequestEnvelope::new(operation)?;
        let value = self.execute(&envelope, resolver).await?;
        Ok(<Op::Output as ResultValue>::from_field(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_cycles() {
        let a: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:1".parse().unwrap();
        let resolver = RoundRobinTargets::new(vec![a, b]);
        let picked: Vec<_> = (1..=4).filter_map(|n| resolver.target(n)).collect();
        assert_eq!(picked, vec![a, b, a, b]);
    }

    #[test]
    fn test_round_robin_empty() {
        assert_eq!(RoundRobinTargets::default().target(1), None);
    }

    #[test]
    fn test_round_robin_from_members() {
        let members = [
            Member::with_id("a", "10.0.0.1:5701".parse().unwrap(), true),
            Member::with_id("b", "10.0.0.2:5701".parse().unwrap(), false),
        ];
        let resolver = RoundRobinTargets::from_members(&members);
        assert_eq!(resolver.target(1), Some(members[0].socket_address()));
        assert_eq!(resolver.target(2), Some(members[1].socket_address()));
    }
}
