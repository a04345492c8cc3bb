//! Caller-side invocation state machine
//!
//! ```text
//! Created -> Sent -> Completed
//!                 -> TimedOut       -> Sent | Failed
//!                 -> ConnectionLost -> Sent | Failed
//!                 -> Failed
//! ```

use tracing::debug;

use super::{InvocationError, InvocationResult};

/// Where an invocation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationPhase {
    Created,
    Sent,
    Completed,
    TimedOut,
    ConnectionLost,
    Failed,
}

impl InvocationPhase {
    /// No further transitions allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationPhase::Completed | InvocationPhase::Failed)
    }

    fn can_become(self, next: InvocationPhase) -> bool {
        use InvocationPhase::*;
        matches!(
            (self, next),
            (Created, Sent)
                | (Sent, Completed)
                | (Sent, TimedOut)
                | (Sent, ConnectionLost)
                | (Sent, Failed)
                | (TimedOut, Sent)
                | (TimedOut, Failed)
                | (ConnectionLost, Sent)
                | (ConnectionLost, Failed)
        )
    }
}

/// Phase, attempt count and the path taken so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationState {
    phase: InvocationPhase,
    attempts: u32,
    history: Vec<InvocationPhase>,
}

impl InvocationState {
    pub fn new() -> Self {
        Self {
            phase: InvocationPhase::Created,
            attempts: 0,
            history: vec![InvocationPhase::Created],
        }
    }

    pub fn phase(&self) -> InvocationPhase {
        self.phase
    }

    /// Number of times the request was sent
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn history(&self) -> &[InvocationPhase] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the machine does not allow
    pub fn transition(&mut self, next: InvocationPhase) -> InvocationResult<()> {
        if !self.phase.can_become(next) {
            return Err(InvocationError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        if next == InvocationPhase::Sent {
            self.attempts += 1;
        }
        debug!(from = ?self.phase, to = ?next, attempt = self.attempts, "invocation transition");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for InvocationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvocationPhase::*;

    #[test]
    fn test_retry_path() {
        let mut state = InvocationState::new();
        for phase in [Sent, TimedOut, Sent, ConnectionLost, Sent, Completed] {
            state.transition(phase).unwrap();
        }
        assert_eq!(state.attempts(), 3);
        assert!(state.phase().is_terminal());
        assert_eq!(state.history().len(), 7);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = InvocationState::new();
        assert!(state.transition(Completed).is_err());
        state.transition(Sent).unwrap();
        state.transition(Completed).unwrap();
        assert_eq!(
            state.transition(Sent),
            Err(InvocationError::InvalidTransition {
                from: Completed,
                to: Sent
            })
        );
    }

    #[test]
    fn test_failed_after_timeout() {
        let mut state = InvocationState::new();
        state.transition(Sent).unwrap();
        state.transition(TimedOut).unwrap();
        state.transition(Failed).unwrap();
        assert!(state.transition(Sent).is_err());
        assert_eq!(state.attempts(), 1);
    }
}
