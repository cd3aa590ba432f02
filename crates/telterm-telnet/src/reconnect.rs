//! Reconnect policy as an explicit state machine.
//!
//! [`Reconnector`] holds no I/O. The link reports what happened (attempt
//! started, connected, connect failed, connection dropped, user stop) and
//! gets back the next [`LinkState`], which says whether to wait and retry or
//! give up.

use std::time::Duration;

pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub retry_on_initial_failure: bool,
    pub retry_on_dropped_connection: bool,
    /// Connect attempts per round; 0 means unlimited.
    pub max_attempts: u32,
    pub retry_pause: Duration,
}

impl ReconnectPolicy {
    /// One attempt, no retries.
    pub fn once() -> Self {
        Self {
            retry_on_initial_failure: false,
            retry_on_dropped_connection: false,
            max_attempts: 1,
            retry_pause: Duration::ZERO,
        }
    }

    pub fn with_retry_on_initial_failure(mut self, enabled: bool) -> Self {
        self.retry_on_initial_failure = enabled;
        self
    }

    pub fn with_retry_on_dropped_connection(mut self, enabled: bool) -> Self {
        self.retry_on_dropped_connection = enabled;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_on_initial_failure: true,
            retry_on_dropped_connection: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting { attempt: u32 },
    Connected,
    /// Waiting `delay` before attempt number `next_attempt`.
    Retrying { next_attempt: u32, delay: Duration },
    Failed,
    Stopped,
}

impl LinkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Failed | LinkState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Idle => "idle",
            LinkState::Connecting { .. } => "connecting",
            LinkState::Connected => "connected",
            LinkState::Retrying { .. } => "retrying",
            LinkState::Failed => "failed",
            LinkState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            LinkState::Retrying {
                next_attempt,
                delay,
            } => write!(
                f,
                "retrying in {}ms (attempt {next_attempt})",
                delay.as_millis()
            ),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Why the machine ended in [`LinkState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The first connect failed and initial retries are off.
    ConnectRefused,
    /// `max_attempts` consecutive connects failed.
    AttemptsExhausted,
    /// An established connection closed and drop retries are off.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: LinkState,
    attempt: u32,
    after_drop: bool,
    failure: Option<FailureKind>,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: LinkState::Idle,
            attempt: 0,
            after_drop: false,
            failure: None,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Attempts made in the current round.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Starts the next connect attempt.
    pub fn begin_attempt(&mut self) -> LinkState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.attempt += 1;
        self.transition(LinkState::Connecting {
            attempt: self.attempt,
        })
    }

    pub fn connected(&mut self) -> LinkState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.transition(LinkState::Connected)
    }

    pub fn connect_failed(&mut self) -> LinkState {
        if self.state.is_terminal() {
            return self.state;
        }
        let retry_allowed = if self.after_drop {
            self.policy.retry_on_dropped_connection
        } else {
            self.policy.retry_on_initial_failure
        };
        if !retry_allowed {
            return self.fail(FailureKind::ConnectRefused);
        }
        if self.policy.max_attempts != 0 && self.attempt >= self.policy.max_attempts {
            return self.fail(FailureKind::AttemptsExhausted);
        }
        self.transition(LinkState::Retrying {
            next_attempt: self.attempt + 1,
            delay: self.policy.retry_pause,
        })
    }

    /// An established connection closed without a user request. Starts a
    /// fresh round of attempts when drop retries are on.
    pub fn dropped(&mut self) -> LinkState {
        if self.state.is_terminal() {
            return self.state;
        }
        if !self.policy.retry_on_dropped_connection {
            return self.fail(FailureKind::Dropped);
        }
        self.after_drop = true;
        self.attempt = 0;
        self.transition(LinkState::Retrying {
            next_attempt: 1,
            delay: self.policy.retry_pause,
        })
    }

    /// The user asked to disconnect. Final.
    pub fn stop(&mut self) -> LinkState {
        if self.state == LinkState::Failed {
            return self.state;
        }
        self.transition(LinkState::Stopped)
    }

    fn fail(&mut self, kind: FailureKind) -> LinkState {
        self.failure = Some(kind);
        self.transition(LinkState::Failed)
    }

    fn transition(&mut self, next: LinkState) -> LinkState {
        self.state = next;
        next
    }
}
