//! Agent connection/execution state.

use std::fmt;

use parking_lot::Mutex;

/// `Disconnected → Connected → (Idle ⇄ Executing)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connected,
    Idle,
    Executing,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Idle => "idle",
            Self::Executing => "executing",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct Inner {
    state: AgentState,
    executing: usize,
}

/// Shared state holder; logs every transition.
///
/// Executions are counted so that concurrent sink workers keep the agent in
/// `Executing` until the last one finishes.
#[derive(Debug)]
pub struct StateTracker {
    inner: Mutex<Inner>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: AgentState::Disconnected,
                executing: 0,
            }),
        }
    }

    pub fn current(&self) -> AgentState {
        self.inner.lock().state
    }

    pub fn connected(&self) {
        let mut inner = self.inner.lock();
        Self::transition(&mut inner, AgentState::Connected);
    }

    /// Subscription and online status are in place.
    pub fn ready(&self) {
        let mut inner = self.inner.lock();
        let next = if inner.executing > 0 {
            AgentState::Executing
        } else {
            AgentState::Idle
        };
        Self::transition(&mut inner, next);
    }

    pub fn disconnected(&self) {
        let mut inner = self.inner.lock();
        Self::transition(&mut inner, AgentState::Disconnected);
    }

    pub fn begin_execution(&self) {
        let mut inner = self.inner.lock();
        inner.executing += 1;
        if inner.state == AgentState::Idle {
            Self::transition(&mut inner, AgentState::Executing);
        }
    }

    pub fn end_execution(&self) {
        let mut inner = self.inner.lock();
        inner.executing = inner.executing.saturating_sub(1);
        if inner.executing == 0 && inner.state == AgentState::Executing {
            Self::transition(&mut inner, AgentState::Idle);
        }
    }

    fn transition(inner: &mut Inner, next: AgentState) {
        if inner.state != next {
            log::info!("[Agent] State: {} -> {}", inner.state, next);
            inner.state = next;
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
