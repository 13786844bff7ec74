//! Single-flight initialization gate.
//!
//! The first caller runs the initializer; every concurrent caller blocks
//! until it finishes, and every later caller reads the memoized outcome.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

const UNINITIALIZED: u8 = 0;
const RUNNING: u8 = 1;

/// Where the gate is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Uninitialized,
    Running,
    Ready,
    Disabled,
    Fatal,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Uninitialized => "uninitialized",
            GateState::Running => "running",
            GateState::Ready => "ready",
            GateState::Disabled => "disabled",
            GateState::Fatal => "fatal",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of an initializer.
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// Initialization succeeded.
    Ready(T),
    /// Initialization failed and the caller may carry on without it.
    Disabled(E),
    /// Initialization failed and the caller must not carry on.
    Fatal(E),
}

impl<T, E> Outcome<T, E> {
    /// The boolean projection callers see.
    pub fn is_supported(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Outcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Ready(_) => None,
            Outcome::Disabled(err) | Outcome::Fatal(err) => Some(err),
        }
    }

    pub fn state(&self) -> GateState {
        match self {
            Outcome::Ready(_) => GateState::Ready,
            Outcome::Disabled(_) => GateState::Disabled,
            Outcome::Fatal(_) => GateState::Fatal,
        }
    }
}

/// Runs an initializer at most once and memoizes its [`Outcome`].
#[derive(Debug)]
pub struct InitGate<T, E> {
    running: AtomicU8,
    outcome: OnceLock<Outcome<T, E>>,
}

impl<T, E> Default for InitGate<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> InitGate<T, E> {
    pub const fn new() -> Self {
        InitGate {
            running: AtomicU8::new(UNINITIALIZED),
            outcome: OnceLock::new(),
        }
    }

    pub fn state(&self) -> GateState {
        match self.outcome.get() {
            Some(outcome) => outcome.state(),
            None if self.running.load(Ordering::Acquire) == RUNNING => GateState::Running,
            None => GateState::Uninitialized,
        }
    }

    /// The outcome, if initialization has finished.
    pub fn get(&self) -> Option<&Outcome<T, E>> {
        self.outcome.get()
    }

    /// Return the outcome, running `init` if no caller has yet.
    ///
    /// If `init` panics the gate returns to `Uninitialized` and the next
    /// caller runs its own initializer.
    pub fn get_or_run(&self, init: impl FnOnce() -> Outcome<T, E>) -> &Outcome<T, E> {
        self.outcome.get_or_init(|| {
            self.running.store(RUNNING, Ordering::Release);
            let _reset = ResetOnUnwind(&self.running);
            init()
        })
    }
}

struct ResetOnUnwind<'a>(&'a AtomicU8);

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(UNINITIALIZED, Ordering::Release);
        }
    }
}
