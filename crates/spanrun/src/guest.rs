//! # Guest Engine Abstraction
//!
//! The scripting runtime itself lives behind this trait. The bridge only
//! needs four things from it: evaluate source, pump its internal job queue,
//! collect garbage on demand, and call back into a guest function the guest
//! previously handed out.
//!
//! A script failure is data, not a fault: it surfaces as
//! [`GuestError::Script`] and crosses the boundary as an ordinary error
//! result.

use spanwire::Value;

#[derive(Debug, Clone)]
pub enum GuestError {
    /// The guest code itself threw. The message is the script-side error.
    Script(String),
    /// The engine failed outside of script semantics.
    Engine(String),
}

impl std::fmt::Display for GuestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuestError::Script(msg) => write!(f, "script error: {}", msg),
            GuestError::Engine(msg) => write!(f, "engine error: {}", msg),
        }
    }
}

impl std::error::Error for GuestError {}

pub type Result<T> = std::result::Result<T, GuestError>;

/// How a source string should be evaluated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvalMode {
    /// Classic script semantics; the completion value is returned.
    Global,
    /// Module semantics; imports are resolved, completion value is empty.
    Module,
}

/// The embedded scripting runtime, as the bridge sees it.
pub trait GuestEngine: Send + Sync + 'static {
    /// Evaluates source text and returns its completion value as a string.
    fn eval(&self, code: &str, source_name: &str, mode: EvalMode) -> Result<String>;

    /// Runs the engine's internal pending-job queue (resolved promises,
    /// microtasks). Returns the number of jobs executed.
    fn run_pending_jobs(&self) -> usize;

    /// Forces a garbage collection pass.
    fn run_gc(&self);

    /// Invokes a guest callback the guest registered earlier, by its
    /// callback handle.
    fn invoke_callback(&self, callback: u32, args: &[Value]) -> Result<Value>;
}
