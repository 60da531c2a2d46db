//! Scripted guest engine for testing.
//!
//! Used internally by the test suites; not part of the public API surface
//! proper.

use std::collections::VecDeque;
use std::sync::Mutex;

use spanwire::Value;

use crate::guest::EvalMode;
use crate::guest::GuestEngine;
use crate::guest::GuestError;
use crate::guest;

/// A guest engine driven by pre-scripted responses.
///
/// Each `eval` pops the next queued response; callback invocations are
/// recorded so tests can assert on what the bridge delivered.
pub struct MockGuest {
    eval_responses: Mutex<VecDeque<guest::Result<String>>>,
    eval_log: Mutex<Vec<(String, String, EvalMode)>>,
    callback_log: Mutex<Vec<(u32, Vec<Value>)>>,
    pending_jobs: Mutex<usize>,
    gc_runs: Mutex<usize>,
}

impl MockGuest {
    pub fn new() -> Self {
        Self {
            eval_responses: Mutex::new(VecDeque::new()),
            eval_log: Mutex::new(Vec::new()),
            callback_log: Mutex::new(Vec::new()),
            pending_jobs: Mutex::new(0),
            gc_runs: Mutex::new(0),
        }
    }

    /// Queues the response the next `eval` will produce.
    pub fn push_eval(&self, response: guest::Result<String>) {
        self.eval_responses.lock().unwrap().push_back(response);
    }

    /// Pretends the engine has this many internal jobs queued.
    pub fn set_pending_jobs(&self, n: usize) {
        *self.pending_jobs.lock().unwrap() = n;
    }

    pub fn eval_log(&self) -> Vec<(String, String, EvalMode)> {
        self.eval_log.lock().unwrap().clone()
    }

    pub fn callback_log(&self) -> Vec<(u32, Vec<Value>)> {
        self.callback_log.lock().unwrap().clone()
    }

    pub fn gc_runs(&self) -> usize {
        *self.gc_runs.lock().unwrap()
    }
}

impl Default for MockGuest {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestEngine for MockGuest {
    fn eval(&self, code: &str, source_name: &str, mode: EvalMode) -> guest::Result<String> {
        self.eval_log
            .lock()
            .unwrap()
            .push((code.to_string(), source_name.to_string(), mode));
        self.eval_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn run_pending_jobs(&self) -> usize {
        let mut jobs = self.pending_jobs.lock().unwrap();
        std::mem::take(&mut *jobs)
    }

    fn run_gc(&self) {
        *self.gc_runs.lock().unwrap() += 1;
    }

    fn invoke_callback(&self, callback: u32, args: &[Value]) -> guest::Result<Value> {
        if callback == 0 {
            return Err(GuestError::Script("callback handle 0 is invalid".into()));
        }
        self.callback_log
            .lock()
            .unwrap()
            .push((callback, args.to_vec()));
        Ok(Value::Null)
    }
}
