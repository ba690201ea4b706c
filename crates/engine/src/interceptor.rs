//! Typed interceptor chain (§9 "monkey-patched method interception... becomes
//! a typed interceptor chain"): linear pipelines of pre-write/post-write and
//! pre-read/post-read middleware that can transform a value or veto an
//! operation, without the write/read paths reaching for dynamic rebinding.

use emberstore_core::{EmberError, Value};

/// What a pre-write interceptor decides for a `set` in flight.
pub enum PreWriteOutcome {
    /// Continue the write with (possibly transformed) `value`.
    Continue(Value),
    /// Abort the write; no WAL record is appended.
    Veto(EmberError),
}

/// What a pre-read interceptor decides for a `get` in flight.
pub enum PreReadOutcome {
    /// Continue the read.
    Continue,
    /// Short-circuit the read as if the key were absent.
    Veto,
}

/// Runs before a value is written, with the chance to transform it or veto
/// the write entirely (encryption, timestamping, auth checks).
pub trait PreWrite: Send + Sync {
    fn intercept(&self, key: &str, value: Value) -> PreWriteOutcome;
}

/// Runs after a write has been durably applied. Cannot veto; side-effect only.
pub trait PostWrite: Send + Sync {
    fn intercept(&self, key: &str, value: &Value);
}

/// Runs before a value is read, with the chance to veto the read.
pub trait PreRead: Send + Sync {
    fn intercept(&self, key: &str) -> PreReadOutcome;
}

/// Runs after a value is read, with the chance to transform it (decryption,
/// redaction) before it reaches the caller.
pub trait PostRead: Send + Sync {
    fn intercept(&self, key: &str, value: Value) -> Value;
}

/// The four linear pipelines a `set`/`get` traverses, in registration order.
#[derive(Default)]
pub struct InterceptorChain {
    pre_write: Vec<Box<dyn PreWrite>>,
    post_write: Vec<Box<dyn PostWrite>>,
    pre_read: Vec<Box<dyn PreRead>>,
    post_read: Vec<Box<dyn PostRead>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre_write(&mut self, interceptor: Box<dyn PreWrite>) {
        self.pre_write.push(interceptor);
    }

    pub fn add_post_write(&mut self, interceptor: Box<dyn PostWrite>) {
        self.post_write.push(interceptor);
    }

    pub fn add_pre_read(&mut self, interceptor: Box<dyn PreRead>) {
        self.pre_read.push(interceptor);
    }

    pub fn add_post_read(&mut self, interceptor: Box<dyn PostRead>) {
        self.post_read.push(interceptor);
    }

    /// Run the pre-write chain. Stops at the first veto.
    pub fn apply_pre_write(&self, key: &str, value: Value) -> PreWriteOutcome {
        let mut current = value;
        for interceptor in &self.pre_write {
            match interceptor.intercept(key, current) {
                PreWriteOutcome::Continue(v) => current = v,
                veto @ PreWriteOutcome::Veto(_) => return veto,
            }
        }
        PreWriteOutcome::Continue(current)
    }

    pub fn apply_post_write(&self, key: &str, value: &Value) {
        for interceptor in &self.post_write {
            interceptor.intercept(key, value);
        }
    }

    /// Run the pre-read chain. Stops at the first veto.
    pub fn apply_pre_read(&self, key: &str) -> PreReadOutcome {
        for interceptor in &self.pre_read {
            if matches!(interceptor.intercept(key), PreReadOutcome::Veto) {
                return PreReadOutcome::Veto;
            }
        }
        PreReadOutcome::Continue
    }

    pub fn apply_post_read(&self, key: &str, value: Value) -> Value {
        let mut current = value;
        for interceptor in &self.post_read {
            current = interceptor.intercept(key, current);
        }
        current
    }
}
