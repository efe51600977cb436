//! Runtime error types.

use std::fmt;

/// A fatal runtime error. The dispatch loop stops and leaves the frame
/// stack as-is for the host to tear down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmError {
    Runtime(String),
    StackOverflow,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Runtime(msg) => write!(f, "{msg}"),
            VmError::StackOverflow => write!(f, "stack overflow"),
        }
    }
}

impl std::error::Error for VmError {}

/// Error returned by a native function; surfaces as a runtime error.
#[derive(Clone, Debug)]
pub struct NativeError(pub String);

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        NativeError(message.into())
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NativeError {}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError(s.to_string())
    }
}
