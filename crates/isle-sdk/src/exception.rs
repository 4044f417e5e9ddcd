//! Exceptions thrown by real methods

use std::fmt;
use std::sync::Arc;

use crate::types::TypeDescriptor;

/// An exception object: its type, message, rendered stack trace and cause.
///
/// `origin` is only set on wrappers produced when the original exception type
/// was not loadable on the catching side; it holds the textual cause chain
/// of the original.
#[derive(Clone)]
pub struct Exception {
    ty: Arc<TypeDescriptor>,
    message: Option<String>,
    stack_trace: Vec<String>,
    cause: Option<Arc<Exception>>,
    origin: Option<String>,
}

impl Exception {
    /// Create an exception of type `ty`
    pub fn new(ty: Arc<TypeDescriptor>, message: impl Into<String>) -> Self {
        Self {
            ty,
            message: Some(message.into()),
            stack_trace: Vec::new(),
            cause: None,
            origin: None,
        }
    }

    /// Create an exception without a message
    pub fn without_message(ty: Arc<TypeDescriptor>) -> Self {
        Self {
            ty,
            message: None,
            stack_trace: Vec::new(),
            cause: None,
            origin: None,
        }
    }

    /// Attach rendered stack frames
    pub fn with_stack_trace(mut self, frames: Vec<String>) -> Self {
        self.stack_trace = frames;
        self
    }

    /// Attach a cause
    pub fn with_cause(mut self, cause: Arc<Exception>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Attach the textual chain of a foreign original
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Exception type
    pub fn ty(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Message, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Rendered stack frames, innermost first
    pub fn stack_trace(&self) -> &[String] {
        &self.stack_trace
    }

    /// Cause, if any
    pub fn cause(&self) -> Option<&Arc<Exception>> {
        self.cause.as_ref()
    }

    /// Textual chain of the foreign original, for wrappers
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Render this exception and its causes, one per line
    pub fn cause_chain(&self) -> String {
        let mut out = self.to_string();
        let mut current = self.cause.as_ref();
        while let Some(cause) = current {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            current = cause.cause.as_ref();
        }
        out
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.ty.name(), msg),
            None => write!(f, "{}", self.ty.name()),
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("type", &self.ty.name())
            .field("message", &self.message)
            .field("frames", &self.stack_trace.len())
            .field("cause", &self.cause)
            .finish()
    }
}

impl std::error::Error for Exception {}
