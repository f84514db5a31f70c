//! Latched Errors & Rate-limited Warnings
//!
//! # Errors
//!
//! GL errors are sticky: the first error raised since the last
//! [`ErrorReporter::take_error`] is kept, later ones are dropped. Reading
//! the error clears it. Context loss adds a one-shot `CONTEXT_LOST_WEBGL`
//! that is reported ahead of any latched error.
//!
//! # Warnings
//!
//! Two independent budgets bound diagnostics: general warnings (error
//! messages count against it) and performance warnings. When a budget runs
//! out, a single "no further warnings" notice is emitted and every later
//! trigger of that kind is dropped.

use std::fmt;

use crate::gl::{self, GLenum};

// ============================================================================
// Error Codes
// ============================================================================

/// A GL error code as seen by scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GlError {
    #[default]
    NoError,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    ContextLost,
}

impl GlError {
    #[must_use]
    pub const fn as_gl_enum(self) -> GLenum {
        match self {
            Self::NoError => gl::NO_ERROR,
            Self::InvalidEnum => gl::INVALID_ENUM,
            Self::InvalidValue => gl::INVALID_VALUE,
            Self::InvalidOperation => gl::INVALID_OPERATION,
            Self::InvalidFramebufferOperation => gl::INVALID_FRAMEBUFFER_OPERATION,
            Self::OutOfMemory => gl::OUT_OF_MEMORY,
            Self::ContextLost => gl::CONTEXT_LOST_WEBGL,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::InvalidEnum => "INVALID_ENUM",
            Self::InvalidValue => "INVALID_VALUE",
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::InvalidFramebufferOperation => "INVALID_FRAMEBUFFER_OPERATION",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::ContextLost => "CONTEXT_LOST_WEBGL",
        }
    }
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validation failure: the error to latch and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub code: GlError,
    pub message: String,
}

impl Failure {
    pub fn new(code: GlError, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_enum(message: impl Into<String>) -> Self {
        Self::new(GlError::InvalidEnum, message)
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(GlError::InvalidValue, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(GlError::InvalidOperation, message)
    }

    pub fn invalid_framebuffer_operation(message: impl Into<String>) -> Self {
        Self::new(GlError::InvalidFramebufferOperation, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(GlError::OutOfMemory, message)
    }

    /// An internal invariant was violated. Asserts in debug builds and
    /// degrades to `OUT_OF_MEMORY` in release builds.
    pub fn implementation_bug(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(false, "implementation bug: {message}");
        Self::new(GlError::OutOfMemory, format!("Implementation bug: {message}"))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of a validator.
pub type Validated<T> = std::result::Result<T, Failure>;

// ============================================================================
// Warning Sinks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    General,
    Performance,
}

/// Receives emitted diagnostics.
pub trait WarningSink: Send {
    fn emit(&mut self, kind: WarningKind, message: &str);
}

impl<F> WarningSink for F
where
    F: FnMut(WarningKind, &str) + Send,
{
    fn emit(&mut self, kind: WarningKind, message: &str) {
        self(kind, message);
    }
}

/// Default sink: forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn emit(&mut self, kind: WarningKind, message: &str) {
        match kind {
            WarningKind::General => log::warn!("WebGL warning: {message}"),
            WarningKind::Performance => log::warn!("WebGL perf warning: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WarningBudget {
    max: u32,
    emitted: u32,
}

impl WarningBudget {
    const fn new(max: u32) -> Self {
        Self { max, emitted: 0 }
    }
}

// ============================================================================
// ErrorReporter
// ============================================================================

pub struct ErrorReporter {
    latched: GlError,
    context_lost_pending: bool,
    general: WarningBudget,
    perf: WarningBudget,
    sink: Box<dyn WarningSink>,
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("latched", &self.latched)
            .field("context_lost_pending", &self.context_lost_pending)
            .field("general", &self.general)
            .field("perf", &self.perf)
            .finish_non_exhaustive()
    }
}

impl ErrorReporter {
    #[must_use]
    pub fn new(max_warnings: u32, max_perf_warnings: u32) -> Self {
        Self {
            latched: GlError::NoError,
            context_lost_pending: false,
            general: WarningBudget::new(max_warnings),
            perf: WarningBudget::new(max_perf_warnings),
            sink: Box::new(LogSink),
        }
    }

    pub fn set_sink(&mut self, sink: impl WarningSink + 'static) {
        self.sink = Box::new(sink);
    }

    pub(crate) fn set_boxed_sink(&mut self, sink: Box<dyn WarningSink>) {
        self.sink = sink;
    }

    /// Latches `code` unless an error is already pending, and reports the
    /// message as a general warning.
    pub fn generate_error(&mut self, func: &str, code: GlError, message: &str) {
        if self.latched == GlError::NoError {
            self.latched = code;
        }
        self.warn(WarningKind::General, &format!("{func}: {message}"));
    }

    pub fn report(&mut self, func: &str, failure: &Failure) {
        self.generate_error(func, failure.code, &failure.message);
    }

    /// Returns and clears the pending error.
    pub fn take_error(&mut self) -> GlError {
        if std::mem::take(&mut self.context_lost_pending) {
            return GlError::ContextLost;
        }
        std::mem::take(&mut self.latched)
    }

    #[inline]
    #[must_use]
    pub fn peek_error(&self) -> GlError {
        self.latched
    }

    /// Queues the one-shot context-lost error and discards the latched one.
    pub fn on_context_lost(&mut self) {
        self.context_lost_pending = true;
        self.latched = GlError::NoError;
    }

    pub fn warn(&mut self, kind: WarningKind, message: &str) {
        let budget = match kind {
            WarningKind::General => &mut self.general,
            WarningKind::Performance => &mut self.perf,
        };
        if budget.emitted >= budget.max {
            return;
        }
        budget.emitted += 1;
        let exhausted = budget.emitted == budget.max;
        let max = budget.max;

        self.sink.emit(kind, message);
        if exhausted {
            let what = match kind {
                WarningKind::General => "WebGL warnings",
                WarningKind::Performance => "WebGL perf warnings",
            };
            self.sink.emit(
                kind,
                &format!(
                    "After reporting {max}, no further {what} will be reported for this WebGL context."
                ),
            );
        }
    }

    pub fn perf_warn(&mut self, message: &str) {
        self.warn(WarningKind::Performance, message);
    }
}
