//! Context Settings
//!
//! Host preferences that shape validation and loss behaviour. They are read
//! once at context creation and never change for the lifetime of a context.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use webgl_core::Settings;
//!
//! // Defaults match a typical desktop browser configuration
//! let settings = Settings::default();
//!
//! // Or override a subset from JSON; missing keys keep their defaults
//! let settings = Settings::from_json(r#"{ "max_contexts": 8 }"#)?;
//! ```

use serde::de::Unexpected;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Host preferences for a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of general warnings (including error messages) reported before
    /// the context goes quiet.
    pub max_warnings: u32,
    /// Number of performance warnings reported before the context goes quiet.
    pub max_perf_warnings: u32,
    /// Live-context budget shared by every context of a [`ContextManager`].
    ///
    /// [`ContextManager`]: crate::loss::ContextManager
    pub max_contexts: usize,
    /// Lose the context when the host reports memory pressure.
    pub lose_context_on_memory_pressure: bool,
    /// Allow a foreground context to be evicted by the live-context budget.
    pub can_lose_context_in_foreground: bool,
    /// Interval of the loss-polling timer.
    pub context_loss_check_interval_ms: u64,
    /// Restore attempts made before a lost context is given up on.
    pub max_restore_attempts: u32,
    /// Interval of the shared discrete-GPU activity tick.
    pub dgpu_tick_ms: u64,
    /// Initial value of the `UNPACK_REQUIRE_FASTPATH` pixel-store switch.
    pub require_fast_path: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_warnings: 32,
            max_perf_warnings: 16,
            max_contexts: 16,
            lose_context_on_memory_pressure: false,
            can_lose_context_in_foreground: true,
            context_loss_check_interval_ms: 1000,
            max_restore_attempts: 3,
            dgpu_tick_ms: 3000,
            require_fast_path: false,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON object. Unspecified fields keep their
    /// defaults. Anything other than an object is rejected.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            let err = <serde_json::Error as serde::de::Error>::invalid_type(unexpected(&value), &"a settings object");
            return Err(err.into());
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn unexpected(value: &serde_json::Value) -> Unexpected<'_> {
    match value {
        serde_json::Value::Null => Unexpected::Unit,
        serde_json::Value::Bool(b) => Unexpected::Bool(*b),
        serde_json::Value::Number(_) => Unexpected::Other("number"),
        serde_json::Value::String(s) => Unexpected::Str(s),
        serde_json::Value::Array(_) => Unexpected::Seq,
        serde_json::Value::Object(_) => Unexpected::Map,
    }
}
