use std::sync::atomic::{AtomicU64, Ordering};

use crate::loss::ContextLossReason;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// A finished frame handed to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    id: u64,
    pub width: u32,
    pub height: u32,
    pub alpha: bool,
    pub premultiplied_alpha: bool,
}

impl FrameHandle {
    #[must_use]
    pub(crate) fn new(width: u32, height: u32, alpha: bool, premultiplied_alpha: bool) -> Self {
        Self {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            alpha,
            premultiplied_alpha,
        }
    }

    /// Process-unique, increasing frame id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The surface owner and compositor, as seen by a context.
pub trait HostObserver: Send {
    /// The context has been lost. Returning `true` allows it to be restored
    /// later (the script called `preventDefault`).
    fn on_context_lost(&mut self, reason: ContextLossReason) -> bool {
        let _ = reason;
        false
    }

    fn on_context_restored(&mut self) {}

    fn on_frame_ready(&mut self, frame: FrameHandle) {
        let _ = frame;
    }
}

/// Host that ignores every notification and never allows restore.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostObserver for NullHost {}
