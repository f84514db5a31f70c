//! Context Loss & Restore
//!
//! # Overview
//!
//! A context is lost when the driver resets, when the process-wide LRU
//! evicts it, on memory pressure, or on request (`WEBGL_lose_context`).
//! Loss is latched immediately: every public entry point turns into a
//! no-op and `getError` reports `CONTEXT_LOST_WEBGL` once.
//!
//! ```text
//!   Alive --loss--> PendingLoss --host notified--> Lost
//!     ^                                             |
//!     +---------------- Restoring <--restore allowed+
//! ```
//!
//! # Restore
//!
//! Restoring recreates the native context and gives every surviving object
//! a fresh native name while keeping its id, so script-visible identity
//! survives. Object contents, bindings and fixed-function state start over.
//!
//! # Cross-context State
//!
//! The LRU order and the discrete-GPU activity machine live in the
//! [`ContextManager`]. Other contexts never touch this context directly:
//! eviction raises this context's [`LossSignal`], which is read on its
//! next call.

mod clock;
mod dgpu;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dgpu::{DgpuState, DynGpuManager, PowerHook};
pub use manager::{ContextId, ContextManager};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::backend::{ObjectKind, ResetStatus};
use crate::context::{Failure, WebGlContext};
use crate::errors::{Result, WebGlError};
use crate::extensions::ExtensionSet;
use crate::objects::{SyncData, TransformFeedbackData, VertexArrayData};

// ============================================================================
// States & Reasons
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LossState {
    #[default]
    Alive,
    /// Lost, host not yet notified.
    PendingLoss,
    Lost,
    Restoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ContextLossReason {
    /// Driver reset without blame.
    #[default]
    None = 0,
    /// `WEBGL_lose_context.loseContext()`.
    Manual = 1,
    /// The driver blamed this context for a reset.
    Guilty = 2,
    /// Evicted by the live-context budget.
    Evicted = 3,
    MemoryPressure = 4,
}

impl ContextLossReason {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::Manual,
            2 => Self::Guilty,
            3 => Self::Evicted,
            4 => Self::MemoryPressure,
            _ => return None,
        })
    }

    /// The native context is gone and took its object names with it.
    fn is_driver_reset(self) -> bool {
        matches!(self, Self::None | Self::Guilty)
    }
}

const NO_REQUEST: u8 = u8::MAX;

/// Cross-thread loss request, raised by the manager and consumed by the
/// owning context.
#[derive(Debug)]
pub struct LossSignal {
    requested: AtomicU8,
}

impl Default for LossSignal {
    fn default() -> Self {
        Self {
            requested: AtomicU8::new(NO_REQUEST),
        }
    }
}

impl LossSignal {
    pub fn request(&self, reason: ContextLossReason) {
        self.requested.store(reason as u8, Ordering::Release);
    }

    pub fn take(&self) -> Option<ContextLossReason> {
        ContextLossReason::from_raw(self.requested.swap(NO_REQUEST, Ordering::AcqRel))
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug)]
pub(crate) struct LossController {
    pub state: LossState,
    pub reason: ContextLossReason,
    pub signal: Arc<LossSignal>,
    /// Set from the host's answer to the loss notification.
    pub allow_restore: bool,
    /// `restoreContext()` was called after a manual loss.
    pub restore_requested: bool,
    pub restore_attempts: u32,
    pub in_foreground: bool,
}

impl LossController {
    pub fn new() -> Self {
        Self {
            state: LossState::Alive,
            reason: ContextLossReason::None,
            signal: Arc::default(),
            allow_restore: true,
            restore_requested: false,
            restore_attempts: 0,
            in_foreground: true,
        }
    }
}

// ============================================================================
// Context Operations
// ============================================================================

impl WebGlContext {
    /// Applies a pending cross-thread loss request.
    pub(crate) fn sync_loss_signal(&mut self) {
        if let Some(reason) = self.loss.signal.take() {
            self.force_lose_context(reason);
        }
    }

    /// Gate for every public entry point.
    pub(crate) fn check_alive(&mut self) -> bool {
        self.sync_loss_signal();
        self.loss.state == LossState::Alive
    }

    pub(crate) fn force_lose_context(&mut self, reason: ContextLossReason) {
        if self.loss.state != LossState::Alive {
            return;
        }
        log::info!("WebGL context {:?} lost ({reason:?})", self.id);

        self.loss.state = LossState::PendingLoss;
        self.loss.reason = reason;
        self.loss.allow_restore = true;
        self.loss.restore_requested = false;
        self.errors.on_context_lost();
        self.fences.lose();

        if reason.is_driver_reset() {
            self.objects.forget_natives();
        } else {
            for (kind, name) in self.collect_natives() {
                self.backend.delete_object(kind, name);
            }
            self.objects.forget_natives();
        }
        self.fake_attrib0.forget();
        self.manager.unregister(self.id);
    }

    fn collect_natives(&mut self) -> Vec<(ObjectKind, crate::backend::NativeName)> {
        let mut natives = self.objects.drain_released();
        let objects = &self.objects;
        macro_rules! push_natives {
            ($pool:ident, $kind:expr) => {
                natives.extend(objects.$pool.iter().filter_map(|(_, e)| e.native.map(|n| ($kind, n))));
            };
        }
        push_natives!(buffers, ObjectKind::Buffer);
        push_natives!(textures, ObjectKind::Texture);
        push_natives!(framebuffers, ObjectKind::Framebuffer);
        push_natives!(programs, ObjectKind::Program);
        push_natives!(queries, ObjectKind::Query);
        push_natives!(renderbuffers, ObjectKind::Renderbuffer);
        push_natives!(samplers, ObjectKind::Sampler);
        push_natives!(shaders, ObjectKind::Shader);
        push_natives!(transform_feedbacks, ObjectKind::TransformFeedback);
        push_natives!(vertex_arrays, ObjectKind::VertexArray);
        if let Some(buffer) = self.fake_attrib0.native() {
            natives.push((ObjectKind::Buffer, buffer));
        }
        natives
    }

    #[must_use]
    pub fn loss_state(&self) -> LossState {
        self.loss.state
    }

    #[must_use]
    pub fn loss_reason(&self) -> ContextLossReason {
        self.loss.reason
    }

    /// `isContextLost`.
    pub fn is_context_lost(&mut self) -> bool {
        self.sync_loss_signal();
        self.loss.state != LossState::Alive
    }

    /// How often the host should call [`WebGlContext::poll_context_loss`].
    #[must_use]
    pub fn loss_check_interval(&self) -> Duration {
        Duration::from_millis(self.settings.context_loss_check_interval_ms)
    }

    /// Marks the owning document as foreground or background. Foreground
    /// contexts are only evicted if settings allow it.
    pub fn set_foreground(&mut self, foreground: bool) {
        self.loss.in_foreground = foreground;
        self.manager.set_evictable(self.id, self.is_evictable());
    }

    fn is_evictable(&self) -> bool {
        !self.loss.in_foreground || self.settings.can_lose_context_in_foreground
    }

    /// Enters the LRU, possibly pushing older contexts out.
    pub(crate) fn register_with_manager(&mut self) {
        let evicted = self
            .manager
            .register(self.id, Arc::clone(&self.loss.signal), self.settings.max_contexts);
        self.manager.set_evictable(self.id, self.is_evictable());
        for victim in evicted {
            log::info!("Context {:?} pushed {victim:?} over the live-context budget", self.id);
        }
    }

    /// Periodic timer body.
    ///
    /// Polls the driver reset status, delivers pending loss notifications
    /// to the host, and attempts a restore when one is allowed.
    pub fn poll_context_loss(&mut self) -> LossState {
        self.sync_loss_signal();
        self.manager.poll();

        if self.loss.state == LossState::Alive {
            match self.backend.reset_status() {
                ResetStatus::NoError => {}
                ResetStatus::Guilty => self.force_lose_context(ContextLossReason::Guilty),
                ResetStatus::Innocent | ResetStatus::Unknown => {
                    self.force_lose_context(ContextLossReason::None);
                }
            }
            let completed = self.backend.completed_fence();
            self.fences.update_completed(completed);
        }

        if self.loss.state == LossState::PendingLoss {
            let reason = self.loss.reason;
            let allowed = self.host.on_context_lost(reason);
            self.loss.allow_restore = allowed && reason != ContextLossReason::Guilty;
            self.loss.state = LossState::Lost;
        }

        let wants_restore = match self.loss.reason {
            ContextLossReason::Manual => self.loss.restore_requested,
            _ => true,
        };
        if self.loss.state == LossState::Lost
            && self.loss.allow_restore
            && wants_restore
            && let Err(err) = self.try_to_restore_context()
        {
            log::warn!("Context restore failed: {err}");
        }
        self.loss.state
    }

    /// Recreates the native context and every surviving object.
    ///
    /// # Errors
    ///
    /// [`WebGlError::RestoreFailed`] if the context is not lost, restore is
    /// forbidden, the attempt budget is spent, or the driver fails.
    pub fn try_to_restore_context(&mut self) -> Result<()> {
        if self.loss.state != LossState::Lost {
            return Err(WebGlError::RestoreFailed("context is not lost".into()));
        }
        if !self.loss.allow_restore {
            return Err(WebGlError::RestoreFailed("restore is not allowed".into()));
        }
        if self.loss.restore_attempts >= self.settings.max_restore_attempts {
            self.loss.allow_restore = false;
            return Err(WebGlError::RestoreFailed(format!(
                "gave up after {} attempts",
                self.loss.restore_attempts
            )));
        }
        self.loss.restore_attempts += 1;
        self.loss.state = LossState::Restoring;

        if let Err(message) = self.backend.recreate() {
            self.loss.state = LossState::Lost;
            return Err(WebGlError::RestoreFailed(message));
        }
        let (width, height) = self.drawing_buffer_size;
        if !self.backend.resize(width, height) {
            self.loss.state = LossState::Lost;
            return Err(WebGlError::RestoreFailed("drawing buffer allocation failed".into()));
        }

        self.reset_after_restore();
        if let Err(failure) = self.recreate_natives() {
            self.objects.forget_natives();
            self.loss.state = LossState::Lost;
            return Err(WebGlError::RestoreFailed(failure.message));
        }

        self.loss.state = LossState::Alive;
        self.loss.reason = ContextLossReason::None;
        self.loss.restore_attempts = 0;
        self.loss.restore_requested = false;
        self.frame_dirty = false;
        self.backbuffer_needs_clear = true;
        self.register_with_manager();
        self.host.on_context_restored();
        log::info!("WebGL context {:?} restored", self.id);
        Ok(())
    }

    /// Drops contents, bindings and fixed-function state. Object ids stay.
    fn reset_after_restore(&mut self) {
        let default_vao = self.default_vao;
        let default_tf = self.default_tf;
        self.bindings.release_all(&mut self.objects, default_vao, default_tf);

        let max_attribs = self.limits.max_vertex_attribs;
        let max_tf = self.limits.max_transform_feedback_separate_attribs;
        let crate::objects::ObjectRegistry {
            buffers,
            textures,
            framebuffers,
            programs,
            queries,
            renderbuffers,
            shaders,
            syncs,
            transform_feedbacks,
            vertex_arrays,
            ..
        } = &mut self.objects;

        for (_, vao) in vertex_arrays.iter_mut() {
            let old = std::mem::replace(&mut vao.data, VertexArrayData::new(max_attribs));
            for buffer in old.attribs.iter().filter_map(|a| a.buffer).chain(old.element_array) {
                buffers.release_ref(buffer);
            }
        }
        for (_, tf) in transform_feedbacks.iter_mut() {
            let old = std::mem::replace(&mut tf.data, TransformFeedbackData::new(max_tf));
            for buffer in old.bindings.iter().filter_map(|b| b.buffer) {
                buffers.release_ref(buffer);
            }
            if let Some(program) = old.program {
                programs.release_ref(program);
            }
        }
        for (_, fb) in framebuffers.iter_mut() {
            for attachment in std::mem::take(&mut fb.data.attachments).into_values() {
                match attachment {
                    crate::objects::Attachment::Texture { id, .. } => textures.release_ref(id),
                    crate::objects::Attachment::Renderbuffer(id) => renderbuffers.release_ref(id),
                }
            }
        }
        for (_, buffer) in buffers.iter_mut() {
            let data = &mut buffer.data;
            data.byte_length = 0;
            data.index_shadow = None;
            data.invalidate_index_cache();
        }
        for (_, texture) in textures.iter_mut() {
            texture.data = crate::objects::TextureData::default();
            texture.has_been_bound = false;
        }
        for (_, rb) in renderbuffers.iter_mut() {
            rb.data = crate::objects::RenderbufferData::default();
        }
        for (_, program) in programs.iter_mut() {
            program.data.linked = None;
            program.data.link_requested = false;
            program.data.info_log.clear();
        }
        for (_, shader) in shaders.iter_mut() {
            shader.data.compiled = false;
            shader.data.info_log.clear();
        }
        for (_, query) in queries.iter_mut() {
            query.data.active = false;
            query.data.available_fence = None;
        }
        // Fences from the old context can no longer complete.
        for (_, sync) in syncs.iter_mut() {
            sync.data = SyncData { fence_id: 0 };
        }

        self.state = crate::context::StateTracker::new(
            self.drawing_buffer_size.0,
            self.drawing_buffer_size.1,
            self.settings.require_fast_path,
        );
        self.generic_attribs.fill(crate::draw::GenericAttrib::default());
        self.release_dead_objects();
    }

    fn recreate_natives(&mut self) -> std::result::Result<(), Failure> {
        let backend = &mut self.backend;
        let objects = &mut self.objects;
        macro_rules! recreate {
            ($pool:ident, $kind:expr) => {
                for (_, entry) in objects.$pool.iter_mut() {
                    let name = backend
                        .create_object($kind)
                        .ok_or_else(|| Failure::out_of_memory(format!("Failed to recreate {:?}.", $kind)))?;
                    entry.native = Some(name);
                }
            };
        }
        recreate!(buffers, ObjectKind::Buffer);
        recreate!(textures, ObjectKind::Texture);
        recreate!(framebuffers, ObjectKind::Framebuffer);
        recreate!(programs, ObjectKind::Program);
        recreate!(queries, ObjectKind::Query);
        recreate!(renderbuffers, ObjectKind::Renderbuffer);
        recreate!(samplers, ObjectKind::Sampler);
        recreate!(shaders, ObjectKind::Shader);

        // The driver defaults keep `None`; only user objects get names.
        let (default_vao, default_tf) = (self.default_vao, self.default_tf);
        for (id, entry) in objects.vertex_arrays.iter_mut() {
            if id != default_vao {
                entry.native = Some(
                    backend
                        .create_object(ObjectKind::VertexArray)
                        .ok_or_else(|| Failure::out_of_memory("Failed to recreate vertex array."))?,
                );
            }
        }
        for (id, entry) in objects.transform_feedbacks.iter_mut() {
            if id != default_tf {
                entry.native = Some(
                    backend
                        .create_object(ObjectKind::TransformFeedback)
                        .ok_or_else(|| Failure::out_of_memory("Failed to recreate transform feedback."))?,
                );
            }
        }

        // Shader attachments survive a restore.
        for (_, program) in objects.programs.iter() {
            let Some(program_name) = program.native else {
                continue;
            };
            for shader in [program.data.vertex_shader, program.data.fragment_shader]
                .into_iter()
                .flatten()
            {
                if let Some(shader_name) = objects.shaders.native(shader) {
                    backend.attach_shader(program_name, shader_name);
                }
            }
        }
        Ok(())
    }

    /// Host memory-pressure notification.
    pub fn on_memory_pressure(&mut self) {
        if self.settings.lose_context_on_memory_pressure && self.loss.state == LossState::Alive {
            self.force_lose_context(ContextLossReason::MemoryPressure);
        }
    }

    // ------------------------------------------------------------------------
    // WEBGL_lose_context
    // ------------------------------------------------------------------------

    /// `WEBGL_lose_context.loseContext()`.
    pub fn lose_context_ext(&mut self) {
        if !self.extensions_enabled.contains(ExtensionSet::WEBGL_LOSE_CONTEXT) {
            return;
        }
        self.sync_loss_signal();
        if self.loss.state != LossState::Alive {
            self.errors.report("loseContext", &Failure::invalid_operation("Context is already lost."));
            return;
        }
        self.force_lose_context(ContextLossReason::Manual);
    }

    /// `WEBGL_lose_context.restoreContext()`. The restore itself happens on
    /// the next [`WebGlContext::poll_context_loss`].
    pub fn restore_context_ext(&mut self) {
        if !self.extensions_enabled.contains(ExtensionSet::WEBGL_LOSE_CONTEXT) {
            return;
        }
        self.sync_loss_signal();
        let failure = match (self.loss.state, self.loss.reason) {
            (LossState::Alive, _) => Some("Context is not lost."),
            (_, reason) if reason != ContextLossReason::Manual => Some("Context loss was not simulated."),
            _ if !self.loss.allow_restore => Some("Context cannot be restored."),
            _ => None,
        };
        match failure {
            Some(message) => self.errors.report("restoreContext", &Failure::invalid_operation(message)),
            None => self.loss.restore_requested = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_taken_once() {
        let signal = LossSignal::default();
        assert_eq!(signal.take(), None);
        signal.request(ContextLossReason::Evicted);
        assert_eq!(signal.take(), Some(ContextLossReason::Evicted));
        assert_eq!(signal.take(), None);
    }

    #[test]
    fn only_resets_drop_natives_implicitly() {
        assert!(ContextLossReason::Guilty.is_driver_reset());
        assert!(ContextLossReason::None.is_driver_reset());
        assert!(!ContextLossReason::Evicted.is_driver_reset());
        assert!(!ContextLossReason::Manual.is_driver_reset());
    }
}
