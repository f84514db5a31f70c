//! WebGL Context
//!
//! # Overview
//!
//! [`WebGlContext`] is the validation and resource-management core that
//! sits between script-facing calls and a [`GlBackend`]. Its public methods
//! mirror the versioned API one entry point at a time. Each one either
//! succeeds or latches one GL error, and no invalid call ever reaches the
//! driver.
//!
//! # Design
//!
//! Every entry point runs through [`WebGlContext::run`]:
//!
//! 1. No-op once the context is lost.
//! 2. Touch the context in the process-wide LRU.
//! 3. Run the body, which returns [`Validated`]. Validators fully resolve
//!    their own failure and never mutate state before the last check.
//! 4. Release native names that became unreferenced during the call.
//! 5. Latch the error of a failed body.
//!
//! The tightly coupled pieces (bindings, object pools, draw validation,
//! uploads and loss handling) are separate modules that each add an
//! `impl WebGlContext` block with crate-visible helpers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use webgl_core::{InitContextDesc, RecordingBackend, WebGlContext, gl};
//!
//! let mut ctx = WebGlContext::create(InitContextDesc::default(), RecordingBackend::default())?;
//! let buffer = ctx.create_buffer();
//! ctx.bind_buffer(gl::ARRAY_BUFFER, buffer);
//! assert_eq!(ctx.get_error(), webgl_core::GlError::NoError);
//! ```

mod attributes;
mod error_reporter;
mod host;
mod objects;
mod parameters;
mod state;

pub use attributes::{ContextAttributes, InitContextDesc, Limits, PowerPreference, WebGlVersion};
pub use error_reporter::{
    ErrorReporter, Failure, GlError, LogSink, Validated, WarningKind, WarningSink,
};
pub use host::{FrameHandle, HostObserver, NullHost};
pub use parameters::ParamValue;
pub use state::{BlendState, EnabledCaps, PixelStore, StateCall, StateTracker, StencilFace};

use std::sync::Arc;

use crate::backend::{Capabilities, GlBackend};
use crate::binding::Bindings;
use crate::draw::{FakeAttrib0, GenericAttrib};
use crate::errors::{Result, WebGlError};
use crate::extensions::{ExtensionId, ExtensionSet, supported_extensions};
use crate::loss::{ContextId, ContextManager, LossController, LossState};
use crate::objects::{
    ObjectRegistry, TransformFeedbackData, TransformFeedbackId, VertexArrayData, VertexArrayId,
};
use crate::settings::Settings;
use crate::sync::FenceTracker;

// ============================================================================
// Context
// ============================================================================

pub struct WebGlContext {
    pub(crate) id: ContextId,
    pub(crate) version: WebGlVersion,
    pub(crate) attributes: ContextAttributes,
    pub(crate) limits: Limits,
    pub(crate) settings: Settings,
    pub(crate) resist_fingerprinting: bool,
    pub(crate) capabilities: Capabilities,

    pub(crate) backend: Box<dyn GlBackend>,
    pub(crate) objects: ObjectRegistry,
    pub(crate) bindings: Bindings,
    pub(crate) state: StateTracker,
    pub(crate) errors: ErrorReporter,

    /// Current generic vertex attribute values (`vertexAttrib4f` and kin).
    pub(crate) generic_attribs: Vec<GenericAttrib>,
    pub(crate) fake_attrib0: FakeAttrib0,

    pub(crate) extensions_supported: ExtensionSet,
    pub(crate) extensions_enabled: ExtensionSet,

    pub(crate) fences: FenceTracker,
    pub(crate) loss: LossController,
    pub(crate) manager: Arc<ContextManager>,
    pub(crate) host: Box<dyn HostObserver>,

    /// Driver-default vertex array and transform feedback objects.
    pub(crate) default_vao: VertexArrayId,
    pub(crate) default_tf: TransformFeedbackId,

    pub(crate) drawing_buffer_size: (u32, u32),
    /// Something was drawn since the last present.
    pub(crate) frame_dirty: bool,
    /// The drawing buffer must be cleared before the next draw into it.
    pub(crate) backbuffer_needs_clear: bool,
    /// Entry point currently running, for diagnostics.
    pub(crate) func_name: &'static str,
}

impl std::fmt::Debug for WebGlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGlContext")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("loss", &self.loss)
            .field("drawing_buffer_size", &self.drawing_buffer_size)
            .field("objects", &self.objects.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Factory for [`WebGlContext`].
pub struct ContextBuilder {
    desc: InitContextDesc,
    manager: Option<Arc<ContextManager>>,
    host: Option<Box<dyn HostObserver>>,
    warning_sink: Option<Box<dyn WarningSink>>,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(desc: InitContextDesc) -> Self {
        Self {
            desc,
            manager: None,
            host: None,
            warning_sink: None,
        }
    }

    /// Uses `manager` instead of the process-wide one.
    #[must_use]
    pub fn manager(mut self, manager: Arc<ContextManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl HostObserver + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    #[must_use]
    pub fn warning_sink(mut self, sink: impl WarningSink + 'static) -> Self {
        self.warning_sink = Some(Box::new(sink));
        self
    }

    /// Validates the creation parameters, probes the driver, and registers
    /// the new context with the manager (which may evict an older one).
    ///
    /// # Errors
    ///
    /// - [`WebGlError::InvalidSize`] for sizes beyond `i32::MAX`.
    /// - [`WebGlError::UnsupportedVersion`] if the driver lacks WebGL 2.
    /// - [`WebGlError::NativeContextCreation`] when a software renderer is
    ///   refused or the drawing buffer cannot be allocated.
    pub fn build(self, backend: impl GlBackend + 'static) -> Result<WebGlContext> {
        let Self {
            desc,
            manager,
            host,
            warning_sink,
        } = self;
        let (width, height) = desc.size;
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(WebGlError::InvalidSize { width, height });
        }

        let mut backend: Box<dyn GlBackend> = Box::new(backend);
        let capabilities = backend.capabilities();
        if desc.version.is_webgl2() && !capabilities.supports_webgl2 {
            return Err(WebGlError::UnsupportedVersion(
                "WebGL 2 is not supported by this driver".into(),
            ));
        }
        if desc.attributes.fail_if_major_performance_caveat && is_software_renderer(&capabilities.renderer) {
            return Err(WebGlError::NativeContextCreation(format!(
                "failIfMajorPerformanceCaveat: refusing software renderer `{}`",
                capabilities.renderer
            )));
        }

        let limits = Limits::from_driver(&capabilities.limits, desc.version, desc.resist_fingerprinting);
        let size = clamp_drawing_buffer(width, height, &limits);
        if !backend.resize(size.0, size.1) {
            return Err(WebGlError::NativeContextCreation(format!(
                "failed to allocate a {}x{} drawing buffer",
                size.0, size.1
            )));
        }

        let mut objects = ObjectRegistry::default();
        let default_vao = objects
            .vertex_arrays
            .insert(None, VertexArrayData::new(limits.max_vertex_attribs));
        objects.vertex_arrays.mark_bound(default_vao);
        let default_tf = objects.transform_feedbacks.insert(
            None,
            TransformFeedbackData::new(limits.max_transform_feedback_separate_attribs),
        );
        objects.transform_feedbacks.mark_bound(default_tf);

        let settings = desc.settings;
        let mut errors = ErrorReporter::new(settings.max_warnings, settings.max_perf_warnings);
        if let Some(sink) = warning_sink {
            errors.set_boxed_sink(sink);
        }

        let mut ctx = WebGlContext {
            id: ContextId::next(),
            version: desc.version,
            attributes: desc.attributes,
            bindings: Bindings::new(&limits, default_vao, default_tf),
            generic_attribs: vec![GenericAttrib::default(); limits.max_vertex_attribs as usize],
            state: StateTracker::new(size.0, size.1, settings.require_fast_path),
            extensions_supported: supported_extensions(
                desc.version,
                capabilities.extensions,
                desc.resist_fingerprinting,
            ),
            extensions_enabled: ExtensionSet::empty(),
            limits,
            resist_fingerprinting: desc.resist_fingerprinting,
            capabilities,
            backend,
            objects,
            errors,
            fake_attrib0: FakeAttrib0::default(),
            fences: FenceTracker::new(),
            loss: LossController::new(),
            manager: manager.unwrap_or_else(ContextManager::global),
            host: host.unwrap_or_else(|| Box::new(NullHost)),
            default_vao,
            default_tf,
            drawing_buffer_size: size,
            frame_dirty: false,
            backbuffer_needs_clear: false,
            func_name: "",
            settings,
        };
        ctx.register_with_manager();
        log::info!(
            "Created {:?} context {:?} ({}x{}) on `{}`",
            ctx.version,
            ctx.id,
            size.0,
            size.1,
            ctx.capabilities.renderer
        );
        Ok(ctx)
    }
}

fn is_software_renderer(renderer: &str) -> bool {
    let renderer = renderer.to_ascii_lowercase();
    ["llvmpipe", "swiftshader", "softpipe", "software"]
        .iter()
        .any(|needle| renderer.contains(needle))
}

/// Clamps a requested drawing buffer size to `[1, max viewport]`.
fn clamp_drawing_buffer(width: u32, height: u32, limits: &Limits) -> (u32, u32) {
    let [max_w, max_h] = limits.max_viewport_dims;
    (width.clamp(1, max_w.max(1)), height.clamp(1, max_h.max(1)))
}

// ============================================================================
// Core
// ============================================================================

impl WebGlContext {
    /// Creates a context with the process-wide manager and no host.
    ///
    /// # Errors
    ///
    /// See [`ContextBuilder::build`].
    pub fn create(desc: InitContextDesc, backend: impl GlBackend + 'static) -> Result<Self> {
        ContextBuilder::new(desc).build(backend)
    }

    /// Runs one entry point: loss gate, LRU touch, body, deferred native
    /// release, error latch. Returns `None` when lost or on failure.
    pub(crate) fn run<T>(
        &mut self,
        func: &'static str,
        body: impl FnOnce(&mut Self) -> Validated<T>,
    ) -> Option<T> {
        if !self.check_alive() {
            return None;
        }
        self.func_name = func;
        self.manager.bump(self.id);

        let result = body(self);
        self.release_dead_objects();
        match result {
            Ok(value) => Some(value),
            Err(failure) => {
                self.errors.report(func, &failure);
                None
            }
        }
    }

    /// Hands every native name whose last reference dropped to the driver.
    pub(crate) fn release_dead_objects(&mut self) {
        for (kind, name) in self.objects.drain_released() {
            log::debug!("Releasing native {kind:?} {name}");
            self.backend.delete_object(kind, name);
        }
    }

    pub(crate) fn require_webgl2(&self) -> Validated<()> {
        if self.version.is_webgl2() {
            Ok(())
        } else {
            Err(Failure::invalid_operation(format!("{} requires WebGL 2.", self.func_name)))
        }
    }

    pub(crate) fn perf_warn(&mut self, message: &str) {
        let message = format!("{}: {message}", self.func_name);
        self.errors.perf_warn(&message);
    }

    /// `getError`.
    pub fn get_error(&mut self) -> GlError {
        self.sync_loss_signal();
        self.errors.take_error()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> WebGlVersion {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &ContextAttributes {
        &self.attributes
    }

    /// `getContextAttributes`; `None` once lost.
    pub fn get_context_attributes(&mut self) -> Option<ContextAttributes> {
        (!self.is_context_lost()).then_some(self.attributes)
    }

    #[inline]
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<ContextManager> {
        &self.manager
    }

    /// Live objects plus deleted ones still referenced by a binding.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ------------------------------------------------------------------------
    // Extensions
    // ------------------------------------------------------------------------

    /// `getSupportedExtensions`; `None` once lost.
    pub fn get_supported_extensions(&mut self) -> Option<Vec<&'static str>> {
        if self.is_context_lost() {
            return None;
        }
        Some(
            ExtensionId::ALL
                .into_iter()
                .filter(|ext| self.extensions_supported.contains(ext.flag()))
                .map(ExtensionId::name)
                .collect(),
        )
    }

    /// `getExtension`: enables and returns the extension if supported.
    pub fn get_extension(&mut self, name: &str) -> Option<ExtensionId> {
        if self.is_context_lost() {
            return None;
        }
        let ext = ExtensionId::from_name(name)?;
        if !self.extensions_supported.contains(ext.flag()) {
            return None;
        }
        if !self.extensions_enabled.contains(ext.flag()) {
            log::debug!("Enabling extension {}", ext.name());
            self.extensions_enabled.insert(ext.flag());
        }
        Some(ext)
    }

    #[inline]
    #[must_use]
    pub fn is_extension_enabled(&self, ext: ExtensionId) -> bool {
        self.extensions_enabled.contains(ext.flag())
    }

    // ------------------------------------------------------------------------
    // Drawing buffer & presentation
    // ------------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        self.drawing_buffer_size
    }

    /// Resizes the drawing buffer, clamped to the maximum viewport. The
    /// contents are discarded; the viewport is left alone.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.check_alive() {
            return;
        }
        let size = clamp_drawing_buffer(width, height, &self.limits);
        if size == self.drawing_buffer_size {
            return;
        }
        if !self.backend.resize(size.0, size.1) {
            self.errors.warn(
                WarningKind::General,
                &format!("resize: failed to resize the drawing buffer to {}x{}", size.0, size.1),
            );
            return;
        }
        log::debug!("Drawing buffer of {:?} resized to {}x{}", self.id, size.0, size.1);
        self.drawing_buffer_size = size;
        self.backbuffer_needs_clear = true;
    }

    /// Hands the finished frame to the compositor. Returns `None` if nothing
    /// was drawn since the last present, or the context is lost.
    pub fn present(&mut self) -> Option<FrameHandle> {
        if !self.check_alive() || !self.frame_dirty {
            return None;
        }
        self.backend.present();
        self.frame_dirty = false;
        if !self.attributes.preserve_drawing_buffer {
            self.backbuffer_needs_clear = true;
        }
        let (width, height) = self.drawing_buffer_size;
        let frame = FrameHandle::new(
            width,
            height,
            self.attributes.alpha,
            self.attributes.premultiplied_alpha,
        );
        self.host.on_frame_ready(frame);
        Some(frame)
    }
}

impl Drop for WebGlContext {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
        if self.loss.state == LossState::Alive {
            let default_vao = self.default_vao;
            let default_tf = self.default_tf;
            self.bindings.release_all(&mut self.objects, default_vao, default_tf);
            for (kind, name) in self.objects.clear_all() {
                self.backend.delete_object(kind, name);
            }
            if let Some(buffer) = self.fake_attrib0.forget() {
                self.backend.delete_object(crate::backend::ObjectKind::Buffer, buffer);
            }
        } else {
            self.objects.clear_all();
        }
        log::debug!("Destroyed context {:?}", self.id);
    }
}
