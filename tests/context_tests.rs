//! Context lifecycle tests
//!
//! Tests for:
//! - Error latching across entry points
//! - Warning budgets end to end
//! - Creation from settings
//! - Presentation and drawing buffer resizing
//! - Behaviour after the context is lost

use std::sync::Arc;

use parking_lot::Mutex;
use webgl_core::context::{FrameHandle, HostObserver};
use webgl_core::gl;
use webgl_core::{
    BufferInit, ContextAttributes, ContextBuilder, ContextManager, DriverCall, GlError, InitContextDesc, ManualClock,
    ParamValue, RecordingBackend, RecordingHandle, Settings, WarningKind, WebGlContext, WebGlError, WebGlVersion,
};

// ============================================================================
// Helpers
// ============================================================================

type Messages = Arc<Mutex<Vec<(WarningKind, String)>>>;

fn manager() -> Arc<ContextManager> {
    Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000))
}

fn desc(version: WebGlVersion) -> InitContextDesc {
    InitContextDesc {
        version,
        size: (300, 150),
        ..InitContextDesc::default()
    }
}

fn context_with_sink(desc: InitContextDesc) -> (WebGlContext, RecordingHandle, Messages) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::default();
    let handle = backend.handle();
    let messages: Messages = Arc::default();
    let sink = Arc::clone(&messages);
    let ctx = ContextBuilder::new(desc)
        .manager(manager())
        .warning_sink(move |kind: WarningKind, message: &str| sink.lock().push((kind, message.to_owned())))
        .build(backend)
        .unwrap();
    (ctx, handle, messages)
}

#[derive(Default, Clone)]
struct FrameLog {
    frames: Arc<Mutex<Vec<FrameHandle>>>,
}

impl HostObserver for FrameLog {
    fn on_frame_ready(&mut self, frame: FrameHandle) {
        self.frames.lock().push(frame);
    }
}

// ============================================================================
// Error Latching
// ============================================================================

#[test]
fn first_error_wins_until_read() {
    let (mut ctx, handle, _) = context_with_sink(desc(WebGlVersion::WebGl1));
    handle.clear();

    ctx.bind_buffer(0x1234, None);
    ctx.buffer_data(gl::ARRAY_BUFFER, BufferInit::Size(4), gl::STATIC_DRAW);
    ctx.clear(0x10);

    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    assert_eq!(ctx.get_error(), GlError::NoError);
    // None of the failing calls reached the driver.
    assert!(handle.calls().is_empty());
}

#[test]
fn successful_calls_do_not_clear_the_latched_error() {
    let (mut ctx, _handle, _) = context_with_sink(desc(WebGlVersion::WebGl1));
    ctx.line_width(-1.0);
    let buffer = ctx.create_buffer();
    ctx.bind_buffer(gl::ARRAY_BUFFER, buffer);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
}

#[test]
fn webgl2_entry_points_fail_on_webgl1() {
    let (mut ctx, handle, _) = context_with_sink(desc(WebGlVersion::WebGl1));
    handle.clear();
    assert!(ctx.fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0).is_none());
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert!(handle.calls().is_empty());
}

// ============================================================================
// Warning Budgets
// ============================================================================

#[test]
fn error_messages_are_rate_limited() {
    let mut init = desc(WebGlVersion::WebGl1);
    init.settings.max_warnings = 3;
    let (mut ctx, _handle, messages) = context_with_sink(init);

    for _ in 0..5 {
        ctx.bind_buffer(0x1234, None);
    }
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);

    let messages = messages.lock();
    assert_eq!(messages.len(), 4);
    assert!(messages[0].1.starts_with("bindBuffer: "));
    assert!(messages[3].1.contains("no further WebGL warnings"));
    assert!(messages.iter().all(|(kind, _)| *kind == WarningKind::General));
}

#[test]
fn perf_warnings_have_their_own_budget() {
    let mut init = desc(WebGlVersion::WebGl1);
    init.settings.max_warnings = 1;
    init.settings.max_perf_warnings = 2;
    let (mut ctx, handle, messages) = context_with_sink(init);
    handle.set_fast_uploads(false);

    let texture = ctx.create_texture();
    ctx.bind_texture(gl::TEXTURE_2D, texture);
    for _ in 0..4 {
        ctx.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA,
            1,
            1,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            webgl_core::TexSource::Bytes(&[0; 4]),
        );
    }
    ctx.bind_buffer(0x1234, None);
    ctx.bind_buffer(0x1234, None);

    let messages = messages.lock();
    let perf = messages.iter().filter(|(k, _)| *k == WarningKind::Performance).count();
    let general = messages.iter().filter(|(k, _)| *k == WarningKind::General).count();
    // Budget plus the final notice, per kind.
    assert_eq!(perf, 3);
    assert_eq!(general, 2);
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn settings_from_json_flow_into_the_context() {
    let settings = Settings::from_json(r#"{ "max_warnings": 0, "max_contexts": 4 }"#).unwrap();
    let init = InitContextDesc {
        settings,
        ..desc(WebGlVersion::WebGl2)
    };
    let (mut ctx, _handle, messages) = context_with_sink(init);
    assert_eq!(ctx.settings().max_contexts, 4);

    ctx.bind_buffer(0x1234, None);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    assert!(messages.lock().is_empty());
}

#[test]
fn malformed_settings_are_a_host_error() {
    let err = Settings::from_json("[1, 2]").unwrap_err();
    assert!(matches!(err, WebGlError::Settings(_)));
}

#[test]
fn creation_failures_leave_nothing_registered() {
    let manager = manager();
    let backend = RecordingBackend::new(webgl_core::Capabilities {
        supports_webgl2: false,
        ..webgl_core::Capabilities::default()
    });
    let result = ContextBuilder::new(desc(WebGlVersion::WebGl2))
        .manager(Arc::clone(&manager))
        .build(backend);
    assert!(matches!(result, Err(WebGlError::UnsupportedVersion(_))));
    assert_eq!(manager.live_contexts(), 0);
}

#[test]
fn context_attributes_are_frozen() {
    let attributes = ContextAttributes {
        antialias: false,
        preserve_drawing_buffer: true,
        ..ContextAttributes::default()
    };
    let (mut ctx, _handle, _) = context_with_sink(InitContextDesc {
        attributes,
        ..desc(WebGlVersion::WebGl1)
    });
    assert_eq!(ctx.get_context_attributes(), Some(attributes));
}

#[test]
fn dropping_a_context_releases_natives_and_unregisters() {
    let manager = manager();
    let backend = RecordingBackend::default();
    let handle = backend.handle();
    let mut ctx = ContextBuilder::new(desc(WebGlVersion::WebGl1))
        .manager(Arc::clone(&manager))
        .build(backend)
        .unwrap();
    let _ = ctx.create_buffer();
    let _ = ctx.create_texture();
    assert_eq!(manager.live_contexts(), 1);

    drop(ctx);
    assert_eq!(manager.live_contexts(), 0);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::DeleteObject { .. })), 2);
}

// ============================================================================
// Presentation
// ============================================================================

#[test]
fn frames_reach_the_host_only_when_dirty() {
    let host = FrameLog::default();
    let backend = RecordingBackend::default();
    let handle = backend.handle();
    let mut ctx = ContextBuilder::new(desc(WebGlVersion::WebGl1))
        .manager(manager())
        .host(host.clone())
        .build(backend)
        .unwrap();

    assert!(ctx.present().is_none());
    ctx.clear(gl::COLOR_BUFFER_BIT);
    let frame = ctx.present().unwrap();
    assert_eq!((frame.width, frame.height), (300, 150));
    assert!(ctx.present().is_none());

    ctx.clear(gl::COLOR_BUFFER_BIT);
    let second = ctx.present().unwrap();
    assert!(second.id() > frame.id());
    assert_eq!(host.frames.lock().len(), 2);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::Present)), 2);
}

#[test]
fn resize_clamps_and_discards_contents() {
    let (mut ctx, handle, _) = context_with_sink(desc(WebGlVersion::WebGl1));
    ctx.resize(0, 64);
    assert_eq!(ctx.drawing_buffer_size(), (1, 64));
    let max = ctx.limits().max_viewport_dims;
    ctx.resize(u32::MAX, u32::MAX);
    assert_eq!(ctx.drawing_buffer_size(), (max[0], max[1]));

    handle.clear();
    ctx.clear(gl::DEPTH_BUFFER_BIT);
    // The implicit clear of the discarded buffer runs first.
    assert_eq!(handle.count(|c| matches!(c, DriverCall::Clear(_))), 2);
}

// ============================================================================
// After Loss
// ============================================================================

#[test]
fn lost_context_turns_calls_into_no_ops() {
    let (mut ctx, handle, _) = context_with_sink(desc(WebGlVersion::WebGl2));
    assert!(ctx.get_extension("WEBGL_lose_context").is_some());
    let buffer = ctx.create_buffer();
    ctx.lose_context_ext();
    handle.clear();

    assert!(ctx.create_buffer().is_none());
    ctx.bind_buffer(gl::ARRAY_BUFFER, buffer);
    ctx.clear(gl::COLOR_BUFFER_BIT);
    assert_eq!(ctx.get_parameter(gl::ARRAY_BUFFER_BINDING), None);
    assert!(ctx.get_context_attributes().is_none());
    assert!(ctx.get_supported_extensions().is_none());
    assert!(ctx.present().is_none());
    assert!(handle.calls().is_empty());

    assert_eq!(ctx.get_error(), GlError::ContextLost);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

#[test]
fn parameters_reflect_bindings() {
    let (mut ctx, _handle, _) = context_with_sink(desc(WebGlVersion::WebGl2));
    let buffer = ctx.create_buffer();
    ctx.bind_buffer(gl::ARRAY_BUFFER, buffer);
    assert_eq!(ctx.get_parameter(gl::ARRAY_BUFFER_BINDING), Some(ParamValue::Buffer(buffer)));
    ctx.delete_buffer(buffer);
    assert_eq!(ctx.get_parameter(gl::ARRAY_BUFFER_BINDING), Some(ParamValue::Buffer(None)));
}
