//! Draw call validation tests
//!
//! Tests for:
//! - Mode, count and program checks
//! - Vertex fetch bounds and index range checks
//! - Attribute 0 emulation on array-attrib-0 drivers
//! - Transform feedback output aliasing
//! - Instancing rules in WebGL 1 and WebGL 2

use std::sync::Arc;

use webgl_core::backend::{ActiveAttrib, Capabilities, LinkInfo};
use webgl_core::gl;
use webgl_core::{
    BufferInit, ContextBuilder, ContextManager, DriverCall, GlError, InitContextDesc, ManualClock, ProgramId,
    RecordingBackend, RecordingHandle, WebGlContext, WebGlVersion,
};

// ============================================================================
// Helpers
// ============================================================================

fn context_with(version: WebGlVersion, capabilities: Capabilities) -> (WebGlContext, RecordingHandle) {
    let backend = RecordingBackend::new(capabilities);
    let handle = backend.handle();
    let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
    let ctx = ContextBuilder::new(InitContextDesc {
        version,
        size: (64, 64),
        ..InitContextDesc::default()
    })
    .manager(manager)
    .build(backend)
    .unwrap();
    (ctx, handle)
}

fn context(version: WebGlVersion) -> (WebGlContext, RecordingHandle) {
    context_with(version, Capabilities::default())
}

/// Links and uses a program reading the given attribute locations.
fn use_program_with_attribs(
    ctx: &mut WebGlContext,
    handle: &RecordingHandle,
    locations: &[u32],
    tf_varyings: &[&str],
) -> ProgramId {
    handle.set_link_result(LinkInfo {
        success: true,
        active_attribs: locations
            .iter()
            .map(|&location| ActiveAttrib {
                name: format!("a{location}"),
                location,
            })
            .collect(),
        ..LinkInfo::default()
    });
    let program = ctx.create_program().unwrap();
    for stage in [gl::VERTEX_SHADER, gl::FRAGMENT_SHADER] {
        let shader = ctx.create_shader(stage).unwrap();
        ctx.shader_source(shader, "void main() {}");
        ctx.compile_shader(shader);
        ctx.attach_shader(program, shader);
    }
    if !tf_varyings.is_empty() {
        ctx.transform_feedback_varyings(program, tf_varyings, gl::INTERLEAVED_ATTRIBS);
    }
    ctx.link_program(program);
    ctx.use_program(Some(program));
    assert_eq!(ctx.get_error(), GlError::NoError);
    program
}

/// Fills a new `ARRAY_BUFFER` with `len` bytes and points attribute 0 at
/// it as tightly packed vec3s.
fn vec3_array(ctx: &mut WebGlContext, len: i64) -> webgl_core::BufferId {
    let buffer = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
    ctx.buffer_data(gl::ARRAY_BUFFER, BufferInit::Size(len), gl::STATIC_DRAW);
    ctx.vertex_attrib_pointer(0, 3, gl::FLOAT, false, 0, 0);
    ctx.enable_vertex_attrib_array(0);
    buffer
}

fn u16_bytes(indices: &[u16]) -> Vec<u8> {
    indices.iter().flat_map(|i| i.to_ne_bytes()).collect()
}

// ============================================================================
// Basic Validation
// ============================================================================

#[test]
fn draw_without_program_is_invalid_operation() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    ctx.draw_arrays(gl::TRIANGLES, 0, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert_eq!(handle.draw_count(), 0);
}

#[test]
fn bad_mode_and_negative_counts() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);

    ctx.draw_arrays(0x1234, 0, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    ctx.draw_arrays(gl::TRIANGLES, -1, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.draw_arrays(gl::TRIANGLES, 0, -3);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    assert_eq!(handle.draw_count(), 0);
}

#[test]
fn empty_draw_succeeds_without_reaching_driver() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    ctx.draw_arrays(gl::TRIANGLES, 0, 0);
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(handle.draw_count(), 0);
}

#[test]
fn vertex_fetch_is_bounded_by_buffer_size() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    // Three vec3 vertices.
    vec3_array(&mut ctx, 36);

    ctx.draw_arrays(gl::TRIANGLES, 0, 3);
    assert_eq!(ctx.get_error(), GlError::NoError);
    ctx.draw_arrays(gl::TRIANGLES, 1, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert_eq!(handle.draw_count(), 1);
}

#[test]
fn unused_attribs_are_not_checked() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);
    // Attribute 1 is enabled with no buffer, but the program never reads it.
    ctx.enable_vertex_attrib_array(1);
    ctx.draw_arrays(gl::TRIANGLES, 0, 3);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

#[test]
fn enabled_attrib_without_buffer_fails() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0, 1], &[]);
    vec3_array(&mut ctx, 36);
    ctx.enable_vertex_attrib_array(1);
    ctx.draw_arrays(gl::TRIANGLES, 0, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

// ============================================================================
// Indexed Draws
// ============================================================================

#[test]
fn index_range_is_checked_against_vertex_buffers() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);

    let indices = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, Some(indices));
    let data = u16_bytes(&[0, 1, 2, 0, 1, 5]);
    ctx.buffer_data(gl::ELEMENT_ARRAY_BUFFER, BufferInit::Data(&data), gl::STATIC_DRAW);

    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_SHORT, 0);
    assert_eq!(ctx.get_error(), GlError::NoError);
    // Index 5 needs six vertices.
    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_SHORT, 6);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    // Misaligned offset.
    ctx.draw_elements(gl::TRIANGLES, 2, gl::UNSIGNED_SHORT, 1);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    // Reads past the end of the element buffer.
    ctx.draw_elements(gl::TRIANGLES, 6, gl::UNSIGNED_SHORT, 2);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert_eq!(handle.draw_count(), 1);
}

#[test]
fn updating_indices_invalidates_the_range_cache() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);

    let indices = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, Some(indices));
    ctx.buffer_data(gl::ELEMENT_ARRAY_BUFFER, BufferInit::Data(&u16_bytes(&[0, 1, 2])), gl::STATIC_DRAW);
    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_SHORT, 0);
    assert_eq!(ctx.get_error(), GlError::NoError);

    ctx.buffer_sub_data(gl::ELEMENT_ARRAY_BUFFER, 4, &u16_bytes(&[9]));
    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_SHORT, 0);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

#[test]
fn uint_indices_need_extension_in_webgl1() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);
    let indices = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, Some(indices));
    let data: Vec<u8> = [0u32, 1, 2].iter().flat_map(|i| i.to_ne_bytes()).collect();
    ctx.buffer_data(gl::ELEMENT_ARRAY_BUFFER, BufferInit::Data(&data), gl::STATIC_DRAW);

    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_INT, 0);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    assert!(ctx.get_extension("OES_element_index_uint").is_some());
    ctx.draw_elements(gl::TRIANGLES, 3, gl::UNSIGNED_INT, 0);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

// ============================================================================
// Attribute 0 Emulation
// ============================================================================

#[test]
fn disabled_attrib0_is_emulated_and_restored() {
    let (mut ctx, handle) = context_with(
        WebGlVersion::WebGl1,
        Capabilities {
            requires_array_attrib0: true,
            ..Capabilities::default()
        },
    );
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    ctx.vertex_attrib_f(0, &[1.0, 2.0, 3.0, 4.0]);
    handle.clear();

    ctx.draw_arrays(gl::POINTS, 0, 5);
    assert_eq!(ctx.get_error(), GlError::NoError);

    let calls = handle.calls();
    let draw_at = calls.iter().position(DriverCall::is_draw).unwrap();
    // Five vertices of four 32-bit components.
    let upload_at = calls
        .iter()
        .position(|c| matches!(c, DriverCall::BufferData { size: 80, .. }))
        .unwrap();
    assert!(upload_at < draw_at);
    assert!(matches!(
        calls[draw_at + 1..]
            .iter()
            .find(|c| matches!(c, DriverCall::EnableVertexAttribArray { index: 0, .. })),
        Some(DriverCall::EnableVertexAttribArray { enabled: false, .. })
    ));

    // Same value and count: the scratch buffer is reused without upload.
    handle.clear();
    ctx.draw_arrays(gl::POINTS, 0, 5);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::BufferData { .. })), 0);
    assert_eq!(handle.draw_count(), 1);
}

#[test]
fn attrib0_is_not_emulated_when_driver_does_not_need_it() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    handle.clear();
    ctx.draw_arrays(gl::POINTS, 0, 5);
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::BufferData { .. })), 0);
}

// ============================================================================
// Instancing
// ============================================================================

#[test]
fn webgl1_instancing_requires_extension_and_per_vertex_attrib() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    vec3_array(&mut ctx, 36);

    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 3, 2);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);

    assert!(ctx.get_extension("ANGLE_instanced_arrays").is_some());
    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 3, 2);
    assert_eq!(ctx.get_error(), GlError::NoError);

    ctx.vertex_attrib_divisor(0, 1);
    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 3, 2);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
}

#[test]
fn instanced_attribs_are_bounded_by_instance_count() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl2);
    use_program_with_attribs(&mut ctx, &handle, &[0], &[]);
    // Two vec3 instances.
    vec3_array(&mut ctx, 24);
    ctx.vertex_attrib_divisor(0, 1);

    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 300, 2);
    assert_eq!(ctx.get_error(), GlError::NoError);
    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 3, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);

    // A divisor of 2 halves the elements needed.
    ctx.vertex_attrib_divisor(0, 2);
    ctx.draw_arrays_instanced(gl::TRIANGLES, 0, 3, 4);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

// ============================================================================
// Transform Feedback
// ============================================================================

#[test]
fn tf_output_may_not_alias_draw_input() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl2);
    use_program_with_attribs(&mut ctx, &handle, &[0], &["v_out"]);
    let shared = vec3_array(&mut ctx, 36);

    ctx.bind_buffer_base(gl::TRANSFORM_FEEDBACK_BUFFER, 0, Some(shared));
    ctx.begin_transform_feedback(gl::POINTS);
    assert_eq!(ctx.get_error(), GlError::NoError);
    ctx.draw_arrays(gl::POINTS, 0, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.end_transform_feedback();

    let output = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::TRANSFORM_FEEDBACK_BUFFER, Some(output));
    ctx.buffer_data(gl::TRANSFORM_FEEDBACK_BUFFER, BufferInit::Size(64), gl::DYNAMIC_DRAW);
    ctx.bind_buffer_base(gl::TRANSFORM_FEEDBACK_BUFFER, 0, Some(output));
    ctx.begin_transform_feedback(gl::POINTS);
    ctx.draw_arrays(gl::POINTS, 0, 3);
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(handle.draw_count(), 1);
}

#[test]
fn tf_mode_must_match_draw_mode() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl2);
    use_program_with_attribs(&mut ctx, &handle, &[0], &["v_out"]);
    vec3_array(&mut ctx, 36);
    let output = ctx.create_buffer().unwrap();
    ctx.bind_buffer(gl::TRANSFORM_FEEDBACK_BUFFER, Some(output));
    ctx.buffer_data(gl::TRANSFORM_FEEDBACK_BUFFER, BufferInit::Size(64), gl::DYNAMIC_DRAW);
    ctx.bind_buffer_base(gl::TRANSFORM_FEEDBACK_BUFFER, 0, Some(output));
    ctx.begin_transform_feedback(gl::TRIANGLES);

    ctx.draw_arrays(gl::POINTS, 0, 3);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.draw_arrays(gl::TRIANGLE_STRIP, 0, 3);
    assert_eq!(ctx.get_error(), GlError::NoError);
}

// ============================================================================
// Clear & Presentation
// ============================================================================

#[test]
fn clear_rejects_unknown_bits() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    ctx.clear(0x8000_0000);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    ctx.clear(gl::COLOR_BUFFER_BIT);
    assert_eq!(ctx.get_error(), GlError::NoError);
    assert_eq!(handle.count(|c| matches!(c, DriverCall::Clear(_))), 1);
}

#[test]
fn present_only_after_drawing() {
    let (mut ctx, _handle) = context(WebGlVersion::WebGl1);
    assert!(ctx.present().is_none());
    ctx.clear(gl::COLOR_BUFFER_BIT);
    let frame = ctx.present().unwrap();
    assert_eq!((frame.width, frame.height), (64, 64));
    assert!(ctx.present().is_none());
}

#[test]
fn first_draw_after_present_clears_the_backbuffer() {
    let (mut ctx, handle) = context(WebGlVersion::WebGl1);
    ctx.clear(gl::COLOR_BUFFER_BIT);
    ctx.present().unwrap();
    handle.clear();

    ctx.clear(gl::DEPTH_BUFFER_BIT);
    // One implicit full clear, then the requested one.
    assert_eq!(handle.count(|c| matches!(c, DriverCall::Clear(_))), 2);
}
