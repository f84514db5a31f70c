//! GL Enumerations
//!
//! The subset of OpenGL ES 2.0/3.0 and WebGL enumerants understood by the
//! validation core. Values match the Khronos registry.

#![allow(missing_docs)]

/// Raw GL enumerant.
pub type GLenum = u32;
/// Raw GL bitfield.
pub type GLbitfield = u32;

// ============================================================================
// Errors
// ============================================================================

pub const NO_ERROR: GLenum = 0;
pub const INVALID_ENUM: GLenum = 0x0500;
pub const INVALID_VALUE: GLenum = 0x0501;
pub const INVALID_OPERATION: GLenum = 0x0502;
pub const OUT_OF_MEMORY: GLenum = 0x0505;
pub const INVALID_FRAMEBUFFER_OPERATION: GLenum = 0x0506;
pub const CONTEXT_LOST_WEBGL: GLenum = 0x9242;

pub const NONE: GLenum = 0;

// ============================================================================
// Buffers
// ============================================================================

pub const ARRAY_BUFFER: GLenum = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const COPY_READ_BUFFER: GLenum = 0x8F36;
pub const COPY_WRITE_BUFFER: GLenum = 0x8F37;
pub const PIXEL_PACK_BUFFER: GLenum = 0x88EB;
pub const PIXEL_UNPACK_BUFFER: GLenum = 0x88EC;
pub const TRANSFORM_FEEDBACK_BUFFER: GLenum = 0x8C8E;
pub const UNIFORM_BUFFER: GLenum = 0x8A11;

pub const ARRAY_BUFFER_BINDING: GLenum = 0x8894;
pub const ELEMENT_ARRAY_BUFFER_BINDING: GLenum = 0x8895;
pub const COPY_READ_BUFFER_BINDING: GLenum = 0x8F36;
pub const COPY_WRITE_BUFFER_BINDING: GLenum = 0x8F37;
pub const PIXEL_PACK_BUFFER_BINDING: GLenum = 0x88ED;
pub const PIXEL_UNPACK_BUFFER_BINDING: GLenum = 0x88EF;
pub const TRANSFORM_FEEDBACK_BUFFER_BINDING: GLenum = 0x8C8F;
pub const TRANSFORM_FEEDBACK_BUFFER_START: GLenum = 0x8C84;
pub const TRANSFORM_FEEDBACK_BUFFER_SIZE: GLenum = 0x8C85;
pub const UNIFORM_BUFFER_BINDING: GLenum = 0x8A28;
pub const UNIFORM_BUFFER_START: GLenum = 0x8A29;
pub const UNIFORM_BUFFER_SIZE: GLenum = 0x8A2A;

pub const STREAM_DRAW: GLenum = 0x88E0;
pub const STREAM_READ: GLenum = 0x88E1;
pub const STREAM_COPY: GLenum = 0x88E2;
pub const STATIC_DRAW: GLenum = 0x88E4;
pub const STATIC_READ: GLenum = 0x88E5;
pub const STATIC_COPY: GLenum = 0x88E6;
pub const DYNAMIC_DRAW: GLenum = 0x88E8;
pub const DYNAMIC_READ: GLenum = 0x88E9;
pub const DYNAMIC_COPY: GLenum = 0x88EA;

pub const BUFFER_SIZE: GLenum = 0x8764;
pub const BUFFER_USAGE: GLenum = 0x8765;

// ============================================================================
// Primitives & Data Types
// ============================================================================

pub const POINTS: GLenum = 0x0000;
pub const LINES: GLenum = 0x0001;
pub const LINE_LOOP: GLenum = 0x0002;
pub const LINE_STRIP: GLenum = 0x0003;
pub const TRIANGLES: GLenum = 0x0004;
pub const TRIANGLE_STRIP: GLenum = 0x0005;
pub const TRIANGLE_FAN: GLenum = 0x0006;

pub const BYTE: GLenum = 0x1400;
pub const UNSIGNED_BYTE: GLenum = 0x1401;
pub const SHORT: GLenum = 0x1402;
pub const UNSIGNED_SHORT: GLenum = 0x1403;
pub const INT: GLenum = 0x1404;
pub const UNSIGNED_INT: GLenum = 0x1405;
pub const FLOAT: GLenum = 0x1406;
pub const HALF_FLOAT: GLenum = 0x140B;
pub const HALF_FLOAT_OES: GLenum = 0x8D61;
pub const UNSIGNED_SHORT_4_4_4_4: GLenum = 0x8033;
pub const UNSIGNED_SHORT_5_5_5_1: GLenum = 0x8034;
pub const UNSIGNED_SHORT_5_6_5: GLenum = 0x8363;
pub const UNSIGNED_INT_2_10_10_10_REV: GLenum = 0x8368;
pub const INT_2_10_10_10_REV: GLenum = 0x8D9F;
pub const UNSIGNED_INT_24_8: GLenum = 0x84FA;

// ============================================================================
// Pixel Formats
// ============================================================================

pub const DEPTH_COMPONENT: GLenum = 0x1902;
pub const RED: GLenum = 0x1903;
pub const ALPHA: GLenum = 0x1906;
pub const RGB: GLenum = 0x1907;
pub const RGBA: GLenum = 0x1908;
pub const LUMINANCE: GLenum = 0x1909;
pub const LUMINANCE_ALPHA: GLenum = 0x190A;
pub const RG: GLenum = 0x8227;
pub const DEPTH_STENCIL: GLenum = 0x84F9;
pub const RED_INTEGER: GLenum = 0x8D94;
pub const RGBA_INTEGER: GLenum = 0x8D99;

pub const R8: GLenum = 0x8229;
pub const RG8: GLenum = 0x822B;
pub const RGB8: GLenum = 0x8051;
pub const RGBA8: GLenum = 0x8058;
pub const SRGB8_ALPHA8: GLenum = 0x8C43;
pub const RGBA4: GLenum = 0x8056;
pub const RGB5_A1: GLenum = 0x8057;
pub const RGB565: GLenum = 0x8D62;
pub const R16F: GLenum = 0x822D;
pub const R32F: GLenum = 0x822E;
pub const RGBA16F: GLenum = 0x881A;
pub const RGB16F: GLenum = 0x881B;
pub const RGBA32F: GLenum = 0x8814;
pub const RGB32F: GLenum = 0x8815;
pub const R8UI: GLenum = 0x8232;
pub const RGBA8UI: GLenum = 0x8D7C;
pub const DEPTH_COMPONENT16: GLenum = 0x81A5;
pub const DEPTH_COMPONENT24: GLenum = 0x81A6;
pub const DEPTH24_STENCIL8: GLenum = 0x88F0;
pub const STENCIL_INDEX8: GLenum = 0x8D48;
pub const DEPTH_COMPONENT32F: GLenum = 0x8CAC;

// ============================================================================
// Textures
// ============================================================================

pub const TEXTURE_2D: GLenum = 0x0DE1;
pub const TEXTURE_3D: GLenum = 0x806F;
pub const TEXTURE_2D_ARRAY: GLenum = 0x8C1A;
pub const TEXTURE_CUBE_MAP: GLenum = 0x8513;
pub const TEXTURE_CUBE_MAP_POSITIVE_X: GLenum = 0x8515;
pub const TEXTURE_CUBE_MAP_NEGATIVE_X: GLenum = 0x8516;
pub const TEXTURE_CUBE_MAP_POSITIVE_Y: GLenum = 0x8517;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Y: GLenum = 0x8518;
pub const TEXTURE_CUBE_MAP_POSITIVE_Z: GLenum = 0x8519;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Z: GLenum = 0x851A;

pub const TEXTURE0: GLenum = 0x84C0;
pub const ACTIVE_TEXTURE: GLenum = 0x84E0;
pub const TEXTURE_BINDING_2D: GLenum = 0x8069;
pub const TEXTURE_BINDING_3D: GLenum = 0x806A;
pub const TEXTURE_BINDING_2D_ARRAY: GLenum = 0x8C1D;
pub const TEXTURE_BINDING_CUBE_MAP: GLenum = 0x8514;
pub const SAMPLER_BINDING: GLenum = 0x8919;
pub const TEXTURE_IMMUTABLE_FORMAT: GLenum = 0x912F;
pub const TEXTURE_IMMUTABLE_LEVELS: GLenum = 0x82DF;

// ============================================================================
// Framebuffers
// ============================================================================

pub const FRAMEBUFFER: GLenum = 0x8D40;
pub const READ_FRAMEBUFFER: GLenum = 0x8CA8;
pub const DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
pub const RENDERBUFFER: GLenum = 0x8D41;
pub const FRAMEBUFFER_BINDING: GLenum = 0x8CA6;
pub const READ_FRAMEBUFFER_BINDING: GLenum = 0x8CAA;
pub const RENDERBUFFER_BINDING: GLenum = 0x8CA7;

pub const COLOR_ATTACHMENT0: GLenum = 0x8CE0;
pub const DEPTH_ATTACHMENT: GLenum = 0x8D00;
pub const STENCIL_ATTACHMENT: GLenum = 0x8D20;
pub const DEPTH_STENCIL_ATTACHMENT: GLenum = 0x821A;

pub const FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;
pub const FRAMEBUFFER_INCOMPLETE_ATTACHMENT: GLenum = 0x8CD6;
pub const FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: GLenum = 0x8CD7;
pub const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: GLenum = 0x8CD9;
pub const FRAMEBUFFER_UNSUPPORTED: GLenum = 0x8CDD;
pub const FRAMEBUFFER_INCOMPLETE_MULTISAMPLE: GLenum = 0x8D56;

pub const COLOR_BUFFER_BIT: GLbitfield = 0x0000_4000;
pub const DEPTH_BUFFER_BIT: GLbitfield = 0x0000_0100;
pub const STENCIL_BUFFER_BIT: GLbitfield = 0x0000_0400;

// ============================================================================
// Programs & Shaders
// ============================================================================

pub const FRAGMENT_SHADER: GLenum = 0x8B30;
pub const VERTEX_SHADER: GLenum = 0x8B31;
pub const CURRENT_PROGRAM: GLenum = 0x8B8D;
pub const SHADER_TYPE: GLenum = 0x8B4F;
pub const DELETE_STATUS: GLenum = 0x8B80;
pub const COMPILE_STATUS: GLenum = 0x8B81;
pub const LINK_STATUS: GLenum = 0x8B82;
pub const ATTACHED_SHADERS: GLenum = 0x8B85;
pub const ACTIVE_ATTRIBUTES: GLenum = 0x8B89;
pub const ACTIVE_UNIFORM_BLOCKS: GLenum = 0x8A36;
pub const TRANSFORM_FEEDBACK_BUFFER_MODE: GLenum = 0x8C7F;
pub const TRANSFORM_FEEDBACK_VARYINGS: GLenum = 0x8C83;
pub const INVALID_INDEX: GLenum = 0xFFFF_FFFF;

// ============================================================================
// Capabilities
// ============================================================================

pub const BLEND: GLenum = 0x0BE2;
pub const CULL_FACE: GLenum = 0x0B44;
pub const DEPTH_TEST: GLenum = 0x0B71;
pub const DITHER: GLenum = 0x0BD0;
pub const POLYGON_OFFSET_FILL: GLenum = 0x8037;
pub const SAMPLE_ALPHA_TO_COVERAGE: GLenum = 0x809E;
pub const SAMPLE_COVERAGE: GLenum = 0x80A0;
pub const SCISSOR_TEST: GLenum = 0x0C11;
pub const STENCIL_TEST: GLenum = 0x0B90;
pub const RASTERIZER_DISCARD: GLenum = 0x8C89;

// ============================================================================
// Fixed-function State
// ============================================================================

pub const SCISSOR_BOX: GLenum = 0x0C10;
pub const VIEWPORT: GLenum = 0x0BA2;
pub const BLEND_COLOR: GLenum = 0x8005;
pub const BLEND_EQUATION_RGB: GLenum = 0x8009;
pub const BLEND_EQUATION_ALPHA: GLenum = 0x883D;
pub const BLEND_SRC_RGB: GLenum = 0x80C9;
pub const BLEND_DST_RGB: GLenum = 0x80C8;
pub const BLEND_SRC_ALPHA: GLenum = 0x80CB;
pub const BLEND_DST_ALPHA: GLenum = 0x80CA;
pub const COLOR_WRITEMASK: GLenum = 0x0C23;
pub const DEPTH_WRITEMASK: GLenum = 0x0B72;
pub const COLOR_CLEAR_VALUE: GLenum = 0x0C22;
pub const DEPTH_CLEAR_VALUE: GLenum = 0x0B73;
pub const STENCIL_CLEAR_VALUE: GLenum = 0x0B91;
pub const LINE_WIDTH: GLenum = 0x0B21;
pub const DEPTH_FUNC: GLenum = 0x0B74;
pub const DEPTH_RANGE: GLenum = 0x0B70;
pub const CULL_FACE_MODE: GLenum = 0x0B45;
pub const FRONT_FACE: GLenum = 0x0B46;
pub const GENERATE_MIPMAP_HINT: GLenum = 0x8192;
pub const FRAGMENT_SHADER_DERIVATIVE_HINT: GLenum = 0x8B8B;
pub const POLYGON_OFFSET_FACTOR: GLenum = 0x8038;
pub const POLYGON_OFFSET_UNITS: GLenum = 0x2A00;
pub const SAMPLE_COVERAGE_VALUE: GLenum = 0x80AA;
pub const SAMPLE_COVERAGE_INVERT: GLenum = 0x80AB;

pub const STENCIL_FUNC: GLenum = 0x0B92;
pub const STENCIL_VALUE_MASK: GLenum = 0x0B93;
pub const STENCIL_FAIL: GLenum = 0x0B94;
pub const STENCIL_PASS_DEPTH_FAIL: GLenum = 0x0B95;
pub const STENCIL_PASS_DEPTH_PASS: GLenum = 0x0B96;
pub const STENCIL_REF: GLenum = 0x0B97;
pub const STENCIL_WRITEMASK: GLenum = 0x0B98;
pub const STENCIL_BACK_FUNC: GLenum = 0x8800;
pub const STENCIL_BACK_FAIL: GLenum = 0x8801;
pub const STENCIL_BACK_PASS_DEPTH_FAIL: GLenum = 0x8802;
pub const STENCIL_BACK_PASS_DEPTH_PASS: GLenum = 0x8803;
pub const STENCIL_BACK_REF: GLenum = 0x8CA3;
pub const STENCIL_BACK_VALUE_MASK: GLenum = 0x8CA4;
pub const STENCIL_BACK_WRITEMASK: GLenum = 0x8CA5;

pub const FUNC_ADD: GLenum = 0x8006;
pub const MIN: GLenum = 0x8007;
pub const MAX: GLenum = 0x8008;
pub const FUNC_SUBTRACT: GLenum = 0x800A;
pub const FUNC_REVERSE_SUBTRACT: GLenum = 0x800B;

pub const ZERO: GLenum = 0;
pub const ONE: GLenum = 1;
pub const SRC_COLOR: GLenum = 0x0300;
pub const ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
pub const SRC_ALPHA: GLenum = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
pub const DST_ALPHA: GLenum = 0x0304;
pub const ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
pub const DST_COLOR: GLenum = 0x0306;
pub const ONE_MINUS_DST_COLOR: GLenum = 0x0307;
pub const SRC_ALPHA_SATURATE: GLenum = 0x0308;
pub const CONSTANT_COLOR: GLenum = 0x8001;
pub const ONE_MINUS_CONSTANT_COLOR: GLenum = 0x8002;
pub const CONSTANT_ALPHA: GLenum = 0x8003;
pub const ONE_MINUS_CONSTANT_ALPHA: GLenum = 0x8004;

pub const NEVER: GLenum = 0x0200;
pub const LESS: GLenum = 0x0201;
pub const EQUAL: GLenum = 0x0202;
pub const LEQUAL: GLenum = 0x0203;
pub const GREATER: GLenum = 0x0204;
pub const NOTEQUAL: GLenum = 0x0205;
pub const GEQUAL: GLenum = 0x0206;
pub const ALWAYS: GLenum = 0x0207;

pub const KEEP: GLenum = 0x1E00;
pub const REPLACE: GLenum = 0x1E01;
pub const INCR: GLenum = 0x1E02;
pub const DECR: GLenum = 0x1E03;
pub const INVERT: GLenum = 0x150A;
pub const INCR_WRAP: GLenum = 0x8507;
pub const DECR_WRAP: GLenum = 0x8508;

pub const FRONT: GLenum = 0x0404;
pub const BACK: GLenum = 0x0405;
pub const FRONT_AND_BACK: GLenum = 0x0408;
pub const CW: GLenum = 0x0900;
pub const CCW: GLenum = 0x0901;

pub const DONT_CARE: GLenum = 0x1100;
pub const FASTEST: GLenum = 0x1101;
pub const NICEST: GLenum = 0x1102;

// ============================================================================
// Pixel Store
// ============================================================================

pub const UNPACK_ROW_LENGTH: GLenum = 0x0CF2;
pub const UNPACK_SKIP_ROWS: GLenum = 0x0CF3;
pub const UNPACK_SKIP_PIXELS: GLenum = 0x0CF4;
pub const UNPACK_ALIGNMENT: GLenum = 0x0CF5;
pub const PACK_ROW_LENGTH: GLenum = 0x0D02;
pub const PACK_SKIP_ROWS: GLenum = 0x0D03;
pub const PACK_SKIP_PIXELS: GLenum = 0x0D04;
pub const PACK_ALIGNMENT: GLenum = 0x0D05;
pub const UNPACK_SKIP_IMAGES: GLenum = 0x806D;
pub const UNPACK_IMAGE_HEIGHT: GLenum = 0x806E;
pub const UNPACK_FLIP_Y_WEBGL: GLenum = 0x9240;
pub const UNPACK_PREMULTIPLY_ALPHA_WEBGL: GLenum = 0x9241;
pub const UNPACK_COLORSPACE_CONVERSION_WEBGL: GLenum = 0x9243;
pub const BROWSER_DEFAULT_WEBGL: GLenum = 0x9244;
/// Debug-only pixel-store switch: fail uploads that miss the fast path.
pub const UNPACK_REQUIRE_FASTPATH: GLenum = 0x10001;

// ============================================================================
// Limits & Strings
// ============================================================================

pub const STENCIL_BITS: GLenum = 0x0D57;
pub const MAX_TEXTURE_SIZE: GLenum = 0x0D33;
pub const MAX_VIEWPORT_DIMS: GLenum = 0x0D3A;
pub const MAX_3D_TEXTURE_SIZE: GLenum = 0x8073;
pub const MAX_CUBE_MAP_TEXTURE_SIZE: GLenum = 0x851C;
pub const MAX_RENDERBUFFER_SIZE: GLenum = 0x84E8;
pub const MAX_ARRAY_TEXTURE_LAYERS: GLenum = 0x88FF;
pub const MAX_VERTEX_ATTRIBS: GLenum = 0x8869;
pub const MAX_COMBINED_TEXTURE_IMAGE_UNITS: GLenum = 0x8B4D;
pub const MAX_DRAW_BUFFERS: GLenum = 0x8824;
pub const MAX_COLOR_ATTACHMENTS: GLenum = 0x8CDF;
pub const MAX_SAMPLES: GLenum = 0x8D57;
pub const MAX_UNIFORM_BUFFER_BINDINGS: GLenum = 0x8A2F;
pub const MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS: GLenum = 0x8C8B;
pub const UNIFORM_BUFFER_OFFSET_ALIGNMENT: GLenum = 0x8A34;
pub const MAX_CLIENT_WAIT_TIMEOUT_WEBGL: GLenum = 0x9247;

pub const VENDOR: GLenum = 0x1F00;
pub const RENDERER: GLenum = 0x1F01;
pub const VERSION: GLenum = 0x1F02;
pub const SHADING_LANGUAGE_VERSION: GLenum = 0x8B8C;
pub const UNMASKED_VENDOR_WEBGL: GLenum = 0x9245;
pub const UNMASKED_RENDERER_WEBGL: GLenum = 0x9246;

// ============================================================================
// Vertex Attributes & Vertex Arrays
// ============================================================================

pub const VERTEX_ATTRIB_ARRAY_ENABLED: GLenum = 0x8622;
pub const VERTEX_ATTRIB_ARRAY_SIZE: GLenum = 0x8623;
pub const VERTEX_ATTRIB_ARRAY_STRIDE: GLenum = 0x8624;
pub const VERTEX_ATTRIB_ARRAY_TYPE: GLenum = 0x8625;
pub const CURRENT_VERTEX_ATTRIB: GLenum = 0x8626;
pub const VERTEX_ATTRIB_ARRAY_NORMALIZED: GLenum = 0x886A;
pub const VERTEX_ATTRIB_ARRAY_BUFFER_BINDING: GLenum = 0x889F;
pub const VERTEX_ATTRIB_ARRAY_INTEGER: GLenum = 0x88FD;
pub const VERTEX_ATTRIB_ARRAY_DIVISOR: GLenum = 0x88FE;
pub const VERTEX_ARRAY_BINDING: GLenum = 0x85B5;

// ============================================================================
// Queries, Transform Feedback & Sync
// ============================================================================

pub const CURRENT_QUERY: GLenum = 0x8865;
pub const QUERY_RESULT: GLenum = 0x8866;
pub const QUERY_RESULT_AVAILABLE: GLenum = 0x8867;
pub const ANY_SAMPLES_PASSED: GLenum = 0x8C2F;
pub const ANY_SAMPLES_PASSED_CONSERVATIVE: GLenum = 0x8D6A;
pub const TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN: GLenum = 0x8C88;

pub const TRANSFORM_FEEDBACK: GLenum = 0x8E22;
pub const TRANSFORM_FEEDBACK_PAUSED: GLenum = 0x8E23;
pub const TRANSFORM_FEEDBACK_ACTIVE: GLenum = 0x8E24;
pub const TRANSFORM_FEEDBACK_BINDING: GLenum = 0x8E25;
pub const INTERLEAVED_ATTRIBS: GLenum = 0x8C8C;
pub const SEPARATE_ATTRIBS: GLenum = 0x8C8D;

pub const SYNC_GPU_COMMANDS_COMPLETE: GLenum = 0x9117;
pub const SYNC_FLUSH_COMMANDS_BIT: GLbitfield = 0x0000_0001;
pub const OBJECT_TYPE: GLenum = 0x9112;
pub const SYNC_CONDITION: GLenum = 0x9113;
pub const SYNC_STATUS: GLenum = 0x9114;
pub const SYNC_FLAGS: GLenum = 0x9115;
pub const SYNC_FENCE: GLenum = 0x9116;
pub const UNSIGNALED: GLenum = 0x9118;
pub const SIGNALED: GLenum = 0x9119;
pub const ALREADY_SIGNALED: GLenum = 0x911A;
pub const TIMEOUT_EXPIRED: GLenum = 0x911B;
pub const CONDITION_SATISFIED: GLenum = 0x911C;
pub const WAIT_FAILED: GLenum = 0x911D;

/// Returns `value` rounded up to the next multiple of `multiple`.
#[inline]
#[must_use]
pub fn round_up_to_multiple_of(value: u64, multiple: u64) -> Option<u64> {
    if multiple == 0 {
        return Some(value);
    }
    value
        .checked_add(multiple - 1)
        .map(|v| (v / multiple) * multiple)
}

/// Byte size of a component type. Packed types report the size of the
/// whole packed value.
#[must_use]
pub fn type_byte_size(ty: GLenum) -> Option<u32> {
    Some(match ty {
        BYTE | UNSIGNED_BYTE => 1,
        SHORT
        | UNSIGNED_SHORT
        | HALF_FLOAT
        | HALF_FLOAT_OES
        | UNSIGNED_SHORT_4_4_4_4
        | UNSIGNED_SHORT_5_5_5_1
        | UNSIGNED_SHORT_5_6_5 => 2,
        INT | UNSIGNED_INT | FLOAT | INT_2_10_10_10_REV | UNSIGNED_INT_2_10_10_10_REV | UNSIGNED_INT_24_8 => 4,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_handles_exact_multiples() {
        assert_eq!(round_up_to_multiple_of(8, 4), Some(8));
        assert_eq!(round_up_to_multiple_of(9, 4), Some(12));
        assert_eq!(round_up_to_multiple_of(0, 8), Some(0));
    }

    #[test]
    fn packed_types_report_the_whole_value() {
        assert_eq!(type_byte_size(UNSIGNED_SHORT_4_4_4_4), Some(2));
        assert_eq!(type_byte_size(UNSIGNED_SHORT_5_5_5_1), Some(2));
        assert_eq!(type_byte_size(UNSIGNED_SHORT_5_6_5), Some(2));
        assert_eq!(type_byte_size(UNSIGNED_INT_24_8), Some(4));
    }

    #[test]
    fn round_up_detects_overflow() {
        assert_eq!(round_up_to_multiple_of(u64::MAX, 8), None);
    }
}
