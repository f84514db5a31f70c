//! Fixed-function State Tracker
//!
//! Mirrors every piece of driver state that scripts can query, so that
//! `getParameter` never round-trips to the driver and draw validation can
//! inspect the state directly.

use bitflags::bitflags;
use glam::{Vec2, Vec4};

use super::{Failure, Validated, WebGlContext};
use crate::gl::{self, GLenum};

bitflags! {
    /// Toggled capabilities (`enable` / `disable`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnabledCaps: u16 {
        const BLEND = 1 << 0;
        const CULL_FACE = 1 << 1;
        const DEPTH_TEST = 1 << 2;
        const DITHER = 1 << 3;
        const POLYGON_OFFSET_FILL = 1 << 4;
        const SAMPLE_ALPHA_TO_COVERAGE = 1 << 5;
        const SAMPLE_COVERAGE = 1 << 6;
        const SCISSOR_TEST = 1 << 7;
        const STENCIL_TEST = 1 << 8;
        const RASTERIZER_DISCARD = 1 << 9;
    }
}

impl EnabledCaps {
    #[must_use]
    pub fn from_gl(cap: GLenum, webgl2: bool) -> Option<Self> {
        Some(match cap {
            gl::BLEND => Self::BLEND,
            gl::CULL_FACE => Self::CULL_FACE,
            gl::DEPTH_TEST => Self::DEPTH_TEST,
            gl::DITHER => Self::DITHER,
            gl::POLYGON_OFFSET_FILL => Self::POLYGON_OFFSET_FILL,
            gl::SAMPLE_ALPHA_TO_COVERAGE => Self::SAMPLE_ALPHA_TO_COVERAGE,
            gl::SAMPLE_COVERAGE => Self::SAMPLE_COVERAGE,
            gl::SCISSOR_TEST => Self::SCISSOR_TEST,
            gl::STENCIL_TEST => Self::STENCIL_TEST,
            gl::RASTERIZER_DISCARD if webgl2 => Self::RASTERIZER_DISCARD,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFace {
    pub func: GLenum,
    pub reference: i32,
    pub value_mask: u32,
    pub write_mask: u32,
    pub fail: GLenum,
    pub depth_fail: GLenum,
    pub depth_pass: GLenum,
}

impl Default for StencilFace {
    fn default() -> Self {
        Self {
            func: gl::ALWAYS,
            reference: 0,
            value_mask: u32::MAX,
            write_mask: u32::MAX,
            fail: gl::KEEP,
            depth_fail: gl::KEEP,
            depth_pass: gl::KEEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub color: Vec4,
    pub equation_rgb: GLenum,
    pub equation_alpha: GLenum,
    pub src_rgb: GLenum,
    pub dst_rgb: GLenum,
    pub src_alpha: GLenum,
    pub dst_alpha: GLenum,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            color: Vec4::ZERO,
            equation_rgb: gl::FUNC_ADD,
            equation_alpha: gl::FUNC_ADD,
            src_rgb: gl::ONE,
            dst_rgb: gl::ZERO,
            src_alpha: gl::ONE,
            dst_alpha: gl::ZERO,
        }
    }
}

/// Pixel store parameters (`pixelStorei`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelStore {
    pub unpack_alignment: u32,
    pub unpack_row_length: u32,
    pub unpack_image_height: u32,
    pub unpack_skip_pixels: u32,
    pub unpack_skip_rows: u32,
    pub unpack_skip_images: u32,
    pub pack_alignment: u32,
    pub pack_row_length: u32,
    pub pack_skip_pixels: u32,
    pub pack_skip_rows: u32,
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub colorspace_conversion: GLenum,
    /// Debug switch: uploads that miss the fast path fail instead of
    /// silently converting.
    pub require_fast_path: bool,
}

impl Default for PixelStore {
    fn default() -> Self {
        Self {
            unpack_alignment: 4,
            unpack_row_length: 0,
            unpack_image_height: 0,
            unpack_skip_pixels: 0,
            unpack_skip_rows: 0,
            unpack_skip_images: 0,
            pack_alignment: 4,
            pack_row_length: 0,
            pack_skip_pixels: 0,
            pack_skip_rows: 0,
            flip_y: false,
            premultiply_alpha: false,
            colorspace_conversion: gl::BROWSER_DEFAULT_WEBGL,
            require_fast_path: false,
        }
    }
}

/// Client-side mirror of the driver's fixed-function state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTracker {
    pub caps: EnabledCaps,
    pub scissor: [i32; 4],
    pub viewport: [i32; 4],
    pub blend: BlendState,
    pub stencil_front: StencilFace,
    pub stencil_back: StencilFace,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub line_width: f32,
    pub depth_func: GLenum,
    pub depth_range: Vec2,
    pub cull_face_mode: GLenum,
    pub front_face: GLenum,
    pub generate_mipmap_hint: GLenum,
    pub derivative_hint: GLenum,
    pub polygon_offset: Vec2,
    pub sample_coverage_value: f32,
    pub sample_coverage_invert: bool,
    pub pixel_store: PixelStore,
}

impl StateTracker {
    /// Initial state for a drawing buffer of `width` x `height`.
    #[must_use]
    pub fn new(width: u32, height: u32, require_fast_path: bool) -> Self {
        let rect = [0, 0, width as i32, height as i32];
        Self {
            caps: EnabledCaps::DITHER,
            scissor: rect,
            viewport: rect,
            blend: BlendState::default(),
            stencil_front: StencilFace::default(),
            stencil_back: StencilFace::default(),
            color_mask: [true; 4],
            depth_mask: true,
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            clear_stencil: 0,
            line_width: 1.0,
            depth_func: gl::LESS,
            depth_range: Vec2::new(0.0, 1.0),
            cull_face_mode: gl::BACK,
            front_face: gl::CCW,
            generate_mipmap_hint: gl::DONT_CARE,
            derivative_hint: gl::DONT_CARE,
            polygon_offset: Vec2::ZERO,
            sample_coverage_value: 1.0,
            sample_coverage_invert: false,
            pixel_store: PixelStore {
                require_fast_path,
                ..PixelStore::default()
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self, cap: EnabledCaps) -> bool {
        self.caps.contains(cap)
    }

    /// Front and back stencil state agree on the bits a draw would use.
    #[must_use]
    pub fn stencil_faces_consistent(&self, stencil_bits: u32) -> bool {
        let max = if stencil_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << stencil_bits) - 1
        };
        let clamp_ref = |r: i32| (r.max(0) as u32).min(max);
        let (front, back) = (&self.stencil_front, &self.stencil_back);
        clamp_ref(front.reference) == clamp_ref(back.reference)
            && (front.value_mask & max) == (back.value_mask & max)
            && (front.write_mask & max) == (back.write_mask & max)
    }
}

/// A fixed-function state change forwarded to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum StateCall {
    Scissor([i32; 4]),
    Viewport([i32; 4]),
    BlendColor(Vec4),
    BlendEquation { rgb: GLenum, alpha: GLenum },
    BlendFunc {
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    },
    StencilFunc {
        face: GLenum,
        func: GLenum,
        reference: i32,
        mask: u32,
    },
    StencilOp {
        face: GLenum,
        fail: GLenum,
        depth_fail: GLenum,
        depth_pass: GLenum,
    },
    StencilMask { face: GLenum, mask: u32 },
    ColorMask([bool; 4]),
    DepthMask(bool),
    ClearColor(Vec4),
    ClearDepth(f32),
    ClearStencil(i32),
    LineWidth(f32),
    DepthFunc(GLenum),
    DepthRange(Vec2),
    CullFace(GLenum),
    FrontFace(GLenum),
    Hint { target: GLenum, mode: GLenum },
    PolygonOffset(Vec2),
    SampleCoverage { value: f32, invert: bool },
}

// ============================================================================
// Enum Validation
// ============================================================================

fn is_compare_func(func: GLenum) -> bool {
    (gl::NEVER..=gl::ALWAYS).contains(&func)
}

fn is_stencil_op(op: GLenum) -> bool {
    matches!(
        op,
        gl::ZERO | gl::KEEP | gl::REPLACE | gl::INCR | gl::DECR | gl::INVERT | gl::INCR_WRAP | gl::DECR_WRAP
    )
}

fn is_face(face: GLenum) -> bool {
    matches!(face, gl::FRONT | gl::BACK | gl::FRONT_AND_BACK)
}

fn is_blend_factor(factor: GLenum) -> bool {
    matches!(
        factor,
        gl::ZERO
            | gl::ONE
            | gl::SRC_COLOR
            | gl::ONE_MINUS_SRC_COLOR
            | gl::SRC_ALPHA
            | gl::ONE_MINUS_SRC_ALPHA
            | gl::DST_ALPHA
            | gl::ONE_MINUS_DST_ALPHA
            | gl::DST_COLOR
            | gl::ONE_MINUS_DST_COLOR
            | gl::SRC_ALPHA_SATURATE
            | gl::CONSTANT_COLOR
            | gl::ONE_MINUS_CONSTANT_COLOR
            | gl::CONSTANT_ALPHA
            | gl::ONE_MINUS_CONSTANT_ALPHA
    )
}

fn is_constant_color(factor: GLenum) -> bool {
    matches!(factor, gl::CONSTANT_COLOR | gl::ONE_MINUS_CONSTANT_COLOR)
}

fn is_constant_alpha(factor: GLenum) -> bool {
    matches!(factor, gl::CONSTANT_ALPHA | gl::ONE_MINUS_CONSTANT_ALPHA)
}

fn non_negative(value: i32, what: &str) -> Validated<u32> {
    u32::try_from(value).map_err(|_| Failure::invalid_value(format!("`{what}` must be >= 0.")))
}

// ============================================================================
// Setters
// ============================================================================

impl WebGlContext {
    fn validate_blend_equation(&self, mode: GLenum) -> Validated<()> {
        match mode {
            gl::FUNC_ADD | gl::FUNC_SUBTRACT | gl::FUNC_REVERSE_SUBTRACT => Ok(()),
            gl::MIN | gl::MAX if self.version.is_webgl2() => Ok(()),
            _ => Err(Failure::invalid_enum(format!("Bad blend equation: 0x{mode:04x}"))),
        }
    }

    fn validate_blend_factors(&self, src: GLenum, dst: GLenum) -> Validated<()> {
        if !is_blend_factor(src) || !is_blend_factor(dst) {
            return Err(Failure::invalid_enum("Bad blend factor."));
        }
        if dst == gl::SRC_ALPHA_SATURATE && !self.version.is_webgl2() {
            return Err(Failure::invalid_enum("SRC_ALPHA_SATURATE is only valid as a source factor."));
        }
        if (is_constant_color(src) && is_constant_alpha(dst))
            || (is_constant_alpha(src) && is_constant_color(dst))
        {
            return Err(Failure::invalid_operation(
                "Constant color and constant alpha cannot be used together.",
            ));
        }
        Ok(())
    }

    fn set_state(&mut self, call: StateCall) {
        self.backend.set_state(&call);
    }

    pub fn enable(&mut self, cap: GLenum) {
        self.set_enabled("enable", cap, true);
    }

    pub fn disable(&mut self, cap: GLenum) {
        self.set_enabled("disable", cap, false);
    }

    fn set_enabled(&mut self, func: &'static str, cap: GLenum, enabled: bool) {
        self.run(func, |ctx| {
            let flag = EnabledCaps::from_gl(cap, ctx.version.is_webgl2())
                .ok_or_else(|| Failure::invalid_enum(format!("Bad capability: 0x{cap:04x}")))?;
            if ctx.state.caps.contains(flag) != enabled {
                ctx.state.caps.set(flag, enabled);
                ctx.backend.set_capability(cap, enabled);
            }
            Ok(())
        });
    }

    pub fn is_enabled(&mut self, cap: GLenum) -> bool {
        self.run("isEnabled", |ctx| {
            let flag = EnabledCaps::from_gl(cap, ctx.version.is_webgl2())
                .ok_or_else(|| Failure::invalid_enum(format!("Bad capability: 0x{cap:04x}")))?;
            Ok(ctx.state.is_enabled(flag))
        })
        .unwrap_or(false)
    }

    pub fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.run("scissor", |ctx| {
            non_negative(width, "width")?;
            non_negative(height, "height")?;
            let rect = [x, y, width, height];
            ctx.state.scissor = rect;
            ctx.set_state(StateCall::Scissor(rect));
            Ok(())
        });
    }

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.run("viewport", |ctx| {
            let width = non_negative(width, "width")?.min(ctx.limits.max_viewport_dims[0]);
            let height = non_negative(height, "height")?.min(ctx.limits.max_viewport_dims[1]);
            let rect = [x, y, width as i32, height as i32];
            ctx.state.viewport = rect;
            ctx.set_state(StateCall::Viewport(rect));
            Ok(())
        });
    }

    pub fn blend_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.run("blendColor", |ctx| {
            let color = Vec4::new(r, g, b, a);
            ctx.state.blend.color = color;
            ctx.set_state(StateCall::BlendColor(color));
            Ok(())
        });
    }

    pub fn blend_equation(&mut self, mode: GLenum) {
        self.blend_equation_separate_impl("blendEquation", mode, mode);
    }

    pub fn blend_equation_separate(&mut self, rgb: GLenum, alpha: GLenum) {
        self.blend_equation_separate_impl("blendEquationSeparate", rgb, alpha);
    }

    fn blend_equation_separate_impl(&mut self, func: &'static str, rgb: GLenum, alpha: GLenum) {
        self.run(func, |ctx| {
            ctx.validate_blend_equation(rgb)?;
            ctx.validate_blend_equation(alpha)?;
            ctx.state.blend.equation_rgb = rgb;
            ctx.state.blend.equation_alpha = alpha;
            ctx.set_state(StateCall::BlendEquation { rgb, alpha });
            Ok(())
        });
    }

    pub fn blend_func(&mut self, src: GLenum, dst: GLenum) {
        self.blend_func_separate_impl("blendFunc", src, dst, src, dst);
    }

    pub fn blend_func_separate(&mut self, src_rgb: GLenum, dst_rgb: GLenum, src_alpha: GLenum, dst_alpha: GLenum) {
        self.blend_func_separate_impl("blendFuncSeparate", src_rgb, dst_rgb, src_alpha, dst_alpha);
    }

    fn blend_func_separate_impl(
        &mut self,
        func: &'static str,
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_alpha: GLenum,
        dst_alpha: GLenum,
    ) {
        self.run(func, |ctx| {
            ctx.validate_blend_factors(src_rgb, dst_rgb)?;
            ctx.validate_blend_factors(src_alpha, dst_alpha)?;
            let blend = &mut ctx.state.blend;
            blend.src_rgb = src_rgb;
            blend.dst_rgb = dst_rgb;
            blend.src_alpha = src_alpha;
            blend.dst_alpha = dst_alpha;
            ctx.set_state(StateCall::BlendFunc {
                src_rgb,
                dst_rgb,
                src_alpha,
                dst_alpha,
            });
            Ok(())
        });
    }

    fn stencil_faces_mut(&mut self, face: GLenum) -> impl Iterator<Item = &mut StencilFace> {
        let front = matches!(face, gl::FRONT | gl::FRONT_AND_BACK);
        let back = matches!(face, gl::BACK | gl::FRONT_AND_BACK);
        let state = &mut self.state;
        [(front, &mut state.stencil_front), (back, &mut state.stencil_back)]
            .into_iter()
            .filter_map(|(selected, f)| selected.then_some(f))
    }

    pub fn stencil_func(&mut self, func: GLenum, reference: i32, mask: u32) {
        self.stencil_func_separate_impl("stencilFunc", gl::FRONT_AND_BACK, func, reference, mask);
    }

    pub fn stencil_func_separate(&mut self, face: GLenum, func: GLenum, reference: i32, mask: u32) {
        self.stencil_func_separate_impl("stencilFuncSeparate", face, func, reference, mask);
    }

    fn stencil_func_separate_impl(&mut self, name: &'static str, face: GLenum, func: GLenum, reference: i32, mask: u32) {
        self.run(name, |ctx| {
            if !is_face(face) {
                return Err(Failure::invalid_enum("Bad face."));
            }
            if !is_compare_func(func) {
                return Err(Failure::invalid_enum("Bad stencil function."));
            }
            for f in ctx.stencil_faces_mut(face) {
                f.func = func;
                f.reference = reference;
                f.value_mask = mask;
            }
            ctx.set_state(StateCall::StencilFunc {
                face,
                func,
                reference,
                mask,
            });
            Ok(())
        });
    }

    pub fn stencil_op(&mut self, fail: GLenum, depth_fail: GLenum, depth_pass: GLenum) {
        self.stencil_op_separate_impl("stencilOp", gl::FRONT_AND_BACK, fail, depth_fail, depth_pass);
    }

    pub fn stencil_op_separate(&mut self, face: GLenum, fail: GLenum, depth_fail: GLenum, depth_pass: GLenum) {
        self.stencil_op_separate_impl("stencilOpSeparate", face, fail, depth_fail, depth_pass);
    }

    fn stencil_op_separate_impl(
        &mut self,
        name: &'static str,
        face: GLenum,
        fail: GLenum,
        depth_fail: GLenum,
        depth_pass: GLenum,
    ) {
        self.run(name, |ctx| {
            if !is_face(face) {
                return Err(Failure::invalid_enum("Bad face."));
            }
            if ![fail, depth_fail, depth_pass].into_iter().all(is_stencil_op) {
                return Err(Failure::invalid_enum("Bad stencil op."));
            }
            for f in ctx.stencil_faces_mut(face) {
                f.fail = fail;
                f.depth_fail = depth_fail;
                f.depth_pass = depth_pass;
            }
            ctx.set_state(StateCall::StencilOp {
                face,
                fail,
                depth_fail,
                depth_pass,
            });
            Ok(())
        });
    }

    pub fn stencil_mask(&mut self, mask: u32) {
        self.stencil_mask_separate_impl("stencilMask", gl::FRONT_AND_BACK, mask);
    }

    pub fn stencil_mask_separate(&mut self, face: GLenum, mask: u32) {
        self.stencil_mask_separate_impl("stencilMaskSeparate", face, mask);
    }

    fn stencil_mask_separate_impl(&mut self, name: &'static str, face: GLenum, mask: u32) {
        self.run(name, |ctx| {
            if !is_face(face) {
                return Err(Failure::invalid_enum("Bad face."));
            }
            for f in ctx.stencil_faces_mut(face) {
                f.write_mask = mask;
            }
            ctx.set_state(StateCall::StencilMask { face, mask });
            Ok(())
        });
    }

    pub fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.run("colorMask", |ctx| {
            ctx.state.color_mask = [r, g, b, a];
            ctx.set_state(StateCall::ColorMask([r, g, b, a]));
            Ok(())
        });
    }

    pub fn depth_mask(&mut self, enabled: bool) {
        self.run("depthMask", |ctx| {
            ctx.state.depth_mask = enabled;
            ctx.set_state(StateCall::DepthMask(enabled));
            Ok(())
        });
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.run("clearColor", |ctx| {
            let color = Vec4::new(r, g, b, a);
            ctx.state.clear_color = color;
            ctx.set_state(StateCall::ClearColor(color));
            Ok(())
        });
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.run("clearDepth", |ctx| {
            let depth = depth.clamp(0.0, 1.0);
            ctx.state.clear_depth = depth;
            ctx.set_state(StateCall::ClearDepth(depth));
            Ok(())
        });
    }

    pub fn clear_stencil(&mut self, value: i32) {
        self.run("clearStencil", |ctx| {
            ctx.state.clear_stencil = value;
            ctx.set_state(StateCall::ClearStencil(value));
            Ok(())
        });
    }

    pub fn line_width(&mut self, width: f32) {
        self.run("lineWidth", |ctx| {
            if width.is_nan() || width <= 0.0 {
                return Err(Failure::invalid_value("`width` must be positive and non-NaN."));
            }
            ctx.state.line_width = width;
            ctx.set_state(StateCall::LineWidth(width));
            Ok(())
        });
    }

    pub fn depth_func(&mut self, func: GLenum) {
        self.run("depthFunc", |ctx| {
            if !is_compare_func(func) {
                return Err(Failure::invalid_enum("Bad depth function."));
            }
            ctx.state.depth_func = func;
            ctx.set_state(StateCall::DepthFunc(func));
            Ok(())
        });
    }

    pub fn depth_range(&mut self, near: f32, far: f32) {
        self.run("depthRange", |ctx| {
            if near > far {
                return Err(Failure::invalid_operation("`near` must not exceed `far`."));
            }
            let range = Vec2::new(near, far).clamp(Vec2::ZERO, Vec2::ONE);
            ctx.state.depth_range = range;
            ctx.set_state(StateCall::DepthRange(range));
            Ok(())
        });
    }

    pub fn cull_face(&mut self, mode: GLenum) {
        self.run("cullFace", |ctx| {
            if !is_face(mode) {
                return Err(Failure::invalid_enum("Bad cull face mode."));
            }
            ctx.state.cull_face_mode = mode;
            ctx.set_state(StateCall::CullFace(mode));
            Ok(())
        });
    }

    pub fn front_face(&mut self, mode: GLenum) {
        self.run("frontFace", |ctx| {
            if !matches!(mode, gl::CW | gl::CCW) {
                return Err(Failure::invalid_enum("Bad front face mode."));
            }
            ctx.state.front_face = mode;
            ctx.set_state(StateCall::FrontFace(mode));
            Ok(())
        });
    }

    pub fn hint(&mut self, target: GLenum, mode: GLenum) {
        self.run("hint", |ctx| {
            if !matches!(mode, gl::DONT_CARE | gl::FASTEST | gl::NICEST) {
                return Err(Failure::invalid_enum("Bad hint mode."));
            }
            match target {
                gl::GENERATE_MIPMAP_HINT => ctx.state.generate_mipmap_hint = mode,
                gl::FRAGMENT_SHADER_DERIVATIVE_HINT if ctx.version.is_webgl2() => {
                    ctx.state.derivative_hint = mode;
                }
                _ => return Err(Failure::invalid_enum("Bad hint target.")),
            }
            ctx.set_state(StateCall::Hint { target, mode });
            Ok(())
        });
    }

    pub fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.run("polygonOffset", |ctx| {
            let offset = Vec2::new(factor, units);
            ctx.state.polygon_offset = offset;
            ctx.set_state(StateCall::PolygonOffset(offset));
            Ok(())
        });
    }

    pub fn sample_coverage(&mut self, value: f32, invert: bool) {
        self.run("sampleCoverage", |ctx| {
            let value = value.clamp(0.0, 1.0);
            ctx.state.sample_coverage_value = value;
            ctx.state.sample_coverage_invert = invert;
            ctx.set_state(StateCall::SampleCoverage { value, invert });
            Ok(())
        });
    }

    /// `pixelStorei`. Unpack parameters are consumed by the upload pipeline
    /// and never forwarded to the driver as-is.
    pub fn pixel_storei(&mut self, pname: GLenum, value: i32) {
        self.run("pixelStorei", |ctx| {
            let webgl2 = ctx.version.is_webgl2();
            let store = &mut ctx.state.pixel_store;
            match pname {
                gl::UNPACK_FLIP_Y_WEBGL => store.flip_y = value != 0,
                gl::UNPACK_PREMULTIPLY_ALPHA_WEBGL => store.premultiply_alpha = value != 0,
                gl::UNPACK_COLORSPACE_CONVERSION_WEBGL => {
                    let value = value as GLenum;
                    if !matches!(value, gl::NONE | gl::BROWSER_DEFAULT_WEBGL) {
                        return Err(Failure::invalid_value("Bad colorspace conversion."));
                    }
                    store.colorspace_conversion = value;
                }
                gl::UNPACK_REQUIRE_FASTPATH => {
                    if !ctx.extensions_enabled.contains(crate::extensions::ExtensionSet::MOZ_DEBUG) {
                        return Err(Failure::invalid_enum("Requires MOZ_debug."));
                    }
                    store.require_fast_path = value != 0;
                }
                gl::UNPACK_ALIGNMENT | gl::PACK_ALIGNMENT => {
                    if !matches!(value, 1 | 2 | 4 | 8) {
                        return Err(Failure::invalid_value("Alignment must be 1, 2, 4, or 8."));
                    }
                    if pname == gl::UNPACK_ALIGNMENT {
                        store.unpack_alignment = value as u32;
                    } else {
                        store.pack_alignment = value as u32;
                    }
                }
                gl::UNPACK_ROW_LENGTH
                | gl::UNPACK_IMAGE_HEIGHT
                | gl::UNPACK_SKIP_PIXELS
                | gl::UNPACK_SKIP_ROWS
                | gl::UNPACK_SKIP_IMAGES
                | gl::PACK_ROW_LENGTH
                | gl::PACK_SKIP_PIXELS
                | gl::PACK_SKIP_ROWS
                    if webgl2 =>
                {
                    let value = non_negative(value, "param")?;
                    let slot = match pname {
                        gl::UNPACK_ROW_LENGTH => &mut store.unpack_row_length,
                        gl::UNPACK_IMAGE_HEIGHT => &mut store.unpack_image_height,
                        gl::UNPACK_SKIP_PIXELS => &mut store.unpack_skip_pixels,
                        gl::UNPACK_SKIP_ROWS => &mut store.unpack_skip_rows,
                        gl::UNPACK_SKIP_IMAGES => &mut store.unpack_skip_images,
                        gl::PACK_ROW_LENGTH => &mut store.pack_row_length,
                        gl::PACK_SKIP_PIXELS => &mut store.pack_skip_pixels,
                        _ => &mut store.pack_skip_rows,
                    };
                    *slot = value;
                }
                _ => return Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_consistency_masks_to_stencil_bits() {
        let mut state = StateTracker::new(1, 1, false);
        state.stencil_front.write_mask = 0xFF;
        state.stencil_back.write_mask = 0x1FF;
        assert!(state.stencil_faces_consistent(8));
        assert!(!state.stencil_faces_consistent(16));
    }

    #[test]
    fn dither_starts_enabled() {
        let state = StateTracker::new(300, 150, false);
        assert!(state.is_enabled(EnabledCaps::DITHER));
        assert!(!state.is_enabled(EnabledCaps::BLEND));
        assert_eq!(state.viewport, [0, 0, 300, 150]);
    }

    #[test]
    fn rasterizer_discard_is_webgl2_only() {
        assert!(EnabledCaps::from_gl(gl::RASTERIZER_DISCARD, false).is_none());
        assert_eq!(
            EnabledCaps::from_gl(gl::RASTERIZER_DISCARD, true),
            Some(EnabledCaps::RASTERIZER_DISCARD)
        );
    }
}
