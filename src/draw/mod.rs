//! Draw Call Validation
//!
//! # Overview
//!
//! `drawArrays`, `drawElements`, their instanced forms and `clear` are the
//! only entry points that make the driver read memory on the script's
//! behalf. Before any of them reaches the backend the context proves that
//! every fetch stays in bounds:
//!
//! - the current program is linked and the draw framebuffer is complete
//! - every enabled attribute the program reads has a live buffer holding
//!   enough elements for the vertex (or instance) range
//! - index data lies inside the element array buffer, and the largest index
//!   (cached per buffer) is fetchable
//! - uniform blocks are backed by large enough buffer ranges
//! - transform feedback outputs do not alias any input
//!
//! # Phases
//!
//! A draw moves `Idle -> Validating -> FakeAttrib0Setup -> Issued ->
//! Cleanup -> Idle`. A failure in validation returns straight to `Idle`
//! with nothing sent to the driver. Once fake attribute 0 setup starts, the
//! cleanup phase always runs, so the driver's attribute 0 state is restored
//! even when setup fails halfway.

mod fake_attrib0;
mod vertex;

pub use fake_attrib0::FakeAttrib0;
pub use vertex::{GenericAttrib, GenericType};

use smallvec::SmallVec;

use crate::binding::ByteRange;
use crate::context::{EnabledCaps, Failure, PowerPreference, StateCall, Validated, WebGlContext};
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLbitfield, GLenum};
use crate::objects::{BufferId, SlotRef};

/// Progress of one draw call through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPhase {
    Idle,
    Validating,
    FakeAttrib0Setup,
    Issued,
    Cleanup,
}

/// Index source of an indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexedDraw {
    ty: GLenum,
    offset: u64,
}

/// A draw as requested, before validation.
#[derive(Debug, Clone, Copy)]
struct DrawRequest {
    mode: GLenum,
    first: i32,
    count: i32,
    instances: i32,
    indexed: Option<IndexedDraw>,
}

/// What validation proved about a draw.
#[derive(Debug, Clone, Copy)]
struct DrawPlan {
    first: u32,
    count: u32,
    instances: u32,
    /// Vertices fetched from non-instanced attributes.
    vertex_count: u64,
}

impl DrawPlan {
    fn is_empty(&self) -> bool {
        self.count == 0 || self.instances == 0
    }
}

fn trace_phase(phase: DrawPhase) {
    log::trace!("draw phase: {phase:?}");
}

fn is_draw_mode(mode: GLenum) -> bool {
    (gl::POINTS..=gl::TRIANGLE_FAN).contains(&mode)
}

/// Primitive family captured by transform feedback begun with `tf_mode`.
fn tf_mode_accepts(tf_mode: GLenum, draw_mode: GLenum) -> bool {
    match tf_mode {
        gl::POINTS => draw_mode == gl::POINTS,
        gl::LINES => matches!(draw_mode, gl::LINES | gl::LINE_LOOP | gl::LINE_STRIP),
        gl::TRIANGLES => matches!(draw_mode, gl::TRIANGLES | gl::TRIANGLE_STRIP | gl::TRIANGLE_FAN),
        _ => false,
    }
}

/// Largest index in `data`. With `skip_restart`, the type's all-ones
/// primitive restart value is ignored.
fn scan_max_index(data: &[u8], ty: GLenum, skip_restart: bool) -> Option<u32> {
    match ty {
        gl::UNSIGNED_BYTE => data
            .iter()
            .map(|&i| u32::from(i))
            .filter(|&i| !skip_restart || i != 0xFF)
            .max(),
        gl::UNSIGNED_SHORT => data
            .chunks_exact(2)
            .map(|c| u32::from(u16::from_ne_bytes([c[0], c[1]])))
            .filter(|&i| !skip_restart || i != 0xFFFF)
            .max(),
        _ => data
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .filter(|&i| !skip_restart || i != u32::MAX)
            .max(),
    }
}

impl WebGlContext {
    // ========================================================================
    // Entry Points
    // ========================================================================

    pub fn draw_arrays(&mut self, mode: GLenum, first: i32, count: i32) {
        self.run("drawArrays", |ctx| {
            ctx.draw(DrawRequest {
                mode,
                first,
                count,
                instances: 1,
                indexed: None,
            })
        });
    }

    /// `drawArraysInstanced` (WebGL 2) or `drawArraysInstancedANGLE`.
    pub fn draw_arrays_instanced(&mut self, mode: GLenum, first: i32, count: i32, instances: i32) {
        self.run("drawArraysInstanced", |ctx| {
            ctx.require_instancing()?;
            ctx.draw(DrawRequest {
                mode,
                first,
                count,
                instances,
                indexed: None,
            })
        });
    }

    pub fn draw_elements(&mut self, mode: GLenum, count: i32, ty: GLenum, offset: i64) {
        self.run("drawElements", |ctx| {
            let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;
            ctx.draw(DrawRequest {
                mode,
                first: 0,
                count,
                instances: 1,
                indexed: Some(IndexedDraw { ty, offset }),
            })
        });
    }

    /// `drawElementsInstanced` (WebGL 2) or `drawElementsInstancedANGLE`.
    pub fn draw_elements_instanced(&mut self, mode: GLenum, count: i32, ty: GLenum, offset: i64, instances: i32) {
        self.run("drawElementsInstanced", |ctx| {
            ctx.require_instancing()?;
            let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;
            ctx.draw(DrawRequest {
                mode,
                first: 0,
                count,
                instances,
                indexed: Some(IndexedDraw { ty, offset }),
            })
        });
    }

    /// `clear`.
    pub fn clear(&mut self, mask: GLbitfield) {
        self.run("clear", |ctx| {
            let all = gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT;
            if mask & !all != 0 {
                return Err(Failure::invalid_value(format!("Invalid clear mask: 0x{mask:x}")));
            }
            ctx.require_complete_framebuffer(gl::DRAW_FRAMEBUFFER)?;

            ctx.clear_backbuffer_if_needed();
            ctx.backend.clear(mask);
            ctx.mark_drawn();
            Ok(())
        });
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    pub(crate) fn require_instancing(&self) -> Validated<()> {
        if self.version.is_webgl2() || self.extensions_enabled.contains(ExtensionSet::ANGLE_INSTANCED_ARRAYS) {
            Ok(())
        } else {
            Err(Failure::invalid_operation("Instanced drawing requires ANGLE_instanced_arrays."))
        }
    }

    fn draw(&mut self, request: DrawRequest) -> Validated<()> {
        trace_phase(DrawPhase::Validating);
        let plan = self.validate_draw(&request)?;
        if plan.is_empty() {
            trace_phase(DrawPhase::Idle);
            return Ok(());
        }

        self.clear_backbuffer_if_needed();

        let emulate = self.needs_fake_attrib0();
        let mut result = Ok(());
        if emulate {
            trace_phase(DrawPhase::FakeAttrib0Setup);
            result = self.setup_fake_attrib0(plan.vertex_count);
        }
        if result.is_ok() {
            match request.indexed {
                Some(indexed) => self.backend.draw_elements_instanced(
                    request.mode,
                    plan.count,
                    indexed.ty,
                    indexed.offset,
                    plan.instances,
                ),
                None => self
                    .backend
                    .draw_arrays_instanced(request.mode, plan.first, plan.count, plan.instances),
            }
            trace_phase(DrawPhase::Issued);
            self.mark_drawn();
        }
        if emulate {
            trace_phase(DrawPhase::Cleanup);
            self.undo_fake_attrib0();
        }
        trace_phase(DrawPhase::Idle);
        result
    }

    /// Bookkeeping after anything touched the draw framebuffer.
    fn mark_drawn(&mut self) {
        if self.bindings.draw_framebuffer.is_none() {
            self.frame_dirty = true;
        }
        if self.attributes.power_preference != PowerPreference::LowPower {
            self.manager.report_dgpu_activity();
        }
    }

    /// Clears the drawing buffer to default values after a present or
    /// resize discarded it. Masks and scissor are overridden for the clear
    /// and restored from the tracker afterwards.
    pub(crate) fn clear_backbuffer_if_needed(&mut self) {
        if !self.backbuffer_needs_clear || self.bindings.draw_framebuffer.is_some() {
            return;
        }
        self.backbuffer_needs_clear = false;

        let mut mask = gl::COLOR_BUFFER_BIT;
        if self.attributes.depth {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if self.attributes.stencil {
            mask |= gl::STENCIL_BUFFER_BIT;
        }

        let backend = &mut self.backend;
        let state = &self.state;
        let scissor = state.is_enabled(EnabledCaps::SCISSOR_TEST);

        if scissor {
            backend.set_capability(gl::SCISSOR_TEST, false);
        }
        backend.set_state(&StateCall::ColorMask([true; 4]));
        backend.set_state(&StateCall::DepthMask(true));
        backend.set_state(&StateCall::StencilMask {
            face: gl::FRONT_AND_BACK,
            mask: u32::MAX,
        });
        backend.set_state(&StateCall::ClearColor(glam::Vec4::ZERO));
        backend.set_state(&StateCall::ClearDepth(1.0));
        backend.set_state(&StateCall::ClearStencil(0));

        backend.clear(mask);

        if scissor {
            backend.set_capability(gl::SCISSOR_TEST, true);
        }
        backend.set_state(&StateCall::ColorMask(state.color_mask));
        backend.set_state(&StateCall::DepthMask(state.depth_mask));
        backend.set_state(&StateCall::StencilMask {
            face: gl::FRONT,
            mask: state.stencil_front.write_mask,
        });
        backend.set_state(&StateCall::StencilMask {
            face: gl::BACK,
            mask: state.stencil_back.write_mask,
        });
        backend.set_state(&StateCall::ClearColor(state.clear_color));
        backend.set_state(&StateCall::ClearDepth(state.clear_depth));
        backend.set_state(&StateCall::ClearStencil(state.clear_stencil));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate_draw(&mut self, request: &DrawRequest) -> Validated<DrawPlan> {
        if !is_draw_mode(request.mode) {
            return Err(Failure::invalid_enum(format!("Bad draw mode: 0x{:04x}", request.mode)));
        }
        let first = u32::try_from(request.first).map_err(|_| Failure::invalid_value("`first` must be >= 0."))?;
        let count = u32::try_from(request.count).map_err(|_| Failure::invalid_value("`count` must be >= 0."))?;
        let instances = u32::try_from(request.instances)
            .map_err(|_| Failure::invalid_value("`instanceCount` must be >= 0."))?;

        let Some(program) = self.bindings.program else {
            return Err(Failure::invalid_operation("The current program is null."));
        };
        if self.current_linked_program().is_none() {
            return Err(Failure::invalid_operation("The current program is not linked."));
        }
        self.require_complete_framebuffer(gl::DRAW_FRAMEBUFFER)?;

        if !self.state.stencil_faces_consistent(self.draw_framebuffer_stencil_bits()) {
            return Err(Failure::invalid_operation(
                "Front and back stencil reference, value mask and write mask must match.",
            ));
        }

        let tf = self.current_tf();
        if tf.is_capturing() {
            if !tf_mode_accepts(tf.mode, request.mode) {
                return Err(Failure::invalid_operation(
                    "Draw mode does not match the active transform feedback mode.",
                ));
            }
            if request.indexed.is_some() {
                return Err(Failure::invalid_operation(
                    "Indexed draws are not allowed while transform feedback is active.",
                ));
            }
        }

        let mut inputs: SmallVec<[ByteRange; 8]> = SmallVec::new();

        let vertex_count = match request.indexed {
            None => {
                if count == 0 {
                    0
                } else {
                    u64::from(first) + u64::from(count)
                }
            }
            Some(indexed) => self.validate_index_fetch(indexed, count, &mut inputs)?,
        };

        if count > 0 && instances > 0 {
            self.validate_vertex_fetch(vertex_count, instances, &mut inputs)?;
        }
        self.validate_uniform_blocks(program, &mut inputs)?;
        self.validate_buffers_for_tf(&inputs)?;

        Ok(DrawPlan {
            first,
            count,
            instances,
            vertex_count,
        })
    }

    /// Checks the index range and returns the number of vertices the
    /// indices can reach (max index + 1).
    fn validate_index_fetch(
        &mut self,
        indexed: IndexedDraw,
        count: u32,
        inputs: &mut SmallVec<[ByteRange; 8]>,
    ) -> Validated<u64> {
        let index_size = match indexed.ty {
            gl::UNSIGNED_BYTE => 1u64,
            gl::UNSIGNED_SHORT => 2,
            gl::UNSIGNED_INT
                if self.version.is_webgl2()
                    || self.extensions_enabled.contains(ExtensionSet::OES_ELEMENT_INDEX_UINT) =>
            {
                4
            }
            ty => return Err(Failure::invalid_enum(format!("Bad index type: 0x{ty:04x}"))),
        };
        if indexed.offset % index_size != 0 {
            return Err(Failure::invalid_operation("`offset` must be a multiple of the index size."));
        }

        let buffer = match SlotRef::resolve(self.current_vao().element_array, &self.objects.buffers) {
            SlotRef::Live(id) => id,
            SlotRef::Deleted(_) => {
                return Err(Failure::invalid_operation("The element array buffer has been deleted."));
            }
            SlotRef::Empty => {
                return Err(Failure::invalid_operation("No element array buffer is bound."));
            }
        };
        if count == 0 {
            return Ok(0);
        }

        let byte_len = u64::from(count) * index_size;
        let end = indexed.offset.checked_add(byte_len);
        let buffer_len = self.objects.buffers.data(buffer).map_or(0, |b| b.byte_length);
        if end.is_none_or(|end| end > buffer_len) {
            return Err(Failure::invalid_operation("Index range exceeds the element array buffer."));
        }
        inputs.extend(ByteRange::new(buffer, indexed.offset, byte_len));

        let skip_restart = self.version.is_webgl2();
        let key = (indexed.ty, indexed.offset, u64::from(count));
        let Some(data) = self.objects.buffers.data_mut(buffer) else {
            return Err(Failure::implementation_bug("Live buffer without data."));
        };
        let max_index = match data.index_cache.get(&key) {
            Some(cached) => *cached,
            None => {
                let Some(shadow) = data.index_shadow.as_deref() else {
                    return Err(Failure::implementation_bug("Element array buffer without index shadow."));
                };
                // Range checked above against `byte_length == shadow.len()`.
                let bytes = &shadow[indexed.offset as usize..(indexed.offset + byte_len) as usize];
                let max = scan_max_index(bytes, indexed.ty, skip_restart);
                data.index_cache.insert(key, max);
                max
            }
        };
        Ok(max_index.map_or(0, |max| u64::from(max) + 1))
    }

    fn validate_vertex_fetch(
        &self,
        vertex_count: u64,
        instances: u32,
        inputs: &mut SmallVec<[ByteRange; 8]>,
    ) -> Validated<()> {
        let Some(linked) = self.current_linked_program() else {
            return Err(Failure::invalid_operation("The current program is not linked."));
        };
        let vao = self.current_vao();
        let webgl1_instanced = !self.version.is_webgl2() && instances != 1;
        let mut has_per_vertex = false;

        for (location, attrib) in vao.attribs.iter().enumerate() {
            let location = location as u32;
            if !linked.uses_attrib(location) {
                continue;
            }
            if attrib.divisor == 0 {
                has_per_vertex = true;
            }
            if !attrib.enabled {
                continue;
            }
            let buffer = match SlotRef::resolve(attrib.buffer, &self.objects.buffers) {
                SlotRef::Live(id) => id,
                SlotRef::Deleted(_) => {
                    return Err(Failure::invalid_operation(format!(
                        "Vertex attrib array {location}'s buffer has been deleted."
                    )));
                }
                SlotRef::Empty => {
                    return Err(Failure::invalid_operation(format!(
                        "Vertex attrib array {location} is enabled but has no buffer bound."
                    )));
                }
            };
            let buffer_len = self.objects.buffers.data(buffer).map_or(0, |b| b.byte_length);
            let avail = attrib.avail_elements(buffer_len);
            let needed = if attrib.divisor == 0 {
                vertex_count
            } else {
                u64::from(instances).div_ceil(u64::from(attrib.divisor))
            };
            if needed > avail {
                return Err(Failure::invalid_operation(format!(
                    "Vertex fetch requires {needed} elements, but attribs only supply {avail}."
                )));
            }
            if needed > 0 {
                let len = (needed - 1) * attrib.byte_stride() + attrib.element_bytes();
                inputs.extend(ByteRange::new(buffer, attrib.offset, len));
            }
        }

        if webgl1_instanced && !has_per_vertex {
            return Err(Failure::invalid_operation(
                "At least one vertex attribute must have a divisor of 0.",
            ));
        }
        Ok(())
    }

    fn validate_uniform_blocks(
        &self,
        program: crate::objects::ProgramId,
        inputs: &mut SmallVec<[ByteRange; 8]>,
    ) -> Validated<()> {
        let Some(data) = self.objects.programs.data(program) else {
            return Ok(());
        };
        let Some(linked) = data.linked.as_ref() else {
            return Ok(());
        };
        for (index, block) in linked.uniform_blocks.iter().enumerate() {
            let binding_index = data.uniform_block_bindings.get(index).copied().unwrap_or(0);
            let binding = self
                .bindings
                .uniform_buffers
                .get(binding_index as usize)
                .copied()
                .unwrap_or_default();
            let Some(buffer) = binding.buffer.filter(|b| self.objects.buffers.is_live(*b)) else {
                return Err(Failure::invalid_operation(format!(
                    "No buffer bound to uniform buffer binding {binding_index}."
                )));
            };
            let buffer_len = buffer_length(self, buffer);
            if binding.byte_count(buffer_len) < block.data_size {
                return Err(Failure::invalid_operation(format!(
                    "Uniform block {index} needs {} bytes, binding {binding_index} supplies {}.",
                    block.data_size,
                    binding.byte_count(buffer_len)
                )));
            }
            inputs.extend(binding.byte_range(buffer_len));
        }
        Ok(())
    }
}

fn buffer_length(ctx: &WebGlContext, buffer: BufferId) -> u64 {
    ctx.objects.buffers.data(buffer).map_or(0, |b| b.byte_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_index_skips_restart_only_when_asked() {
        let data: Vec<u8> = [1u16, 0xFFFF, 7].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(scan_max_index(&data, gl::UNSIGNED_SHORT, false), Some(0xFFFF));
        assert_eq!(scan_max_index(&data, gl::UNSIGNED_SHORT, true), Some(7));
        assert_eq!(scan_max_index(&[0xFF], gl::UNSIGNED_BYTE, true), None);
    }

    #[test]
    fn tf_lines_accept_strips_and_loops() {
        assert!(tf_mode_accepts(gl::LINES, gl::LINE_STRIP));
        assert!(tf_mode_accepts(gl::TRIANGLES, gl::TRIANGLE_FAN));
        assert!(!tf_mode_accepts(gl::POINTS, gl::TRIANGLES));
    }
}
