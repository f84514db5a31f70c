//! Binding Validator
//!
//! # Overview
//!
//! Tracks which object occupies which binding target (and index), and
//! enforces the rules for changing occupants:
//!
//! - a buffer's content kind (index data vs. everything else) is fixed by
//!   its first bind, and cross binding is refused;
//! - a buffer engaged as transform feedback output cannot be bound
//!   elsewhere while capture is active;
//! - indexed ranges must fit the buffer and the target's alignment. A
//!   failed range bind leaves the slot untouched.
//!
//! Every slot holds one reference on its occupant, so a deleted object that
//! is still bound keeps its native resource until the slot lets go.
//!
//! # Layout
//!
//! - `buffers`: generic and indexed buffer targets, buffer data.
//! - `textures`: texture units, samplers.
//! - `framebuffers`: framebuffers, renderbuffers, completeness.
//! - `programs`: shaders, programs, uniform blocks.
//! - `queries`: vertex arrays, queries, transform feedback objects.

mod buffers;
mod framebuffers;
mod programs;
mod queries;
mod textures;

pub use buffers::BufferInit;
pub use framebuffers::FramebufferStatus;
pub(crate) use framebuffers::release_attachment_ref;

use crate::context::Limits;
use crate::objects::{
    BufferId, FramebufferId, ObjectRegistry, ProgramId, QueryId, RenderbufferId, SamplerId,
    TextureId, TransformFeedbackId, VertexArrayId,
};

// ============================================================================
// Indexed Buffer Bindings
// ============================================================================

/// A buffer bound to an indexed target, with an optional byte range.
///
/// A `size` of zero means "the whole buffer" (`bindBufferBase`), which
/// follows the buffer's length as it is reallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexedBufferBinding {
    pub buffer: Option<BufferId>,
    pub start: u64,
    pub size: u64,
}

impl IndexedBufferBinding {
    /// Bytes actually reachable through this binding for a buffer of
    /// `buffer_len` bytes. Ranges shrink with the buffer.
    #[must_use]
    pub fn byte_count(&self, buffer_len: u64) -> u64 {
        if self.buffer.is_none() {
            return 0;
        }
        if self.size == 0 {
            return buffer_len;
        }
        if self.start >= buffer_len {
            return 0;
        }
        (buffer_len - self.start).min(self.size)
    }

    /// The reachable byte range, if any.
    #[must_use]
    pub fn byte_range(&self, buffer_len: u64) -> Option<ByteRange> {
        let buffer = self.buffer?;
        let start = if self.size == 0 { 0 } else { self.start };
        ByteRange::new(buffer, start, self.byte_count(buffer_len))
    }
}

/// A non-empty byte range of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub buffer: BufferId,
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[must_use]
    pub fn new(buffer: BufferId, start: u64, len: u64) -> Option<Self> {
        (len > 0).then(|| Self {
            buffer,
            start,
            end: start.saturating_add(len),
        })
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.buffer == other.buffer && self.start < other.end && other.start < self.end
    }
}

// ============================================================================
// Binding Slots
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureUnit {
    pub tex_2d: Option<TextureId>,
    pub cube_map: Option<TextureId>,
    pub tex_3d: Option<TextureId>,
    pub tex_2d_array: Option<TextureId>,
    pub sampler: Option<SamplerId>,
}

/// Every binding slot of a context, except those stored in the bound vertex
/// array (`ELEMENT_ARRAY_BUFFER`, attribute buffers) and transform feedback
/// object (indexed `TRANSFORM_FEEDBACK_BUFFER`).
#[derive(Debug)]
pub struct Bindings {
    pub array_buffer: Option<BufferId>,
    pub copy_read_buffer: Option<BufferId>,
    pub copy_write_buffer: Option<BufferId>,
    pub pixel_pack_buffer: Option<BufferId>,
    pub pixel_unpack_buffer: Option<BufferId>,
    pub uniform_buffer: Option<BufferId>,
    pub transform_feedback_buffer: Option<BufferId>,
    pub uniform_buffers: Vec<IndexedBufferBinding>,

    pub active_texture: u32,
    pub texture_units: Vec<TextureUnit>,

    pub draw_framebuffer: Option<FramebufferId>,
    pub read_framebuffer: Option<FramebufferId>,
    pub renderbuffer: Option<RenderbufferId>,

    pub program: Option<ProgramId>,
    /// Never empty: unbinding selects the default vertex array.
    pub vertex_array: VertexArrayId,
    /// Never empty: unbinding selects the default transform feedback.
    pub transform_feedback: TransformFeedbackId,

    /// `ANY_SAMPLES_PASSED(_CONSERVATIVE)` share one slot.
    pub occlusion_query: Option<QueryId>,
    pub tf_primitives_query: Option<QueryId>,
}

impl Bindings {
    #[must_use]
    pub fn new(limits: &Limits, default_vao: VertexArrayId, default_tf: TransformFeedbackId) -> Self {
        Self {
            array_buffer: None,
            copy_read_buffer: None,
            copy_write_buffer: None,
            pixel_pack_buffer: None,
            pixel_unpack_buffer: None,
            uniform_buffer: None,
            transform_feedback_buffer: None,
            uniform_buffers: vec![IndexedBufferBinding::default(); limits.max_uniform_buffer_bindings as usize],
            active_texture: 0,
            texture_units: vec![TextureUnit::default(); limits.max_texture_units as usize],
            draw_framebuffer: None,
            read_framebuffer: None,
            renderbuffer: None,
            program: None,
            vertex_array: default_vao,
            transform_feedback: default_tf,
            occlusion_query: None,
            tf_primitives_query: None,
        }
    }

    /// Empties every slot, dropping the references they held.
    pub fn release_all(
        &mut self,
        objects: &mut ObjectRegistry,
        default_vao: VertexArrayId,
        default_tf: TransformFeedbackId,
    ) {
        let buffers = &mut objects.buffers;
        for slot in [
            &mut self.array_buffer,
            &mut self.copy_read_buffer,
            &mut self.copy_write_buffer,
            &mut self.pixel_pack_buffer,
            &mut self.pixel_unpack_buffer,
            &mut self.uniform_buffer,
            &mut self.transform_feedback_buffer,
        ] {
            buffers.rebind(slot, None);
        }
        for binding in &mut self.uniform_buffers {
            buffers.rebind(&mut binding.buffer, None);
            *binding = IndexedBufferBinding::default();
        }

        self.active_texture = 0;
        for unit in &mut self.texture_units {
            for slot in [&mut unit.tex_2d, &mut unit.cube_map, &mut unit.tex_3d, &mut unit.tex_2d_array] {
                objects.textures.rebind(slot, None);
            }
            objects.samplers.rebind(&mut unit.sampler, None);
        }

        objects.framebuffers.rebind(&mut self.draw_framebuffer, None);
        objects.framebuffers.rebind(&mut self.read_framebuffer, None);
        objects.renderbuffers.rebind(&mut self.renderbuffer, None);
        objects.programs.rebind(&mut self.program, None);
        objects.queries.rebind(&mut self.occlusion_query, None);
        objects.queries.rebind(&mut self.tf_primitives_query, None);

        if self.vertex_array != default_vao {
            objects.vertex_arrays.release_ref(self.vertex_array);
            self.vertex_array = default_vao;
        }
        if self.transform_feedback != default_tf {
            objects.transform_feedbacks.release_ref(self.transform_feedback);
            self.transform_feedback = default_tf;
        }
    }

    /// The generic slot for a buffer target other than
    /// `ELEMENT_ARRAY_BUFFER`.
    pub(crate) fn buffer_slot_mut(&mut self, target: crate::gl::GLenum) -> Option<&mut Option<BufferId>> {
        use crate::gl;
        Some(match target {
            gl::ARRAY_BUFFER => &mut self.array_buffer,
            gl::COPY_READ_BUFFER => &mut self.copy_read_buffer,
            gl::COPY_WRITE_BUFFER => &mut self.copy_write_buffer,
            gl::PIXEL_PACK_BUFFER => &mut self.pixel_pack_buffer,
            gl::PIXEL_UNPACK_BUFFER => &mut self.pixel_unpack_buffer,
            gl::UNIFORM_BUFFER => &mut self.uniform_buffer,
            gl::TRANSFORM_FEEDBACK_BUFFER => &mut self.transform_feedback_buffer,
            _ => return None,
        })
    }

    #[must_use]
    pub fn active_unit(&self) -> Option<&TextureUnit> {
        self.texture_units.get(self.active_texture as usize)
    }
}

#[cfg(test)]
mod tests {
    use slotmap::KeyData;

    use super::*;

    fn buffer(n: u64) -> BufferId {
        BufferId::from(KeyData::from_ffi(n | (1 << 32)))
    }

    #[test]
    fn whole_buffer_binding_follows_length() {
        let binding = IndexedBufferBinding {
            buffer: Some(buffer(1)),
            start: 0,
            size: 0,
        };
        assert_eq!(binding.byte_count(64), 64);
        assert_eq!(binding.byte_count(128), 128);
    }

    #[test]
    fn ranged_binding_shrinks_with_buffer() {
        let binding = IndexedBufferBinding {
            buffer: Some(buffer(1)),
            start: 32,
            size: 64,
        };
        assert_eq!(binding.byte_count(256), 64);
        assert_eq!(binding.byte_count(48), 16);
        assert_eq!(binding.byte_count(16), 0);
        assert_eq!(IndexedBufferBinding::default().byte_count(64), 0);
    }

    #[test]
    fn ranges_overlap_only_within_one_buffer() {
        let a = ByteRange::new(buffer(1), 0, 16).unwrap();
        let b = ByteRange::new(buffer(1), 8, 16).unwrap();
        let c = ByteRange::new(buffer(1), 16, 16).unwrap();
        let d = ByteRange::new(buffer(2), 0, 16).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert!(ByteRange::new(buffer(1), 0, 0).is_none());
    }
}
