//! Per-kind object state.
//!
//! These structs hold what the context must remember about each GPU object
//! to validate later calls without asking the driver.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{BufferId, ProgramId, RenderbufferId, ShaderId, TextureId};
use crate::backend::{ActiveAttrib, AttribPointer, NativeName, UniformBlockInfo};
use crate::binding::IndexedBufferBinding;
use crate::gl::{self, GLenum};

// ============================================================================
// Buffers
// ============================================================================

/// What a buffer may be bound as, fixed on its first bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferContent {
    #[default]
    Undefined,
    ElementArray,
    OtherData,
}

#[derive(Debug, Default)]
pub struct BufferData {
    pub content: BufferContent,
    pub byte_length: u64,
    pub usage: GLenum,
    /// CPU copy of the contents, kept for buffers that may source indices.
    pub index_shadow: Option<Vec<u8>>,
    /// Memoised maximum index per `(type, byte offset, count)`.
    pub index_cache: FxHashMap<(GLenum, u64, u64), Option<u32>>,
}

impl BufferData {
    pub fn invalidate_index_cache(&mut self) {
        self.index_cache.clear();
    }

    /// Whether index data is tracked for this buffer.
    #[inline]
    #[must_use]
    pub fn keeps_index_shadow(&self) -> bool {
        self.content != BufferContent::OtherData
    }
}

// ============================================================================
// Textures & Renderbuffers
// ============================================================================

/// One allocated image of a texture (a face/level pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub internal_format: GLenum,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Default)]
pub struct TextureData {
    /// Bind target, fixed on first bind.
    pub target: Option<GLenum>,
    pub immutable: bool,
    pub immutable_levels: u32,
    /// Keyed by `(cube face index, level)`. Non-cube targets use face 0.
    pub images: FxHashMap<(u8, u32), ImageInfo>,
}

impl TextureData {
    #[must_use]
    pub fn image(&self, image_target: GLenum, level: u32) -> Option<&ImageInfo> {
        self.images.get(&(face_index(image_target), level))
    }
}

/// Cube face index of an image target; 0 for non-cube targets.
#[must_use]
pub fn face_index(image_target: GLenum) -> u8 {
    if (gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&image_target) {
        (image_target - gl::TEXTURE_CUBE_MAP_POSITIVE_X) as u8
    } else {
        0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RenderbufferData {
    /// Zero until storage is allocated.
    pub internal_format: GLenum,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

// ============================================================================
// Framebuffers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Texture {
        id: TextureId,
        image_target: GLenum,
        level: u32,
    },
    Renderbuffer(RenderbufferId),
}

#[derive(Debug, Default)]
pub struct FramebufferData {
    pub attachments: FxHashMap<GLenum, Attachment>,
}

// ============================================================================
// Shaders & Programs
// ============================================================================

#[derive(Debug)]
pub struct ShaderData {
    pub stage: GLenum,
    pub source: String,
    pub compiled: bool,
    pub info_log: String,
}

/// The executable produced by a successful link.
#[derive(Debug, Clone, Default)]
pub struct LinkedProgram {
    pub active_attribs: Vec<ActiveAttrib>,
    pub uniform_blocks: Vec<UniformBlockInfo>,
    pub tf_varying_count: u32,
    pub tf_buffer_mode: GLenum,
}

impl LinkedProgram {
    /// Whether the program reads vertex attribute `location`.
    #[must_use]
    pub fn uses_attrib(&self, location: u32) -> bool {
        self.active_attribs.iter().any(|a| a.location == location)
    }

    /// Number of transform feedback buffer bindings that must be bound.
    #[must_use]
    pub fn required_tf_buffers(&self) -> u32 {
        match (self.tf_varying_count, self.tf_buffer_mode) {
            (0, _) => 0,
            (_, gl::INTERLEAVED_ATTRIBS) => 1,
            (n, _) => n,
        }
    }
}

#[derive(Debug)]
pub struct ProgramData {
    pub vertex_shader: Option<ShaderId>,
    pub fragment_shader: Option<ShaderId>,
    pub linked: Option<LinkedProgram>,
    pub link_requested: bool,
    pub info_log: String,
    /// Uniform block index -> `UNIFORM_BUFFER` binding index.
    pub uniform_block_bindings: SmallVec<[u32; 4]>,
    /// Varyings captured by the next link.
    pub tf_varyings: Vec<String>,
    pub tf_buffer_mode: GLenum,
}

impl Default for ProgramData {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            linked: None,
            link_requested: false,
            info_log: String::new(),
            uniform_block_bindings: SmallVec::new(),
            tf_varyings: Vec::new(),
            tf_buffer_mode: gl::INTERLEAVED_ATTRIBS,
        }
    }
}

// ============================================================================
// Queries & Syncs
// ============================================================================

#[derive(Debug, Default)]
pub struct QueryData {
    /// Fixed by the first `BeginQuery`.
    pub target: Option<GLenum>,
    pub active: bool,
    /// Fence issued when the query ended.
    pub available_fence: Option<u64>,
}

#[derive(Debug)]
pub struct SyncData {
    pub fence_id: u64,
}

// ============================================================================
// Transform Feedback
// ============================================================================

#[derive(Debug)]
pub struct TransformFeedbackData {
    pub bindings: Vec<IndexedBufferBinding>,
    pub active: bool,
    pub paused: bool,
    pub mode: GLenum,
    pub program: Option<ProgramId>,
}

impl TransformFeedbackData {
    #[must_use]
    pub fn new(max_bindings: u32) -> Self {
        Self {
            bindings: vec![IndexedBufferBinding::default(); max_bindings as usize],
            active: false,
            paused: false,
            mode: gl::POINTS,
            program: None,
        }
    }

    /// Active and not paused.
    #[inline]
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.active && !self.paused
    }

    #[must_use]
    pub fn captures_into(&self, buffer: BufferId) -> bool {
        self.active && self.bindings.iter().any(|b| b.buffer == Some(buffer))
    }
}

// ============================================================================
// Vertex Arrays
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttrib {
    pub enabled: bool,
    pub buffer: Option<BufferId>,
    pub size: u8,
    pub ty: GLenum,
    pub normalized: bool,
    pub integer: bool,
    /// Stride as specified; zero means tightly packed.
    pub stride: u32,
    pub offset: u64,
    pub divisor: u32,
}

impl Default for VertexAttrib {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer: None,
            size: 4,
            ty: gl::FLOAT,
            normalized: false,
            integer: false,
            stride: 0,
            offset: 0,
            divisor: 0,
        }
    }
}

impl VertexAttrib {
    /// Bytes read for one element.
    #[must_use]
    pub fn element_bytes(&self) -> u64 {
        let component = u64::from(gl::type_byte_size(self.ty).unwrap_or(4));
        if crate::backend::is_packed_vertex_type(self.ty) {
            component
        } else {
            component * u64::from(self.size)
        }
    }

    /// Distance between consecutive elements.
    #[must_use]
    pub fn byte_stride(&self) -> u64 {
        if self.stride == 0 {
            self.element_bytes()
        } else {
            u64::from(self.stride)
        }
    }

    /// Number of whole elements a buffer of `buffer_len` bytes can supply.
    #[must_use]
    pub fn avail_elements(&self, buffer_len: u64) -> u64 {
        let element = self.element_bytes();
        let Some(avail) = buffer_len.checked_sub(self.offset) else {
            return 0;
        };
        if avail < element {
            return 0;
        }
        (avail - element) / self.byte_stride() + 1
    }

    #[must_use]
    pub fn to_pointer(&self, buffer: Option<NativeName>) -> AttribPointer {
        AttribPointer {
            buffer,
            size: self.size,
            ty: self.ty,
            normalized: self.normalized,
            integer: self.integer,
            stride: self.stride,
            offset: self.offset,
        }
    }
}

#[derive(Debug)]
pub struct VertexArrayData {
    pub attribs: Vec<VertexAttrib>,
    pub element_array: Option<BufferId>,
}

impl VertexArrayData {
    #[must_use]
    pub fn new(max_attribs: u32) -> Self {
        Self {
            attribs: vec![VertexAttrib::default(); max_attribs as usize],
            element_array: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avail_elements_counts_whole_elements() {
        let attrib = VertexAttrib {
            size: 3,
            ty: gl::FLOAT,
            stride: 16,
            offset: 4,
            ..VertexAttrib::default()
        };
        // 4..16, 20..32, 36..48 fit in 48 bytes; a fourth would need 52..64.
        assert_eq!(attrib.avail_elements(48), 3);
        assert_eq!(attrib.avail_elements(15), 0);
        assert_eq!(attrib.avail_elements(2), 0);
    }

    #[test]
    fn packed_types_read_four_bytes() {
        let attrib = VertexAttrib {
            size: 4,
            ty: gl::INT_2_10_10_10_REV,
            ..VertexAttrib::default()
        };
        assert_eq!(attrib.element_bytes(), 4);
    }

    #[test]
    fn interleaved_programs_need_one_buffer() {
        let program = LinkedProgram {
            tf_varying_count: 3,
            tf_buffer_mode: gl::INTERLEAVED_ATTRIBS,
            ..LinkedProgram::default()
        };
        assert_eq!(program.required_tf_buffers(), 1);
        let separate = LinkedProgram {
            tf_buffer_mode: gl::SEPARATE_ATTRIBS,
            ..program
        };
        assert_eq!(separate.required_tf_buffers(), 3);
    }
}
