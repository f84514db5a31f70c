//! Native Driver Boundary
//!
//! [`GlBackend`] is the only path by which validated calls reach a native
//! graphics driver. The context treats it as an opaque capability interface:
//! every call that arrives here has already passed validation, so a backend
//! never needs to re-check API rules.
//!
//! # Design
//!
//! - Objects are addressed by [`NativeName`]s that the backend mints in
//!   [`GlBackend::create_object`]. A context never reuses a name after it has
//!   passed it to [`GlBackend::delete_object`].
//! - Operations that allocate driver memory return `bool`; `false` surfaces
//!   as `OUT_OF_MEMORY` on the context rather than aborting.
//! - [`Capabilities`] are probed once when the context is created. Driver
//!   workarounds such as the array-backed attribute 0 requirement are keyed
//!   off that probe.
//!
//! [`RecordingBackend`] is a headless implementation that records every call.

mod recording;

pub use recording::{DriverCall, RecordedUpload, RecordingBackend, RecordingHandle};

use std::num::NonZeroU32;

use crate::context::StateCall;
use crate::draw::GenericAttrib;
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLbitfield, GLenum};
use crate::texture::UnpackDescriptor;

/// Driver-side object name. Zero is reserved for "no object".
pub type NativeName = NonZeroU32;

/// The kinds of GPU objects a context manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    Framebuffer,
    Program,
    Query,
    Renderbuffer,
    Sampler,
    Shader,
    Sync,
    TransformFeedback,
    VertexArray,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Implementation limits reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLimits {
    pub max_vertex_attribs: u32,
    pub max_combined_texture_units: u32,
    pub max_texture_size: u32,
    pub max_cube_map_texture_size: u32,
    pub max_3d_texture_size: u32,
    pub max_array_texture_layers: u32,
    pub max_renderbuffer_size: u32,
    pub max_viewport_dims: [u32; 2],
    pub max_color_attachments: u32,
    pub max_draw_buffers: u32,
    pub max_samples: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_transform_feedback_separate_attribs: u32,
    pub uniform_buffer_offset_alignment: u32,
}

impl Default for DriverLimits {
    fn default() -> Self {
        Self {
            max_vertex_attribs: 16,
            max_combined_texture_units: 32,
            max_texture_size: 16384,
            max_cube_map_texture_size: 16384,
            max_3d_texture_size: 2048,
            max_array_texture_layers: 2048,
            max_renderbuffer_size: 16384,
            max_viewport_dims: [16384, 16384],
            max_color_attachments: 8,
            max_draw_buffers: 8,
            max_samples: 4,
            max_uniform_buffer_bindings: 24,
            max_transform_feedback_separate_attribs: 4,
            uniform_buffer_offset_alignment: 256,
        }
    }
}

/// Result of the one-time driver probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub limits: DriverLimits,
    /// The driver cannot draw unless vertex attribute 0 is array-backed.
    pub requires_array_attrib0: bool,
    pub supports_webgl2: bool,
    pub extensions: ExtensionSet,
    pub vendor: String,
    pub renderer: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            limits: DriverLimits::default(),
            requires_array_attrib0: false,
            supports_webgl2: true,
            extensions: ExtensionSet::all(),
            vendor: "Headless".into(),
            renderer: "Headless Recording Driver".into(),
        }
    }
}

// ============================================================================
// Call Payloads
// ============================================================================

/// A vertex attribute array pointer as set on the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub buffer: Option<NativeName>,
    pub size: u8,
    pub ty: GLenum,
    pub normalized: bool,
    pub integer: bool,
    pub stride: u32,
    pub offset: u64,
}

/// What a framebuffer attachment point refers to on the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSource {
    None,
    Texture {
        texture: NativeName,
        image_target: GLenum,
        level: u32,
    },
    Renderbuffer(NativeName),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileInfo {
    pub success: bool,
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttrib {
    pub name: String,
    pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockInfo {
    pub name: String,
    /// Minimum number of bytes a bound buffer range must provide.
    pub data_size: u64,
}

/// Outcome of a driver link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkInfo {
    pub success: bool,
    pub log: String,
    pub active_attribs: Vec<ActiveAttrib>,
    pub uniform_blocks: Vec<UniformBlockInfo>,
}

/// Transform feedback capture requested for a link.
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    pub tf_varyings: &'a [String],
    pub tf_buffer_mode: GLenum,
}

/// Driver reset status, polled by the loss timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetStatus {
    #[default]
    NoError,
    /// This context caused the reset.
    Guilty,
    /// Another context caused the reset.
    Innocent,
    Unknown,
}

/// Pixel data handed to the driver with an upload.
#[derive(Debug, Clone, Copy)]
pub enum UploadData<'a> {
    /// Zero-initialised storage.
    Zeroed,
    Bytes(&'a [u8]),
    /// Byte offset into the bound `PIXEL_UNPACK_BUFFER`.
    Pbo(u64),
}

/// A fully validated texture image upload.
#[derive(Debug, Clone, Copy)]
pub struct TexUpload<'a> {
    pub image_target: GLenum,
    pub level: u32,
    pub internal_format: GLenum,
    pub format: GLenum,
    pub ty: GLenum,
    pub offset: [u32; 3],
    pub size: [u32; 3],
    /// Updates an existing image instead of (re)specifying it.
    pub is_sub_image: bool,
    /// Layout of `data`. Tight after a CPU conversion pass.
    pub unpack: UnpackDescriptor,
    pub data: UploadData<'a>,
}

/// Immutable texture storage allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexStorageDesc {
    pub target: GLenum,
    pub levels: u32,
    pub internal_format: GLenum,
    pub size: [u32; 3],
}

/// Where the bytes of an upload come from, for fast-path eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSourceKind {
    Bytes,
    Pbo,
    Image,
}

/// Shape of an upload, for fast-path eligibility.
#[derive(Debug, Clone, Copy)]
pub struct UploadShape {
    pub source: UploadSourceKind,
    pub internal_format: GLenum,
    pub format: GLenum,
    pub ty: GLenum,
    pub size: [u32; 3],
    pub unpack: UnpackDescriptor,
}

// ============================================================================
// The Driver Trait
// ============================================================================

/// The opaque native driver interface.
pub trait GlBackend: Send {
    fn capabilities(&self) -> Capabilities;

    // --- Objects ---
    fn create_object(&mut self, kind: ObjectKind) -> Option<NativeName>;
    fn delete_object(&mut self, kind: ObjectKind, name: NativeName);

    // --- Buffers ---
    fn bind_buffer(&mut self, target: GLenum, buffer: Option<NativeName>);
    fn bind_buffer_range(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: Option<NativeName>,
        offset: u64,
        size: u64,
    );
    fn buffer_data(&mut self, target: GLenum, size: u64, data: Option<&[u8]>, usage: GLenum)
    -> bool;
    fn buffer_sub_data(&mut self, target: GLenum, offset: u64, data: &[u8]);

    // --- Textures & Samplers ---
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: GLenum, texture: Option<NativeName>);
    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeName>);
    fn tex_image(&mut self, upload: &TexUpload<'_>) -> bool;
    fn tex_storage(&mut self, desc: &TexStorageDesc) -> bool;

    /// Whether the driver can consume this upload directly, honouring the
    /// unpack layout itself. The answer is backend specific.
    fn is_fast_upload_eligible(&self, shape: &UploadShape) -> bool {
        shape.source != UploadSourceKind::Image
    }

    // --- Framebuffers ---
    fn bind_framebuffer(&mut self, target: GLenum, framebuffer: Option<NativeName>);
    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeName>);
    fn framebuffer_attach(&mut self, target: GLenum, attachment: GLenum, source: AttachmentSource);
    fn renderbuffer_storage(
        &mut self,
        internal_format: GLenum,
        samples: u32,
        width: u32,
        height: u32,
    ) -> bool;

    // --- Programs ---
    fn compile_shader(&mut self, shader: NativeName, stage: GLenum, source: &str) -> CompileInfo;
    fn attach_shader(&mut self, program: NativeName, shader: NativeName);
    fn detach_shader(&mut self, program: NativeName, shader: NativeName);
    fn link_program(&mut self, program: NativeName, request: &LinkRequest<'_>) -> LinkInfo;
    fn use_program(&mut self, program: Option<NativeName>);

    // --- Vertex Arrays & Transform Feedback ---
    fn bind_vertex_array(&mut self, vao: Option<NativeName>);
    fn bind_transform_feedback(&mut self, tf: Option<NativeName>);
    fn begin_transform_feedback(&mut self, mode: GLenum);
    fn end_transform_feedback(&mut self);
    fn pause_transform_feedback(&mut self);
    fn resume_transform_feedback(&mut self);

    // --- Queries ---
    fn begin_query(&mut self, target: GLenum, query: NativeName);
    fn end_query(&mut self, target: GLenum);
    fn query_result(&mut self, query: NativeName) -> u64;

    // --- Vertex Attributes ---
    fn enable_vertex_attrib_array(&mut self, index: u32, enabled: bool);
    fn vertex_attrib_pointer(&mut self, index: u32, pointer: &AttribPointer);
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);
    fn vertex_attrib(&mut self, index: u32, value: GenericAttrib);

    // --- Drawing ---
    fn draw_arrays_instanced(&mut self, mode: GLenum, first: u32, count: u32, instances: u32);
    fn draw_elements_instanced(
        &mut self,
        mode: GLenum,
        count: u32,
        ty: GLenum,
        offset: u64,
        instances: u32,
    );
    fn clear(&mut self, mask: GLbitfield);

    // --- Fixed-function State ---
    fn set_capability(&mut self, cap: GLenum, enabled: bool);
    fn set_state(&mut self, call: &StateCall);

    // --- Submission & Sync ---
    fn flush(&mut self);
    fn finish(&mut self);
    /// Queues a fence that completes once all prior work has executed.
    fn insert_fence(&mut self, id: u64);
    /// Highest fence id known to have completed.
    fn completed_fence(&mut self) -> u64;

    // --- Loss & Presentation ---
    fn reset_status(&mut self) -> ResetStatus;
    /// Recreates the native context after a loss. All names are invalid.
    fn recreate(&mut self) -> Result<(), String>;
    fn resize(&mut self, width: u32, height: u32) -> bool;
    fn present(&mut self);
}

/// Whether `ty` is a packed pixel type that must be used with 4 components
/// when used as a vertex attribute type.
#[inline]
#[must_use]
pub(crate) fn is_packed_vertex_type(ty: GLenum) -> bool {
    matches!(ty, gl::INT_2_10_10_10_REV | gl::UNSIGNED_INT_2_10_10_10_REV)
}
