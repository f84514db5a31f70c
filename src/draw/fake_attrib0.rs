//! Attribute 0 emulation.
//!
//! Some desktop drivers refuse to draw unless vertex attribute 0 is backed
//! by an array. When attribute 0 is disabled on such a driver, each draw
//! points it at a scratch buffer filled with the current generic value and
//! puts the real attribute state back afterwards.

use crate::backend::{AttribPointer, NativeName, ObjectKind};
use crate::context::{Failure, Validated, WebGlContext};
use crate::draw::{GenericAttrib, GenericType};
use crate::gl;

/// Scratch buffer backing attribute 0, and what it was last filled with.
#[derive(Debug, Default)]
pub struct FakeAttrib0 {
    buffer: Option<NativeName>,
    /// Value and vertex count of the last upload.
    uploaded: Option<(GenericAttrib, u64)>,
    warned: bool,
}

impl FakeAttrib0 {
    #[inline]
    #[must_use]
    pub fn native(&self) -> Option<NativeName> {
        self.buffer
    }

    /// Drops the scratch buffer without deleting it, returning its name.
    pub fn forget(&mut self) -> Option<NativeName> {
        self.uploaded = None;
        self.buffer.take()
    }
}

impl WebGlContext {
    pub(crate) fn needs_fake_attrib0(&self) -> bool {
        self.capabilities.requires_array_attrib0 && !self.current_vao().attribs[0].enabled
    }

    /// Points attribute 0 at `vertex_count` copies of its generic value.
    pub(crate) fn setup_fake_attrib0(&mut self, vertex_count: u64) -> Validated<()> {
        if !self.fake_attrib0.warned {
            self.fake_attrib0.warned = true;
            self.perf_warn(
                "Drawing without vertex attrib 0 array enabled forces expensive emulation work.",
            );
        }

        let value = self.generic_attribs[0];
        let byte_len = vertex_count
            .checked_mul(16)
            .ok_or_else(|| Failure::out_of_memory("Fake attrib 0 buffer size overflows."))?;

        let buffer = match self.fake_attrib0.buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = self
                    .backend
                    .create_object(ObjectKind::Buffer)
                    .ok_or_else(|| Failure::out_of_memory("Failed to create fake attrib 0 buffer."))?;
                self.fake_attrib0.buffer = Some(buffer);
                buffer
            }
        };
        self.backend.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));

        if self.fake_attrib0.uploaded != Some((value, vertex_count)) {
            self.fake_attrib0.uploaded = None;
            let count = usize::try_from(vertex_count)
                .map_err(|_| Failure::out_of_memory("Fake attrib 0 buffer too large."))?;
            let mut vertices: Vec<[u32; 4]> = Vec::new();
            vertices
                .try_reserve_exact(count)
                .map_err(|_| Failure::out_of_memory("Failed to allocate fake attrib 0 data."))?;
            vertices.resize(count, value.bits);
            let bytes: &[u8] = bytemuck::cast_slice(&vertices);
            if !self.backend.buffer_data(gl::ARRAY_BUFFER, byte_len, Some(bytes), gl::DYNAMIC_DRAW) {
                return Err(Failure::out_of_memory("Failed to upload fake attrib 0 data."));
            }
            self.fake_attrib0.uploaded = Some((value, vertex_count));
        }

        let pointer = AttribPointer {
            buffer: Some(buffer),
            size: 4,
            ty: value.gl_type(),
            normalized: false,
            integer: value.ty != GenericType::Float,
            stride: 0,
            offset: 0,
        };
        self.backend.vertex_attrib_pointer(0, &pointer);
        self.backend.enable_vertex_attrib_array(0, true);
        Ok(())
    }

    /// Restores the driver's attribute 0 and `ARRAY_BUFFER` binding from
    /// tracked state.
    pub(crate) fn undo_fake_attrib0(&mut self) {
        let attrib = self.current_vao().attribs[0];
        let pointer = attrib.to_pointer(self.objects.buffers.native_of(attrib.buffer));
        self.backend.vertex_attrib_pointer(0, &pointer);
        self.backend.enable_vertex_attrib_array(0, attrib.enabled);
        let array_buffer = self.objects.buffers.native_of(self.bindings.array_buffer);
        self.backend.bind_buffer(gl::ARRAY_BUFFER, array_buffer);
    }
}
