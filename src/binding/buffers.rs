use smallvec::SmallVec;

use super::{ByteRange, IndexedBufferBinding};
use crate::context::{Failure, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{BufferContent, BufferId, ObjectRegistry, SlotRef, TransformFeedbackData};

/// Initial contents for `bufferData`.
#[derive(Debug, Clone, Copy)]
pub enum BufferInit<'a> {
    /// Zero-filled storage of the given size.
    Size(i64),
    Data(&'a [u8]),
}

impl WebGlContext {
    // ========================================================================
    // Lookups
    // ========================================================================

    pub(crate) fn validate_buffer_target(&self, target: GLenum) -> Validated<()> {
        match target {
            gl::ARRAY_BUFFER | gl::ELEMENT_ARRAY_BUFFER => Ok(()),
            gl::COPY_READ_BUFFER
            | gl::COPY_WRITE_BUFFER
            | gl::PIXEL_PACK_BUFFER
            | gl::PIXEL_UNPACK_BUFFER
            | gl::TRANSFORM_FEEDBACK_BUFFER
            | gl::UNIFORM_BUFFER
                if self.version.is_webgl2() =>
            {
                Ok(())
            }
            _ => Err(Failure::invalid_enum(format!("Bad buffer target: 0x{target:04x}"))),
        }
    }

    /// Buffer bound to a generic target. `ELEMENT_ARRAY_BUFFER` lives in the
    /// current vertex array.
    pub(crate) fn bound_buffer(&self, target: GLenum) -> Validated<Option<BufferId>> {
        self.validate_buffer_target(target)?;
        Ok(match target {
            gl::ELEMENT_ARRAY_BUFFER => self.current_vao().element_array,
            gl::ARRAY_BUFFER => self.bindings.array_buffer,
            gl::COPY_READ_BUFFER => self.bindings.copy_read_buffer,
            gl::COPY_WRITE_BUFFER => self.bindings.copy_write_buffer,
            gl::PIXEL_PACK_BUFFER => self.bindings.pixel_pack_buffer,
            gl::PIXEL_UNPACK_BUFFER => self.bindings.pixel_unpack_buffer,
            gl::UNIFORM_BUFFER => self.bindings.uniform_buffer,
            _ => self.bindings.transform_feedback_buffer,
        })
    }

    /// Like [`WebGlContext::bound_buffer`], but the slot must be occupied
    /// by a live buffer.
    pub(crate) fn require_bound_buffer(&self, target: GLenum) -> Validated<BufferId> {
        match SlotRef::resolve(self.bound_buffer(target)?, &self.objects.buffers) {
            SlotRef::Live(id) => Ok(id),
            SlotRef::Deleted(_) => Err(Failure::invalid_operation("Bound buffer has been deleted.")),
            SlotRef::Empty => Err(Failure::invalid_operation(format!(
                "No buffer bound to 0x{target:04x}."
            ))),
        }
    }

    /// The bound transform feedback object. The slot holds a reference, so
    /// the fallback is never observed.
    pub(crate) fn current_tf(&self) -> &TransformFeedbackData {
        static DETACHED: TransformFeedbackData = TransformFeedbackData {
            bindings: Vec::new(),
            active: false,
            paused: false,
            mode: gl::POINTS,
            program: None,
        };
        self.objects
            .transform_feedbacks
            .data(self.bindings.transform_feedback)
            .unwrap_or(&DETACHED)
    }

    #[must_use]
    pub(crate) fn tf_is_active(&self) -> bool {
        self.current_tf().active
    }

    /// Checks that `buffer` may occupy `target`.
    fn validate_buffer_for_target(&self, target: GLenum, buffer: BufferId) -> Validated<()> {
        let entry = self
            .objects
            .buffers
            .get(buffer)
            .ok_or_else(|| Failure::invalid_operation("Unknown buffer."))?;
        if entry.deleted {
            return Err(Failure::invalid_operation("Buffer has been deleted."));
        }
        let is_copy = matches!(target, gl::COPY_READ_BUFFER | gl::COPY_WRITE_BUFFER);
        match (entry.data.content, target) {
            (BufferContent::ElementArray, _) if !is_copy && target != gl::ELEMENT_ARRAY_BUFFER => {
                return Err(Failure::invalid_operation(
                    "Buffer already contains element data and cannot be bound to other targets.",
                ));
            }
            (BufferContent::OtherData, gl::ELEMENT_ARRAY_BUFFER) => {
                return Err(Failure::invalid_operation(
                    "Buffer already contains non-element data and cannot be bound to ELEMENT_ARRAY_BUFFER.",
                ));
            }
            _ => {}
        }
        if target != gl::TRANSFORM_FEEDBACK_BUFFER && self.current_tf().captures_into(buffer) {
            return Err(Failure::invalid_operation(
                "Buffer is bound for output of an active transform feedback.",
            ));
        }
        Ok(())
    }

    /// Fixes the content kind of a buffer on its first non-copy bind.
    fn note_buffer_bind(objects: &mut ObjectRegistry, target: GLenum, buffer: BufferId) {
        objects.buffers.mark_bound(buffer);
        let Some(data) = objects.buffers.data_mut(buffer) else {
            return;
        };
        if data.content != BufferContent::Undefined
            || matches!(target, gl::COPY_READ_BUFFER | gl::COPY_WRITE_BUFFER)
        {
            return;
        }
        if target == gl::ELEMENT_ARRAY_BUFFER {
            data.content = BufferContent::ElementArray;
        } else {
            data.content = BufferContent::OtherData;
            data.index_shadow = None;
            data.invalidate_index_cache();
        }
    }

    /// Puts `buffer` into the generic slot for `target`. Validation done.
    fn set_generic_buffer(&mut self, target: GLenum, buffer: Option<BufferId>) {
        if let Some(id) = buffer {
            Self::note_buffer_bind(&mut self.objects, target, id);
        }
        let ObjectRegistry {
            buffers,
            vertex_arrays,
            ..
        } = &mut self.objects;
        if target == gl::ELEMENT_ARRAY_BUFFER {
            if let Some(vao) = vertex_arrays.data_mut(self.bindings.vertex_array) {
                buffers.rebind(&mut vao.element_array, buffer);
            }
        } else if let Some(slot) = self.bindings.buffer_slot_mut(target) {
            buffers.rebind(slot, buffer);
        }
        let native = self.objects.buffers.native_of(buffer);
        self.backend.bind_buffer(target, native);
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// `bindBuffer`.
    pub fn bind_buffer(&mut self, target: GLenum, buffer: Option<BufferId>) {
        self.run("bindBuffer", |ctx| {
            ctx.validate_buffer_target(target)?;
            if target == gl::TRANSFORM_FEEDBACK_BUFFER && ctx.tf_is_active() {
                return Err(Failure::invalid_operation(
                    "Cannot change TRANSFORM_FEEDBACK_BUFFER while transform feedback is active.",
                ));
            }
            if let Some(id) = buffer {
                ctx.validate_buffer_for_target(target, id)?;
            }
            ctx.set_generic_buffer(target, buffer);
            Ok(())
        });
    }

    /// `bindBufferBase`: binds the whole buffer to an indexed target.
    pub fn bind_buffer_base(&mut self, target: GLenum, index: u32, buffer: Option<BufferId>) {
        self.run("bindBufferBase", |ctx| ctx.bind_indexed(target, index, buffer, None));
    }

    /// `bindBufferRange`.
    pub fn bind_buffer_range(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: Option<BufferId>,
        offset: i64,
        size: i64,
    ) {
        self.run("bindBufferRange", |ctx| {
            let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;
            let size = u64::try_from(size).map_err(|_| Failure::invalid_value("`size` must be >= 0."))?;
            ctx.bind_indexed(target, index, buffer, Some((offset, size)))
        });
    }

    fn bind_indexed(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: Option<BufferId>,
        range: Option<(u64, u64)>,
    ) -> Validated<()> {
        self.require_webgl2()?;
        let max_index = match target {
            gl::UNIFORM_BUFFER => self.limits.max_uniform_buffer_bindings,
            gl::TRANSFORM_FEEDBACK_BUFFER => self.limits.max_transform_feedback_separate_attribs,
            _ => {
                return Err(Failure::invalid_enum(format!(
                    "Bad indexed buffer target: 0x{target:04x}"
                )));
            }
        };
        if index >= max_index {
            return Err(Failure::invalid_value(format!(
                "`index` ({index}) must be < {max_index}."
            )));
        }
        if target == gl::TRANSFORM_FEEDBACK_BUFFER && self.tf_is_active() {
            return Err(Failure::invalid_operation(
                "Cannot change TRANSFORM_FEEDBACK_BUFFER while transform feedback is active.",
            ));
        }

        let (start, size) = range.unwrap_or((0, 0));
        if let Some((offset, size)) = range
            && buffer.is_some()
        {
            if size == 0 {
                return Err(Failure::invalid_value("`size` must be > 0."));
            }
            match target {
                gl::UNIFORM_BUFFER => {
                    let align = u64::from(self.limits.uniform_buffer_offset_alignment);
                    if offset % align != 0 {
                        return Err(Failure::invalid_value(format!(
                            "`offset` must be a multiple of UNIFORM_BUFFER_OFFSET_ALIGNMENT ({align})."
                        )));
                    }
                }
                _ => {
                    if offset % 4 != 0 || size % 4 != 0 {
                        return Err(Failure::invalid_value(
                            "`offset` and `size` must be multiples of 4.",
                        ));
                    }
                }
            }
        }
        if let Some(id) = buffer {
            self.validate_buffer_for_target(target, id)?;
            if let Some((offset, size)) = range {
                let len = self.objects.buffers.data(id).map_or(0, |b| b.byte_length);
                let end = offset
                    .checked_add(size)
                    .ok_or_else(|| Failure::invalid_value("`offset + size` overflows."))?;
                if end > len {
                    return Err(Failure::invalid_value(format!(
                        "`offset + size` ({end}) exceeds the buffer's byte length ({len})."
                    )));
                }
            }
        }

        // Validation complete; mutate.
        let binding = IndexedBufferBinding {
            buffer,
            start: if buffer.is_some() { start } else { 0 },
            size: if buffer.is_some() { size } else { 0 },
        };
        let ObjectRegistry {
            buffers,
            transform_feedbacks,
            ..
        } = &mut self.objects;
        let slot = if target == gl::UNIFORM_BUFFER {
            self.bindings.uniform_buffers.get_mut(index as usize)
        } else {
            transform_feedbacks
                .data_mut(self.bindings.transform_feedback)
                .and_then(|tf| tf.bindings.get_mut(index as usize))
        };
        let Some(slot) = slot else {
            return Err(Failure::implementation_bug("indexed binding slot missing"));
        };
        buffers.rebind(&mut slot.buffer, buffer);
        slot.start = binding.start;
        slot.size = binding.size;

        if let Some(id) = buffer {
            Self::note_buffer_bind(&mut self.objects, target, id);
        }
        if let Some(generic) = self.bindings.buffer_slot_mut(target) {
            self.objects.buffers.rebind(generic, buffer);
        }
        let native = self.objects.buffers.native_of(buffer);
        self.backend
            .bind_buffer_range(target, index, native, binding.start, binding.size);
        Ok(())
    }

    // ========================================================================
    // Data
    // ========================================================================

    fn validate_usage(&self, usage: GLenum) -> Validated<()> {
        match usage {
            gl::STREAM_DRAW | gl::STATIC_DRAW | gl::DYNAMIC_DRAW => Ok(()),
            gl::STREAM_READ
            | gl::STREAM_COPY
            | gl::STATIC_READ
            | gl::STATIC_COPY
            | gl::DYNAMIC_READ
            | gl::DYNAMIC_COPY
                if self.version.is_webgl2() =>
            {
                Ok(())
            }
            _ => Err(Failure::invalid_enum(format!("Bad usage: 0x{usage:04x}"))),
        }
    }

    fn reject_active_tf_output(&self, buffer: BufferId) -> Validated<()> {
        if self.current_tf().captures_into(buffer) {
            return Err(Failure::invalid_operation(
                "Buffer is bound for output of an active transform feedback.",
            ));
        }
        Ok(())
    }

    /// `bufferData`. Reallocates the bound buffer.
    pub fn buffer_data(&mut self, target: GLenum, init: BufferInit<'_>, usage: GLenum) {
        self.run("bufferData", |ctx| {
            ctx.validate_buffer_target(target)?;
            ctx.validate_usage(usage)?;
            let id = ctx.require_bound_buffer(target)?;
            ctx.reject_active_tf_output(id)?;

            let (len, bytes) = match init {
                BufferInit::Size(size) => {
                    let size = u64::try_from(size).map_err(|_| Failure::invalid_value("`size` must be >= 0."))?;
                    (size, None)
                }
                BufferInit::Data(bytes) => (bytes.len() as u64, Some(bytes)),
            };

            let keeps_shadow = ctx
                .objects
                .buffers
                .data(id)
                .is_some_and(crate::objects::BufferData::keeps_index_shadow);
            let shadow = if keeps_shadow {
                let len_usize = usize::try_from(len).map_err(|_| Failure::out_of_memory("Buffer too large."))?;
                let mut shadow = Vec::new();
                shadow
                    .try_reserve_exact(len_usize)
                    .map_err(|_| Failure::out_of_memory("Failed to allocate index shadow."))?;
                match bytes {
                    Some(bytes) => shadow.extend_from_slice(bytes),
                    None => shadow.resize(len_usize, 0),
                }
                Some(shadow)
            } else {
                None
            };

            if !ctx.backend.buffer_data(target, len, bytes, usage) {
                return Err(Failure::out_of_memory(format!("Failed to allocate {len} bytes.")));
            }
            if let Some(data) = ctx.objects.buffers.data_mut(id) {
                data.byte_length = len;
                data.usage = usage;
                data.index_shadow = shadow;
                data.invalidate_index_cache();
            }
            Ok(())
        });
    }

    /// `bufferSubData`.
    pub fn buffer_sub_data(&mut self, target: GLenum, offset: i64, bytes: &[u8]) {
        self.run("bufferSubData", |ctx| {
            ctx.validate_buffer_target(target)?;
            let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;
            let id = ctx.require_bound_buffer(target)?;
            ctx.reject_active_tf_output(id)?;
            let len = ctx.objects.buffers.data(id).map_or(0, |b| b.byte_length);
            let end = offset
                .checked_add(bytes.len() as u64)
                .filter(|end| *end <= len)
                .ok_or_else(|| Failure::invalid_value("Offset and data size exceed the buffer's size."))?;
            if bytes.is_empty() {
                return Ok(());
            }

            ctx.backend.buffer_sub_data(target, offset, bytes);
            if let Some(data) = ctx.objects.buffers.data_mut(id) {
                if let Some(shadow) = data.index_shadow.as_mut() {
                    // `end <= byte_length == shadow.len()`, so both fit usize.
                    shadow[offset as usize..end as usize].copy_from_slice(bytes);
                }
                data.invalidate_index_cache();
            }
            Ok(())
        });
    }

    // ========================================================================
    // Transform Feedback Aliasing
    // ========================================================================

    /// Output ranges of the bound transform feedback object.
    pub(crate) fn tf_output_ranges(&self) -> SmallVec<[ByteRange; 4]> {
        self.current_tf()
            .bindings
            .iter()
            .filter_map(|binding| {
                let len = binding
                    .buffer
                    .and_then(|b| self.objects.buffers.data(b))
                    .map_or(0, |b| b.byte_length);
                binding.byte_range(len)
            })
            .collect()
    }

    /// Before a draw with transform feedback active: every required output
    /// binding is present and no output range overlaps another output or
    /// any range the draw reads from.
    pub(crate) fn validate_buffers_for_tf(&self, inputs: &[ByteRange]) -> Validated<()> {
        let tf = self.current_tf();
        if !tf.is_capturing() {
            return Ok(());
        }
        let required = tf
            .program
            .and_then(|p| self.objects.programs.data(p))
            .and_then(|p| p.linked.as_ref())
            .map_or(0, crate::objects::LinkedProgram::required_tf_buffers);
        for index in 0..required {
            let bound = tf
                .bindings
                .get(index as usize)
                .and_then(|b| b.buffer)
                .is_some_and(|b| self.objects.buffers.is_live(b));
            if !bound {
                return Err(Failure::invalid_operation(format!(
                    "Transform feedback output {index} has no buffer bound."
                )));
            }
        }

        let outputs = self.tf_output_ranges();
        for (i, out) in outputs.iter().enumerate() {
            if outputs[i + 1..].iter().any(|other| out.overlaps(other)) {
                return Err(Failure::invalid_operation(
                    "Transform feedback output ranges overlap.",
                ));
            }
            if inputs.iter().any(|input| out.overlaps(input)) {
                return Err(Failure::invalid_operation(
                    "A buffer range is bound for both transform feedback output and draw input.",
                ));
            }
        }
        Ok(())
    }
}
