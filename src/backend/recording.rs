//! Headless recording driver.
//!
//! Every call is appended to a shared log so tests and tools can assert on
//! exactly what reached the "driver". Failure modes (allocation failure,
//! device reset, restore failure) are injected through [`RecordingHandle`].

use std::num::NonZeroU32;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    AttachmentSource, AttribPointer, Capabilities, CompileInfo, GlBackend, LinkInfo, LinkRequest,
    NativeName, ObjectKind, ResetStatus, TexStorageDesc, TexUpload, UploadData, UploadShape,
    UploadSourceKind,
};
use crate::context::StateCall;
use crate::draw::GenericAttrib;
use crate::gl::{GLbitfield, GLenum};

/// Upload payload as seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedUpload {
    Zeroed,
    Bytes(Vec<u8>),
    Pbo(u64),
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    CreateObject {
        kind: ObjectKind,
        name: NativeName,
    },
    DeleteObject {
        kind: ObjectKind,
        name: NativeName,
    },
    BindBuffer {
        target: GLenum,
        buffer: Option<NativeName>,
    },
    BindBufferRange {
        target: GLenum,
        index: u32,
        buffer: Option<NativeName>,
        offset: u64,
        size: u64,
    },
    BufferData {
        target: GLenum,
        size: u64,
        data: Option<Vec<u8>>,
    },
    BufferSubData {
        target: GLenum,
        offset: u64,
        len: usize,
    },
    ActiveTexture(u32),
    BindTexture {
        target: GLenum,
        texture: Option<NativeName>,
    },
    BindSampler {
        unit: u32,
        sampler: Option<NativeName>,
    },
    TexImage {
        image_target: GLenum,
        level: u32,
        internal_format: GLenum,
        format: GLenum,
        ty: GLenum,
        size: [u32; 3],
        is_sub_image: bool,
        data: RecordedUpload,
    },
    TexStorage(TexStorageDesc),
    BindFramebuffer {
        target: GLenum,
        framebuffer: Option<NativeName>,
    },
    BindRenderbuffer(Option<NativeName>),
    FramebufferAttach {
        target: GLenum,
        attachment: GLenum,
        source: AttachmentSource,
    },
    RenderbufferStorage {
        internal_format: GLenum,
        samples: u32,
        width: u32,
        height: u32,
    },
    CompileShader(NativeName),
    AttachShader {
        program: NativeName,
        shader: NativeName,
    },
    DetachShader {
        program: NativeName,
        shader: NativeName,
    },
    LinkProgram(NativeName),
    UseProgram(Option<NativeName>),
    BindVertexArray(Option<NativeName>),
    BindTransformFeedback(Option<NativeName>),
    BeginTransformFeedback(GLenum),
    EndTransformFeedback,
    PauseTransformFeedback,
    ResumeTransformFeedback,
    BeginQuery {
        target: GLenum,
        query: NativeName,
    },
    EndQuery(GLenum),
    EnableVertexAttribArray {
        index: u32,
        enabled: bool,
    },
    VertexAttribPointer {
        index: u32,
        pointer: AttribPointer,
    },
    VertexAttribDivisor {
        index: u32,
        divisor: u32,
    },
    VertexAttrib {
        index: u32,
        value: GenericAttrib,
    },
    DrawArrays {
        mode: GLenum,
        first: u32,
        count: u32,
        instances: u32,
    },
    DrawElements {
        mode: GLenum,
        count: u32,
        ty: GLenum,
        offset: u64,
        instances: u32,
    },
    Clear(GLbitfield),
    SetCapability {
        cap: GLenum,
        enabled: bool,
    },
    SetState(StateCall),
    Flush,
    Finish,
    InsertFence(u64),
    Recreate,
    Resize {
        width: u32,
        height: u32,
    },
    Present,
}

impl DriverCall {
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }
}

#[derive(Debug)]
struct Recorder {
    calls: Vec<DriverCall>,
    capabilities: Capabilities,
    next_name: u32,
    issued_fence: u64,
    completed_fence: u64,
    auto_complete_fences: bool,
    fail_allocations: bool,
    fail_object_creation: bool,
    fail_recreate: bool,
    reset_status: ResetStatus,
    compile_success: bool,
    link_result: LinkInfo,
    fast_uploads: bool,
    query_result: u64,
}

/// A [`GlBackend`] that records every call and never touches a GPU.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    recorder: Arc<Mutex<Recorder>>,
}

/// Test-side view of a [`RecordingBackend`]'s log and failure switches.
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    recorder: Arc<Mutex<Recorder>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(Capabilities::default())
    }
}

impl RecordingBackend {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        let recorder = Recorder {
            calls: Vec::new(),
            capabilities,
            next_name: 1,
            issued_fence: 0,
            completed_fence: 0,
            auto_complete_fences: false,
            fail_allocations: false,
            fail_object_creation: false,
            fail_recreate: false,
            reset_status: ResetStatus::NoError,
            compile_success: true,
            link_result: LinkInfo {
                success: true,
                ..LinkInfo::default()
            },
            fast_uploads: true,
            query_result: 0,
        };
        Self {
            recorder: Arc::new(Mutex::new(recorder)),
        }
    }

    #[must_use]
    pub fn handle(&self) -> RecordingHandle {
        RecordingHandle {
            recorder: Arc::clone(&self.recorder),
        }
    }

    fn record(&self, call: DriverCall) {
        self.recorder.lock().calls.push(call);
    }
}

impl RecordingHandle {
    /// Snapshot of every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DriverCall> {
        self.recorder.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.recorder.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.count(DriverCall::is_draw)
    }

    #[must_use]
    pub fn last_call(&self) -> Option<DriverCall> {
        self.recorder.lock().calls.last().cloned()
    }

    pub fn clear(&self) {
        self.recorder.lock().calls.clear();
    }

    /// Makes every allocating call report failure.
    pub fn fail_allocations(&self, fail: bool) {
        self.recorder.lock().fail_allocations = fail;
    }

    pub fn fail_object_creation(&self, fail: bool) {
        self.recorder.lock().fail_object_creation = fail;
    }

    pub fn fail_recreate(&self, fail: bool) {
        self.recorder.lock().fail_recreate = fail;
    }

    /// Simulates a device reset reported on the next status poll.
    pub fn set_reset_status(&self, status: ResetStatus) {
        self.recorder.lock().reset_status = status;
    }

    pub fn set_compile_success(&self, success: bool) {
        self.recorder.lock().compile_success = success;
    }

    pub fn set_link_result(&self, info: LinkInfo) {
        self.recorder.lock().link_result = info;
    }

    /// Controls [`GlBackend::is_fast_upload_eligible`] for byte and PBO sources.
    pub fn set_fast_uploads(&self, fast: bool) {
        self.recorder.lock().fast_uploads = fast;
    }

    pub fn set_query_result(&self, value: u64) {
        self.recorder.lock().query_result = value;
    }

    /// Marks every fence issued so far as complete.
    pub fn complete_all_fences(&self) {
        let mut recorder = self.recorder.lock();
        recorder.completed_fence = recorder.issued_fence;
    }

    /// Reports `id` as the completed counter, even if it is bogus.
    pub fn report_completed_fence(&self, id: u64) {
        self.recorder.lock().completed_fence = id;
    }

    /// Completes fences as soon as they are inserted.
    pub fn auto_complete_fences(&self, enabled: bool) {
        self.recorder.lock().auto_complete_fences = enabled;
    }
}

impl GlBackend for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.recorder.lock().capabilities.clone()
    }

    fn create_object(&mut self, kind: ObjectKind) -> Option<NativeName> {
        let mut recorder = self.recorder.lock();
        if recorder.fail_object_creation {
            return None;
        }
        let name = NonZeroU32::new(recorder.next_name)?;
        recorder.next_name += 1;
        recorder.calls.push(DriverCall::CreateObject { kind, name });
        Some(name)
    }

    fn delete_object(&mut self, kind: ObjectKind, name: NativeName) {
        self.record(DriverCall::DeleteObject { kind, name });
    }

    fn bind_buffer(&mut self, target: GLenum, buffer: Option<NativeName>) {
        self.record(DriverCall::BindBuffer { target, buffer });
    }

    fn bind_buffer_range(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: Option<NativeName>,
        offset: u64,
        size: u64,
    ) {
        self.record(DriverCall::BindBufferRange {
            target,
            index,
            buffer,
            offset,
            size,
        });
    }

    fn buffer_data(
        &mut self,
        target: GLenum,
        size: u64,
        data: Option<&[u8]>,
        _usage: GLenum,
    ) -> bool {
        let mut recorder = self.recorder.lock();
        if recorder.fail_allocations {
            return false;
        }
        recorder.calls.push(DriverCall::BufferData {
            target,
            size,
            data: data.map(<[u8]>::to_vec),
        });
        true
    }

    fn buffer_sub_data(&mut self, target: GLenum, offset: u64, data: &[u8]) {
        self.record(DriverCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(DriverCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: GLenum, texture: Option<NativeName>) {
        self.record(DriverCall::BindTexture { target, texture });
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeName>) {
        self.record(DriverCall::BindSampler { unit, sampler });
    }

    fn tex_image(&mut self, upload: &TexUpload<'_>) -> bool {
        let mut recorder = self.recorder.lock();
        if recorder.fail_allocations && !upload.is_sub_image {
            return false;
        }
        let data = match upload.data {
            UploadData::Zeroed => RecordedUpload::Zeroed,
            UploadData::Bytes(bytes) => RecordedUpload::Bytes(bytes.to_vec()),
            UploadData::Pbo(offset) => RecordedUpload::Pbo(offset),
        };
        recorder.calls.push(DriverCall::TexImage {
            image_target: upload.image_target,
            level: upload.level,
            internal_format: upload.internal_format,
            format: upload.format,
            ty: upload.ty,
            size: upload.size,
            is_sub_image: upload.is_sub_image,
            data,
        });
        true
    }

    fn tex_storage(&mut self, desc: &TexStorageDesc) -> bool {
        let mut recorder = self.recorder.lock();
        if recorder.fail_allocations {
            return false;
        }
        recorder.calls.push(DriverCall::TexStorage(*desc));
        true
    }

    fn is_fast_upload_eligible(&self, shape: &UploadShape) -> bool {
        shape.source != UploadSourceKind::Image && self.recorder.lock().fast_uploads
    }

    fn bind_framebuffer(&mut self, target: GLenum, framebuffer: Option<NativeName>) {
        self.record(DriverCall::BindFramebuffer {
            target,
            framebuffer,
        });
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeName>) {
        self.record(DriverCall::BindRenderbuffer(renderbuffer));
    }

    fn framebuffer_attach(&mut self, target: GLenum, attachment: GLenum, source: AttachmentSource) {
        self.record(DriverCall::FramebufferAttach {
            target,
            attachment,
            source,
        });
    }

    fn renderbuffer_storage(
        &mut self,
        internal_format: GLenum,
        samples: u32,
        width: u32,
        height: u32,
    ) -> bool {
        let mut recorder = self.recorder.lock();
        if recorder.fail_allocations {
            return false;
        }
        recorder.calls.push(DriverCall::RenderbufferStorage {
            internal_format,
            samples,
            width,
            height,
        });
        true
    }

    fn compile_shader(&mut self, shader: NativeName, _stage: GLenum, _source: &str) -> CompileInfo {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(DriverCall::CompileShader(shader));
        if recorder.compile_success {
            CompileInfo {
                success: true,
                log: String::new(),
            }
        } else {
            CompileInfo {
                success: false,
                log: "ERROR: 0:1: syntax error".into(),
            }
        }
    }

    fn attach_shader(&mut self, program: NativeName, shader: NativeName) {
        self.record(DriverCall::AttachShader { program, shader });
    }

    fn detach_shader(&mut self, program: NativeName, shader: NativeName) {
        self.record(DriverCall::DetachShader { program, shader });
    }

    fn link_program(&mut self, program: NativeName, _request: &LinkRequest<'_>) -> LinkInfo {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(DriverCall::LinkProgram(program));
        recorder.link_result.clone()
    }

    fn use_program(&mut self, program: Option<NativeName>) {
        self.record(DriverCall::UseProgram(program));
    }

    fn bind_vertex_array(&mut self, vao: Option<NativeName>) {
        self.record(DriverCall::BindVertexArray(vao));
    }

    fn bind_transform_feedback(&mut self, tf: Option<NativeName>) {
        self.record(DriverCall::BindTransformFeedback(tf));
    }

    fn begin_transform_feedback(&mut self, mode: GLenum) {
        self.record(DriverCall::BeginTransformFeedback(mode));
    }

    fn end_transform_feedback(&mut self) {
        self.record(DriverCall::EndTransformFeedback);
    }

    fn pause_transform_feedback(&mut self) {
        self.record(DriverCall::PauseTransformFeedback);
    }

    fn resume_transform_feedback(&mut self) {
        self.record(DriverCall::ResumeTransformFeedback);
    }

    fn begin_query(&mut self, target: GLenum, query: NativeName) {
        self.record(DriverCall::BeginQuery { target, query });
    }

    fn end_query(&mut self, target: GLenum) {
        self.record(DriverCall::EndQuery(target));
    }

    fn query_result(&mut self, _query: NativeName) -> u64 {
        self.recorder.lock().query_result
    }

    fn enable_vertex_attrib_array(&mut self, index: u32, enabled: bool) {
        self.record(DriverCall::EnableVertexAttribArray { index, enabled });
    }

    fn vertex_attrib_pointer(&mut self, index: u32, pointer: &AttribPointer) {
        self.record(DriverCall::VertexAttribPointer {
            index,
            pointer: *pointer,
        });
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.record(DriverCall::VertexAttribDivisor { index, divisor });
    }

    fn vertex_attrib(&mut self, index: u32, value: GenericAttrib) {
        self.record(DriverCall::VertexAttrib { index, value });
    }

    fn draw_arrays_instanced(&mut self, mode: GLenum, first: u32, count: u32, instances: u32) {
        self.record(DriverCall::DrawArrays {
            mode,
            first,
            count,
            instances,
        });
    }

    fn draw_elements_instanced(
        &mut self,
        mode: GLenum,
        count: u32,
        ty: GLenum,
        offset: u64,
        instances: u32,
    ) {
        self.record(DriverCall::DrawElements {
            mode,
            count,
            ty,
            offset,
            instances,
        });
    }

    fn clear(&mut self, mask: GLbitfield) {
        self.record(DriverCall::Clear(mask));
    }

    fn set_capability(&mut self, cap: GLenum, enabled: bool) {
        self.record(DriverCall::SetCapability { cap, enabled });
    }

    fn set_state(&mut self, call: &StateCall) {
        self.record(DriverCall::SetState(call.clone()));
    }

    fn flush(&mut self) {
        self.record(DriverCall::Flush);
    }

    fn finish(&mut self) {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(DriverCall::Finish);
        recorder.completed_fence = recorder.issued_fence;
    }

    fn insert_fence(&mut self, id: u64) {
        let mut recorder = self.recorder.lock();
        recorder.calls.push(DriverCall::InsertFence(id));
        recorder.issued_fence = id;
        if recorder.auto_complete_fences {
            recorder.completed_fence = id;
        }
    }

    fn completed_fence(&mut self) -> u64 {
        self.recorder.lock().completed_fence
    }

    fn reset_status(&mut self) -> ResetStatus {
        std::mem::take(&mut self.recorder.lock().reset_status)
    }

    fn recreate(&mut self) -> Result<(), String> {
        let mut recorder = self.recorder.lock();
        if recorder.fail_recreate {
            return Err("device still unavailable".into());
        }
        recorder.calls.push(DriverCall::Recreate);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        let mut recorder = self.recorder.lock();
        if recorder.fail_allocations {
            return false;
        }
        recorder.calls.push(DriverCall::Resize { width, height });
        true
    }

    fn present(&mut self) {
        self.record(DriverCall::Present);
    }
}
