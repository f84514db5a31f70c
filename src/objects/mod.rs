//! GPU Object Registry
//!
//! Every GPU object a context creates lives in a typed [`ObjectPool`] keyed
//! by a slotmap id. Ids are what scripts hold; they stay stable across a
//! context restore even though the native names behind them change.
//!
//! # Lifetime
//!
//! An object is referenced by its creation registry (until `Delete*`) and by
//! every binding slot holding it. A deleted object that is still bound stays
//! addressable, answers identity queries, and is rejected for new use. Its
//! native resource is released once the last reference drops. Released
//! names are collected per pool and drained by the context at the end of the
//! current call, so the driver never sees a name freed mid-validation.

mod pool;
mod types;

pub use pool::{ObjectEntry, ObjectPool};
pub use types::{
    Attachment, BufferContent, BufferData, FramebufferData, ImageInfo, LinkedProgram,
    ProgramData, QueryData, RenderbufferData, ShaderData, SyncData, TextureData,
    TransformFeedbackData, VertexArrayData, VertexAttrib, face_index,
};

use slotmap::{Key, new_key_type};

use crate::backend::{NativeName, ObjectKind};

new_key_type! {
    pub struct BufferId;
    pub struct TextureId;
    pub struct FramebufferId;
    pub struct ProgramId;
    pub struct QueryId;
    pub struct RenderbufferId;
    pub struct SamplerId;
    pub struct ShaderId;
    pub struct SyncId;
    pub struct TransformFeedbackId;
    pub struct VertexArrayId;
}

/// Resolution of a binding slot.
///
/// Lookup succeeds for both live and deleted occupants; only `Live` may be
/// used for new draws or uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef<K> {
    Empty,
    Live(K),
    Deleted(K),
}

impl<K: Key> SlotRef<K> {
    #[must_use]
    pub fn resolve<T>(slot: Option<K>, pool: &ObjectPool<K, T>) -> Self {
        match slot {
            None => Self::Empty,
            Some(id) if pool.is_live(id) => Self::Live(id),
            Some(id) => Self::Deleted(id),
        }
    }

    #[inline]
    #[must_use]
    pub fn live(self) -> Option<K> {
        match self {
            Self::Live(id) => Some(id),
            _ => None,
        }
    }

    /// The occupant, live or deleted.
    #[inline]
    #[must_use]
    pub fn id(self) -> Option<K> {
        match self {
            Self::Empty => None,
            Self::Live(id) | Self::Deleted(id) => Some(id),
        }
    }
}

/// All object pools of one context.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    pub buffers: ObjectPool<BufferId, BufferData>,
    pub textures: ObjectPool<TextureId, TextureData>,
    pub framebuffers: ObjectPool<FramebufferId, FramebufferData>,
    pub programs: ObjectPool<ProgramId, ProgramData>,
    pub queries: ObjectPool<QueryId, QueryData>,
    pub renderbuffers: ObjectPool<RenderbufferId, RenderbufferData>,
    pub samplers: ObjectPool<SamplerId, ()>,
    pub shaders: ObjectPool<ShaderId, ShaderData>,
    pub syncs: ObjectPool<SyncId, SyncData>,
    pub transform_feedbacks: ObjectPool<TransformFeedbackId, TransformFeedbackData>,
    pub vertex_arrays: ObjectPool<VertexArrayId, VertexArrayData>,
}

macro_rules! for_each_pool {
    ($self:ident, |$kind:ident, $pool:ident| $body:expr) => {{
        { let $kind = ObjectKind::Buffer; let $pool = &mut $self.buffers; $body }
        { let $kind = ObjectKind::Texture; let $pool = &mut $self.textures; $body }
        { let $kind = ObjectKind::Framebuffer; let $pool = &mut $self.framebuffers; $body }
        { let $kind = ObjectKind::Program; let $pool = &mut $self.programs; $body }
        { let $kind = ObjectKind::Query; let $pool = &mut $self.queries; $body }
        { let $kind = ObjectKind::Renderbuffer; let $pool = &mut $self.renderbuffers; $body }
        { let $kind = ObjectKind::Sampler; let $pool = &mut $self.samplers; $body }
        { let $kind = ObjectKind::Shader; let $pool = &mut $self.shaders; $body }
        { let $kind = ObjectKind::Sync; let $pool = &mut $self.syncs; $body }
        { let $kind = ObjectKind::TransformFeedback; let $pool = &mut $self.transform_feedbacks; $body }
        { let $kind = ObjectKind::VertexArray; let $pool = &mut $self.vertex_arrays; $body }
    }};
}

impl ObjectRegistry {
    /// Native names whose release became due.
    pub fn drain_released(&mut self) -> Vec<(ObjectKind, NativeName)> {
        let mut out = Vec::new();
        for_each_pool!(self, |kind, pool| out.extend(pool.drain_graveyard().map(|n| (kind, n))));
        out
    }

    /// Removes every object, returning every native name still alive.
    pub fn clear_all(&mut self) -> Vec<(ObjectKind, NativeName)> {
        let mut out = Vec::new();
        for_each_pool!(self, |kind, pool| out.extend(pool.clear().into_iter().map(|n| (kind, n))));
        out
    }

    /// Drops every native name without releasing it. Used when the driver
    /// context is gone and its names died with it.
    pub fn forget_natives(&mut self) {
        for_each_pool!(self, |_kind, pool| {
            pool.drain_graveyard().for_each(drop);
            for (_, entry) in pool.iter_mut() {
                entry.native = None;
            }
        });
    }

    /// Total number of objects, deleted-but-referenced ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.framebuffers.len()
            + self.programs.len()
            + self.queries.len()
            + self.renderbuffers.len()
            + self.samplers.len()
            + self.shaders.len()
            + self.syncs.len()
            + self.transform_feedbacks.len()
            + self.vertex_arrays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
