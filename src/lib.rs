#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod binding;
pub mod context;
pub mod draw;
pub mod errors;
pub mod extensions;
pub mod gl;
pub mod loss;
pub mod objects;
pub mod settings;
pub mod sync;
pub mod texture;

pub use backend::{Capabilities, DriverCall, GlBackend, RecordingBackend, RecordingHandle};
pub use binding::{BufferInit, FramebufferStatus};
pub use context::{
    ContextAttributes, ContextBuilder, GlError, InitContextDesc, Limits, ParamValue, PowerPreference,
    WarningKind, WebGlContext, WebGlVersion,
};
pub use errors::{Result, WebGlError};
pub use extensions::ExtensionId;
pub use loss::{ContextLossReason, ContextManager, LossState, ManualClock, SystemClock};
pub use objects::{
    BufferId, FramebufferId, ProgramId, QueryId, RenderbufferId, SamplerId, ShaderId, SyncId, TextureId,
    TransformFeedbackId, VertexArrayId,
};
pub use settings::Settings;
pub use sync::Availability;
pub use texture::{DomImage, TexSource};
