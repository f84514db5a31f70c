use serde::{Deserialize, Serialize};

use crate::backend::DriverLimits;
use crate::settings::Settings;

/// API version exposed by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WebGlVersion {
    #[default]
    WebGl1,
    WebGl2,
}

impl WebGlVersion {
    #[inline]
    #[must_use]
    pub const fn is_webgl2(self) -> bool {
        matches!(self, Self::WebGl2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    LowPower,
    HighPerformance,
}

/// Creation attributes, frozen for the lifetime of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    pub fail_if_major_performance_caveat: bool,
    pub power_preference: PowerPreference,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: true,
            stencil: false,
            antialias: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            fail_if_major_performance_caveat: false,
            power_preference: PowerPreference::Default,
        }
    }
}

/// Everything the context factory needs besides the driver.
#[derive(Debug, Clone, Default)]
pub struct InitContextDesc {
    pub version: WebGlVersion,
    pub attributes: ContextAttributes,
    /// Requested drawing buffer size.
    pub size: (u32, u32),
    /// Clamp limits and hide identifying strings.
    pub resist_fingerprinting: bool,
    pub settings: Settings,
}

/// Limits snapshot taken at creation. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_vertex_attribs: u32,
    pub max_texture_units: u32,
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

impl Limits {
    /// Derives the exposed limits from the driver's.
    #[must_use]
    pub fn from_driver(driver: &DriverLimits, version: WebGlVersion, resist_fingerprinting: bool) -> Self {
        let mut limits = Self {
            max_vertex_attribs: driver.max_vertex_attribs,
            max_texture_units: driver.max_combined_texture_units,
            max_texture_size: driver.max_texture_size,
            max_cube_map_texture_size: driver.max_cube_map_texture_size,
            max_3d_texture_size: driver.max_3d_texture_size,
            max_array_texture_layers: driver.max_array_texture_layers,
            max_renderbuffer_size: driver.max_renderbuffer_size,
            max_viewport_dims: driver.max_viewport_dims,
            max_color_attachments: driver.max_color_attachments,
            max_draw_buffers: driver.max_draw_buffers,
            max_samples: driver.max_samples,
            max_uniform_buffer_bindings: driver.max_uniform_buffer_bindings,
            max_transform_feedback_separate_attribs: driver.max_transform_feedback_separate_attribs,
            uniform_buffer_offset_alignment: driver.uniform_buffer_offset_alignment.max(1),
        };

        if !version.is_webgl2() {
            limits.max_3d_texture_size = 0;
            limits.max_array_texture_layers = 0;
            limits.max_color_attachments = 1;
            limits.max_draw_buffers = 1;
            limits.max_samples = 0;
            limits.max_uniform_buffer_bindings = 0;
            limits.max_transform_feedback_separate_attribs = 0;
        }

        if resist_fingerprinting {
            limits.max_vertex_attribs = limits.max_vertex_attribs.min(16);
            limits.max_texture_units = limits.max_texture_units.min(16);
            limits.max_texture_size = limits.max_texture_size.min(2048);
            limits.max_cube_map_texture_size = limits.max_cube_map_texture_size.min(2048);
            limits.max_3d_texture_size = limits.max_3d_texture_size.min(256);
            limits.max_array_texture_layers = limits.max_array_texture_layers.min(256);
            limits.max_renderbuffer_size = limits.max_renderbuffer_size.min(2048);
            limits.max_viewport_dims = limits.max_viewport_dims.map(|d| d.min(2048));
            limits.max_samples = limits.max_samples.min(4);
        }
        limits
    }

    /// Largest valid mip level for a base dimension limit.
    #[must_use]
    pub fn max_level_for(size: u32) -> u32 {
        if size == 0 { 0 } else { 31 - size.leading_zeros() }
    }
}
