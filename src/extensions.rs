//! Extension Table
//!
//! Extensions are looked up through a fixed enumerated table. Enabling one
//! relaxes or extends validation rules (e.g. `OES_element_index_uint` admits
//! 32-bit indices on WebGL 1) without changing the core validators.
//!
//! The set supported by a context is the intersection of what the driver
//! advertises and what the context version exposes as an extension rather
//! than as core functionality.

use bitflags::bitflags;

use crate::context::WebGlVersion;

bitflags! {
    /// A set of [`ExtensionId`]s, used for both "supported" and "enabled".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtensionSet: u32 {
        const ANGLE_INSTANCED_ARRAYS = 1 << 0;
        const OES_ELEMENT_INDEX_UINT = 1 << 1;
        const OES_VERTEX_ARRAY_OBJECT = 1 << 2;
        const OES_TEXTURE_FLOAT = 1 << 3;
        const OES_TEXTURE_HALF_FLOAT = 1 << 4;
        const WEBGL_LOSE_CONTEXT = 1 << 5;
        const EXT_COLOR_BUFFER_FLOAT = 1 << 6;
        const MOZ_DEBUG = 1 << 7;
    }
}

/// One entry of the extension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionId {
    AngleInstancedArrays,
    OesElementIndexUint,
    OesVertexArrayObject,
    OesTextureFloat,
    OesTextureHalfFloat,
    WebglLoseContext,
    ExtColorBufferFloat,
    MozDebug,
}

impl ExtensionId {
    pub const ALL: [ExtensionId; 8] = [
        ExtensionId::AngleInstancedArrays,
        ExtensionId::OesElementIndexUint,
        ExtensionId::OesVertexArrayObject,
        ExtensionId::OesTextureFloat,
        ExtensionId::OesTextureHalfFloat,
        ExtensionId::WebglLoseContext,
        ExtensionId::ExtColorBufferFloat,
        ExtensionId::MozDebug,
    ];

    /// The name scripts use to request the extension.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AngleInstancedArrays => "ANGLE_instanced_arrays",
            Self::OesElementIndexUint => "OES_element_index_uint",
            Self::OesVertexArrayObject => "OES_vertex_array_object",
            Self::OesTextureFloat => "OES_texture_float",
            Self::OesTextureHalfFloat => "OES_texture_half_float",
            Self::WebglLoseContext => "WEBGL_lose_context",
            Self::ExtColorBufferFloat => "EXT_color_buffer_float",
            Self::MozDebug => "MOZ_debug",
        }
    }

    /// Case-insensitive lookup, as extension names are matched by scripts.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ext| ext.name().eq_ignore_ascii_case(name))
    }

    #[inline]
    #[must_use]
    pub const fn flag(self) -> ExtensionSet {
        match self {
            Self::AngleInstancedArrays => ExtensionSet::ANGLE_INSTANCED_ARRAYS,
            Self::OesElementIndexUint => ExtensionSet::OES_ELEMENT_INDEX_UINT,
            Self::OesVertexArrayObject => ExtensionSet::OES_VERTEX_ARRAY_OBJECT,
            Self::OesTextureFloat => ExtensionSet::OES_TEXTURE_FLOAT,
            Self::OesTextureHalfFloat => ExtensionSet::OES_TEXTURE_HALF_FLOAT,
            Self::WebglLoseContext => ExtensionSet::WEBGL_LOSE_CONTEXT,
            Self::ExtColorBufferFloat => ExtensionSet::EXT_COLOR_BUFFER_FLOAT,
            Self::MozDebug => ExtensionSet::MOZ_DEBUG,
        }
    }

    /// Whether the extension is offered at all for `version`.
    ///
    /// Extensions promoted to core in WebGL 2 are not offered there.
    #[must_use]
    pub const fn is_offered_for(self, version: WebGlVersion) -> bool {
        match (self, version) {
            (
                Self::AngleInstancedArrays
                | Self::OesElementIndexUint
                | Self::OesVertexArrayObject
                | Self::OesTextureFloat
                | Self::OesTextureHalfFloat,
                WebGlVersion::WebGl2,
            )
            | (Self::ExtColorBufferFloat, WebGlVersion::WebGl1) => false,
            _ => true,
        }
    }

    /// Privileged extensions hidden when fingerprinting resistance is on.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::MozDebug)
    }
}

/// Computes the extensions a context can offer.
#[must_use]
pub fn supported_extensions(
    version: WebGlVersion,
    driver: ExtensionSet,
    resist_fingerprinting: bool,
) -> ExtensionSet {
    ExtensionId::ALL
        .into_iter()
        .filter(|ext| ext.is_offered_for(version))
        .filter(|ext| !(resist_fingerprinting && ext.is_privileged()))
        .filter(|ext| driver.contains(ext.flag()))
        .fold(ExtensionSet::empty(), |set, ext| set | ext.flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            ExtensionId::from_name("oes_element_index_uint"),
            Some(ExtensionId::OesElementIndexUint)
        );
        assert_eq!(ExtensionId::from_name("WEBGL_draw_buffers"), None);
    }

    #[test]
    fn core_features_are_not_offered_on_webgl2() {
        let set = supported_extensions(WebGlVersion::WebGl2, ExtensionSet::all(), false);
        assert!(!set.contains(ExtensionSet::ANGLE_INSTANCED_ARRAYS));
        assert!(set.contains(ExtensionSet::EXT_COLOR_BUFFER_FLOAT));
        assert!(set.contains(ExtensionSet::WEBGL_LOSE_CONTEXT));
    }

    #[test]
    fn privileged_extensions_hidden_under_fingerprinting_resistance() {
        let set = supported_extensions(WebGlVersion::WebGl1, ExtensionSet::all(), true);
        assert!(!set.contains(ExtensionSet::MOZ_DEBUG));
        assert!(set.contains(ExtensionSet::OES_TEXTURE_FLOAT));
    }
}
