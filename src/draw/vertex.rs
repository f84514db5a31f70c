//! Vertex attribute state: array pointers, divisors and generic values.

use crate::backend::is_packed_vertex_type;
use crate::context::{Failure, ParamValue, Validated, WebGlContext};
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLenum};
use crate::objects::ObjectRegistry;

/// Component type of a generic attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenericType {
    #[default]
    Float,
    Int,
    Uint,
}

/// Value of a vertex attribute that is not array-backed. Stored as raw
/// bits so float, int and uint values share one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericAttrib {
    pub ty: GenericType,
    pub bits: [u32; 4],
}

impl Default for GenericAttrib {
    fn default() -> Self {
        Self::from_f32([0.0, 0.0, 0.0, 1.0])
    }
}

impl GenericAttrib {
    #[must_use]
    pub fn from_f32(value: [f32; 4]) -> Self {
        Self {
            ty: GenericType::Float,
            bits: value.map(f32::to_bits),
        }
    }

    #[must_use]
    pub fn from_i32(value: [i32; 4]) -> Self {
        Self {
            ty: GenericType::Int,
            bits: bytemuck::cast(value),
        }
    }

    #[must_use]
    pub fn from_u32(value: [u32; 4]) -> Self {
        Self {
            ty: GenericType::Uint,
            bits: value,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bits)
    }

    /// Vertex attribute type matching the stored value.
    #[must_use]
    pub fn gl_type(&self) -> GLenum {
        match self.ty {
            GenericType::Float => gl::FLOAT,
            GenericType::Int => gl::INT,
            GenericType::Uint => gl::UNSIGNED_INT,
        }
    }

    #[must_use]
    pub fn to_param(&self) -> ParamValue {
        match self.ty {
            GenericType::Float => ParamValue::Float4(self.bits.map(f32::from_bits)),
            GenericType::Int => ParamValue::Int4(bytemuck::cast(self.bits)),
            GenericType::Uint => ParamValue::Uint4(self.bits),
        }
    }
}

impl WebGlContext {
    fn validate_attrib_index(&self, index: u32) -> Validated<()> {
        if index >= self.limits.max_vertex_attribs {
            return Err(Failure::invalid_value(format!(
                "`index` ({index}) must be less than MAX_VERTEX_ATTRIBS ({}).",
                self.limits.max_vertex_attribs
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Arrays
    // ========================================================================

    pub fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.set_attrib_array_enabled("enableVertexAttribArray", index, true);
    }

    pub fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.set_attrib_array_enabled("disableVertexAttribArray", index, false);
    }

    fn set_attrib_array_enabled(&mut self, func: &'static str, index: u32, enabled: bool) {
        self.run(func, |ctx| {
            ctx.validate_attrib_index(index)?;
            if let Some(vao) = ctx.current_vao_mut() {
                vao.attribs[index as usize].enabled = enabled;
            }
            ctx.backend.enable_vertex_attrib_array(index, enabled);
            Ok(())
        });
    }

    /// `vertexAttribPointer`.
    pub fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: GLenum,
        normalized: bool,
        stride: i32,
        offset: i64,
    ) {
        self.run("vertexAttribPointer", |ctx| {
            let float_types = matches!(
                ty,
                gl::BYTE | gl::UNSIGNED_BYTE | gl::SHORT | gl::UNSIGNED_SHORT | gl::FLOAT
            );
            let webgl2_types = matches!(
                ty,
                gl::INT
                    | gl::UNSIGNED_INT
                    | gl::HALF_FLOAT
                    | gl::INT_2_10_10_10_REV
                    | gl::UNSIGNED_INT_2_10_10_10_REV
            );
            if !float_types && !(webgl2_types && ctx.version.is_webgl2()) {
                return Err(Failure::invalid_enum(format!("Bad vertex attrib type: 0x{ty:04x}")));
            }
            ctx.set_attrib_pointer(index, size, ty, normalized, false, stride, offset)
        });
    }

    /// `vertexAttribIPointer` (WebGL 2).
    pub fn vertex_attrib_i_pointer(&mut self, index: u32, size: i32, ty: GLenum, stride: i32, offset: i64) {
        self.run("vertexAttribIPointer", |ctx| {
            ctx.require_webgl2()?;
            if !matches!(
                ty,
                gl::BYTE | gl::UNSIGNED_BYTE | gl::SHORT | gl::UNSIGNED_SHORT | gl::INT | gl::UNSIGNED_INT
            ) {
                return Err(Failure::invalid_enum(format!("Bad integer vertex attrib type: 0x{ty:04x}")));
            }
            ctx.set_attrib_pointer(index, size, ty, false, true, stride, offset)
        });
    }

    fn set_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: GLenum,
        normalized: bool,
        integer: bool,
        stride: i32,
        offset: i64,
    ) -> Validated<()> {
        self.validate_attrib_index(index)?;
        if !(1..=4).contains(&size) {
            return Err(Failure::invalid_value("`size` must be 1, 2, 3 or 4."));
        }
        if is_packed_vertex_type(ty) && size != 4 {
            return Err(Failure::invalid_operation("Packed vertex types require `size` 4."));
        }
        let stride = u32::try_from(stride)
            .ok()
            .filter(|s| *s <= 255)
            .ok_or_else(|| Failure::invalid_value("`stride` must be in [0, 255]."))?;
        let offset = u64::try_from(offset).map_err(|_| Failure::invalid_value("`offset` must be >= 0."))?;

        let type_size = gl::type_byte_size(ty).unwrap_or(1);
        if offset % u64::from(type_size) != 0 || stride % type_size != 0 {
            return Err(Failure::invalid_operation(
                "`offset` and `stride` must be multiples of the type size.",
            ));
        }
        let buffer = self.bindings.array_buffer;
        if buffer.is_none() && offset != 0 {
            return Err(Failure::invalid_operation(
                "With no ARRAY_BUFFER bound, `offset` must be 0.",
            ));
        }

        let ObjectRegistry {
            buffers,
            vertex_arrays,
            ..
        } = &mut self.objects;
        let Some(vao) = vertex_arrays.data_mut(self.bindings.vertex_array) else {
            return Err(Failure::implementation_bug("No vertex array bound."));
        };
        let attrib = &mut vao.attribs[index as usize];
        buffers.rebind(&mut attrib.buffer, buffer);
        attrib.size = size as u8;
        attrib.ty = ty;
        attrib.normalized = normalized;
        attrib.integer = integer;
        attrib.stride = stride;
        attrib.offset = offset;

        let pointer = attrib.to_pointer(buffers.native_of(buffer));
        self.backend.vertex_attrib_pointer(index, &pointer);
        Ok(())
    }

    /// `vertexAttribDivisor` (WebGL 2) or `vertexAttribDivisorANGLE`.
    pub fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.run("vertexAttribDivisor", |ctx| {
            if !ctx.version.is_webgl2() && !ctx.extensions_enabled.contains(ExtensionSet::ANGLE_INSTANCED_ARRAYS) {
                return Err(Failure::invalid_operation("ANGLE_instanced_arrays is not enabled."));
            }
            ctx.validate_attrib_index(index)?;
            if let Some(vao) = ctx.current_vao_mut() {
                vao.attribs[index as usize].divisor = divisor;
            }
            ctx.backend.vertex_attrib_divisor(index, divisor);
            Ok(())
        });
    }

    // ========================================================================
    // Generic Values
    // ========================================================================

    /// `vertexAttrib{1,2,3,4}f[v]`. Missing components default to
    /// `(0, 0, 0, 1)`.
    pub fn vertex_attrib_f(&mut self, index: u32, values: &[f32]) {
        self.run("vertexAttrib", |ctx| {
            if values.is_empty() || values.len() > 4 {
                return Err(Failure::invalid_value("Expected 1 to 4 components."));
            }
            let mut value = [0.0, 0.0, 0.0, 1.0];
            value[..values.len()].copy_from_slice(values);
            ctx.set_generic_attrib(index, GenericAttrib::from_f32(value))
        });
    }

    /// `vertexAttribI4i[v]` (WebGL 2).
    pub fn vertex_attrib_i4i(&mut self, index: u32, value: [i32; 4]) {
        self.run("vertexAttribI4i", |ctx| {
            ctx.require_webgl2()?;
            ctx.set_generic_attrib(index, GenericAttrib::from_i32(value))
        });
    }

    /// `vertexAttribI4ui[v]` (WebGL 2).
    pub fn vertex_attrib_i4ui(&mut self, index: u32, value: [u32; 4]) {
        self.run("vertexAttribI4ui", |ctx| {
            ctx.require_webgl2()?;
            ctx.set_generic_attrib(index, GenericAttrib::from_u32(value))
        });
    }

    fn set_generic_attrib(&mut self, index: u32, value: GenericAttrib) -> Validated<()> {
        self.validate_attrib_index(index)?;
        self.generic_attribs[index as usize] = value;
        // Attribute 0 is fed from the fake array on drivers without a
        // generic attribute 0, so it never reaches the driver directly.
        if index != 0 || !self.capabilities.requires_array_attrib0 {
            self.backend.vertex_attrib(index, value);
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// `getVertexAttrib`.
    pub fn get_vertex_attrib(&mut self, index: u32, pname: GLenum) -> Option<ParamValue> {
        self.run("getVertexAttrib", |ctx| {
            ctx.validate_attrib_index(index)?;
            if pname == gl::CURRENT_VERTEX_ATTRIB {
                return Ok(ctx.generic_attribs[index as usize].to_param());
            }
            let attrib = ctx.current_vao().attribs[index as usize];
            let webgl2 = ctx.version.is_webgl2();
            Ok(match pname {
                gl::VERTEX_ATTRIB_ARRAY_ENABLED => ParamValue::Bool(attrib.enabled),
                gl::VERTEX_ATTRIB_ARRAY_SIZE => ParamValue::Int(i32::from(attrib.size)),
                gl::VERTEX_ATTRIB_ARRAY_STRIDE => ParamValue::Int(attrib.stride as i32),
                gl::VERTEX_ATTRIB_ARRAY_TYPE => ParamValue::Enum(attrib.ty),
                gl::VERTEX_ATTRIB_ARRAY_NORMALIZED => ParamValue::Bool(attrib.normalized),
                gl::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING => ParamValue::Buffer(attrib.buffer),
                gl::VERTEX_ATTRIB_ARRAY_INTEGER if webgl2 => ParamValue::Bool(attrib.integer),
                gl::VERTEX_ATTRIB_ARRAY_DIVISOR
                    if webgl2 || ctx.extensions_enabled.contains(ExtensionSet::ANGLE_INSTANCED_ARRAYS) =>
                {
                    ParamValue::Int(attrib.divisor as i32)
                }
                _ => return Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            })
        })
    }
}
