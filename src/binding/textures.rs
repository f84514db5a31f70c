use crate::context::{Failure, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{SamplerId, TextureId};

impl WebGlContext {
    pub(crate) fn validate_texture_target(&self, target: GLenum) -> Validated<()> {
        match target {
            gl::TEXTURE_2D | gl::TEXTURE_CUBE_MAP => Ok(()),
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY if self.version.is_webgl2() => Ok(()),
            _ => Err(Failure::invalid_enum(format!("Bad texture target: 0x{target:04x}"))),
        }
    }

    /// Texture bound on the active unit for a bind target.
    pub(crate) fn bound_texture(&self, target: GLenum) -> Option<TextureId> {
        let unit = self.bindings.active_unit()?;
        match target {
            gl::TEXTURE_2D => unit.tex_2d,
            gl::TEXTURE_CUBE_MAP => unit.cube_map,
            gl::TEXTURE_3D => unit.tex_3d,
            gl::TEXTURE_2D_ARRAY => unit.tex_2d_array,
            _ => None,
        }
    }

    /// `activeTexture`.
    pub fn active_texture(&mut self, texture_unit: GLenum) {
        self.run("activeTexture", |ctx| {
            let unit = texture_unit.wrapping_sub(gl::TEXTURE0);
            if unit >= ctx.limits.max_texture_units {
                return Err(Failure::invalid_enum(format!(
                    "Texture unit out of range: 0x{texture_unit:04x} (max unit {}).",
                    ctx.limits.max_texture_units.saturating_sub(1)
                )));
            }
            ctx.bindings.active_texture = unit;
            ctx.backend.active_texture(unit);
            Ok(())
        });
    }

    /// `bindTexture`. The first bind fixes the texture's target.
    pub fn bind_texture(&mut self, target: GLenum, texture: Option<TextureId>) {
        self.run("bindTexture", |ctx| {
            ctx.validate_texture_target(target)?;
            if let Some(id) = texture {
                let entry = ctx
                    .objects
                    .textures
                    .get(id)
                    .ok_or_else(|| Failure::invalid_operation("Unknown texture."))?;
                if entry.deleted {
                    return Err(Failure::invalid_operation("Texture has been deleted."));
                }
                if let Some(existing) = entry.data.target
                    && existing != target
                {
                    return Err(Failure::invalid_operation(format!(
                        "Texture was first bound to 0x{existing:04x}, not 0x{target:04x}."
                    )));
                }
            }

            if let Some(id) = texture {
                ctx.objects.textures.mark_bound(id);
                if let Some(data) = ctx.objects.textures.data_mut(id) {
                    data.target.get_or_insert(target);
                }
            }
            let unit_index = ctx.bindings.active_texture as usize;
            let Some(unit) = ctx.bindings.texture_units.get_mut(unit_index) else {
                return Err(Failure::implementation_bug("active texture unit out of range"));
            };
            let slot = match target {
                gl::TEXTURE_2D => &mut unit.tex_2d,
                gl::TEXTURE_CUBE_MAP => &mut unit.cube_map,
                gl::TEXTURE_3D => &mut unit.tex_3d,
                _ => &mut unit.tex_2d_array,
            };
            ctx.objects.textures.rebind(slot, texture);
            let native = ctx.objects.textures.native_of(texture);
            ctx.backend.bind_texture(target, native);
            Ok(())
        });
    }

    /// `bindSampler`.
    pub fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerId>) {
        self.run("bindSampler", |ctx| {
            ctx.require_webgl2()?;
            if unit >= ctx.limits.max_texture_units {
                return Err(Failure::invalid_value(format!("`unit` ({unit}) out of range.")));
            }
            if let Some(id) = sampler
                && !ctx.objects.samplers.is_live(id)
            {
                return Err(Failure::invalid_operation("Sampler is deleted or unknown."));
            }
            let Some(slot) = ctx.bindings.texture_units.get_mut(unit as usize) else {
                return Err(Failure::implementation_bug("texture unit out of range"));
            };
            ctx.objects.samplers.rebind(&mut slot.sampler, sampler);
            if let Some(id) = sampler {
                ctx.objects.samplers.mark_bound(id);
            }
            let native = ctx.objects.samplers.native_of(sampler);
            ctx.backend.bind_sampler(unit, native);
            Ok(())
        });
    }
}
