use crate::backend::LinkRequest;
use crate::context::{Failure, ParamValue, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{LinkedProgram, ProgramData, ProgramId, ShaderData, ShaderId};

impl WebGlContext {
    fn live_shader(&self, shader: ShaderId) -> Validated<&ShaderData> {
        match self.objects.shaders.get(shader) {
            Some(entry) if !entry.deleted => Ok(&entry.data),
            Some(_) => Err(Failure::invalid_value("Shader has been deleted.")),
            None => Err(Failure::invalid_value("Unknown shader.")),
        }
    }

    fn live_program(&self, program: ProgramId) -> Validated<&ProgramData> {
        match self.objects.programs.get(program) {
            Some(entry) if !entry.deleted => Ok(&entry.data),
            Some(_) => Err(Failure::invalid_value("Program has been deleted.")),
            None => Err(Failure::invalid_value("Unknown program.")),
        }
    }

    /// The linked executable of the current program.
    pub(crate) fn current_linked_program(&self) -> Option<&LinkedProgram> {
        let id = self.bindings.program?;
        self.objects.programs.data(id)?.linked.as_ref()
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// `shaderSource`.
    pub fn shader_source(&mut self, shader: ShaderId, source: &str) {
        self.run("shaderSource", |ctx| {
            ctx.live_shader(shader)?;
            if let Some(data) = ctx.objects.shaders.data_mut(shader) {
                data.source = source.to_owned();
            }
            Ok(())
        });
    }

    /// `compileShader`. Compilation itself is delegated to the driver.
    pub fn compile_shader(&mut self, shader: ShaderId) {
        self.run("compileShader", |ctx| {
            let data = ctx.live_shader(shader)?;
            let (stage, source) = (data.stage, data.source.clone());
            let native = ctx
                .objects
                .shaders
                .native(shader)
                .ok_or_else(|| Failure::implementation_bug("live shader without a native name"))?;
            let info = ctx.backend.compile_shader(native, stage, &source);
            if let Some(data) = ctx.objects.shaders.data_mut(shader) {
                data.compiled = info.success;
                data.info_log = info.log;
            }
            Ok(())
        });
    }

    /// `attachShader`. A program holds at most one shader per stage.
    pub fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.run("attachShader", |ctx| {
            let stage = ctx.live_shader(shader)?.stage;
            let data = ctx.live_program(program)?;
            let slot = match stage {
                gl::VERTEX_SHADER => data.vertex_shader,
                _ => data.fragment_shader,
            };
            if slot.is_some() {
                return Err(Failure::invalid_operation(
                    "A shader of this type is already attached.",
                ));
            }

            let objects = &mut ctx.objects;
            if let Some(data) = objects.programs.data_mut(program) {
                let slot = match stage {
                    gl::VERTEX_SHADER => &mut data.vertex_shader,
                    _ => &mut data.fragment_shader,
                };
                objects.shaders.rebind(slot, Some(shader));
            }
            if let (Some(p), Some(s)) = (objects.programs.native(program), objects.shaders.native(shader)) {
                ctx.backend.attach_shader(p, s);
            }
            Ok(())
        });
    }

    /// `detachShader`.
    pub fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        self.run("detachShader", |ctx| {
            let data = ctx.live_program(program)?;
            if ctx.objects.shaders.get(shader).is_none() {
                return Err(Failure::invalid_value("Unknown shader."));
            }
            let is_vertex = data.vertex_shader == Some(shader);
            if !is_vertex && data.fragment_shader != Some(shader) {
                return Err(Failure::invalid_operation("Shader is not attached to this program."));
            }

            let (p, s) = (ctx.objects.programs.native(program), ctx.objects.shaders.native(shader));
            let objects = &mut ctx.objects;
            if let Some(data) = objects.programs.data_mut(program) {
                let slot = if is_vertex {
                    &mut data.vertex_shader
                } else {
                    &mut data.fragment_shader
                };
                objects.shaders.rebind(slot, None);
            }
            if let (Some(p), Some(s)) = (p, s) {
                ctx.backend.detach_shader(p, s);
            }
            Ok(())
        });
    }

    // ========================================================================
    // Programs
    // ========================================================================

    /// `linkProgram`.
    ///
    /// Programs without two compiled shaders fail to link without a driver
    /// round trip.
    pub fn link_program(&mut self, program: ProgramId) {
        self.run("linkProgram", |ctx| {
            let data = ctx.live_program(program)?;
            let tf = ctx.current_tf();
            if tf.active && tf.program == Some(program) {
                return Err(Failure::invalid_operation(
                    "Program is in use by active transform feedback.",
                ));
            }

            let compiled = |id: Option<ShaderId>| {
                id.and_then(|id| ctx.objects.shaders.data(id))
                    .is_some_and(|s| s.compiled)
            };
            let ready = compiled(data.vertex_shader) && compiled(data.fragment_shader);
            let tf_varyings = data.tf_varyings.clone();
            let tf_buffer_mode = data.tf_buffer_mode;

            let (linked, log) = if ready {
                let native = ctx
                    .objects
                    .programs
                    .native(program)
                    .ok_or_else(|| Failure::implementation_bug("live program without a native name"))?;
                let info = ctx.backend.link_program(
                    native,
                    &LinkRequest {
                        tf_varyings: &tf_varyings,
                        tf_buffer_mode,
                    },
                );
                let linked = info.success.then(|| LinkedProgram {
                    active_attribs: info.active_attribs,
                    uniform_blocks: info.uniform_blocks,
                    tf_varying_count: u32::try_from(tf_varyings.len()).unwrap_or(u32::MAX),
                    tf_buffer_mode,
                });
                (linked, info.log)
            } else {
                (None, "Program must have a compiled vertex and fragment shader.".to_owned())
            };

            if linked.is_none() {
                log::debug!("linkProgram failed: {log}");
            }
            if let Some(data) = ctx.objects.programs.data_mut(program) {
                data.uniform_block_bindings = linked
                    .as_ref()
                    .map(|l| std::iter::repeat_n(0, l.uniform_blocks.len()).collect())
                    .unwrap_or_default();
                data.linked = linked;
                data.link_requested = true;
                data.info_log = log;
            }
            Ok(())
        });
    }

    /// `useProgram`.
    pub fn use_program(&mut self, program: Option<ProgramId>) {
        self.run("useProgram", |ctx| {
            if ctx.current_tf().is_capturing() {
                return Err(Failure::invalid_operation(
                    "Transform feedback is active and not paused.",
                ));
            }
            if let Some(id) = program {
                let data = ctx.live_program(id)?;
                if data.linked.is_none() {
                    return Err(Failure::invalid_operation("Program has not been successfully linked."));
                }
            }
            ctx.objects.programs.rebind(&mut ctx.bindings.program, program);
            let native = ctx.objects.programs.native_of(program);
            ctx.backend.use_program(native);
            Ok(())
        });
    }

    /// `transformFeedbackVaryings`. Takes effect on the next link.
    pub fn transform_feedback_varyings(&mut self, program: ProgramId, varyings: &[&str], buffer_mode: GLenum) {
        self.run("transformFeedbackVaryings", |ctx| {
            ctx.require_webgl2()?;
            ctx.live_program(program)?;
            match buffer_mode {
                gl::INTERLEAVED_ATTRIBS => {}
                gl::SEPARATE_ATTRIBS => {
                    let max = ctx.limits.max_transform_feedback_separate_attribs as usize;
                    if varyings.len() > max {
                        return Err(Failure::invalid_value(format!(
                            "Too many separate varyings: {} > {max}.",
                            varyings.len()
                        )));
                    }
                }
                _ => return Err(Failure::invalid_enum(format!("Bad buffer mode: 0x{buffer_mode:04x}"))),
            }
            if let Some(data) = ctx.objects.programs.data_mut(program) {
                data.tf_varyings = varyings.iter().map(|&v| v.to_owned()).collect();
                data.tf_buffer_mode = buffer_mode;
            }
            Ok(())
        });
    }

    // ========================================================================
    // Uniform Blocks
    // ========================================================================

    /// `getUniformBlockIndex`. Unknown names yield `INVALID_INDEX`.
    pub fn get_uniform_block_index(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        self.run("getUniformBlockIndex", |ctx| {
            ctx.require_webgl2()?;
            let data = ctx.live_program(program)?;
            let index = data
                .linked
                .as_ref()
                .and_then(|l| l.uniform_blocks.iter().position(|b| b.name == name))
                .and_then(|i| u32::try_from(i).ok());
            Ok(index.unwrap_or(gl::INVALID_INDEX))
        })
    }

    /// `uniformBlockBinding`.
    pub fn uniform_block_binding(&mut self, program: ProgramId, block_index: u32, binding: u32) {
        self.run("uniformBlockBinding", |ctx| {
            ctx.require_webgl2()?;
            let data = ctx.live_program(program)?;
            let linked = data
                .linked
                .as_ref()
                .ok_or_else(|| Failure::invalid_operation("Program has not been successfully linked."))?;
            if block_index as usize >= linked.uniform_blocks.len() {
                return Err(Failure::invalid_value(format!("Bad uniform block index: {block_index}")));
            }
            if binding >= ctx.limits.max_uniform_buffer_bindings {
                return Err(Failure::invalid_value(format!(
                    "Binding {binding} exceeds MAX_UNIFORM_BUFFER_BINDINGS."
                )));
            }
            if let Some(slot) = ctx
                .objects
                .programs
                .data_mut(program)
                .and_then(|d| d.uniform_block_bindings.get_mut(block_index as usize))
            {
                *slot = binding;
            }
            Ok(())
        });
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// `getAttribLocation`; -1 for names that are not active attributes.
    pub fn get_attrib_location(&mut self, program: ProgramId, name: &str) -> i32 {
        self.run("getAttribLocation", |ctx| {
            let data = ctx.live_program(program)?;
            let linked = data
                .linked
                .as_ref()
                .ok_or_else(|| Failure::invalid_operation("Program has not been successfully linked."))?;
            Ok(linked
                .active_attribs
                .iter()
                .find(|a| a.name == name)
                .and_then(|a| i32::try_from(a.location).ok())
                .unwrap_or(-1))
        })
        .unwrap_or(-1)
    }

    /// `getShaderParameter`. Deleted shaders still answer.
    pub fn get_shader_parameter(&mut self, shader: ShaderId, pname: GLenum) -> Option<ParamValue> {
        self.run("getShaderParameter", |ctx| {
            let entry = ctx
                .objects
                .shaders
                .get(shader)
                .ok_or_else(|| Failure::invalid_value("Unknown shader."))?;
            Ok(match pname {
                gl::SHADER_TYPE => ParamValue::Enum(entry.data.stage),
                gl::DELETE_STATUS => ParamValue::Bool(entry.deleted),
                gl::COMPILE_STATUS => ParamValue::Bool(entry.data.compiled),
                _ => return Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            })
        })
    }

    pub fn get_shader_source(&mut self, shader: ShaderId) -> Option<String> {
        self.run("getShaderSource", |ctx| Ok(ctx.live_shader(shader)?.source.clone()))
    }

    pub fn get_shader_info_log(&mut self, shader: ShaderId) -> Option<String> {
        self.run("getShaderInfoLog", |ctx| Ok(ctx.live_shader(shader)?.info_log.clone()))
    }

    /// `getProgramParameter`. Deleted programs still answer.
    pub fn get_program_parameter(&mut self, program: ProgramId, pname: GLenum) -> Option<ParamValue> {
        self.run("getProgramParameter", |ctx| {
            let entry = ctx
                .objects
                .programs
                .get(program)
                .ok_or_else(|| Failure::invalid_value("Unknown program."))?;
            let data = &entry.data;
            let count = |n: usize| ParamValue::Int(i32::try_from(n).unwrap_or(i32::MAX));
            let webgl2 = ctx.version.is_webgl2();
            Ok(match pname {
                gl::DELETE_STATUS => ParamValue::Bool(entry.deleted),
                gl::LINK_STATUS => ParamValue::Bool(data.linked.is_some()),
                gl::ATTACHED_SHADERS => {
                    count(usize::from(data.vertex_shader.is_some()) + usize::from(data.fragment_shader.is_some()))
                }
                gl::ACTIVE_ATTRIBUTES => count(data.linked.as_ref().map_or(0, |l| l.active_attribs.len())),
                gl::ACTIVE_UNIFORM_BLOCKS if webgl2 => {
                    count(data.linked.as_ref().map_or(0, |l| l.uniform_blocks.len()))
                }
                gl::TRANSFORM_FEEDBACK_BUFFER_MODE if webgl2 => ParamValue::Enum(data.tf_buffer_mode),
                gl::TRANSFORM_FEEDBACK_VARYINGS if webgl2 => {
                    count(data.linked.as_ref().map_or(0, |l| l.tf_varying_count as usize))
                }
                _ => return Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            })
        })
    }

    pub fn get_program_info_log(&mut self, program: ProgramId) -> Option<String> {
        self.run("getProgramInfoLog", |ctx| Ok(ctx.live_program(program)?.info_log.clone()))
    }
}
