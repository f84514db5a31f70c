use crate::context::{Failure, ParamValue, Validated, WebGlContext};
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLenum};
use crate::objects::{QueryId, TransformFeedbackId, VertexArrayData, VertexArrayId};

impl WebGlContext {
    // ========================================================================
    // Vertex Arrays
    // ========================================================================

    /// The bound vertex array.
    pub(crate) fn current_vao(&self) -> &VertexArrayData {
        static DETACHED: VertexArrayData = VertexArrayData {
            attribs: Vec::new(),
            element_array: None,
        };
        self.objects
            .vertex_arrays
            .data(self.bindings.vertex_array)
            .unwrap_or(&DETACHED)
    }

    pub(crate) fn current_vao_mut(&mut self) -> Option<&mut VertexArrayData> {
        self.objects.vertex_arrays.data_mut(self.bindings.vertex_array)
    }

    /// `bindVertexArray`. `None` selects the default vertex array.
    pub fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.run("bindVertexArray", |ctx| {
            if !ctx.version.is_webgl2() && !ctx.extensions_enabled.contains(ExtensionSet::OES_VERTEX_ARRAY_OBJECT) {
                return Err(Failure::invalid_operation("OES_vertex_array_object is not enabled."));
            }
            if let Some(id) = vao
                && !ctx.objects.vertex_arrays.is_live(id)
            {
                return Err(Failure::invalid_operation("Vertex array is deleted or unknown."));
            }

            let new = vao.unwrap_or(ctx.default_vao);
            let old = std::mem::replace(&mut ctx.bindings.vertex_array, new);
            if old != new {
                let pool = &mut ctx.objects.vertex_arrays;
                if new != ctx.default_vao {
                    pool.add_ref(new);
                }
                if old != ctx.default_vao {
                    pool.release_ref(old);
                }
            }
            ctx.objects.vertex_arrays.mark_bound(new);
            let native = ctx.objects.vertex_arrays.native(new);
            ctx.backend.bind_vertex_array(native);
            Ok(())
        });
    }

    // ========================================================================
    // Transform Feedback
    // ========================================================================

    /// `bindTransformFeedback`. `None` selects the default object.
    pub fn bind_transform_feedback(&mut self, target: GLenum, tf: Option<TransformFeedbackId>) {
        self.run("bindTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            if target != gl::TRANSFORM_FEEDBACK {
                return Err(Failure::invalid_enum(format!("Bad target: 0x{target:04x}")));
            }
            if ctx.current_tf().is_capturing() {
                return Err(Failure::invalid_operation(
                    "Current transform feedback is active and not paused.",
                ));
            }
            if let Some(id) = tf
                && !ctx.objects.transform_feedbacks.is_live(id)
            {
                return Err(Failure::invalid_operation("Transform feedback is deleted or unknown."));
            }

            let new = tf.unwrap_or(ctx.default_tf);
            let old = std::mem::replace(&mut ctx.bindings.transform_feedback, new);
            if old != new {
                let pool = &mut ctx.objects.transform_feedbacks;
                if new != ctx.default_tf {
                    pool.add_ref(new);
                }
                if old != ctx.default_tf {
                    pool.release_ref(old);
                }
            }
            ctx.objects.transform_feedbacks.mark_bound(new);
            let native = ctx.objects.transform_feedbacks.native(new);
            ctx.backend.bind_transform_feedback(native);
            Ok(())
        });
    }

    /// `beginTransformFeedback`.
    pub fn begin_transform_feedback(&mut self, primitive_mode: GLenum) {
        self.run("beginTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            if !matches!(primitive_mode, gl::POINTS | gl::LINES | gl::TRIANGLES) {
                return Err(Failure::invalid_enum(format!("Bad primitive mode: 0x{primitive_mode:04x}")));
            }
            let tf = ctx.current_tf();
            if tf.active {
                return Err(Failure::invalid_operation("Transform feedback is already active."));
            }
            let program = ctx
                .bindings
                .program
                .ok_or_else(|| Failure::invalid_operation("No program in use."))?;
            let linked = ctx
                .current_linked_program()
                .ok_or_else(|| Failure::invalid_operation("Current program is not linked."))?;
            let required = linked.required_tf_buffers() as usize;
            if required == 0 {
                return Err(Failure::invalid_operation(
                    "Current program has no transform feedback varyings.",
                ));
            }
            if let Some(index) = (0..required).find(|&i| tf.bindings.get(i).is_none_or(|b| b.buffer.is_none())) {
                return Err(Failure::invalid_operation(format!(
                    "No buffer bound to TRANSFORM_FEEDBACK_BUFFER index {index}."
                )));
            }

            ctx.objects.programs.add_ref(program);
            let id = ctx.bindings.transform_feedback;
            if let Some(tf) = ctx.objects.transform_feedbacks.data_mut(id) {
                tf.active = true;
                tf.paused = false;
                tf.mode = primitive_mode;
                tf.program = Some(program);
            }
            ctx.backend.begin_transform_feedback(primitive_mode);
            Ok(())
        });
    }

    /// `endTransformFeedback`.
    pub fn end_transform_feedback(&mut self) {
        self.run("endTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            if !ctx.tf_is_active() {
                return Err(Failure::invalid_operation("Transform feedback is not active."));
            }
            ctx.end_current_tf();
            ctx.backend.end_transform_feedback();
            Ok(())
        });
    }

    /// Deactivates the bound transform feedback, dropping its program
    /// reference.
    pub(crate) fn end_current_tf(&mut self) {
        let id = self.bindings.transform_feedback;
        let program = self.objects.transform_feedbacks.data_mut(id).and_then(|tf| {
            tf.active = false;
            tf.paused = false;
            tf.program.take()
        });
        if let Some(program) = program {
            self.objects.programs.release_ref(program);
        }
    }

    /// `pauseTransformFeedback`.
    pub fn pause_transform_feedback(&mut self) {
        self.run("pauseTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            if !ctx.current_tf().is_capturing() {
                return Err(Failure::invalid_operation("Transform feedback is not active or already paused."));
            }
            let id = ctx.bindings.transform_feedback;
            if let Some(tf) = ctx.objects.transform_feedbacks.data_mut(id) {
                tf.paused = true;
            }
            ctx.backend.pause_transform_feedback();
            Ok(())
        });
    }

    /// `resumeTransformFeedback`. The program that began capture must still
    /// be current.
    pub fn resume_transform_feedback(&mut self) {
        self.run("resumeTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            let tf = ctx.current_tf();
            if !tf.active || !tf.paused {
                return Err(Failure::invalid_operation("Transform feedback is not paused."));
            }
            if tf.program != ctx.bindings.program {
                return Err(Failure::invalid_operation(
                    "Current program differs from the one transform feedback began with.",
                ));
            }
            let id = ctx.bindings.transform_feedback;
            if let Some(tf) = ctx.objects.transform_feedbacks.data_mut(id) {
                tf.paused = false;
            }
            ctx.backend.resume_transform_feedback();
            Ok(())
        });
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn query_slot(&mut self, target: GLenum) -> Validated<&mut Option<QueryId>> {
        match target {
            gl::ANY_SAMPLES_PASSED | gl::ANY_SAMPLES_PASSED_CONSERVATIVE => Ok(&mut self.bindings.occlusion_query),
            gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN => Ok(&mut self.bindings.tf_primitives_query),
            _ => Err(Failure::invalid_enum(format!("Bad query target: 0x{target:04x}"))),
        }
    }

    /// `beginQuery`. A query's target is fixed by its first begin.
    pub fn begin_query(&mut self, target: GLenum, query: QueryId) {
        self.run("beginQuery", |ctx| {
            ctx.require_webgl2()?;
            if ctx.query_slot(target)?.is_some() {
                return Err(Failure::invalid_operation("A query is already active for this target."));
            }
            let entry = ctx
                .objects
                .queries
                .get(query)
                .filter(|e| !e.deleted)
                .ok_or_else(|| Failure::invalid_operation("Query is deleted or unknown."))?;
            if entry.data.active {
                return Err(Failure::invalid_operation("Query is already active."));
            }
            if let Some(existing) = entry.data.target
                && existing != target
            {
                return Err(Failure::invalid_operation(format!(
                    "Query was first used with 0x{existing:04x}, not 0x{target:04x}."
                )));
            }

            if let Some(data) = ctx.objects.queries.data_mut(query) {
                data.target = Some(target);
                data.active = true;
                data.available_fence = None;
            }
            ctx.objects.queries.mark_bound(query);
            let mut slot = None;
            ctx.objects.queries.rebind(&mut slot, Some(query));
            *ctx.query_slot(target)? = slot;
            if let Some(native) = ctx.objects.queries.native(query) {
                ctx.backend.begin_query(target, native);
            }
            Ok(())
        });
    }

    /// `endQuery`. The result becomes available once a fence issued now
    /// completes.
    pub fn end_query(&mut self, target: GLenum) {
        self.run("endQuery", |ctx| {
            ctx.require_webgl2()?;
            let query = ctx
                .query_slot(target)?
                .ok_or_else(|| Failure::invalid_operation("No query is active for this target."))?;
            ctx.finish_query(target, query);
            Ok(())
        });
    }

    /// Ends an active query and releases its slot.
    pub(crate) fn finish_query(&mut self, target: GLenum, query: QueryId) {
        self.backend.end_query(target);
        let fence = self.insert_fence();
        if let Some(data) = self.objects.queries.data_mut(query) {
            data.active = false;
            data.available_fence = Some(fence);
        }
        let mut slot = Some(query);
        self.objects.queries.rebind(&mut slot, None);
        if let Ok(binding) = self.query_slot(target) {
            *binding = None;
        }
    }

    /// `getQuery(target, CURRENT_QUERY)`.
    pub fn get_query(&mut self, target: GLenum, pname: GLenum) -> Option<ParamValue> {
        self.run("getQuery", |ctx| {
            ctx.require_webgl2()?;
            if pname != gl::CURRENT_QUERY {
                return Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}")));
            }
            let current = *ctx.query_slot(target)?;
            // Both occlusion targets share a slot; report only the one begun.
            let current = current.filter(|&id| ctx.objects.queries.data(id).and_then(|d| d.target) == Some(target));
            Ok(ParamValue::Query(current))
        })
    }

    /// `getQueryParameter`. Results are `Null` until the end-of-query fence
    /// has completed.
    pub fn get_query_parameter(&mut self, query: QueryId, pname: GLenum) -> Option<ParamValue> {
        self.poll_fences();
        self.run("getQueryParameter", |ctx| {
            ctx.require_webgl2()?;
            let entry = ctx
                .objects
                .queries
                .get(query)
                .filter(|e| !e.deleted)
                .ok_or_else(|| Failure::invalid_operation("Query is deleted or unknown."))?;
            if entry.data.active {
                return Err(Failure::invalid_operation("Query is still active."));
            }
            let fence = entry
                .data
                .available_fence
                .ok_or_else(|| Failure::invalid_operation("Query has never been ended."))?;
            let available = ctx.fences.is_complete(fence);

            match pname {
                gl::QUERY_RESULT_AVAILABLE => Ok(ParamValue::Bool(available)),
                gl::QUERY_RESULT if available => {
                    let native = entry
                        .native
                        .ok_or_else(|| Failure::implementation_bug("live query without a native name"))?;
                    let target = entry.data.target;
                    let result = ctx.backend.query_result(native);
                    Ok(match target {
                        Some(gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN) => {
                            ParamValue::Uint(u32::try_from(result).unwrap_or(u32::MAX))
                        }
                        // Occlusion queries answer whether any sample passed.
                        _ => ParamValue::Bool(result != 0),
                    })
                }
                gl::QUERY_RESULT => {
                    ctx.errors.warn(
                        crate::context::WarningKind::General,
                        "getQueryParameter: Query result not yet available.",
                    );
                    Ok(ParamValue::Null)
                }
                _ => Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            }
        })
    }
}
