//! Fence, sync object and query tests

use std::sync::Arc;

use anyhow::Context as _;
use webgl_core::gl;
use webgl_core::{
    Availability, ContextBuilder, ContextManager, DriverCall, GlError, InitContextDesc, ManualClock, ParamValue,
    RecordingBackend, RecordingHandle, WebGlContext, WebGlVersion,
};

fn context() -> anyhow::Result<(WebGlContext, RecordingHandle)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = RecordingBackend::default();
    let handle = backend.handle();
    let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
    let ctx = ContextBuilder::new(InitContextDesc {
        version: WebGlVersion::WebGl2,
        size: (8, 8),
        ..InitContextDesc::default()
    })
    .manager(manager)
    .build(backend)?;
    Ok((ctx, handle))
}

// ============================================================================
// Fence Counters
// ============================================================================

#[test]
fn counters_start_apart_and_stay_ordered() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    assert_eq!(ctx.fence_counters(), (1, 0));

    let _ = ctx.on_work_complete();
    let _ = ctx.on_work_complete();
    assert_eq!(ctx.fence_counters(), (3, 0));
    assert_eq!(handle.count(|c| matches!(c, DriverCall::InsertFence(_))), 2);

    // A bogus report past the last issued fence is clamped.
    handle.report_completed_fence(99);
    ctx.poll_fences();
    assert_eq!(ctx.fence_counters(), (3, 2));

    // Going backwards is ignored.
    handle.report_completed_fence(1);
    ctx.poll_fences();
    assert_eq!(ctx.fence_counters(), (3, 2));
    Ok(())
}

#[test]
fn work_complete_resolves_after_poll() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    let rx = ctx.on_work_complete();
    assert!(rx.try_recv().is_err());

    handle.complete_all_fences();
    assert!(rx.try_recv().is_err());
    ctx.poll_fences();
    assert_eq!(rx.try_recv(), Ok(Availability::Available));
    Ok(())
}

#[test]
fn already_completed_fence_resolves_immediately() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    handle.auto_complete_fences(true);
    let _ = ctx.on_work_complete();
    ctx.poll_fences();
    let rx = ctx.on_fence_available(1);
    assert_eq!(rx.try_recv(), Ok(Availability::Available));
    Ok(())
}

#[test]
fn finish_drains_the_driver() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    handle.auto_complete_fences(true);
    let rx = ctx.on_work_complete();
    ctx.finish();
    assert_eq!(rx.try_recv(), Ok(Availability::Available));
    assert!(matches!(handle.last_call(), Some(DriverCall::Finish)));
    Ok(())
}

#[test]
fn loss_resolves_pending_waiters_as_lost() -> anyhow::Result<()> {
    let (mut ctx, _handle) = context()?;
    let pending = ctx.on_work_complete();
    assert!(ctx.get_extension("WEBGL_lose_context").is_some());
    ctx.lose_context_ext();
    assert_eq!(pending.try_recv(), Ok(Availability::Lost));

    let late = ctx.on_work_complete();
    assert_eq!(late.try_recv(), Ok(Availability::Lost));
    Ok(())
}

// ============================================================================
// Sync Objects
// ============================================================================

#[test]
fn client_wait_never_blocks() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    let sync = ctx.fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0).context("fenceSync failed")?;

    assert_eq!(ctx.client_wait_sync(sync, 0, 0), gl::TIMEOUT_EXPIRED);
    assert_eq!(ctx.get_sync_parameter(sync, gl::SYNC_STATUS), Some(gl::UNSIGNALED));

    handle.complete_all_fences();
    assert_eq!(ctx.client_wait_sync(sync, gl::SYNC_FLUSH_COMMANDS_BIT, 0), gl::ALREADY_SIGNALED);
    assert_eq!(ctx.get_sync_parameter(sync, gl::SYNC_STATUS), Some(gl::SIGNALED));
    assert_eq!(ctx.get_error(), GlError::NoError);
    Ok(())
}

#[test]
fn client_wait_rejects_timeouts_and_bad_flags() -> anyhow::Result<()> {
    let (mut ctx, _handle) = context()?;
    let sync = ctx.fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0).context("fenceSync failed")?;

    assert_eq!(ctx.client_wait_sync(sync, 0, 1), gl::WAIT_FAILED);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert_eq!(ctx.client_wait_sync(sync, 0x8, 0), gl::WAIT_FAILED);
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    Ok(())
}

#[test]
fn fence_sync_validates_arguments() -> anyhow::Result<()> {
    let (mut ctx, _handle) = context()?;
    assert!(ctx.fence_sync(0x1234, 0).is_none());
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    assert!(ctx.fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 1).is_none());
    assert_eq!(ctx.get_error(), GlError::InvalidValue);
    Ok(())
}

#[test]
fn deleted_sync_is_unusable() -> anyhow::Result<()> {
    let (mut ctx, _handle) = context()?;
    let sync = ctx.fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0).context("fenceSync failed")?;
    assert!(ctx.is_sync(sync));
    ctx.delete_sync(sync);
    assert!(!ctx.is_sync(sync));
    assert_eq!(ctx.client_wait_sync(sync, 0, 0), gl::WAIT_FAILED);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    Ok(())
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_results_wait_for_their_fence() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    let query = ctx.create_query().context("createQuery failed")?;
    ctx.begin_query(gl::ANY_SAMPLES_PASSED, query);
    assert_eq!(
        ctx.get_query(gl::ANY_SAMPLES_PASSED, gl::CURRENT_QUERY),
        Some(ParamValue::Query(Some(query)))
    );
    ctx.end_query(gl::ANY_SAMPLES_PASSED);
    assert_eq!(ctx.get_query(gl::ANY_SAMPLES_PASSED, gl::CURRENT_QUERY), Some(ParamValue::Query(None)));

    assert_eq!(ctx.get_query_parameter(query, gl::QUERY_RESULT_AVAILABLE), Some(ParamValue::Bool(false)));
    assert_eq!(ctx.get_query_parameter(query, gl::QUERY_RESULT), Some(ParamValue::Null));

    handle.set_query_result(7);
    handle.complete_all_fences();
    assert_eq!(ctx.get_query_parameter(query, gl::QUERY_RESULT_AVAILABLE), Some(ParamValue::Bool(true)));
    assert_eq!(ctx.get_query_parameter(query, gl::QUERY_RESULT), Some(ParamValue::Bool(true)));
    assert_eq!(ctx.get_error(), GlError::NoError);
    Ok(())
}

#[test]
fn primitive_queries_report_counts() -> anyhow::Result<()> {
    let (mut ctx, handle) = context()?;
    handle.auto_complete_fences(true);
    let query = ctx.create_query().context("createQuery failed")?;
    ctx.begin_query(gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN, query);
    ctx.end_query(gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN);
    handle.set_query_result(12);
    assert_eq!(ctx.get_query_parameter(query, gl::QUERY_RESULT), Some(ParamValue::Uint(12)));
    Ok(())
}

#[test]
fn query_misuse_is_invalid_operation() -> anyhow::Result<()> {
    let (mut ctx, _handle) = context()?;
    let query = ctx.create_query().context("createQuery failed")?;

    ctx.end_query(gl::ANY_SAMPLES_PASSED);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);

    ctx.begin_query(gl::ANY_SAMPLES_PASSED, query);
    ctx.begin_query(gl::ANY_SAMPLES_PASSED, query);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    assert!(ctx.get_query_parameter(query, gl::QUERY_RESULT).is_none());
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.end_query(gl::ANY_SAMPLES_PASSED);

    // The first begin fixed the target.
    ctx.begin_query(gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN, query);
    assert_eq!(ctx.get_error(), GlError::InvalidOperation);
    ctx.begin_query(0x1234, query);
    assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    Ok(())
}
