//! Fences, Sync Objects & Availability
//!
//! Submitted GPU work is tracked with two counters: `next`, the id the next
//! fence will get (starting at 1), and `completed`, the highest id the
//! driver has reported done (starting at 0). `completed < next` always
//! holds and `completed` never decreases.
//!
//! Nothing here blocks. Callers that want to know when work finishes get a
//! [`flume::Receiver`] that resolves once `completed` reaches their id. The
//! pending list is re-checked whenever the completed counter advances. A
//! lost context resolves every pending receiver with
//! [`Availability::Lost`].

use flume::{Receiver, Sender};

use crate::context::{Failure, WebGlContext};
use crate::gl::{self, GLbitfield, GLenum};
use crate::objects::{SyncData, SyncId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Available,
    Lost,
}

#[derive(Debug)]
pub struct FenceTracker {
    next: u64,
    completed: u64,
    pending: Vec<(u64, Sender<Availability>)>,
}

impl Default for FenceTracker {
    fn default() -> Self {
        Self {
            next: 1,
            completed: 0,
            pending: Vec::new(),
        }
    }
}

impl FenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next fence id.
    pub fn issue(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    #[inline]
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next
    }

    #[inline]
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self, id: u64) -> bool {
        id <= self.completed
    }

    /// Records driver progress and resolves callbacks that became ready.
    ///
    /// Reports beyond the last issued id are clamped, stale reports ignored.
    pub fn update_completed(&mut self, reported: u64) {
        let reported = reported.min(self.next - 1);
        if reported <= self.completed {
            return;
        }
        self.completed = reported;
        let completed = self.completed;
        self.pending.retain(|(id, tx)| {
            if *id <= completed {
                let _ = tx.send(Availability::Available);
                false
            } else {
                true
            }
        });
    }

    /// A receiver resolving once fence `id` completes.
    pub fn on_available(&mut self, id: u64) -> Receiver<Availability> {
        let (tx, rx) = flume::bounded(1);
        if self.is_complete(id) {
            let _ = tx.send(Availability::Available);
        } else {
            self.pending.push((id, tx));
        }
        rx
    }

    /// Resolves every pending receiver as lost.
    pub fn lose(&mut self) {
        for (_, tx) in self.pending.drain(..) {
            let _ = tx.send(Availability::Lost);
        }
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Context Operations
// ============================================================================

impl WebGlContext {
    /// Issues a driver fence and returns its id.
    pub(crate) fn insert_fence(&mut self) -> u64 {
        let id = self.fences.issue();
        self.backend.insert_fence(id);
        id
    }

    /// Pulls driver progress into the fence tracker.
    pub fn poll_fences(&mut self) {
        if !self.check_alive() {
            return;
        }
        let completed = self.backend.completed_fence();
        self.fences.update_completed(completed);
    }

    /// Resolves once all work submitted up to now has completed, or the
    /// context is lost.
    pub fn on_work_complete(&mut self) -> Receiver<Availability> {
        if !self.check_alive() {
            let (tx, rx) = flume::bounded(1);
            let _ = tx.send(Availability::Lost);
            return rx;
        }
        let id = self.insert_fence();
        self.fences.on_available(id)
    }

    /// Resolves once fence `id` completes or the context is lost.
    pub fn on_fence_available(&mut self, id: u64) -> Receiver<Availability> {
        if !self.check_alive() {
            let (tx, rx) = flume::bounded(1);
            let _ = tx.send(Availability::Lost);
            return rx;
        }
        self.fences.on_available(id)
    }

    #[must_use]
    pub fn fence_counters(&self) -> (u64, u64) {
        (self.fences.next_id(), self.fences.completed())
    }

    pub fn flush(&mut self) {
        self.run("flush", |ctx| {
            ctx.backend.flush();
            Ok(())
        });
    }

    /// The only blocking call: waits for the driver to drain.
    pub fn finish(&mut self) {
        self.run("finish", |ctx| {
            ctx.backend.finish();
            let completed = ctx.backend.completed_fence();
            ctx.fences.update_completed(completed);
            Ok(())
        });
    }

    // ------------------------------------------------------------------------
    // Sync objects
    // ------------------------------------------------------------------------

    pub fn fence_sync(&mut self, condition: GLenum, flags: GLbitfield) -> Option<SyncId> {
        self.run("fenceSync", |ctx| {
            ctx.require_webgl2()?;
            if condition != gl::SYNC_GPU_COMMANDS_COMPLETE {
                return Err(Failure::invalid_enum("condition must be SYNC_GPU_COMMANDS_COMPLETE."));
            }
            if flags != 0 {
                return Err(Failure::invalid_value("flags must be 0."));
            }
            let fence_id = ctx.insert_fence();
            let id = ctx.objects.syncs.insert(None, SyncData { fence_id });
            Ok(id)
        })
    }

    pub fn is_sync(&mut self, sync: SyncId) -> bool {
        self.run("isSync", |ctx| Ok(ctx.objects.syncs.is_live(sync)))
            .unwrap_or(false)
    }

    pub fn delete_sync(&mut self, sync: SyncId) {
        self.run("deleteSync", |ctx| {
            ctx.objects.syncs.mark_deleted(sync);
            Ok(())
        });
    }

    /// Non-blocking wait. Only a zero timeout is accepted.
    pub fn client_wait_sync(&mut self, sync: SyncId, flags: GLbitfield, timeout_ns: u64) -> GLenum {
        self.run("clientWaitSync", |ctx| {
            ctx.require_webgl2()?;
            if flags & !gl::SYNC_FLUSH_COMMANDS_BIT != 0 {
                return Err(Failure::invalid_value("Unknown flags."));
            }
            if timeout_ns > 0 {
                return Err(Failure::invalid_operation(
                    "Timeout must not exceed MAX_CLIENT_WAIT_TIMEOUT_WEBGL (0).",
                ));
            }
            let fence_id = ctx.live_sync(sync)?.fence_id;
            if flags & gl::SYNC_FLUSH_COMMANDS_BIT != 0 {
                ctx.backend.flush();
            }
            let completed = ctx.backend.completed_fence();
            ctx.fences.update_completed(completed);
            Ok(if ctx.fences.is_complete(fence_id) {
                gl::ALREADY_SIGNALED
            } else {
                gl::TIMEOUT_EXPIRED
            })
        })
        .unwrap_or(gl::WAIT_FAILED)
    }

    pub fn get_sync_parameter(&mut self, sync: SyncId, pname: GLenum) -> Option<GLenum> {
        self.run("getSyncParameter", |ctx| {
            ctx.require_webgl2()?;
            let fence_id = ctx.live_sync(sync)?.fence_id;
            match pname {
                gl::OBJECT_TYPE => Ok(gl::SYNC_FENCE),
                gl::SYNC_CONDITION => Ok(gl::SYNC_GPU_COMMANDS_COMPLETE),
                gl::SYNC_FLAGS => Ok(0),
                gl::SYNC_STATUS => {
                    let completed = ctx.backend.completed_fence();
                    ctx.fences.update_completed(completed);
                    Ok(if ctx.fences.is_complete(fence_id) {
                        gl::SIGNALED
                    } else {
                        gl::UNSIGNALED
                    })
                }
                _ => Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            }
        })
    }

    fn live_sync(&self, sync: SyncId) -> Result<&SyncData, Failure> {
        self.objects
            .syncs
            .get(sync)
            .filter(|e| !e.deleted)
            .map(|e| &e.data)
            .ok_or_else(|| Failure::invalid_operation("Sync object is deleted or unknown."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_from_one() {
        let mut fences = FenceTracker::new();
        assert_eq!(fences.issue(), 1);
        assert_eq!(fences.issue(), 2);
        assert_eq!(fences.next_id(), 3);
        assert_eq!(fences.completed(), 0);
    }

    #[test]
    fn completed_is_clamped_and_monotonic() {
        let mut fences = FenceTracker::new();
        fences.issue();
        fences.issue();
        fences.update_completed(10);
        assert_eq!(fences.completed(), 2);
        fences.update_completed(1);
        assert_eq!(fences.completed(), 2);
    }

    #[test]
    fn receivers_resolve_when_counter_advances() {
        let mut fences = FenceTracker::new();
        let first = fences.issue();
        let second = fences.issue();
        let rx1 = fences.on_available(first);
        let rx2 = fences.on_available(second);

        fences.update_completed(first);
        assert_eq!(rx1.try_recv().ok(), Some(Availability::Available));
        assert!(rx2.try_recv().is_err());
        assert_eq!(fences.pending_len(), 1);

        fences.lose();
        assert_eq!(rx2.try_recv().ok(), Some(Availability::Lost));
    }
}
