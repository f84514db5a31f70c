//! Discrete-GPU activity tracking.
//!
//! Aggregate rendering activity across every context drives a three-state
//! machine on a fixed tick:
//!
//! ```text
//!   Inactive --activity--> Primed --tick w/ activity--> Active
//!      ^                     |                           |
//!      +----tick w/o activity+---------------------------+
//! ```
//!
//! A [`PowerHook`] is told whenever the machine enters or leaves `Active`,
//! which is when the host should hold or release the discrete GPU.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DgpuState {
    #[default]
    Inactive,
    Primed,
    Active,
}

/// Host callback for power-state switches.
pub trait PowerHook: Send {
    fn set_dgpu_active(&mut self, active: bool);
}

impl<F> PowerHook for F
where
    F: FnMut(bool) + Send,
{
    fn set_dgpu_active(&mut self, active: bool) {
        self(active);
    }
}

pub struct DynGpuManager {
    state: DgpuState,
    activity_this_tick: bool,
    next_tick_ms: Option<u64>,
    tick_ms: u64,
    hook: Option<Box<dyn PowerHook>>,
}

impl fmt::Debug for DynGpuManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynGpuManager")
            .field("state", &self.state)
            .field("activity_this_tick", &self.activity_this_tick)
            .field("next_tick_ms", &self.next_tick_ms)
            .field("tick_ms", &self.tick_ms)
            .finish_non_exhaustive()
    }
}

impl DynGpuManager {
    #[must_use]
    pub fn new(tick_ms: u64) -> Self {
        Self {
            state: DgpuState::Inactive,
            activity_this_tick: false,
            next_tick_ms: None,
            tick_ms: tick_ms.max(1),
            hook: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> DgpuState {
        self.state
    }

    /// When the next tick is due, if one is scheduled.
    #[inline]
    #[must_use]
    pub fn next_tick_ms(&self) -> Option<u64> {
        self.next_tick_ms
    }

    pub fn set_hook(&mut self, hook: Box<dyn PowerHook>) {
        self.hook = Some(hook);
    }

    /// Records rendering activity. The report that primes the machine does
    /// not count towards the tick it starts.
    pub fn report_activity(&mut self, now_ms: u64) {
        if self.state == DgpuState::Inactive {
            self.set_state(DgpuState::Primed);
            self.next_tick_ms = Some(now_ms + self.tick_ms);
        } else {
            self.activity_this_tick = true;
        }
    }

    /// Runs the tick if it is due.
    pub fn poll(&mut self, now_ms: u64) {
        if let Some(due) = self.next_tick_ms
            && now_ms >= due
        {
            self.tick(now_ms);
        }
    }

    fn tick(&mut self, now_ms: u64) {
        let next = if std::mem::take(&mut self.activity_this_tick) {
            DgpuState::Active
        } else {
            DgpuState::Inactive
        };
        self.set_state(next);
        self.next_tick_ms = (next != DgpuState::Inactive).then_some(now_ms + self.tick_ms);
    }

    fn set_state(&mut self, next: DgpuState) {
        let was_active = self.state == DgpuState::Active;
        let now_active = next == DgpuState::Active;
        if self.state != next {
            log::debug!("dGPU activity: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        if was_active != now_active
            && let Some(hook) = self.hook.as_mut()
        {
            hook.set_dgpu_active(now_active);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn activity_primes_then_activates() {
        let mut dgpu = DynGpuManager::new(3000);
        dgpu.report_activity(0);
        assert_eq!(dgpu.state(), DgpuState::Primed);

        dgpu.report_activity(1000);
        dgpu.poll(2999);
        assert_eq!(dgpu.state(), DgpuState::Primed);
        dgpu.poll(3000);
        assert_eq!(dgpu.state(), DgpuState::Active);
    }

    #[test]
    fn idle_tick_decays_to_inactive() {
        let mut dgpu = DynGpuManager::new(100);
        dgpu.report_activity(0);
        dgpu.poll(100);
        assert_eq!(dgpu.state(), DgpuState::Inactive);
        assert_eq!(dgpu.next_tick_ms(), None);
    }

    #[test]
    fn hook_sees_active_transitions_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dgpu = DynGpuManager::new(10);
        dgpu.set_hook(Box::new(move |active: bool| sink.lock().push(active)));

        dgpu.report_activity(0);
        dgpu.report_activity(5);
        dgpu.poll(10);
        dgpu.poll(20);
        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn single_report_never_reaches_active() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dgpu = DynGpuManager::new(10);
        dgpu.set_hook(Box::new(move |active: bool| sink.lock().push(active)));

        dgpu.report_activity(0);
        dgpu.poll(10);
        dgpu.report_activity(12);
        dgpu.poll(22);
        assert_eq!(dgpu.state(), DgpuState::Inactive);
        assert!(seen.lock().is_empty());
    }
}
