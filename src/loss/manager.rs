//! Process-scoped context manager.
//!
//! Owns the state shared by every context: the LRU order used for
//! live-context budgeting and the discrete-GPU activity machine. Both sit
//! behind one coarse lock. Contexts reach the manager through an
//! `Arc<ContextManager>` handle, so tests can inject their own instance
//! (with a [`ManualClock`](super::ManualClock)) instead of the global one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::clock::{Clock, SystemClock};
use super::dgpu::{DgpuState, DynGpuManager, PowerHook};
use super::{ContextLossReason, LossSignal};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique context identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct LruEntry {
    stamp: u64,
    signal: Arc<LossSignal>,
    evictable: bool,
}

#[derive(Debug)]
struct ManagerState {
    next_stamp: u64,
    /// Stamp -> context; the smallest stamp is the least recently used.
    order: BTreeMap<u64, ContextId>,
    entries: FxHashMap<ContextId, LruEntry>,
    dgpu: DynGpuManager,
}

impl ManagerState {
    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }
}

pub struct ContextManager {
    state: Mutex<ManagerState>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<ContextManager>>>> = Lazy::new(RwLock::default);

impl ContextManager {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, dgpu_tick_ms: u64) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                next_stamp: 0,
                order: BTreeMap::new(),
                entries: FxHashMap::default(),
                dgpu: DynGpuManager::new(dgpu_tick_ms),
            }),
            clock,
        }
    }

    /// The process-wide manager, created on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        if let Some(manager) = GLOBAL.read().as_ref() {
            return Arc::clone(manager);
        }
        let mut slot = GLOBAL.write();
        let manager = slot.get_or_insert_with(|| {
            log::debug!("Initializing global context manager");
            let defaults = crate::settings::Settings::default();
            Arc::new(Self::new(Arc::new(SystemClock::default()), defaults.dgpu_tick_ms))
        });
        Arc::clone(manager)
    }

    /// Drops the process-wide manager. Contexts still holding a handle keep
    /// it alive; the next [`ContextManager::global`] call starts fresh.
    pub fn shutdown_global() {
        if GLOBAL.write().take().is_some() {
            log::debug!("Global context manager shut down");
        }
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // LRU
    // ========================================================================

    /// Adds a context at the front of the LRU order, then enforces the
    /// live-context budget. Returns the contexts forced into loss.
    pub fn register(&self, id: ContextId, signal: Arc<LossSignal>, max_contexts: usize) -> Vec<ContextId> {
        let mut state = self.state.lock();
        let stamp = state.stamp();
        if let Some(old) = state.entries.insert(
            id,
            LruEntry {
                stamp,
                signal,
                evictable: true,
            },
        ) {
            state.order.remove(&old.stamp);
        }
        state.order.insert(stamp, id);

        let mut evicted = Vec::new();
        while state.entries.len() > max_contexts.max(1) {
            let victim = state
                .order
                .values()
                .copied()
                .find(|candidate| *candidate != id && state.entries.get(candidate).is_some_and(|e| e.evictable));
            let Some(victim) = victim else {
                log::warn!("Live context budget exceeded but no context can be evicted");
                break;
            };
            if let Some(entry) = state.entries.remove(&victim) {
                state.order.remove(&entry.stamp);
                entry.signal.request(ContextLossReason::Evicted);
                log::info!("Evicting least recently used context {victim:?}");
            }
            evicted.push(victim);
        }
        evicted
    }

    /// Moves a context to the front of the LRU order.
    pub fn bump(&self, id: ContextId) {
        let mut state = self.state.lock();
        let stamp = state.stamp();
        let Some(entry) = state.entries.get_mut(&id) else {
            return;
        };
        let old = std::mem::replace(&mut entry.stamp, stamp);
        state.order.remove(&old);
        state.order.insert(stamp, id);
    }

    pub fn unregister(&self, id: ContextId) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.remove(&id) {
            state.order.remove(&entry.stamp);
        }
    }

    /// Excludes or re-admits a context as an eviction candidate.
    pub fn set_evictable(&self, id: ContextId, evictable: bool) {
        if let Some(entry) = self.state.lock().entries.get_mut(&id) {
            entry.evictable = evictable;
        }
    }

    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Registered contexts, most recently used first.
    #[must_use]
    pub fn lru_order(&self) -> Vec<ContextId> {
        self.state.lock().order.values().rev().copied().collect()
    }

    // ========================================================================
    // Discrete GPU
    // ========================================================================

    pub fn report_dgpu_activity(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.dgpu.poll(now);
        state.dgpu.report_activity(now);
    }

    /// Timer body: runs the activity tick if it is due.
    pub fn poll(&self) {
        let now = self.clock.now_ms();
        self.state.lock().dgpu.poll(now);
    }

    #[must_use]
    pub fn dgpu_state(&self) -> DgpuState {
        self.state.lock().dgpu.state()
    }

    pub fn set_power_hook(&self, hook: impl PowerHook + 'static) {
        self.state.lock().dgpu.set_hook(Box::new(hook));
    }
}
