//! Deterministic host: records handles instead of scheduling them.
//!
//! Used by tests and the native demo. Callers decide when a handle "fires"
//! and feed the event to the game themselves.

use std::collections::BTreeMap;

use super::{HandleKind, Host, HostHandle};

#[derive(Debug, Default)]
pub struct ManualHost {
    next_id: u32,
    /// Live handles with their period/delay (0 for frames and listeners)
    live: BTreeMap<u32, (HandleKind, u32)>,
    released: Vec<HostHandle>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&mut self, kind: HandleKind, ms: u32) -> HostHandle {
        self.next_id += 1;
        self.live.insert(self.next_id, (kind, ms));
        HostHandle {
            id: self.next_id,
            kind,
        }
    }

    pub fn is_live(&self, handle: HostHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn live_count(&self, kind: HandleKind) -> usize {
        self.live.values().filter(|(k, _)| *k == kind).count()
    }

    pub fn total_live(&self) -> usize {
        self.live.len()
    }

    /// The live handle of `kind` (oldest first)
    pub fn live_of(&self, kind: HandleKind) -> Option<HostHandle> {
        self.live
            .iter()
            .find(|(_, (k, _))| *k == kind)
            .map(|(&id, &(kind, _))| HostHandle { id, kind })
    }

    /// Delay or period the handle was scheduled with
    pub fn scheduled_ms(&self, handle: HostHandle) -> Option<u32> {
        self.live.get(&handle.id).map(|&(_, ms)| ms)
    }

    /// Fire the live handle of `kind`. One-shot kinds (frames, timeouts) stop
    /// being live, like their browser counterparts.
    pub fn fire(&mut self, kind: HandleKind) -> Option<HostHandle> {
        let handle = self.live_of(kind)?;
        if matches!(kind, HandleKind::Frame | HandleKind::Timeout) {
            self.live.remove(&handle.id);
        }
        Some(handle)
    }

    /// Every handle released so far, in order
    pub fn released(&self) -> &[HostHandle] {
        &self.released
    }
}

impl Host for ManualHost {
    fn request_frame(&mut self) -> HostHandle {
        self.acquire(HandleKind::Frame, 0)
    }

    fn start_interval(&mut self, period_ms: u32) -> HostHandle {
        self.acquire(HandleKind::Interval, period_ms)
    }

    fn start_timeout(&mut self, delay_ms: u32) -> HostHandle {
        self.acquire(HandleKind::Timeout, delay_ms)
    }

    fn listen_pointer(&mut self) -> HostHandle {
        self.acquire(HandleKind::Pointer, 0)
    }

    fn release(&mut self, handle: HostHandle) {
        if self.live.remove(&handle.id).is_some() {
            self.released.push(handle);
        }
    }
}
