//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Frame, interval and timeout scheduling
//! - Pointer listener registration
//! - Storage (LocalStorage on web, in-memory elsewhere)
//!
//! The core never touches the browser directly. Every scheduled callback or
//! listener is a [`HostHandle`] held in a [`HandleSlot`], so a handle is always
//! released before its slot is reused.

pub mod manual;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::StoreError;

/// What a host handle drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleKind {
    /// One-shot animation frame (re-requested every frame)
    Frame,
    /// Repeating interval (clock display)
    Interval,
    /// One-shot timeout (circle relocation)
    Timeout,
    /// Pointer-down listener on the board
    Pointer,
}

/// An acquired host resource. Ids are never reused within a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle {
    pub id: u32,
    pub kind: HandleKind,
}

/// Payload delivered when a handle fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Frame,
    Interval,
    Timeout,
    /// Board-relative pointer position
    Pointer { x: f32, y: f32 },
}

/// Scheduling and listener services provided by the runtime.
///
/// Fired handles come back as `(HostHandle, HostEvent)` pairs through
/// `Game::on_host_event`.
pub trait Host {
    /// Schedule one animation frame
    fn request_frame(&mut self) -> HostHandle;
    /// Start a repeating interval
    fn start_interval(&mut self, period_ms: u32) -> HostHandle;
    /// Schedule a one-shot timeout
    fn start_timeout(&mut self, delay_ms: u32) -> HostHandle;
    /// Attach the board pointer-down listener
    fn listen_pointer(&mut self) -> HostHandle;
    /// Cancel / detach. Releasing an unknown or already-fired handle is a no-op.
    fn release(&mut self, handle: HostHandle);
}

/// Holder for at most one live handle
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HandleSlot(Option<HostHandle>);

impl HandleSlot {
    pub fn new() -> Self {
        Self(None)
    }

    /// Store `handle`, releasing whatever was held before
    pub fn replace(&mut self, host: &mut dyn Host, handle: HostHandle) {
        if let Some(old) = self.0.replace(handle) {
            host.release(old);
        }
    }

    /// Release and clear
    pub fn release(&mut self, host: &mut dyn Host) {
        if let Some(old) = self.0.take() {
            host.release(old);
        }
    }

    /// Forget a one-shot handle that has already fired (nothing to cancel)
    pub fn clear_fired(&mut self, handle: HostHandle) {
        if self.holds(handle) {
            self.0 = None;
        }
    }

    pub fn holds(&self, handle: HostHandle) -> bool {
        self.0 == Some(handle)
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }
}

/// Flat string key-value persistence (LocalStorage semantics)
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory storage for native builds and tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for std::rc::Rc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}
