//! Connection flag shared between the event loop and status readers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether a remote peer is currently connected.
///
/// Only the peripheral event loop writes the flag; any number of clones may
/// read it from other tasks or threads.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus(Arc<AtomicBool>);

impl ConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}
