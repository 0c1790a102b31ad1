//! Notifier - Tell the hypervisor the console page changed
//!
//! Signals are sent after every write attempt (data to drain) and after
//! every read (space freed), whether or not anything moved. Sending more
//! often than strictly needed is harmless; the backend re-reads the
//! counters on each wakeup.

use core::fmt;

use pvcons_hypervisor::{EventChannel, Hypercalls};

/// Event channel signaller for one console
#[derive(Clone, Copy)]
pub struct Notifier<'a> {
    port: EventChannel,
    hypercalls: &'a dyn Hypercalls,
}

impl<'a> Notifier<'a> {
    pub const fn new(port: EventChannel, hypercalls: &'a dyn Hypercalls) -> Self {
        Self { port, hypercalls }
    }

    /// Port this notifier signals
    pub fn port(&self) -> EventChannel {
        self.port
    }

    /// Signal the hypervisor
    ///
    /// Fire-and-forget: does not wait for the backend to react.
    #[inline]
    pub fn notify(&self) {
        self.hypercalls.event_channel_send(self.port);
    }
}

impl fmt::Debug for Notifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("port", &self.port).finish_non_exhaustive()
    }
}
