//! Event Dispatch - Route event channel upcalls to handlers
//!
//! A fixed-size table indexed by port. Each slot is written at most once,
//! so lookups on the upcall path need no lock and never allocate.

use spin::Once;

use crate::{BindError, EventChannel, EventDispatch, EventHandler, Result};

/// Dispatch table for ports `0..N`
pub struct EventTable<const N: usize> {
    slots: [Once<&'static dyn EventHandler>; N],
}

impl<const N: usize> EventTable<N> {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Once<&'static dyn EventHandler> = Once::new();

    /// Create a table with no handlers bound
    pub const fn new() -> Self {
        Self {
            slots: [Self::EMPTY; N],
        }
    }

    /// Number of ports the table can route
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Check if a handler is bound to `port`
    pub fn is_bound(&self, port: EventChannel) -> bool {
        self.slot(port).is_some_and(Once::is_completed)
    }

    /// Invoke the handler bound to `port`
    ///
    /// Called from the upcall path once per pending port.
    ///
    /// # Returns
    /// `true` if a handler ran, `false` if the port is unbound or out of range
    pub fn dispatch(&self, port: EventChannel) -> bool {
        match self.slot(port).and_then(Once::get) {
            Some(handler) => {
                handler.on_event(port);
                true
            }
            None => false,
        }
    }

    fn slot(&self, port: EventChannel) -> Option<&Once<&'static dyn EventHandler>> {
        self.slots.get(port.port() as usize)
    }
}

impl<const N: usize> Default for EventTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventDispatch for EventTable<N> {
    fn bind(&self, port: EventChannel, handler: &'static dyn EventHandler) -> Result<()> {
        let slot = self.slot(port).ok_or(BindError::PortOutOfRange { port, capacity: N })?;

        let mut fresh = false;
        slot.call_once(|| {
            fresh = true;
            handler
        });

        if fresh {
            Ok(())
        } else {
            Err(BindError::AlreadyBound { port })
        }
    }
}
