//! Console driver - Byte stream API over the console page
//!
//! # Backpressure
//! Console output is too valuable to drop. When the output ring fills up,
//! `write` yields the vCPU to the hypervisor and retries until everything
//! has been transferred. There is no timeout and no cancellation: the guest
//! trusts the hypervisor to drain the ring while it is descheduled.
//!
//! ```text
//! Console::write(bytes)
//!   └─> ConsoleRing::write()        [partial write when full]
//!        └─> Notifier::notify()     [wake the backend]
//!             └─> sched_yield()     [only if bytes remain]
//! ```
//!
//! # Concurrency
//! No internal lock. At most one guest-side writer and one guest-side reader
//! may use a console at a time; the surrounding runtime serializes callers.

use core::fmt;

use pvcons_hypervisor::{EventChannel, EventDispatch, Hypercalls};
use pvcons_ring::ConsoleRing;

use crate::{ConsoleConfig, ConsoleWriter, Notifier, Result};

/// Paravirtualized console driver
pub struct Console<'a> {
    ring: &'a ConsoleRing,
    notifier: Notifier<'a>,
    hypercalls: &'a dyn Hypercalls,
}

impl<'a> Console<'a> {
    /// Create a console over an already mapped page
    pub const fn new(ring: &'a ConsoleRing, port: EventChannel, hypercalls: &'a dyn Hypercalls) -> Self {
        Self {
            ring,
            notifier: Notifier::new(port, hypercalls),
            hypercalls,
        }
    }

    /// Create a console from boot configuration
    ///
    /// # Errors
    /// Returns [`crate::ConsoleError::InvalidPage`] if the configured page
    /// address is unusable.
    ///
    /// # Safety
    /// `config.ring_vaddr` must map the console page set up by the hypervisor
    /// for the rest of the guest's lifetime.
    pub unsafe fn from_config(config: &ConsoleConfig, hypercalls: &'a dyn Hypercalls) -> Result<Self> {
        config.validate()?;
        let ring = unsafe { ConsoleRing::from_vaddr(config.ring_vaddr)? };
        Ok(Self::new(ring, config.event_channel, hypercalls))
    }

    /// Event channel shared with the hypervisor
    pub fn event_channel(&self) -> EventChannel {
        self.notifier.port()
    }

    /// The underlying console page
    pub fn ring(&self) -> &'a ConsoleRing {
        self.ring
    }

    /// Write all of `bytes` to the console
    ///
    /// Each `\n` goes out as `\r\n`. Blocks (by yielding the vCPU) while the
    /// output ring is full.
    ///
    /// # Returns
    /// Always `bytes.len()`
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut rest = bytes;

        while !rest.is_empty() {
            let sent = self.ring.write(rest);
            self.notifier.notify();

            rest = &rest[sent..];

            if !rest.is_empty() {
                self.hypercalls.sched_yield();
            }
        }

        bytes.len()
    }

    /// Read whatever input is pending into `buf`
    ///
    /// Never blocks. Always signals the hypervisor, even when nothing was
    /// read, so it knows the guest has looked.
    ///
    /// # Returns
    /// Number of bytes read, 0 if the input ring was empty
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let n = self.ring.read(buf);
        self.notifier.notify();
        n
    }

    /// `core::fmt::Write` adapter for this console
    pub fn writer(&self) -> ConsoleWriter<'_, 'a> {
        ConsoleWriter::new(self)
    }
}

impl Console<'static> {
    /// Route input events on this console's channel to its input handler
    ///
    /// # Errors
    /// Returns [`crate::ConsoleError::Bind`] if the dispatcher refuses the port.
    pub fn register(&'static self, dispatch: &dyn EventDispatch) -> Result<()> {
        dispatch.bind(self.event_channel(), self)?;
        log::debug!("console input handler bound to {}", self.event_channel());
        Ok(())
    }
}

impl fmt::Debug for Console<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("event_channel", &self.event_channel())
            .field("ring", &self.ring.state())
            .finish_non_exhaustive()
    }
}
