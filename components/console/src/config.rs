//! Boot configuration for the console
//!
//! The hypervisor describes the console in the guest's start information:
//! the machine frame holding the shared page and the event channel port.
//! Turning the frame into a usable address is the boot layer's job, so it
//! is passed in as a translation function.

use pvcons_hypervisor::EventChannel;

use crate::{ConsoleError, Result};

/// Console section of the boot-time start information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartInfoConsole {
    /// Machine frame number of the console page
    pub mfn: u64,

    /// Event channel port for console notifications
    pub evtchn: u32,
}

/// Where the console lives in this guest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Virtual address of the mapped console page
    pub ring_vaddr: usize,

    /// Event channel shared with the hypervisor's console backend
    pub event_channel: EventChannel,
}

impl ConsoleConfig {
    pub const fn new(ring_vaddr: usize, event_channel: EventChannel) -> Self {
        Self {
            ring_vaddr,
            event_channel,
        }
    }

    /// Build the configuration from start information
    ///
    /// # Arguments
    /// * `info` - Console section of the start information
    /// * `translate` - Maps a machine frame number to its virtual address
    pub fn from_start_info<F>(info: &StartInfoConsole, translate: F) -> Self
    where
        F: FnOnce(u64) -> usize,
    {
        Self {
            ring_vaddr: translate(info.mfn),
            event_channel: EventChannel::new(info.evtchn),
        }
    }

    /// Check the configuration before the page is touched
    ///
    /// # Errors
    /// Returns [`ConsoleError::InvalidPage`] if the page address is null or
    /// not page aligned. Every port number is accepted.
    pub fn validate(&self) -> Result<()> {
        pvcons_ring::validate_page_addr(self.ring_vaddr).map_err(|err| {
            log::warn!("rejecting console config on {}: {}", self.event_channel, err);
            ConsoleError::from(err)
        })
    }
}
