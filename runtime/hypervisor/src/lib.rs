//! # Hypervisor Collaborator Interfaces
//!
//! The console driver needs exactly three things from the world outside
//! the shared page:
//! - **signal**: poke the hypervisor through an event channel
//! - **yield**: give the virtual CPU back to the hypervisor's scheduler
//! - **bind**: have an event upcall invoke a handler
//!
//! This crate names those seams and provides backends for them:
//! - **Mock Mode**: recording hypercalls for host testing (default)
//! - **Runtime Mode**: hypercalls through the boot layer's hypercall page
//!
//! ## Usage
//!
//! ```rust
//! use pvcons_hypervisor::{EventChannel, Hypercalls};
//! use pvcons_hypervisor::mock::MockHypervisor;
//!
//! let hv = MockHypervisor::new();
//! hv.event_channel_send(EventChannel::new(3));
//! assert_eq!(hv.signal_count(), 1);
//! ```
//!
//! ## Build Modes
//!
//! ```bash
//! # Mock (default - host testing)
//! cargo build
//!
//! # Runtime (real guest)
//! cargo build --no-default-features --features runtime
//! ```

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use core::fmt;

use thiserror::Error;

/// Lock-free event dispatch table
pub mod dispatch;

/// Recording backend (for testing)
#[cfg(feature = "mock")]
pub mod mock;

/// Hypercall-page backend (for real guests)
#[cfg(feature = "runtime")]
pub mod runtime;

pub use dispatch::EventTable;

/// Event channel port
///
/// An opaque small integer naming a payload-less signal line between the
/// guest and the hypervisor. Obtained from boot-time start information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EventChannel(u32);

impl EventChannel {
    pub const fn new(port: u32) -> Self {
        Self(port)
    }

    /// Raw port number as passed to hypercalls
    pub const fn port(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evtchn:{}", self.0)
    }
}

/// Hypercalls the console driver issues
///
/// Implementations must not allocate: both calls happen on the console's
/// write path, which may run from an event upcall.
pub trait Hypercalls: Sync {
    /// Signal the hypervisor on `port`
    ///
    /// Fire-and-forget. No acknowledgement is expected and the result, if
    /// the backend has one, is discarded.
    fn event_channel_send(&self, port: EventChannel);

    /// Relinquish the virtual CPU to the hypervisor's scheduler
    ///
    /// Blocks until the hypervisor chooses to run this vCPU again. There is
    /// no timeout.
    fn sched_yield(&self);
}

/// Receiver of event upcalls
pub trait EventHandler: Sync {
    /// Called when `port` has been signalled by the hypervisor
    ///
    /// Runs in upcall context: must not allocate or wait on locks.
    fn on_event(&self, port: EventChannel);
}

/// Event binding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("{port} is outside the dispatch table (capacity {capacity})")]
    PortOutOfRange { port: EventChannel, capacity: usize },

    #[error("{port} already has a handler")]
    AlreadyBound { port: EventChannel },
}

pub type Result<T> = core::result::Result<T, BindError>;

/// Registration half of the upcall dispatch mechanism
pub trait EventDispatch {
    /// Route future events on `port` to `handler`
    ///
    /// # Errors
    /// Returns [`BindError`] if the port cannot take a handler.
    fn bind(&self, port: EventChannel, handler: &'static dyn EventHandler) -> Result<()>;
}

/// Backend selection for this build
pub mod config {
    use core::fmt;

    #[cfg(not(any(feature = "mock", feature = "runtime")))]
    compile_error!("No hypervisor backend selected. Enable the 'mock' or 'runtime' feature.");

    /// Hypercall backend a build is meant to run against
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum BackendMode {
        /// Recording backend, host tests and simulation
        Mock,
        /// Hypercall page of a real guest
        Runtime,
    }

    impl BackendMode {
        pub const fn name(self) -> &'static str {
            match self {
                BackendMode::Mock => "mock",
                BackendMode::Runtime => "runtime",
            }
        }
    }

    impl fmt::Display for BackendMode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    /// `runtime` wins when both features are enabled
    pub const BACKEND: BackendMode = if cfg!(feature = "runtime") {
        BackendMode::Runtime
    } else {
        BackendMode::Mock
    };

    /// Name of the compiled-in backend, `"mock"` or `"runtime"`
    pub const fn platform_mode() -> &'static str {
        BACKEND.name()
    }
}
