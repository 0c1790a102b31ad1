//! Paravirtualized Console - Guest-side console driver
//!
//! # Purpose
//! Provides the guest's console: a byte-stream write that never drops
//! output, a non-blocking read, and an input handler that echoes what the
//! user types. Everything travels through one page shared with the
//! hypervisor plus an event channel.
//!
//! # Integration Points
//! - Depends on: `pvcons-ring` (shared page), `pvcons-hypervisor` (signal,
//!   yield, event binding)
//! - Provides to: the guest runtime's console write primitive
//!   ([`write_console`]), `core::fmt::Write`, and the `log` facade
//! - Event channels: one, from the boot-time start information
//!
//! # Architecture
//! ```text
//! hypervisor ──in ring──> Console::handle_input ──┐
//!      ^                                          │ echo
//!      └────────out ring <── Console::write <─────┘
//!                  │
//!                  └─> Notifier::notify (event channel)
//! ```
//!
//! # Lifecycle
//! The console is a process-wide singleton: built once from the start
//! information during boot, installed with [`install`] (or [`init`], which
//! also binds the input handler), and never torn down.
//!
//! # Upcall Safety
//! Reads, writes, notifications and the input handler never allocate and
//! take no locks, so they may run from an event upcall.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use spin::Once;

mod config;
mod driver;
mod error;
mod input;
mod logger;
mod notifier;
mod writer;

pub use config::{ConsoleConfig, StartInfoConsole};
pub use driver::Console;
pub use error::{ConsoleError, Result};
pub use input::INPUT_CHUNK;
pub use logger::ConsoleLogger;
pub use notifier::Notifier;
pub use writer::ConsoleWriter;

pub use pvcons_hypervisor::{EventChannel, EventDispatch, Hypercalls};
pub use pvcons_ring::ConsoleRing;

static CONSOLE: Once<Console<'static>> = Once::new();

/// Make `console` the process-wide console
///
/// # Errors
/// Returns [`ConsoleError::AlreadyInstalled`] if a console was installed
/// before; the existing one stays in place.
pub fn install(console: Console<'static>) -> Result<&'static Console<'static>> {
    let mut fresh = false;
    let installed = CONSOLE.call_once(|| {
        fresh = true;
        console
    });

    if fresh {
        Ok(installed)
    } else {
        Err(ConsoleError::AlreadyInstalled)
    }
}

/// The process-wide console, if one has been installed
pub fn installed() -> Option<&'static Console<'static>> {
    CONSOLE.get()
}

/// Write to the process-wide console
///
/// Backs the guest runtime's console write primitive. Blocks while the
/// output ring is full.
///
/// # Returns
/// `bytes.len()`, or 0 if no console has been installed yet
pub fn write_console(bytes: &[u8]) -> usize {
    installed().map_or(0, |console| console.write(bytes))
}

/// Bring up the console during boot
///
/// Builds the configuration from the start information, installs the
/// console and binds its input handler.
///
/// # Arguments
/// * `info` - Console section of the start information
/// * `translate` - Maps a machine frame number to its virtual address
/// * `hypercalls` - Signal and yield backend
/// * `dispatch` - Event upcall dispatcher
///
/// # Errors
/// Fails if the page address is unusable, a console is already installed,
/// or the dispatcher refuses the event channel.
///
/// # Safety
/// The address returned by `translate` must map the console page for the
/// rest of the guest's lifetime.
pub unsafe fn init<F>(
    info: &StartInfoConsole,
    translate: F,
    hypercalls: &'static dyn Hypercalls,
    dispatch: &dyn EventDispatch,
) -> Result<&'static Console<'static>>
where
    F: FnOnce(u64) -> usize,
{
    let config = ConsoleConfig::from_start_info(info, translate);
    let console = unsafe { Console::from_config(&config, hypercalls)? };

    let console = install(console)?;
    console.register(dispatch)?;

    log::info!(
        "console ready on {} (page {:#x}, mfn {:#x}, {} backend)",
        config.event_channel,
        config.ring_vaddr,
        info.mfn,
        pvcons_hypervisor::config::BACKEND
    );
    Ok(console)
}
