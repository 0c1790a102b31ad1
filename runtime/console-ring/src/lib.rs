//! Console Ring - Shared page transport between guest and hypervisor
//!
//! # Purpose
//! Moves console bytes between the guest and the hypervisor through a single
//! shared memory page, without locks, never overrunning either buffer and
//! always reporting how much actually transferred.
//!
//! # Integration Points
//! - Depends on: boot layer (maps the page and hands out its address)
//! - Provides to: Console driver (guest half), simulators and tests (backend half)
//! - Signalling: none here; callers notify the peer after each transfer
//!
//! # Architecture
//! Two independent single-producer/single-consumer byte rings:
//!
//! ```text
//! offset 0     in[1024]      hypervisor -> guest
//! offset 1024  out[2048]     guest -> hypervisor
//! offset 3072  in_cons  u32  advanced by the guest
//! offset 3076  in_prod  u32  advanced by the hypervisor
//! offset 3080  out_cons u32  advanced by the hypervisor
//! offset 3084  out_prod u32  advanced by the guest
//! ```
//!
//! # Memory Ordering
//! - Producer: store bytes, then publish the producer counter with Release
//! - Consumer: load the producer counter with Acquire, then read bytes,
//!   then publish the consumer counter with Release
//!
//! Only the producer of a ring ever stores its producer counter and only the
//! consumer ever stores its consumer counter.
//!
//! # Interrupt Context
//! No operation in this crate allocates, blocks or takes a lock. All of them
//! may run from an event upcall.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use core::cell::UnsafeCell;
use core::mem::{align_of, offset_of, size_of};
use core::sync::atomic::{AtomicU32, Ordering};

use static_assertions::{const_assert, const_assert_eq};
use thiserror::Error;

mod index;

pub use index::RingIndex;

/// Capacity of the hypervisor -> guest ring
pub const IN_RING_SIZE: usize = 1024;

/// Capacity of the guest -> hypervisor ring
pub const OUT_RING_SIZE: usize = 2048;

/// Size of the shared page the rings live in
pub const PAGE_SIZE: usize = 4096;

type InIndex = RingIndex<IN_RING_SIZE>;
type OutIndex = RingIndex<OUT_RING_SIZE>;

/// Console page errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("console page address is null")]
    NullPage,

    #[error("console page address {vaddr:#x} is not page aligned")]
    Misaligned { vaddr: usize },
}

pub type Result<T> = core::result::Result<T, RingError>;

/// Byte storage written by one party and read by the other
///
/// Slots are only touched through volatile accesses, and only while the
/// position counters say the accessing side owns them.
#[repr(transparent)]
struct RingBuf<const N: usize>(UnsafeCell<[u8; N]>);

impl<const N: usize> RingBuf<N> {
    const fn new() -> Self {
        Self(UnsafeCell::new([0; N]))
    }

    #[inline]
    fn store(&self, slot: usize, byte: u8) {
        debug_assert!(slot < N);
        // SAFETY: slot is masked into bounds by the caller, and the producer
        // role owns every slot between the published producer and consumer
        // positions.
        unsafe { core::ptr::write_volatile(self.0.get().cast::<u8>().add(slot), byte) }
    }

    #[inline]
    fn load(&self, slot: usize) -> u8 {
        debug_assert!(slot < N);
        // SAFETY: slot is masked into bounds, and the consumer only reads
        // slots the producer has already published.
        unsafe { core::ptr::read_volatile(self.0.get().cast::<u8>().add(slot)) }
    }
}

/// The shared console page
///
/// # Memory Layout
/// Bit-exact with the hypervisor's view: the input array, the output array,
/// then four 32-bit counters. See the crate documentation for offsets.
///
/// # Safety
/// The page is shared with a concurrently running peer. Correctness relies
/// on at most one guest-side writer and one guest-side reader touching it
/// at a time, per direction.
#[repr(C)]
pub struct ConsoleRing {
    input: RingBuf<IN_RING_SIZE>,
    output: RingBuf<OUT_RING_SIZE>,
    in_cons: AtomicU32,
    in_prod: AtomicU32,
    out_cons: AtomicU32,
    out_prod: AtomicU32,
}

// SAFETY: every field is either an atomic or a byte array whose slots are
// handed back and forth through those atomics.
unsafe impl Sync for ConsoleRing {}

const_assert!(IN_RING_SIZE.is_power_of_two());
const_assert!(OUT_RING_SIZE.is_power_of_two());
const_assert_eq!(offset_of!(ConsoleRing, input), 0);
const_assert_eq!(offset_of!(ConsoleRing, output), IN_RING_SIZE);
const_assert_eq!(offset_of!(ConsoleRing, in_cons), IN_RING_SIZE + OUT_RING_SIZE);
const_assert_eq!(offset_of!(ConsoleRing, in_prod), IN_RING_SIZE + OUT_RING_SIZE + 4);
const_assert_eq!(offset_of!(ConsoleRing, out_cons), IN_RING_SIZE + OUT_RING_SIZE + 8);
const_assert_eq!(offset_of!(ConsoleRing, out_prod), IN_RING_SIZE + OUT_RING_SIZE + 12);
const_assert_eq!(size_of::<ConsoleRing>(), IN_RING_SIZE + OUT_RING_SIZE + 16);
const_assert!(size_of::<ConsoleRing>() <= PAGE_SIZE);
const_assert!(align_of::<ConsoleRing>() <= PAGE_SIZE);

/// Snapshot of the four position counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingState {
    pub in_cons: u32,
    pub in_prod: u32,
    pub out_cons: u32,
    pub out_prod: u32,
}

/// Check that `vaddr` can hold a console page
pub fn validate_page_addr(vaddr: usize) -> Result<()> {
    if vaddr == 0 {
        return Err(RingError::NullPage);
    }
    if vaddr % PAGE_SIZE != 0 {
        return Err(RingError::Misaligned { vaddr });
    }
    Ok(())
}

impl ConsoleRing {
    /// Create a zeroed console page
    ///
    /// Used for host-side tests and simulation. A real guest maps the page
    /// the hypervisor set up instead, see [`ConsoleRing::from_vaddr`].
    pub const fn new() -> Self {
        Self::starting_at(0, 0)
    }

    /// Create a zeroed page whose counters start at the given positions
    ///
    /// Both counters of the input ring start at `in_pos` and both counters of
    /// the output ring at `out_pos`, so the rings are empty. Starting close
    /// to `u32::MAX` exercises counter wrap.
    pub const fn starting_at(in_pos: u32, out_pos: u32) -> Self {
        Self {
            input: RingBuf::new(),
            output: RingBuf::new(),
            in_cons: AtomicU32::new(in_pos),
            in_prod: AtomicU32::new(in_pos),
            out_cons: AtomicU32::new(out_pos),
            out_prod: AtomicU32::new(out_pos),
        }
    }

    /// Reinterpret a boot-mapped page as the console page
    ///
    /// # Errors
    /// Returns [`RingError`] for a null or misaligned address.
    ///
    /// # Safety
    /// `vaddr` must be the virtual address of the console page set up by the
    /// hypervisor, mapped read-write for the rest of the guest's lifetime.
    pub unsafe fn from_vaddr(vaddr: usize) -> Result<&'static ConsoleRing> {
        validate_page_addr(vaddr)?;
        Ok(&*(vaddr as *const ConsoleRing))
    }

    // ========== Guest Half ==========

    /// Write `bytes` into the output ring (guest producer)
    ///
    /// Each `\n` is preceded by a synthesized `\r`, so a newline needs two
    /// free slots. Stops at the first byte that does not fit.
    ///
    /// # Returns
    /// Number of input bytes consumed, not counting synthesized carriage
    /// returns. Less than `bytes.len()` means the ring filled up.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let cons = self.out_cons.load(Ordering::Acquire);
        let mut prod = self.out_prod.load(Ordering::Acquire);
        let mut sent = 0;

        for &byte in bytes {
            let needed = if byte == b'\n' { 2 } else { 1 };
            if OutIndex::free(prod, cons) < needed {
                break;
            }

            if byte == b'\n' {
                self.output.store(OutIndex::slot(prod), b'\r');
                prod = prod.wrapping_add(1);
            }

            self.output.store(OutIndex::slot(prod), byte);
            prod = prod.wrapping_add(1);
            sent += 1;
        }

        // Publish after the bytes; the peer infers presence from this counter
        self.out_prod.store(prod, Ordering::Release);
        sent
    }

    /// Read pending bytes from the input ring (guest consumer)
    ///
    /// Never blocks. Returns 0 when the ring is empty, leaving both counters
    /// unchanged.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut cons = self.in_cons.load(Ordering::Acquire);
        let prod = self.in_prod.load(Ordering::Acquire);

        let size = (InIndex::pending(prod, cons) as usize).min(buf.len());
        for slot in &mut buf[..size] {
            *slot = self.input.load(InIndex::slot(cons));
            cons = cons.wrapping_add(1);
        }

        self.in_cons.store(cons, Ordering::Release);
        size
    }

    // ========== Backend Half ==========
    //
    // The hypervisor's side of each ring. A guest never calls these on a real
    // page; they drive tests and the host simulator.

    /// Deposit raw bytes into the input ring (backend producer)
    ///
    /// No framing is applied. Returns how many bytes fit.
    pub fn push_input(&self, bytes: &[u8]) -> usize {
        let cons = self.in_cons.load(Ordering::Acquire);
        let mut prod = self.in_prod.load(Ordering::Acquire);

        let size = (InIndex::free(prod, cons) as usize).min(bytes.len());
        for &byte in &bytes[..size] {
            self.input.store(InIndex::slot(prod), byte);
            prod = prod.wrapping_add(1);
        }

        self.in_prod.store(prod, Ordering::Release);
        size
    }

    /// Take pending bytes out of the output ring (backend consumer)
    pub fn drain_output(&self, buf: &mut [u8]) -> usize {
        let mut cons = self.out_cons.load(Ordering::Acquire);
        let prod = self.out_prod.load(Ordering::Acquire);

        let size = (OutIndex::pending(prod, cons) as usize).min(buf.len());
        for slot in &mut buf[..size] {
            *slot = self.output.load(OutIndex::slot(cons));
            cons = cons.wrapping_add(1);
        }

        self.out_cons.store(cons, Ordering::Release);
        size
    }

    // ========== Introspection ==========

    /// Bytes waiting in the input ring
    pub fn input_pending(&self) -> usize {
        let cons = self.in_cons.load(Ordering::Acquire);
        let prod = self.in_prod.load(Ordering::Acquire);
        InIndex::pending(prod, cons) as usize
    }

    /// Bytes waiting in the output ring
    pub fn output_pending(&self) -> usize {
        let cons = self.out_cons.load(Ordering::Acquire);
        let prod = self.out_prod.load(Ordering::Acquire);
        OutIndex::pending(prod, cons) as usize
    }

    /// Free slots in the output ring
    pub fn output_free(&self) -> usize {
        let cons = self.out_cons.load(Ordering::Acquire);
        let prod = self.out_prod.load(Ordering::Acquire);
        OutIndex::free(prod, cons) as usize
    }

    /// Current values of all four counters
    pub fn state(&self) -> RingState {
        RingState {
            in_cons: self.in_cons.load(Ordering::Acquire),
            in_prod: self.in_prod.load(Ordering::Acquire),
            out_cons: self.out_cons.load(Ordering::Acquire),
            out_prod: self.out_prod.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
impl ConsoleRing {
    /// Overwrite all four counters, as a misbehaving peer could
    fn force_counters(&self, state: RingState) {
        self.in_cons.store(state.in_cons, Ordering::Release);
        self.in_prod.store(state.in_prod, Ordering::Release);
        self.out_cons.store(state.out_cons, Ordering::Release);
        self.out_prod.store(state.out_prod, Ordering::Release);
    }
}

impl Default for ConsoleRing {
    fn default() -> Self {
        Self::new()
    }
}
