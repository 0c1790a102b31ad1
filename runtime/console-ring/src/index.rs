//! Position arithmetic for power-of-two byte rings
//!
//! Producer and consumer positions are free-running `u32` counters. They are
//! never reduced modulo the capacity; only the slot index is masked. The
//! number of bytes in flight is therefore `prod - cons` in wrapping
//! arithmetic, which stays correct when the counters pass `u32::MAX`.

/// Index helper for a ring of `N` bytes
///
/// `N` must be a power of two. The check runs at compile time the first
/// time any of the helpers is instantiated for a given `N`.
pub struct RingIndex<const N: usize>;

impl<const N: usize> RingIndex<N> {
    const MASK: u32 = {
        assert!(N.is_power_of_two(), "Ring size must be power of 2");
        assert!(N <= u32::MAX as usize / 2, "Ring size must fit the position counters");
        (N - 1) as u32
    };

    /// Ring capacity in bytes
    pub const CAPACITY: u32 = N as u32;

    /// Buffer slot addressed by a free-running position
    #[inline]
    pub const fn slot(pos: u32) -> usize {
        (pos & Self::MASK) as usize
    }

    /// Bytes published by the producer and not yet consumed
    ///
    /// A well-behaved peer never lets this exceed `N`. Callers that copy data
    /// out clamp it with [`RingIndex::pending`].
    #[inline]
    pub const fn used(prod: u32, cons: u32) -> u32 {
        prod.wrapping_sub(cons)
    }

    /// Bytes available to the consumer, clamped to the capacity
    #[inline]
    pub const fn pending(prod: u32, cons: u32) -> u32 {
        let used = Self::used(prod, cons);
        if used > Self::CAPACITY {
            Self::CAPACITY
        } else {
            used
        }
    }

    /// Free slots available to the producer
    ///
    /// Returns 0 when the counters claim more than `N` bytes in flight.
    #[inline]
    pub const fn free(prod: u32, cons: u32) -> u32 {
        Self::CAPACITY.saturating_sub(Self::used(prod, cons))
    }
}
