//! Simulated hypervisor console backend
//!
//! Plays the hypervisor's half of the console page on the host: deposits
//! keystrokes into the input ring, raises the guest's event, and drains the
//! output ring whenever the guest signals.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use pvcons_console::{ConsoleRing, EventChannel, Hypercalls, INPUT_CHUNK};
use pvcons_ring::OUT_RING_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Port of the simulated console event channel
pub const CONSOLE_PORT: EventChannel = EventChannel::new(1);

/// Frame number reported in the simulated start information
pub const CONSOLE_MFN: u64 = 0x8_0000;

/// Pending notifications buffered per direction
const EVENT_QUEUE_DEPTH: usize = 64;

#[repr(C, align(4096))]
pub struct SharedPage(pub ConsoleRing);

/// The page shared between the simulated guest and backend
pub static PAGE: SharedPage = SharedPage(ConsoleRing::new());

/// Virtual address the simulated boot layer maps the console frame to
pub fn page_addr() -> usize {
    &PAGE.0 as *const ConsoleRing as usize
}

/// Event channel pair: one queue per direction
pub fn event_channels() -> (Sender<EventChannel>, Receiver<EventChannel>) {
    crossbeam::channel::bounded(EVENT_QUEUE_DEPTH)
}

/// Guest hypercalls delivered to the simulated backend
pub struct SimHypercalls {
    to_backend: Sender<EventChannel>,
    signals: AtomicUsize,
    dropped: AtomicUsize,
    yields: AtomicUsize,
}

impl SimHypercalls {
    pub fn new(to_backend: Sender<EventChannel>) -> Self {
        Self {
            to_backend,
            signals: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            yields: AtomicUsize::new(0),
        }
    }

    pub fn signals(&self) -> usize {
        self.signals.load(Ordering::Relaxed)
    }

    /// Signals coalesced because the backend already had one pending
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::Relaxed)
    }
}

impl Hypercalls for SimHypercalls {
    fn event_channel_send(&self, port: EventChannel) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        // An event channel is a single pending bit; extra signals collapse
        match self.to_backend.try_send(port) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn sched_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
        std::thread::yield_now();
    }
}

/// Hypervisor side of the console
pub struct Backend<'a> {
    ring: &'a ConsoleRing,
    from_guest: Receiver<EventChannel>,
    to_guest: Sender<EventChannel>,
    drain_chunk: usize,
}

impl<'a> Backend<'a> {
    pub fn new(
        ring: &'a ConsoleRing,
        from_guest: Receiver<EventChannel>,
        to_guest: Sender<EventChannel>,
        drain_chunk: usize,
    ) -> Self {
        Self {
            ring,
            from_guest,
            to_guest,
            drain_chunk: drain_chunk.clamp(1, OUT_RING_SIZE),
        }
    }

    /// Type `keys` at the guest and wait until it has read them
    ///
    /// Keys go in as bursts of at most [`INPUT_CHUNK`] bytes. Each burst is
    /// deposited into an empty input ring, announced with one event, and
    /// fully consumed before the next one, so the guest's input handler sees
    /// exactly one burst per chunk. Echoed output is drained into `out`
    /// meanwhile.
    pub fn type_keys(&self, keys: &[u8], out: &mut Vec<u8>) -> anyhow::Result<()> {
        for burst in keys.chunks(INPUT_CHUNK) {
            let mut rest = burst;
            while !rest.is_empty() {
                let n = self.ring.push_input(rest);
                rest = &rest[n..];
                if n == 0 {
                    self.drain_into(out);
                    std::thread::yield_now();
                }
            }
            log::trace!("deposited {} input bytes", burst.len());

            self.to_guest
                .send(CONSOLE_PORT)
                .map_err(|_| anyhow::anyhow!("guest upcall thread has exited"))?;

            while self.ring.input_pending() > 0 {
                self.drain_into(out);
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    /// Drain output until the guest has been quiet for `idle`
    pub fn collect(&self, idle: Duration, out: &mut Vec<u8>) {
        loop {
            match self.from_guest.recv_timeout(idle) {
                Ok(port) => {
                    log::trace!("guest signalled {}", port);
                    self.drain_into(out);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.drain_into(out) == 0 {
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.drain_into(out);
                    return;
                }
            }
        }
    }

    /// Drain everything currently in the output ring, `drain_chunk` at a time
    pub fn drain_into(&self, out: &mut Vec<u8>) -> usize {
        let mut total = 0;
        loop {
            let n = self.drain_chunk(out);
            if n == 0 {
                return total;
            }
            total += n;
        }
    }

    /// Drain at most one chunk
    pub fn drain_chunk(&self, out: &mut Vec<u8>) -> usize {
        let mut buf = [0u8; OUT_RING_SIZE];
        let n = self.ring.drain_output(&mut buf[..self.drain_chunk]);
        out.extend_from_slice(&buf[..n]);
        n
    }

    /// Check for a pending guest signal without blocking
    pub fn poll_signal(&self) -> Option<EventChannel> {
        self.from_guest.try_recv().ok()
    }
}
