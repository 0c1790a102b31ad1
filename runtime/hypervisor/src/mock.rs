//! Mock hypercall backend
//!
//! Records every signal and yield instead of trapping into a hypervisor.
//! A yield hook lets a test play the hypervisor's part while the guest is
//! "descheduled", e.g. draining a full output ring.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::{EventChannel, Hypercalls};

/// Callback run on every [`Hypercalls::sched_yield`]
pub type YieldHook<'a> = &'a (dyn Fn() + Sync);

/// Recording hypercall backend
pub struct MockHypervisor<'a> {
    signals: AtomicUsize,
    last_port: AtomicU32,
    yields: AtomicUsize,
    on_yield: Option<YieldHook<'a>>,
}

impl MockHypervisor<'static> {
    /// Create a mock whose yields return immediately
    pub const fn new() -> Self {
        Self {
            signals: AtomicUsize::new(0),
            last_port: AtomicU32::new(0),
            yields: AtomicUsize::new(0),
            on_yield: None,
        }
    }
}

impl<'a> MockHypervisor<'a> {
    /// Create a mock that runs `hook` each time the guest yields
    pub fn with_yield_hook(hook: YieldHook<'a>) -> Self {
        Self {
            signals: AtomicUsize::new(0),
            last_port: AtomicU32::new(0),
            yields: AtomicUsize::new(0),
            on_yield: Some(hook),
        }
    }

    /// Number of event channel signals sent so far
    pub fn signal_count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }

    /// Port of the most recent signal, if any
    pub fn last_signalled(&self) -> Option<EventChannel> {
        if self.signal_count() == 0 {
            None
        } else {
            Some(EventChannel::new(self.last_port.load(Ordering::SeqCst)))
        }
    }

    /// Number of scheduler yields so far
    pub fn yield_count(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }

    /// Forget recorded signals and yields
    pub fn reset(&self) {
        self.signals.store(0, Ordering::SeqCst);
        self.yields.store(0, Ordering::SeqCst);
        self.last_port.store(0, Ordering::SeqCst);
    }
}

impl Default for MockHypervisor<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Hypercalls for MockHypervisor<'_> {
    fn event_channel_send(&self, port: EventChannel) {
        self.last_port.store(port.port(), Ordering::SeqCst);
        self.signals.fetch_add(1, Ordering::SeqCst);
    }

    fn sched_yield(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_yield {
            hook();
        }
    }
}

impl fmt::Debug for MockHypervisor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHypervisor")
            .field("signals", &self.signal_count())
            .field("last_signalled", &self.last_signalled())
            .field("yields", &self.yield_count())
            .field("has_yield_hook", &self.on_yield.is_some())
            .finish()
    }
}
