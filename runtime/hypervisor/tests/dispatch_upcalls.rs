//! Upcall delivery across threads
//!
//! One thread plays the hypervisor and raises events; another plays the
//! guest's upcall entry and routes them through the dispatch table.

use pvcons_hypervisor::mock::MockHypervisor;
use pvcons_hypervisor::{EventChannel, EventDispatch, EventHandler, EventTable, Hypercalls};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Tally {
    hits: [AtomicUsize; 4],
}

impl EventHandler for Tally {
    fn on_event(&self, port: EventChannel) {
        self.hits[port.port() as usize].fetch_add(1, Ordering::SeqCst);
    }
}

static TALLY: Tally = Tally {
    hits: [
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ],
};

static EVENTS: EventTable<4> = EventTable::new();

#[test]
fn events_reach_bound_handlers() {
    EVENTS.bind(EventChannel::new(1), &TALLY).expect("bind port 1");
    EVENTS.bind(EventChannel::new(3), &TALLY).expect("bind port 3");

    let (raise, pending) = crossbeam::channel::unbounded::<EventChannel>();

    let unrouted = crossbeam::thread::scope(|s| {
        s.spawn(move |_| {
            for i in 0..300u32 {
                raise.send(EventChannel::new(i % 4)).expect("upcall thread alive");
            }
        });

        let upcalls = s.spawn(move |_| {
            let mut unrouted = 0;
            for port in pending.iter() {
                if !EVENTS.dispatch(port) {
                    unrouted += 1;
                }
            }
            unrouted
        });

        upcalls.join().expect("upcall thread panicked")
    })
    .expect("scope panicked");

    assert_eq!(unrouted, 150);
    assert_eq!(TALLY.hits[0].load(Ordering::SeqCst), 0);
    assert_eq!(TALLY.hits[1].load(Ordering::SeqCst), 75);
    assert_eq!(TALLY.hits[2].load(Ordering::SeqCst), 0);
    assert_eq!(TALLY.hits[3].load(Ordering::SeqCst), 75);
}

#[test]
fn mock_hypercalls_are_shareable() {
    let hv = MockHypervisor::new();

    crossbeam::thread::scope(|s| {
        for t in 0..4u32 {
            let hv = &hv;
            s.spawn(move |_| {
                for _ in 0..100 {
                    hv.event_channel_send(EventChannel::new(t));
                    hv.sched_yield();
                }
            });
        }
    })
    .expect("scope panicked");

    assert_eq!(hv.signal_count(), 400);
    assert_eq!(hv.yield_count(), 400);
}
