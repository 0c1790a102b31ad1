//! End-to-end echo through the dispatch table
//!
//! The test plays the hypervisor: it deposits keystrokes in the input ring,
//! raises the console's event, and inspects what comes back on the output
//! ring.

use pvcons_console::{Console, ConsoleRing, EventChannel, EventDispatch};
use pvcons_hypervisor::mock::MockHypervisor;
use pvcons_hypervisor::EventTable;

const PORT: EventChannel = EventChannel::new(3);

static PAGE: ConsoleRing = ConsoleRing::new();
static HYPERVISOR: MockHypervisor<'static> = MockHypervisor::new();
static CONSOLE: Console<'static> = Console::new(&PAGE, PORT, &HYPERVISOR);
static EVENTS: EventTable<8> = EventTable::new();

fn take_output() -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = PAGE.drain_output(&mut buf);
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn type_and_signal(keys: &[u8]) {
    assert_eq!(PAGE.push_input(keys), keys.len());
    assert!(EVENTS.dispatch(PORT));
}

#[test]
fn echo_session() {
    CONSOLE.register(&EVENTS).expect("bind console");
    assert!(EVENTS.is_bound(PORT));

    // Enter after "ok": echoed \r, then the appended newline framed as \r\n
    type_and_signal(b"ok\r");
    assert_eq!(take_output(), b"ok\r\r\n");
    assert_eq!(PAGE.input_pending(), 0);

    // Plain typing is echoed as-is
    type_and_signal(b"ls -l");
    assert_eq!(take_output(), b"ls -l");

    // A pasted newline is framed by the write path only
    type_and_signal(b"one\ntwo");
    assert_eq!(take_output(), b"one\r\ntwo");

    // A burst larger than one scratch chunk is echoed in order
    let burst: Vec<u8> = (0..950).map(|i| b'a' + (i % 26) as u8).collect();
    type_and_signal(&burst);
    assert_eq!(take_output(), burst);

    // A spurious event with nothing pending only checks the ring
    let before = HYPERVISOR.signal_count();
    assert!(EVENTS.dispatch(PORT));
    assert_eq!(take_output(), b"");
    assert_eq!(HYPERVISOR.signal_count(), before + 1);

    // Every notification went to the console's own channel
    assert_eq!(HYPERVISOR.last_signalled(), Some(PORT));
    assert_eq!(HYPERVISOR.yield_count(), 0);

    // Binding the same console twice is refused
    assert!(CONSOLE.register(&EVENTS).is_err());
}
