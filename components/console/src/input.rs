//! Input handler - Echo console input back to the output ring
//!
//! Runs from the event upcall whenever the hypervisor signals that input is
//! available. Drains the input ring in small chunks and writes each chunk
//! straight back out. A chunk ending in a carriage return (a typed Enter)
//! gets an extra newline, which the write path frames as `\r\n`.
//!
//! Typing `ok` and Enter therefore produces `ok\r\r\n` on the output ring:
//! the echoed `\r` goes out unchanged, then the appended `\n` is framed.
//!
//! The scratch buffer lives on the stack; nothing here allocates.

use pvcons_hypervisor::{EventChannel, EventHandler};

use crate::Console;

/// Bytes drained from the input ring per iteration
pub const INPUT_CHUNK: usize = 100;

impl Console<'_> {
    /// Drain the input ring, echoing every chunk
    ///
    /// Returns once a read finds the ring empty.
    pub fn handle_input(&self) {
        let mut buf = [0u8; INPUT_CHUNK];

        loop {
            let n = self.read(&mut buf);
            if n == 0 {
                break;
            }

            self.write(&buf[..n]);

            if buf[n - 1] == b'\r' {
                self.write(b"\n");
            }
        }
    }
}

impl EventHandler for Console<'_> {
    fn on_event(&self, _port: EventChannel) {
        self.handle_input();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvcons_hypervisor::mock::MockHypervisor;
    use pvcons_ring::ConsoleRing;
    use std::vec::Vec;

    const PORT: EventChannel = EventChannel::new(1);

    fn output(ring: &ConsoleRing) -> Vec<u8> {
        let mut buf = [0u8; 2048];
        let n = ring.drain_output(&mut buf);
        buf[..n].to_vec()
    }

    #[test]
    fn carriage_return_gets_newline() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        ring.push_input(b"hi\r");
        console.handle_input();

        assert_eq!(output(&ring), b"hi\r\r\n");
        assert_eq!(ring.input_pending(), 0);
    }

    #[test]
    fn newline_input_is_framed() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        ring.push_input(b"a\nb");
        console.handle_input();

        assert_eq!(output(&ring), b"a\r\nb");
    }

    #[test]
    fn plain_input_echoed_verbatim() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        ring.push_input(b"abc");
        console.handle_input();

        assert_eq!(output(&ring), b"abc");
        // read with data, echo write, final empty read
        assert_eq!(hv.signal_count(), 3);
    }

    #[test]
    fn empty_ring_only_checks() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        console.handle_input();

        assert_eq!(ring.output_pending(), 0);
        assert_eq!(hv.signal_count(), 1);
    }

    #[test]
    fn carriage_return_rule_applies_per_chunk() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        // The \r at index 99 ends the first chunk; the one at 149 ends the second
        let mut input = vec![b'x'; 150];
        input[INPUT_CHUNK - 1] = b'\r';
        input[149] = b'\r';
        ring.push_input(&input);

        console.handle_input();

        let mut expected = Vec::new();
        expected.extend_from_slice(&input[..INPUT_CHUNK]);
        expected.extend_from_slice(b"\r\n");
        expected.extend_from_slice(&input[INPUT_CHUNK..]);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(output(&ring), expected);
    }

    #[test]
    fn carriage_return_mid_chunk_is_not_expanded() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        ring.push_input(b"a\rb");
        console.handle_input();

        assert_eq!(output(&ring), b"a\rb");
    }

    #[test]
    fn on_event_runs_handler() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, PORT, &hv);

        ring.push_input(b"ok\r");
        console.on_event(PORT);

        assert_eq!(output(&ring), b"ok\r\r\n");
    }
}
