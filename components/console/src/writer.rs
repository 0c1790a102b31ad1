//! `core::fmt::Write` over the console
//!
//! Lets `write!`/`writeln!` target the console directly. Formatting goes
//! through [`Console::write`], so the same newline framing and backpressure
//! apply.

use core::fmt;

use crate::Console;

/// Wrapper for using a [`Console`] with `core::fmt::Write`
pub struct ConsoleWriter<'c, 'a> {
    console: &'c Console<'a>,
}

impl<'c, 'a> ConsoleWriter<'c, 'a> {
    pub const fn new(console: &'c Console<'a>) -> Self {
        Self { console }
    }
}

impl fmt::Write for ConsoleWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.write(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use pvcons_hypervisor::mock::MockHypervisor;
    use pvcons_hypervisor::EventChannel;
    use pvcons_ring::ConsoleRing;

    use crate::Console;

    #[test]
    fn formatted_output_is_framed() {
        let ring = ConsoleRing::new();
        let hv = MockHypervisor::new();
        let console = Console::new(&ring, EventChannel::new(1), &hv);

        writeln!(console.writer(), "answer={}", 42).unwrap();

        let mut buf = [0u8; 32];
        let n = ring.drain_output(&mut buf);
        assert_eq!(&buf[..n], b"answer=42\r\n");
    }
}
