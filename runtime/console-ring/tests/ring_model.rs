//! Model-based tests for the console page
//!
//! Interleaves produce and consume operations on both rings against a
//! `VecDeque` model and checks that the counters never claim more bytes in
//! flight than the ring can hold, and that every byte comes back out in
//! order.

use pvcons_ring::{ConsoleRing, IN_RING_SIZE, OUT_RING_SIZE};
use std::collections::VecDeque;

struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        ((x.wrapping_mul(0x2545F4914F6CDD1D)) >> 32) as u32
    }

    fn gen_range(&mut self, max_exclusive: u32) -> u32 {
        if max_exclusive == 0 {
            return 0;
        }
        self.next_u32() % max_exclusive
    }

    fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next_u32() & 0xFF) as u8).collect()
    }
}

/// Expected wire bytes for a prefix of `input` consumed by `write`
fn framed(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2);
    for &b in input {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

fn check_bounds(ring: &ConsoleRing) {
    let state = ring.state();
    assert!(state.in_prod.wrapping_sub(state.in_cons) as usize <= IN_RING_SIZE);
    assert!(state.out_prod.wrapping_sub(state.out_cons) as usize <= OUT_RING_SIZE);
}

fn run_model(ring: &ConsoleRing, seed: u64, steps: usize) {
    let mut rng = Rng::new(seed);
    let mut out_model: VecDeque<u8> = VecDeque::new();
    let mut in_model: VecDeque<u8> = VecDeque::new();

    for _ in 0..steps {
        match rng.gen_range(4) {
            0 => {
                // guest write; newlines are common to exercise framing
                let len = rng.gen_range(300) as usize;
                let mut data = rng.gen_bytes(len);
                for b in data.iter_mut() {
                    if rng.gen_range(8) == 0 {
                        *b = b'\n';
                    }
                }
                let sent = ring.write(&data);
                assert!(sent <= data.len());
                out_model.extend(framed(&data[..sent]));

                if sent < data.len() {
                    // The next byte really did not fit
                    let needed = if data[sent] == b'\n' { 2 } else { 1 };
                    assert!(ring.output_free() < needed);
                }
            }
            1 => {
                // hypervisor drain
                let mut buf = vec![0u8; rng.gen_range(400) as usize];
                let n = ring.drain_output(&mut buf);
                let expected: Vec<u8> = out_model.drain(..n).collect();
                assert_eq!(&buf[..n], &expected[..]);
            }
            2 => {
                // hypervisor deposit
                let len = rng.gen_range(200) as usize;
                let data = rng.gen_bytes(len);
                let n = ring.push_input(&data);
                in_model.extend(&data[..n]);
            }
            _ => {
                // guest read
                let mut buf = vec![0u8; rng.gen_range(150) as usize];
                let n = ring.read(&mut buf);
                assert_eq!(n, in_model.len().min(buf.len()));
                let expected: Vec<u8> = in_model.drain(..n).collect();
                assert_eq!(&buf[..n], &expected[..]);
            }
        }

        check_bounds(ring);
        assert_eq!(ring.output_pending(), out_model.len());
        assert_eq!(ring.input_pending(), in_model.len());
    }
}

#[test]
fn interleaved_operations_match_model() {
    let ring = ConsoleRing::new();
    run_model(&ring, 0x1234_5678_9ABC_DEF0, 20_000);
}

#[test]
fn interleaved_operations_across_counter_wrap() {
    let start = u32::MAX - 3000;
    let ring = ConsoleRing::starting_at(start, start);
    run_model(&ring, 0xDEAD_BEEF_CAFE_F00D, 20_000);

    // Both rings moved far enough to pass u32::MAX
    let state = ring.state();
    assert!(state.out_prod < start);
    assert!(state.in_prod < start);
}

#[test]
fn round_trip_larger_than_capacity() {
    let ring = ConsoleRing::new();
    let message: Vec<u8> = (0..10 * OUT_RING_SIZE).map(|i| (i % 251) as u8 | 0x80).collect();

    let mut received = Vec::new();
    let mut rest = &message[..];
    let mut buf = [0u8; 333];
    while !rest.is_empty() {
        let sent = ring.write(rest);
        rest = &rest[sent..];
        let n = ring.drain_output(&mut buf);
        received.extend_from_slice(&buf[..n]);
    }
    loop {
        let n = ring.drain_output(&mut buf);
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }

    // No newline bytes in the message, so the wire carries it verbatim
    assert_eq!(received, message);
}

#[test]
fn raw_drain_returns_framed_bytes_verbatim() {
    let ring = ConsoleRing::new();
    assert_eq!(ring.write(b"a\nb"), 3);

    let mut buf = [0u8; 16];
    let n = ring.drain_output(&mut buf);
    assert_eq!(&buf[..n], b"a\r\nb");
}
