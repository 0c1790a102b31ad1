//! pvcons-sim - host-side simulator for the paravirtualized console
//!
//! Commands:
//! - `pvcons-sim echo` - Type keys at the guest and show what it echoes
//! - `pvcons-sim flood` - Have the guest print faster than the backend drains
//! - `pvcons-sim layout` - Show the shared page layout

mod backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use backend::{Backend, SimHypercalls, CONSOLE_MFN, CONSOLE_PORT, PAGE};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pvcons_console::{StartInfoConsole, INPUT_CHUNK};
use pvcons_hypervisor::EventTable;
use pvcons_ring::{ConsoleRing, IN_RING_SIZE, OUT_RING_SIZE};

/// Upcall table of the simulated guest
static EVENTS: EventTable<8> = EventTable::new();

#[derive(Parser)]
#[command(name = "pvcons-sim")]
#[command(author = "pvcons Contributors")]
#[command(version)]
#[command(about = "Drive the paravirtualized console against a simulated hypervisor", long_about = None)]
struct Cli {
    /// Log filter for driver and simulator messages (e.g. debug, trace)
    #[arg(short, long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type keys at the guest and show the echoed output
    Echo {
        /// Keys to type; `\r`, `\n`, `\t` and `\\` are unescaped
        #[arg(short, long, default_value = "hello\\r")]
        input: String,

        /// Type the input this many times
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,

        /// Bytes the backend drains per pass
        #[arg(short, long, default_value_t = 512)]
        drain_chunk: usize,
    },

    /// Write more than the output ring holds and watch the guest yield
    Flood {
        /// Lines the guest prints
        #[arg(short, long, default_value_t = 500)]
        lines: usize,

        /// Bytes the backend drains per pass
        #[arg(short, long, default_value_t = 64)]
        drain_chunk: usize,
    },

    /// Show the shared page layout
    Layout,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Echo {
            input,
            repeat,
            drain_chunk,
        } => {
            run_echo(&unescape(&input), repeat, drain_chunk)?;
        }

        Commands::Flood { lines, drain_chunk } => {
            run_flood(lines, drain_chunk)?;
        }

        Commands::Layout => {
            show_layout();
        }
    }

    Ok(())
}

/// Boot the simulated guest's console on the shared page
fn boot_guest(drain_chunk: usize) -> anyhow::Result<(&'static SimHypercalls, Backend<'static>)> {
    let (to_backend, from_guest) = backend::event_channels();
    let (to_guest, guest_events) = backend::event_channels();

    let hypercalls: &'static SimHypercalls = Box::leak(Box::new(SimHypercalls::new(to_backend)));
    let info = StartInfoConsole {
        mfn: CONSOLE_MFN,
        evtchn: CONSOLE_PORT.port(),
    };

    // SAFETY: PAGE is a static, so the mapping lives as long as the process.
    unsafe { pvcons_console::init(&info, |_mfn| backend::page_addr(), hypercalls, &EVENTS)? };

    thread::Builder::new()
        .name("guest-upcalls".into())
        .spawn(move || {
            for port in guest_events.iter() {
                if !EVENTS.dispatch(port) {
                    log::warn!("no handler bound to {}", port);
                }
            }
        })?;

    let ring: &'static ConsoleRing = &PAGE.0;
    Ok((hypercalls, Backend::new(ring, from_guest, to_guest, drain_chunk)))
}

fn run_echo(keys: &[u8], repeat: usize, drain_chunk: usize) -> anyhow::Result<()> {
    if keys.is_empty() {
        anyhow::bail!("Nothing to type");
    }

    println!("{} Booting guest console on {}...", "🖥".green(), CONSOLE_PORT);
    let (hypercalls, backend) = boot_guest(drain_chunk)?;

    let mut echoed = Vec::new();
    for _ in 0..repeat {
        println!("  {} {}", "typed ".cyan(), escape(keys));
        backend.type_keys(keys, &mut echoed)?;
    }
    backend.collect(Duration::from_millis(50), &mut echoed);

    println!("  {} {}", "echoed".cyan(), escape(&echoed));

    let expected = expected_echo(keys).repeat(repeat);
    if echoed == expected {
        println!("{} Echo matches input", "✅".green());
    } else {
        println!("{} Echo differs, expected {}", "⚠".yellow(), escape(&expected));
    }

    report(hypercalls);
    Ok(())
}

fn run_flood(lines: usize, drain_chunk: usize) -> anyhow::Result<()> {
    println!("{} Booting guest console on {}...", "🖥".green(), CONSOLE_PORT);
    let (hypercalls, backend) = boot_guest(drain_chunk)?;

    let mut text = Vec::new();
    for i in 0..lines {
        text.extend_from_slice(format!("line {i:05}\n").as_bytes());
    }
    println!(
        "  guest prints {} bytes through a {} byte ring",
        text.len(),
        OUT_RING_SIZE
    );

    let done = AtomicBool::new(false);
    let mut received = Vec::new();

    thread::scope(|s| {
        s.spawn(|| {
            let n = pvcons_console::write_console(&text);
            log::debug!("guest write returned {}", n);
            done.store(true, Ordering::Release);
        });

        loop {
            let finished = done.load(Ordering::Acquire);
            let _ = backend.poll_signal();
            if backend.drain_chunk(&mut received) == 0 {
                if finished && PAGE.0.output_pending() == 0 {
                    break;
                }
                thread::yield_now();
            }
        }
    });

    let expected = frame(&text);
    if received == expected {
        println!(
            "{} Received {} bytes, every newline framed",
            "✅".green(),
            received.len()
        );
    } else {
        anyhow::bail!(
            "Output corrupted: received {} bytes, expected {}",
            received.len(),
            expected.len()
        );
    }

    report(hypercalls);
    Ok(())
}

fn report(hypercalls: &SimHypercalls) {
    println!("\n{}", "Hypercalls".bold());
    println!("  event channel sends: {}", hypercalls.signals());
    println!("  coalesced signals:   {}", hypercalls.dropped());
    println!("  scheduler yields:    {}", hypercalls.yields());
    println!("  ring state:          {:?}", PAGE.0.state());
}

fn show_layout() {
    println!("{}", "Console page layout".bold().green());
    println!("  {:<10} {:>6} {:>6}", "field", "offset", "size");
    let rows = [
        ("in", 0, IN_RING_SIZE),
        ("out", IN_RING_SIZE, OUT_RING_SIZE),
        ("in_cons", IN_RING_SIZE + OUT_RING_SIZE, 4),
        ("in_prod", IN_RING_SIZE + OUT_RING_SIZE + 4, 4),
        ("out_cons", IN_RING_SIZE + OUT_RING_SIZE + 8, 4),
        ("out_prod", IN_RING_SIZE + OUT_RING_SIZE + 12, 4),
    ];
    for (name, offset, size) in rows {
        println!("  {:<10} {:>6} {:>6}", name, offset, size);
    }
    println!("\nTotal: {} bytes", core::mem::size_of::<ConsoleRing>());
    println!("Input handler reads {} bytes per chunk", INPUT_CHUNK);
}

/// Output the guest produces for keys typed through [`Backend::type_keys`]
///
/// The keys arrive in [`INPUT_CHUNK`] sized bursts and the handler reads
/// each burst as one chunk. It echoes the chunk and follows a chunk ending
/// in `\r` with a newline, which goes out as `\r\n`.
fn expected_echo(keys: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in keys.chunks(INPUT_CHUNK) {
        out.extend(frame(chunk));
        if chunk.last() == Some(&b'\r') {
            out.extend_from_slice(b"\r\n");
        }
    }
    out
}

/// Expand each `\n` to `\r\n`
fn frame(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}

fn escape(bytes: &[u8]) -> String {
    let text: String = bytes.escape_ascii().to_string();
    format!("\"{}\"", text)
}
