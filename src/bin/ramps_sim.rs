//! Desktop simulator for the RAMPS controller.
//!
//! Runs the reference device table against the simulated board and speaks
//! the line protocol on stdin/stdout, so host software can be developed
//! without hardware. Logs go to stderr, filtered by `RAMPS_LOG`
//! (`tracing-subscriber` directives such as `debug` or `rs_ramps=trace`;
//! default `info`).
//!
//! The loop runs every millisecond:
//! - Executes complete input lines and prints their replies
//! - Advances every device and any running calibration
//! - Prints switch and service events
//! - Closes the simulated home switch of an axis once homing has driven it
//!   far enough
//!
//! # Run
//!
//! ```bash
//! cargo run --bin ramps-sim
//! echo '>SERVICE CALIBRATE_X' | RAMPS_LOG=debug cargo run --bin ramps-sim
//! ```

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use log::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use rs_ramps::hal::{MockBoard, MockInput};
use rs_ramps::traits::{Clock, SerialPort};
use rs_ramps::{Config, Controller, DeviceState, Interface};

/// Main loop interval in milliseconds.
const LOOP_INTERVAL_MS: u64 = 1;

/// Steps an axis travels from where homing starts to its switch.
const SIM_TRAVEL_STEPS: i64 = 200;

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = Config::default();
    let mut board = MockBoard::new();
    let mut controller = Controller::new(&config, &mut board);
    let mut switches = HomeSwitchSim::new(&controller, &board);

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || pump_stdin(tx))
        .context("spawning stdin reader")?;

    let mut link = Interface::new(StdioPort::new(rx), &config.protocol);
    link.send_startup_banner();

    let clock = StdClock::new();
    loop {
        let now = clock.now_ms();
        link.tick(&mut controller, now);
        switches.update(&controller);

        if link.port().is_closed() {
            break;
        }
        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }

    info!("input closed\n{}", link.statistics());
    io::stdout().flush().context("flushing stdout")?;
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RAMPS_LOG")
        .from_env()
        .context("parsing RAMPS_LOG")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

// ============================================================================
// Host Link
// ============================================================================

fn pump_stdin(tx: Sender<u8>) {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    loop {
        let chunk = match reader.fill_buf() {
            Ok([]) => break,
            Ok(chunk) => chunk.to_vec(),
            Err(e) => {
                error!("stdin: {e}");
                break;
            }
        };
        reader.consume(chunk.len());
        for byte in chunk {
            if tx.send(byte).is_err() {
                return;
            }
        }
    }
    debug!("stdin closed");
}

/// Serial port over the process's stdin and stdout.
struct StdioPort {
    rx: Receiver<u8>,
    closed: bool,
}

impl StdioPort {
    fn new(rx: Receiver<u8>) -> Self {
        Self { rx, closed: false }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SerialPort for StdioPort {
    fn read_byte(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            error!("stdout: {e}");
        }
    }
}

struct StdClock {
    start: Instant,
}

impl StdClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

// ============================================================================
// Simulated Home Switches
// ============================================================================

struct SimAxis {
    stepper: String,
    switch: MockInput,
    trip_at: Option<i64>,
}

/// Closes an axis's home switch once homing has moved it
/// [`SIM_TRAVEL_STEPS`] below where it started.
struct HomeSwitchSim {
    axes: Vec<SimAxis>,
}

impl HomeSwitchSim {
    fn new(controller: &Controller<MockBoard>, board: &MockBoard) -> Self {
        let axes = controller
            .devices()
            .iter()
            .filter_map(|device| {
                let stepper = device.as_stepper()?;
                let switch = board.input(stepper.home_switch()?)?;
                Some(SimAxis {
                    stepper: device.name().to_string(),
                    switch,
                    trip_at: None,
                })
            })
            .collect();
        Self { axes }
    }

    fn update(&mut self, controller: &Controller<MockBoard>) {
        for axis in self.axes.iter_mut() {
            let Some(device) = controller.device(&axis.stepper) else {
                continue;
            };
            let Some(stepper) = device.as_stepper() else {
                continue;
            };

            if device.state() == DeviceState::Calibrating {
                let position = stepper.position_steps();
                let trip_at = *axis.trip_at.get_or_insert(position - SIM_TRAVEL_STEPS);
                axis.switch.set(position <= trip_at);
            } else if axis.trip_at.take().is_some() {
                axis.switch.set_low();
            }
        }
    }
}
