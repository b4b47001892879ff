//! Federate bridge loopback runner
//!
//! Runs every participant of a run file against one in-process loopback bus,
//! always stepping the one with the earliest next hit time until the stop
//! time. Publications are driven by a sine signal; received inputs are
//! logged.
//!
//! # Example
//!
//! ```bash
//! federate-bridge --run demos/loopback.json
//! federate-bridge --run demos/loopback.json --stop-time 10 --log-level debug
//! ```

mod run;

use clap::Parser;
use federate_bridge_core_rs::bus::loopback::LoopbackBus;
use federate_bridge_core_rs::logging::init_logging;
use federate_bridge_core_rs::{BridgeError, Federate, Orchestrator, PortBuffer, Time};
use run::{RunFile, RunFileError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info};

/// Federate Bridge Loopback Runner
///
/// Steps several federates in time order over a shared in-process bus.
#[derive(Parser, Debug)]
#[command(name = "federate-bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Run file listing the participants
    #[arg(short = 'r', long)]
    run: PathBuf,

    /// Override the run file's stop time (seconds)
    #[arg(short = 't', long)]
    stop_time: Option<f64>,

    /// Log level used when RUST_LOG is unset
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    RunFile(#[from] RunFileError),

    #[error("participant {index}: {source}")]
    Participant { index: usize, source: BridgeError },
}

/// Frequency of the drive signal in Hz
const SIGNAL_FREQUENCY: f64 = 0.77552;

/// Drive signal for slot `slot` at time `t`
fn signal(t: Time, slot: usize) -> f64 {
    (SIGNAL_FREQUENCY * 2.0 * std::f64::consts::PI * t * (slot + 1) as f64).sin()
}

/// Fill a publication buffer with the drive signal at time `t`
fn drive(buffer: &mut PortBuffer, t: Time) {
    match buffer {
        PortBuffer::Double(slots) => {
            for (i, slot) in slots.iter_mut().enumerate() {
                *slot = signal(t, i);
            }
        }
        PortBuffer::Int32(slots) => {
            for (i, slot) in slots.iter_mut().enumerate() {
                *slot = (signal(t, i) * 100.0).round() as i32;
            }
        }
        PortBuffer::Boolean(slots) => {
            for (i, slot) in slots.iter_mut().enumerate() {
                *slot = signal(t, i) > 0.0;
            }
        }
        PortBuffer::Bytes(_) => {}
    }
}

fn describe(buffer: &PortBuffer) -> String {
    match buffer {
        PortBuffer::Double(v) => format!("{:?}", v),
        PortBuffer::Int32(v) => format!("{:?}", v),
        PortBuffer::Boolean(v) => format!("{:?}", v),
        PortBuffer::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
    }
}

/// One input value as the host saw it after a step
#[derive(Debug, Clone, PartialEq)]
struct Received {
    federate: String,
    input: String,
    time: Time,
    value: PortBuffer,
}

#[derive(Debug, Default)]
struct RunReport {
    steps: usize,
    received: Vec<Received>,
}

impl RunReport {
    /// Most recent value of every input, in first-seen order
    fn last_values(&self) -> Vec<&Received> {
        let mut last: Vec<&Received> = Vec::new();
        for received in &self.received {
            match last
                .iter_mut()
                .find(|l| l.federate == received.federate && l.input == received.input)
            {
                Some(slot) => *slot = received,
                None => last.push(received),
            }
        }
        last
    }
}

/// Participant due next: earliest next hit time not past `stop_time`, ties
/// going to the lower index
fn next_due(orchestrators: &[Orchestrator<'_, LoopbackBus>], stop_time: Time) -> Result<Option<usize>, CliError> {
    let mut due: Option<(usize, Time)> = None;
    for (index, orchestrator) in orchestrators.iter().enumerate() {
        let next = orchestrator
            .next_hit_time()
            .map_err(|source| CliError::Participant { index, source })?;
        if next > stop_time {
            continue;
        }
        if due.map_or(true, |(_, earliest)| next < earliest) {
            due = Some((index, next));
        }
    }
    Ok(due.map(|(index, _)| index))
}

fn run(args: &Args) -> Result<RunReport, CliError> {
    let run_file = RunFile::load(&args.run)?;
    let stop_time = args.stop_time.unwrap_or(run_file.stop_time);
    let participant_error = |index: usize| move |source: BridgeError| CliError::Participant { index, source };

    info!(run = %args.run.display(), participants = run_file.participants.len(), stop_time, "Starting run");

    let bus = LoopbackBus::new();
    let mut federates = Vec::with_capacity(run_file.participants.len());
    for index in 0..run_file.participants.len() {
        if let Some(source) = run_file.source(index) {
            federates.push(Federate::create(bus.clone(), &source).map_err(participant_error(index))?);
        }
    }

    let mut orchestrators = Vec::with_capacity(federates.len());
    for (index, (federate, participant)) in federates.iter().zip(&run_file.participants).enumerate() {
        orchestrators.push(Orchestrator::start(federate, &participant.ports).map_err(participant_error(index))?);
    }

    // The loopback grants immediately, so stepping in time order is what
    // keeps every pull behind the peers' publications
    let mut report = RunReport::default();
    while let Some(index) = next_due(&orchestrators, stop_time)? {
        let orchestrator = &mut orchestrators[index];

        let now = orchestrator.granted_time().unwrap_or(0.0);
        for port in 0..orchestrator.num_publications() {
            if let Some(buffer) = orchestrator.publication_buffer_mut(port) {
                drive(buffer, now);
            }
        }

        let result = orchestrator.step().map_err(participant_error(index))?;
        let federate = orchestrator.federate().name();
        for (port, name) in orchestrator.input_names().iter().enumerate() {
            if let Some(buffer) = orchestrator.input_buffer(port) {
                info!(
                    federate = %federate,
                    time = result.granted_time,
                    input = %name,
                    value = %describe(buffer),
                    "received"
                );
                report.received.push(Received {
                    federate: federate.to_string(),
                    input: name.to_string(),
                    time: result.granted_time,
                    value: buffer.clone(),
                });
            }
        }
        report.steps += 1;
    }

    for (index, orchestrator) in orchestrators.into_iter().enumerate() {
        orchestrator.finish().map_err(participant_error(index))?;
    }
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(report) => {
            println!("\n=== Run Complete ===");
            println!("Steps: {}", report.steps);
            println!("Values received: {}", report.received.len());
            for last in report.last_values() {
                println!("  {} {} @ {}: {}", last.federate, last.input, last.time, describe(&last.value));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}
