// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use polyclock::config::ClockConfig;
use polyclock::sim::{simulate, Scenario, SimHost};
use polyclock::storage::FileStorage;
use polyclock::timing::Clock;
use tracing::{info, Level};

#[cfg(feature = "hardware-midi")]
use polyclock::midi::{print_ports, MidiClockRouter, MidiClockSender, MidiSource, MidirInput, MidirOutput};
#[cfg(feature = "hardware-midi")]
use polyclock::timing::{MidiTransport, SequencerLink};
#[cfg(feature = "hardware-midi")]
use polyclock::util::{pot, POT_MAX, POT_MIN};

const DEFAULT_SIM_SECONDS: f32 = 10.0;

fn print_usage() {
    println!("POLYCLOCK - Eurorack clock core");
    println!();
    println!("Usage: polyclock [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --simulate <SCENARIO> [SECONDS]  Run offline: internal, external or midi (default 10 s)");
    #[cfg(feature = "hardware-midi")]
    {
        println!("  --list-midi                      List available MIDI ports");
        println!("  --run [SECONDS]                  Run the internal clock in real time (needs --midi-out)");
        println!("  --midi-out <N>                   MIDI destination for clock out");
        println!("  --midi-in <N>                    MIDI source to follow");
        println!("  --pot <0.0-1.0>                  Tempo pot position for --run");
    }
    println!("  --config <FILE>                  Clock configuration (YAML or TOML)");
    println!("  --state <FILE>                   Load and save clock settings");
    println!("  --seed <N>                       Seed for simulated input jitter");
    println!("  --verbose                        Debug logging");
    println!("  --help                           Show this help message");
}

enum Command {
    Simulate { scenario: Scenario, seconds: f32 },
    #[cfg(feature = "hardware-midi")]
    ListMidi,
    #[cfg(feature = "hardware-midi")]
    Run { seconds: Option<f32> },
    Help,
}

#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    state: Option<PathBuf>,
    seed: Option<u64>,
    verbose: bool,
    #[cfg(feature = "hardware-midi")]
    midi_out: Option<usize>,
    #[cfg(feature = "hardware-midi")]
    midi_in: Option<usize>,
    #[cfg(feature = "hardware-midi")]
    pot: Option<f32>,
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

/// Optional positional number following a flag
fn optional_seconds(args: &[String], i: usize) -> Option<f32> {
    args.get(i + 1).and_then(|s| s.parse().ok())
}

fn parse_args(args: &[String]) -> Result<(Command, Options)> {
    let mut command = None;
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--simulate" => {
                let scenario: Scenario = value(args, i, "--simulate")?.parse()?;
                i += 1;
                let seconds = match optional_seconds(args, i) {
                    Some(seconds) => {
                        i += 1;
                        seconds
                    }
                    None => DEFAULT_SIM_SECONDS,
                };
                command = Some(Command::Simulate { scenario, seconds });
            }
            #[cfg(feature = "hardware-midi")]
            "--list-midi" => command = Some(Command::ListMidi),
            #[cfg(feature = "hardware-midi")]
            "--run" => {
                let seconds = optional_seconds(args, i);
                if seconds.is_some() {
                    i += 1;
                }
                command = Some(Command::Run { seconds });
            }
            #[cfg(feature = "hardware-midi")]
            "--midi-out" => {
                let port = value(args, i, "--midi-out")?;
                options.midi_out = Some(port.parse().map_err(|_| anyhow!("Invalid destination number: {}", port))?);
                i += 1;
            }
            #[cfg(feature = "hardware-midi")]
            "--midi-in" => {
                let port = value(args, i, "--midi-in")?;
                options.midi_in = Some(port.parse().map_err(|_| anyhow!("Invalid source number: {}", port))?);
                i += 1;
            }
            #[cfg(feature = "hardware-midi")]
            "--pot" => {
                let position = value(args, i, "--pot")?;
                options.pot = Some(position.parse().map_err(|_| anyhow!("Invalid pot position: {}", position))?);
                i += 1;
            }
            "--config" => {
                options.config = Some(PathBuf::from(value(args, i, "--config")?));
                i += 1;
            }
            "--state" => {
                options.state = Some(PathBuf::from(value(args, i, "--state")?));
                i += 1;
            }
            "--seed" => {
                let seed = value(args, i, "--seed")?;
                options.seed = Some(seed.parse().map_err(|_| anyhow!("Invalid seed: {}", seed))?);
                i += 1;
            }
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => command = Some(Command::Help),
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
        i += 1;
    }

    Ok((command.unwrap_or(Command::Help), options))
}

fn load_config(options: &Options) -> Result<ClockConfig> {
    match &options.config {
        Some(path) => ClockConfig::load(path),
        None => Ok(ClockConfig::default()),
    }
}

fn open_state(options: &Options, clock: &mut Clock) -> Result<Option<FileStorage>> {
    let Some(path) = &options.state else {
        return Ok(None);
    };
    let storage = FileStorage::open(path)
        .with_context(|| format!("Failed to open state file {}", path.display()))?;
    clock.load_from_memory(&storage);
    info!(path = %path.display(), "clock settings restored");
    Ok(Some(storage))
}

fn save_state(clock: &Clock, storage: Option<FileStorage>) -> Result<()> {
    if let Some(mut storage) = storage {
        clock.save_to_memory(&mut storage);
        storage
            .flush()
            .with_context(|| format!("Failed to save state file {}", storage.path().display()))?;
        info!(path = %storage.path().display(), "clock settings saved");
    }
    Ok(())
}

fn run_simulation(scenario: Scenario, seconds: f32, options: &Options) -> Result<()> {
    let config = load_config(options)?;
    let mut clock = Clock::from_config(&config);
    let storage = open_state(options, &mut clock)?;
    let mut host = SimHost::new(config.midi_channel);

    let report = simulate(&mut clock, &mut host, scenario, seconds, options.seed);
    println!("{}", report);

    save_state(&clock, storage)
}

/// Real MIDI out for the live loop; realignments only get logged
#[cfg(feature = "hardware-midi")]
struct LiveHost {
    midi: MidiClockSender<MidirOutput>,
}

#[cfg(feature = "hardware-midi")]
impl MidiTransport for LiveHost {
    fn send_clock_start(&mut self) {
        self.midi.send_clock_start();
    }

    fn send_clock_stop(&mut self) {
        self.midi.send_clock_stop();
    }

    fn send_clock_pulse(&mut self) {
        self.midi.send_clock_pulse();
    }

    fn report_disconnected(&mut self) {
        self.midi.report_disconnected();
    }
}

#[cfg(feature = "hardware-midi")]
impl SequencerLink for LiveHost {
    fn realign_to(&mut self, step: u32) {
        info!(step, "sequencer realign");
    }
}

#[cfg(feature = "hardware-midi")]
fn run_live(seconds: Option<f32>, options: &Options) -> Result<()> {
    use std::thread;
    use std::time::{Duration, Instant};

    let destination = options
        .midi_out
        .ok_or_else(|| anyhow!("--run requires --midi-out <N> (see --list-midi)"))?;

    let config = load_config(options)?;
    let mut clock = Clock::from_config(&config);
    let storage = open_state(options, &mut clock)?;

    println!("Connecting to MIDI destination {}...", destination);
    let output = MidirOutput::new(destination)?;
    let mut host = LiveHost {
        midi: MidiClockSender::new(output, config.midi_channel),
    };
    let input = match options.midi_in {
        Some(port) => {
            println!("Connecting to MIDI source {}...", port);
            Some(MidirInput::new(port, MidiSource::Usb)?)
        }
        None => None,
    };
    let mut router = MidiClockRouter::new();

    if let Some(position) = options.pot {
        // The first reading only latches, so come from the far end
        let value = pot(position);
        let latch = if value > POT_MAX / 2 { POT_MIN } else { POT_MAX };
        clock.set_pot(latch, &mut host);
        clock.set_pot(value, &mut host);
    }

    let rate = clock.timings().sample_rate as f64;
    let run_duration = seconds.map(|s| Duration::from_secs_f32(s.max(0.0)));
    println!("Running at {:.1} ticks/s (press Ctrl+C to stop)...", rate);

    let start_time = Instant::now();
    let mut ticks: u64 = 0;
    let mut triggers: u64 = 0;

    loop {
        let elapsed = start_time.elapsed();
        if run_duration.is_some_and(|limit| elapsed >= limit) {
            break;
        }

        if let Some(input) = &input {
            while let Some((source, message)) = input.try_recv() {
                router.route(&mut clock, source, &message);
            }
        }

        let due = (elapsed.as_secs_f64() * rate) as u64;
        while ticks < due {
            ticks += 1;
            let pulse = router.take_pulse();
            if clock.process(false, false, pulse, &mut host) {
                triggers += 1;
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    println!(
        "Clock stopped after {} triggers ({} MIDI send errors)",
        triggers,
        host.midi.send_errors()
    );
    save_state(&clock, storage)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("POLYCLOCK - Eurorack clock core");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let (command, options) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match command {
        Command::Simulate { scenario, seconds } => run_simulation(scenario, seconds, &options)?,
        #[cfg(feature = "hardware-midi")]
        Command::ListMidi => print_ports(),
        #[cfg(feature = "hardware-midi")]
        Command::Run { seconds } => run_live(seconds, &options)?,
        Command::Help => print_usage(),
    }

    Ok(())
}
