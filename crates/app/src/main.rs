use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use lofi_pulse_core::{
    kick_train, AppConfig, BeatLoop, PcmAnalyser, PlaybackClock, PulseError, RecordedSource,
    TickOutput,
};
use tracing_subscriber::EnvFilter;

fn main() -> lofi_pulse_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Synth {
            bpm,
            seconds,
            every,
        } => run_synth(&config, bpm, seconds, every),
        Commands::Replay { input, output } => run_replay(&config, &input, output.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> lofi_pulse_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_synth(
    config: &AppConfig,
    bpm: f64,
    seconds: f64,
    every: usize,
) -> lofi_pulse_core::Result<()> {
    tracing::info!(bpm, seconds, "synthesising kick train");

    let sample_rate = config.analyser.sample_rate;
    let interval_ms = config.tick.interval_ms();
    let samples_per_tick =
        ((f64::from(sample_rate) * interval_ms / 1000.0).round() as usize).max(1);
    let pcm = kick_train(bpm, seconds, sample_rate);

    let mut analyser = PcmAnalyser::new(config.analyser.clone())?;
    analyser.set_active(true);
    let mut beat_loop = BeatLoop::new(analyser, &config.levels);
    let mut clock = PlaybackClock::default();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut last: Option<TickOutput> = None;
    let mut beats = 0usize;

    for chunk in pcm.chunks(samples_per_tick) {
        beat_loop.source_mut().push_samples(chunk);
        let output = beat_loop.tick(clock.now_ms());
        beats += usize::from(output.summary.is_beat);
        if every > 0 && output.sequence % every as u64 == 0 {
            write_line(&mut out, &output)?;
        }
        last = Some(output);
        clock.advance(interval_ms);
    }

    let last = last.ok_or(PulseError::InvalidInput("synthesised signal is empty"))?;
    tracing::info!(
        requested_bpm = bpm,
        estimated_bpm = last.summary.bpm,
        confidence = last.summary.confidence,
        beats,
        "synthesis finished"
    );
    writeln!(
        out,
        "requested {bpm:.1} bpm, estimated {} bpm (confidence {:.2}, {beats} beats)",
        last.summary.bpm, last.summary.confidence
    )?;
    Ok(())
}

fn run_replay(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
) -> lofi_pulse_core::Result<()> {
    tracing::info!(?input, ?output, "replaying recorded ticks");

    let text = std::fs::read_to_string(input)?;
    let source = RecordedSource::from_json_lines(&text)?;
    let total = source.len();
    let mut beat_loop = BeatLoop::new(source, &config.levels);

    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    while let Some(time_ms) = beat_loop.source().current().map(|tick| tick.time_ms) {
        let tick_output = beat_loop.tick(time_ms);
        write_line(&mut sink, &tick_output)?;
        beat_loop.source_mut().advance();
    }
    sink.flush()?;

    tracing::info!(ticks = total, "replay finished");
    Ok(())
}

fn write_line(out: &mut impl Write, output: &TickOutput) -> lofi_pulse_core::Result<()> {
    serde_json::to_writer(&mut *out, output)?;
    writeln!(out)?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat and tempo estimation for the Lofi Pulse focus timer", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed a synthetic kick drum through the analyser and report the tempo.
    Synth {
        /// Tempo of the synthesised kicks.
        #[arg(long, default_value_t = 90.0)]
        bpm: f64,
        /// Length of the synthesised signal in seconds.
        #[arg(long, default_value_t = 20.0)]
        seconds: f64,
        /// Print every n-th tick as JSON; 0 prints only the final report.
        #[arg(long, default_value_t = 0)]
        every: usize,
    },
    /// Replay recorded analyser ticks (one JSON object per line).
    Replay {
        /// Recording to replay.
        input: PathBuf,
        /// Where to write the per-tick output. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
