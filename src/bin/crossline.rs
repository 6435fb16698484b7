//! crossline - track line crossings on a configured frame source
//!
//! This binary:
//! 1. Loads configuration (file named by --config or CROSSLINE_CONFIG, then env)
//! 2. Opens the frame source and the configured motion estimator
//! 3. Tracks until Ctrl-C or the source runs out of frames
//! 4. Prints every crossing as it happens and a summary on exit

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufWriter;
use std::path::PathBuf;

use crossline::{
    open_source, EventLog, EventSink, FanOut, FrameObserver, JsonLinesSink, LogSink,
    NullObserver, SessionEnd, SnapshotObserver, StopSignal, TrackerConfig, TrackingSession,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, env = "CROSSLINE_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://walk, stub://idle, an image directory, or /dev/videoN.
    #[arg(long)]
    source: Option<String>,
    /// Name used in event messages.
    #[arg(long)]
    subject: Option<String>,
    /// Print events as JSON lines on stdout instead of messages.
    #[arg(long)]
    json: bool,
    /// Write annotated frames to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Keep one snapshot every N frames.
    #[arg(long, default_value_t = 10)]
    snapshot_every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = TrackerConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.uri = source;
    }
    if let Some(subject) = args.subject {
        cfg.subject = subject;
    }
    cfg.validate()?;

    let mut session = TrackingSession::from_config(&cfg)?;
    let mut source = open_source(&cfg.source)?;

    let stop = StopSignal::new();
    let handle = stop.clone();
    ctrlc::set_handler(move || handle.raise()).context("error setting Ctrl-C handler")?;

    let mut observer: Box<dyn FrameObserver> = match &args.snapshot_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create snapshot dir {}", dir.display()))?;
            Box::new(SnapshotObserver::new(dir, args.snapshot_every))
        }
        None => Box::new(NullObserver),
    };

    log::info!(
        "crossline tracking {} on {} with {}",
        cfg.subject,
        cfg.source.uri,
        session.estimator_name()
    );

    let mut event_log = EventLog::new(cfg.subject.clone());
    let mut out: Box<dyn EventSink> = if args.json {
        Box::new(JsonLinesSink::new(BufWriter::new(std::io::stdout())))
    } else {
        Box::new(LogSink::new(cfg.subject.clone()))
    };
    let summary = {
        let mut sinks = FanOut::new().with(&mut event_log).with(out.as_mut());
        session.run(source.as_mut(), &mut sinks, observer.as_mut(), &stop)?
    };

    let stats = summary.stats;
    let source_stats = source.stats();
    eprintln!(
        "crossline: session ended ({}) after {} frames ({} analysed, {} unavailable)",
        match summary.end {
            SessionEnd::Stopped => "stopped",
            SessionEnd::Exhausted => "source exhausted",
            SessionEnd::SourceLost => "source lost",
        },
        stats.frames_received,
        stats.frames_analysed,
        stats.frames_unavailable
    );
    eprintln!(
        "crossline: {} exits, {} entries on {} (line at x={})",
        stats.exits,
        stats.entries,
        source_stats.uri,
        summary
            .line_x
            .map(|x| x.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(status) = event_log.status_line() {
        eprintln!("crossline: last event: {}", status);
    }
    Ok(())
}
