//! demo - end-to-end synthetic run for crossline
//!
//! A textured subject walks from the left edge to the right edge of a
//! synthetic scene and back again. The run should report one exit followed
//! by one entry.

use anyhow::{anyhow, Result};
use clap::Parser;

use crossline::{
    EstimatorKind, EventLog, MotionConfig, NullObserver, SessionConfig, SessionEnd, StopSignal,
    SyntheticConfig, SyntheticSource, Thresholds, TrackingSession,
};

const DEMO_WIDTH: u32 = 160;
const DEMO_HEIGHT: u32 = 120;
const DEMO_SUBJECT: &str = "the visitor";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Per-pixel sensor noise amplitude (0-255).
    #[arg(long, default_value_t = 0)]
    noise: u8,
    /// Motion estimator: pyramidal-lk or block-match.
    #[arg(long, default_value = "pyramidal-lk")]
    estimator: EstimatorKind,
    /// Seed for the sensor noise.
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    stage("build synthetic walk");
    let scene = SyntheticConfig::out_and_back("stub://demo", DEMO_WIDTH, DEMO_HEIGHT, args.fps)
        .with_noise(args.noise, args.seed);
    let total_frames = scene.total_frames();
    let mut source = SyntheticSource::new(scene);

    stage("open tracking session");
    let motion = MotionConfig {
        kind: args.estimator,
        ..MotionConfig::default()
    };
    let config = SessionConfig {
        thresholds: Thresholds::default(),
        // Synthetic frames are already in display orientation.
        mirror: false,
        ..SessionConfig::default()
    };
    let mut session = TrackingSession::new(config, motion.build()?)?;

    stage(&format!(
        "track {} frames with {}",
        total_frames,
        session.estimator_name()
    ));
    let mut event_log = EventLog::new(DEMO_SUBJECT);
    let summary = session.run(
        &mut source,
        &mut event_log,
        &mut NullObserver,
        &StopSignal::new(),
    )?;
    if summary.end != SessionEnd::Exhausted {
        return Err(anyhow!("demo walk ended early: {:?}", summary.end));
    }

    stage("event log");
    for message in event_log.messages() {
        println!("{}", message);
    }
    println!(
        "{} exits, {} entries over {} frames",
        summary.stats.exits, summary.stats.entries, summary.stats.frames_received
    );
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
