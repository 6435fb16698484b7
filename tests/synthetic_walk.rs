use crossline::{
    open_source, CrossingEvent, Direction, EstimatorKind, EventLog, Leg, MotionConfig,
    NullObserver, SessionConfig, SessionEnd, SourceSettings, StopSignal, SyntheticConfig,
    SyntheticSource, TrackerError, TrackingSession,
};

fn session_with(kind: EstimatorKind, mirror: bool) -> Result<TrackingSession, TrackerError> {
    let motion = MotionConfig {
        kind,
        ..MotionConfig::default()
    };
    let config = SessionConfig {
        mirror,
        ..SessionConfig::default()
    };
    TrackingSession::new(config, motion.build()?)
}

fn block_match_session(mirror: bool) -> Result<TrackingSession, TrackerError> {
    session_with(EstimatorKind::BlockMatch, mirror)
}

fn walk(noise: u8) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig::out_and_back("stub://walk", 160, 120, 10).with_noise(noise, 42))
}

fn directions(events: &[CrossingEvent]) -> Vec<Direction> {
    events.iter().map(|e| e.direction).collect()
}

#[test]
fn walk_out_and_back_reports_exit_then_entry() -> Result<(), TrackerError> {
    let mut session = block_match_session(false)?;
    let mut source = walk(0);
    let mut events: Vec<CrossingEvent> = Vec::new();

    let summary = session.run(&mut source, &mut events, &mut NullObserver, &StopSignal::new())?;

    assert_eq!(summary.end, SessionEnd::Exhausted);
    assert_eq!(summary.line_x, Some(80));
    assert_eq!(directions(&events), vec![Direction::Exited, Direction::Entered]);
    assert!(events[0].position_x > 80.0);
    assert!(events[0].mean_flow_x > 2.0);
    assert!(events[1].position_x < 80.0);
    assert!(events[1].mean_flow_x < -2.0);
    assert!(events[0].timestamp < events[1].timestamp);
    assert_eq!(summary.stats.frames_unavailable, 0);
    Ok(())
}

#[test]
fn pyramidal_lk_walk_reports_exit_then_entry() -> Result<(), TrackerError> {
    let mut session = session_with(EstimatorKind::PyramidalLk, false)?;
    let mut events: Vec<CrossingEvent> = Vec::new();

    let summary = session.run(&mut walk(0), &mut events, &mut NullObserver, &StopSignal::new())?;

    assert_eq!(summary.estimator, "pyramidal-lk");
    assert_eq!(summary.end, SessionEnd::Exhausted);
    assert_eq!(directions(&events), vec![Direction::Exited, Direction::Entered]);
    assert!(events[0].mean_flow_x > 0.0);
    assert!(events[1].mean_flow_x < 0.0);
    Ok(())
}

#[test]
fn scripted_one_way_walk_only_exits() -> Result<(), TrackerError> {
    let scene = SyntheticConfig {
        script: vec![Leg::pause(2), Leg::walk(10, 6), Leg::pause(3)],
        ..SyntheticConfig::out_and_back("stub://one-way", 160, 120, 10)
    };
    assert_eq!(scene.total_frames(), 16);
    let mut session = block_match_session(false)?;
    let mut events: Vec<CrossingEvent> = Vec::new();

    let summary = session.run(
        &mut SyntheticSource::new(scene),
        &mut events,
        &mut NullObserver,
        &StopSignal::new(),
    )?;

    assert_eq!(summary.stats.frames_received, 16);
    assert_eq!(directions(&events), vec![Direction::Exited]);
    Ok(())
}

#[test]
fn mirroring_swaps_directions() -> Result<(), TrackerError> {
    let mut session = block_match_session(true)?;
    let mut events: Vec<CrossingEvent> = Vec::new();

    session.run(&mut walk(0), &mut events, &mut NullObserver, &StopSignal::new())?;

    assert_eq!(directions(&events), vec![Direction::Entered, Direction::Exited]);
    Ok(())
}

#[test]
fn walk_survives_sensor_noise() -> Result<(), TrackerError> {
    let mut session = block_match_session(false)?;
    let mut events: Vec<CrossingEvent> = Vec::new();

    session.run(&mut walk(4), &mut events, &mut NullObserver, &StopSignal::new())?;

    assert_eq!(directions(&events), vec![Direction::Exited, Direction::Entered]);
    Ok(())
}

#[test]
fn idle_scene_never_fires() -> Result<(), TrackerError> {
    let settings = SourceSettings {
        uri: "stub://idle".to_string(),
        width: 96,
        height: 72,
        mirror: false,
        ..SourceSettings::default()
    };
    for kind in [EstimatorKind::PyramidalLk, EstimatorKind::BlockMatch] {
        let mut source = open_source(&settings)?;
        let motion = MotionConfig {
            kind,
            ..MotionConfig::default()
        };
        let mut session = TrackingSession::new(SessionConfig::default(), motion.build()?)?;
        let mut log = EventLog::new("nobody");

        let summary = session.run(source.as_mut(), &mut log, &mut NullObserver, &StopSignal::new())?;

        assert_eq!(summary.end, SessionEnd::Exhausted);
        assert_eq!(summary.stats.frames_received, 31);
        assert!(log.is_empty(), "{} fired on a still scene", kind.as_str());
        assert_eq!(session.state().last_significant_position_x, None);
    }
    Ok(())
}

#[test]
fn event_log_reads_like_a_diary() -> Result<(), TrackerError> {
    let mut session = block_match_session(false)?;
    let mut log = EventLog::new("alice");

    session.run(&mut walk(0), &mut log, &mut NullObserver, &StopSignal::new())?;

    let messages = log.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("alice has gone out at "));
    assert!(messages[1].starts_with("alice has come in at "));
    assert_eq!(log.status_line(), Some(messages[1].as_str()));
    Ok(())
}
