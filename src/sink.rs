//! Event sinks.
//!
//! A sink receives every crossing event synchronously, in frame order. A
//! failing sink is reported by the session and does not stop tracking.

use anyhow::{Context, Result};
use std::io::Write;

use crate::detector::CrossingEvent;

pub trait EventSink {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()>;
}

impl EventSink for Vec<CrossingEvent> {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// In-memory log of human-readable messages for one session.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    subject: String,
    messages: Vec<String>,
}

impl EventLog {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Most recent message, shown as the status line.
    pub fn status_line(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()> {
        self.messages.push(event.describe(&self.subject));
        Ok(())
    }
}

/// Writes each event message through `log::info!`.
#[derive(Clone, Debug)]
pub struct LogSink {
    subject: String,
}

impl LogSink {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

impl EventSink for LogSink {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()> {
        log::info!("{}", event.describe(&self.subject));
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event).context("serialize crossing event")?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().context("flush event stream")?;
        Ok(())
    }
}

/// Forwards every event to each inner sink, stopping at the first failure.
#[derive(Default)]
pub struct FanOut<'a> {
    sinks: Vec<&'a mut dyn EventSink>,
}

impl<'a> FanOut<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: &'a mut dyn EventSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanOut<'_> {
    fn on_event(&mut self, event: &CrossingEvent) -> Result<()> {
        for sink in self.sinks.iter_mut() {
            sink.on_event(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Direction;
    use chrono::{Local, TimeZone};

    fn event(direction: Direction, second: u32) -> CrossingEvent {
        CrossingEvent {
            direction,
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 18, 30, second).unwrap(),
            frame_index: 12,
            position_x: 400.5,
            mean_flow_x: 3.25,
        }
    }

    #[test]
    fn event_log_renders_messages_in_order() -> Result<()> {
        let mut log = EventLog::new("bob");
        assert!(log.status_line().is_none());
        log.on_event(&event(Direction::Exited, 1))?;
        log.on_event(&event(Direction::Entered, 9))?;
        assert_eq!(
            log.messages(),
            ["bob has gone out at 18:30:01.", "bob has come in at 18:30:09."]
        );
        assert_eq!(log.status_line(), Some("bob has come in at 18:30:09."));
        Ok(())
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_event() -> Result<()> {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.on_event(&event(Direction::Exited, 1))?;
        sink.on_event(&event(Direction::Entered, 2))?;
        let out = String::from_utf8(sink.into_inner())?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(first["direction"], "exited");
        assert_eq!(first["frame_index"], 12);
        assert_eq!(first["position_x"], 400.5);
        let second: serde_json::Value = serde_json::from_str(lines[1])?;
        assert_eq!(second["direction"], "entered");
        Ok(())
    }

    #[test]
    fn fan_out_reaches_every_sink() -> Result<()> {
        let mut collected: Vec<CrossingEvent> = Vec::new();
        let mut log = EventLog::new("carol");
        {
            let mut fan = FanOut::new().with(&mut collected).with(&mut log);
            fan.on_event(&event(Direction::Exited, 5))?;
        }
        assert_eq!(collected.len(), 1);
        assert_eq!(log.messages().len(), 1);
        Ok(())
    }
}
