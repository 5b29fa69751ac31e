use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

const COUNTDOWN_WORDS: [&str; 5] = ["one", "two", "three", "four", "five"];

/// An audio/voice prompt produced by the playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "cue")]
pub enum Cue {
    Start { exercise_name: String },
    Rest,
    Countdown { seconds_remaining: u32 },
    Complete,
}

impl Cue {
    pub fn name(&self) -> &'static str {
        match self {
            Cue::Start { .. } => "start",
            Cue::Rest => "rest",
            Cue::Countdown { .. } => "countdown",
            Cue::Complete => "complete",
        }
    }

    /// Text a voice prompt would speak for this cue.
    pub fn spoken_text(&self) -> String {
        match self {
            Cue::Start { exercise_name } if exercise_name.is_empty() => "Start exercise".into(),
            Cue::Start { exercise_name } => format!("Start {exercise_name}"),
            Cue::Rest => "Rest".into(),
            Cue::Countdown { seconds_remaining } => COUNTDOWN_WORDS
                .get((*seconds_remaining as usize).wrapping_sub(1))
                .map(|word| word.to_string())
                .unwrap_or_else(|| seconds_remaining.to_string()),
            Cue::Complete => "Workout complete!".into(),
        }
    }
}

/// Consumer of cues. `emit` must return promptly and must never fail from the
/// caller's point of view: sinks log and drop their own errors.
pub trait CueSink: Send + Sync + 'static {
    fn emit(&self, cue: &Cue);
}

/// Writes every cue to the log.
#[derive(Debug, Default, Clone)]
pub struct LogCueSink;

impl CueSink for LogCueSink {
    fn emit(&self, cue: &Cue) {
        info!("cue {}: {}", cue.name(), cue.spoken_text());
    }
}

/// Forwards cues to an unbounded channel. A closed receiver is logged once per
/// cue and otherwise ignored.
#[derive(Debug, Clone)]
pub struct ChannelCueSink {
    tx: UnboundedSender<Cue>,
}

impl ChannelCueSink {
    pub fn new(tx: UnboundedSender<Cue>) -> Self {
        Self { tx }
    }
}

impl CueSink for ChannelCueSink {
    fn emit(&self, cue: &Cue) {
        if let Err(err) = self.tx.send(cue.clone()) {
            warn!("dropping {} cue, receiver closed: {err}", cue.name());
        }
    }
}

/// Fans a cue out to several sinks in order.
pub struct FanoutCueSink {
    sinks: Vec<Box<dyn CueSink>>,
}

impl FanoutCueSink {
    pub fn new(sinks: Vec<Box<dyn CueSink>>) -> Self {
        Self { sinks }
    }
}

impl CueSink for FanoutCueSink {
    fn emit(&self, cue: &Cue) {
        for sink in &self.sinks {
            sink.emit(cue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn countdown_words_match_seconds() {
        let text = |n| Cue::Countdown { seconds_remaining: n }.spoken_text();
        assert_eq!(text(5), "five");
        assert_eq!(text(1), "one");
        assert_eq!(text(0), "0");
        assert_eq!(text(9), "9");
    }

    #[test]
    fn start_text_falls_back_without_name() {
        let named = Cue::Start {
            exercise_name: "Push-ups".into(),
        };
        assert_eq!(named.spoken_text(), "Start Push-ups");
        let unnamed = Cue::Start {
            exercise_name: String::new(),
        };
        assert_eq!(unnamed.spoken_text(), "Start exercise");
        assert_eq!(Cue::Complete.spoken_text(), "Workout complete!");
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelCueSink::new(tx);
        drop(rx);
        sink.emit(&Cue::Rest);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let sink = FanoutCueSink::new(vec![
            Box::new(ChannelCueSink::new(tx_a)),
            Box::new(LogCueSink),
            Box::new(ChannelCueSink::new(tx_b)),
        ]);
        sink.emit(&Cue::Complete);
        assert_eq!(rx_a.try_recv().unwrap(), Cue::Complete);
        assert_eq!(rx_b.try_recv().unwrap(), Cue::Complete);
    }
}
