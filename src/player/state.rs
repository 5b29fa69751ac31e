use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{Segment, SegmentKind, Workout};

use super::cue::Cue;

/// Countdown cues are announced for the last this-many seconds of every phase.
pub const COUNTDOWN_SECS: u32 = 5;
pub const DEFAULT_PREPARATION_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "phase")]
pub enum Phase {
    Preparing {
        seconds_remaining: u32,
    },
    Active {
        segment_index: usize,
        seconds_remaining: u32,
    },
    Resting {
        segment_index: usize,
        seconds_remaining: u32,
    },
    Complete,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Preparing { .. } => "Get Ready",
            Phase::Active { .. } => "Work",
            Phase::Resting { .. } => "Rest",
            Phase::Complete => "Done",
        }
    }
}

/// Displayed phase for a segment. Derived from the segment kind alone so the
/// label can never disagree with the segment being played.
pub fn phase_of(kind: SegmentKind, segment_index: usize, seconds_remaining: u32) -> Phase {
    match kind {
        SegmentKind::Exercise => Phase::Active {
            segment_index,
            seconds_remaining,
        },
        SegmentKind::Rest => Phase::Resting {
            segment_index,
            seconds_remaining,
        },
    }
}

fn entry_cue(segment: &Segment) -> Cue {
    match segment.kind {
        SegmentKind::Exercise => Cue::Start {
            exercise_name: segment.name.clone(),
        },
        SegmentKind::Rest => Cue::Rest,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub preparation_secs: u32,
}

impl SessionConfig {
    /// Preparation is clamped to at least one second so the first transition
    /// is always driven by a tick.
    pub fn new(preparation_secs: u32) -> Self {
        Self {
            preparation_secs: preparation_secs.max(1),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREPARATION_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preparing,
    Segment(usize),
    Complete,
}

/// Read-only view of a session for renderers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub workout_id: String,
    pub workout_name: String,
    pub phase: Phase,
    pub segment_index: Option<usize>,
    pub segment_count: usize,
    pub seconds_remaining: u32,
    pub running: bool,
    pub segment_name: Option<String>,
    pub next_segment_name: Option<String>,
}

/// Playback state for one run of a workout.
#[derive(Debug, Clone)]
pub struct Session {
    workout: Arc<Workout>,
    config: SessionConfig,
    stage: Stage,
    seconds_remaining: u32,
    running: bool,
    // Last countdown value announced in the current phase segment.
    announced: Option<u32>,
}

impl Session {
    pub fn new(workout: Arc<Workout>, config: SessionConfig) -> Self {
        Self {
            workout,
            stage: Stage::Preparing,
            seconds_remaining: config.preparation_secs,
            config,
            running: false,
            announced: None,
        }
    }

    pub fn workout(&self) -> &Arc<Workout> {
        &self.workout
    }

    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::Preparing => Phase::Preparing {
                seconds_remaining: self.seconds_remaining,
            },
            Stage::Segment(index) => {
                phase_of(self.workout.segments()[index].kind, index, self.seconds_remaining)
            }
            Stage::Complete => Phase::Complete,
        }
    }

    pub fn segment_index(&self) -> Option<usize> {
        match self.stage {
            Stage::Segment(index) => Some(index),
            Stage::Preparing | Stage::Complete => None,
        }
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    pub fn start(&mut self) -> Vec<Cue> {
        let mut cues = Vec::new();
        if self.running || self.is_complete() {
            return cues;
        }
        self.running = true;
        self.announce_countdown(&mut cues);
        cues
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn toggle(&mut self) -> Vec<Cue> {
        if self.running {
            self.pause();
            Vec::new()
        } else {
            self.start()
        }
    }

    pub fn reset(&mut self) {
        *self = Session::new(self.workout.clone(), self.config);
    }

    /// Advances one second. At zero exactly one transition is applied.
    pub fn tick(&mut self) -> Vec<Cue> {
        let mut cues = Vec::new();
        if !self.running || self.is_complete() {
            return cues;
        }

        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.advance(&mut cues);
        }
        self.announce_countdown(&mut cues);
        cues
    }

    fn advance(&mut self, cues: &mut Vec<Cue>) {
        let next = match self.stage {
            Stage::Preparing => 0,
            Stage::Segment(index) => index + 1,
            Stage::Complete => return,
        };

        self.announced = None;
        match self.workout.segment(next) {
            Some(segment) => {
                self.stage = Stage::Segment(next);
                self.seconds_remaining = segment.duration_secs;
                cues.push(entry_cue(segment));
            }
            None => {
                self.stage = Stage::Complete;
                self.seconds_remaining = 0;
                self.running = false;
                cues.push(Cue::Complete);
            }
        }
    }

    fn announce_countdown(&mut self, cues: &mut Vec<Cue>) {
        if !self.running || self.is_complete() {
            return;
        }
        let remaining = self.seconds_remaining;
        if (1..=COUNTDOWN_SECS).contains(&remaining) && self.announced != Some(remaining) {
            self.announced = Some(remaining);
            cues.push(Cue::Countdown {
                seconds_remaining: remaining,
            });
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let segment_index = self.segment_index();
        let next_index = match self.stage {
            Stage::Preparing => Some(0),
            Stage::Segment(index) => Some(index + 1),
            Stage::Complete => None,
        };

        PlayerSnapshot {
            workout_id: self.workout.id().to_string(),
            workout_name: self.workout.name().to_string(),
            phase: self.phase(),
            segment_index,
            segment_count: self.workout.len(),
            seconds_remaining: self.seconds_remaining,
            running: self.running,
            segment_name: segment_index
                .and_then(|index| self.workout.segment(index))
                .map(|segment| segment.name.clone()),
            next_segment_name: next_index
                .and_then(|index| self.workout.segment(index))
                .map(|segment| segment.name.clone()),
        }
    }
}
