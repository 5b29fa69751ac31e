use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reasons a workout cannot be played. Raised when a `Workout` is built, never
/// during playback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkoutError {
    #[error("workout '{0}' has no segments")]
    Empty(String),
    #[error("segment '{segment_id}' in workout '{workout_id}' has a zero duration")]
    ZeroDuration {
        workout_id: String,
        segment_id: String,
    },
    #[error("segment id '{segment_id}' appears more than once in workout '{workout_id}'")]
    DuplicateSegmentId {
        workout_id: String,
        segment_id: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    Exercise,
    Rest,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Exercise => "exercise",
            SegmentKind::Rest => "rest",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Strength,
    Cardio,
    Flexibility,
    Hiit,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Strength => "strength",
            Category::Cardio => "cardio",
            Category::Flexibility => "flexibility",
            Category::Hiit => "hiit",
        }
    }
}

/// One timed step of a workout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(alias = "duration")]
    pub duration_secs: u32,
    #[serde(rename = "type", alias = "kind")]
    pub kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Segment {
    pub fn exercise(id: impl Into<String>, name: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration_secs,
            kind: SegmentKind::Exercise,
            description: None,
        }
    }

    pub fn rest(id: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            id: id.into(),
            name: "Rest".into(),
            duration_secs,
            kind: SegmentKind::Rest,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An ordered, validated list of segments. Every `Workout` value is playable:
/// it has at least one segment and every segment lasts at least one second.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "WorkoutRecord")]
pub struct Workout {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    segments: Vec<Segment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Unvalidated wire shape. Accepts the older `exercises` field name so exported
/// workout lists can be imported as-is.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkoutRecord {
    #[serde(default = "new_id")]
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(alias = "exercises")]
    segments: Vec<Segment>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkoutRecord> for Workout {
    type Error = WorkoutError;

    fn try_from(record: WorkoutRecord) -> Result<Self, Self::Error> {
        validate_segments(&record.id, &record.segments)?;
        Ok(Self {
            id: record.id,
            name: record.name,
            description: record.description,
            difficulty: record.difficulty,
            category: record.category,
            segments: record.segments,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn validate_segments(workout_id: &str, segments: &[Segment]) -> Result<(), WorkoutError> {
    if segments.is_empty() {
        return Err(WorkoutError::Empty(workout_id.to_string()));
    }

    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        if segment.duration_secs == 0 {
            return Err(WorkoutError::ZeroDuration {
                workout_id: workout_id.to_string(),
                segment_id: segment.id.clone(),
            });
        }
        if !seen.insert(segment.id.as_str()) {
            return Err(WorkoutError::DuplicateSegmentId {
                workout_id: workout_id.to_string(),
                segment_id: segment.id.clone(),
            });
        }
    }

    Ok(())
}

impl Workout {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Result<Self, WorkoutError> {
        let now = Utc::now();
        Workout::try_from(WorkoutRecord {
            id: id.into(),
            name: name.into(),
            description: None,
            difficulty: None,
            category: None,
            segments,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| u64::from(segment.duration_secs))
            .sum()
    }

    pub(crate) fn touch(&mut self, updated_at: DateTime<Utc>) {
        self.updated_at = updated_at;
    }
}

/// Seed content for an empty store.
pub fn default_workouts() -> Vec<Workout> {
    let segments = vec![
        Segment::exercise("ex1", "Jumping Jacks", 30).with_description(
            "Start with feet together and arms at sides, then jump and spread legs while raising arms",
        ),
        Segment::rest("ex2", 10),
        Segment::exercise("ex3", "Push-ups", 30)
            .with_description("Standard push-ups, modify on knees if needed"),
    ];

    match Workout::new("1", "Full Body HIIT", segments) {
        Ok(workout) => vec![workout
            .with_description("30-minute high intensity interval training")
            .with_difficulty(Difficulty::Intermediate)
            .with_category(Category::Hiit)],
        Err(err) => {
            warn!("Skipping invalid bundled workout: {err}");
            Vec::new()
        }
    }
}
