pub mod workout;

pub use workout::{
    default_workouts, Category, Difficulty, Segment, SegmentKind, Workout, WorkoutError,
};
