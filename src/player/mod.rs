pub mod controller;
pub mod cue;
pub mod state;

use std::sync::Arc;

use thiserror::Error;

use crate::{db::Database, models::WorkoutError};

pub use controller::{PlayerCommand, PlayerConfig, PlayerController};
pub use cue::{ChannelCueSink, Cue, CueSink, FanoutCueSink, LogCueSink};
pub use state::{phase_of, Phase, PlayerSnapshot, Session, SessionConfig};

/// Why a player could not be opened. All of these are raised before a
/// session exists.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("workout '{0}' not found")]
    WorkoutNotFound(String),
    #[error("cannot start: {0}")]
    InvalidWorkout(#[from] WorkoutError),
    #[error("workout store failed: {0:#}")]
    Store(#[source] anyhow::Error),
}

/// Loads a workout snapshot from the store and spawns a player for it.
pub async fn open_session(
    db: &Database,
    workout_id: &str,
    config: PlayerConfig,
    sink: Arc<dyn CueSink>,
) -> Result<PlayerController, PlayerError> {
    let workout = db
        .get_workout(workout_id)
        .await
        .map_err(|err| match err.downcast::<WorkoutError>() {
            Ok(invalid) => PlayerError::InvalidWorkout(invalid),
            Err(other) => PlayerError::Store(other),
        })?
        .ok_or_else(|| PlayerError::WorkoutNotFound(workout_id.to_string()))?;

    Ok(PlayerController::spawn(Arc::new(workout), config, sink))
}
