use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    db::Database,
    models::{SegmentKind, Workout},
    player::{
        open_session, ChannelCueSink, CueSink, FanoutCueSink, LogCueSink, Phase, PlayerConfig,
        PlayerSnapshot,
    },
    settings::{AudioSettings, PlaybackSettings, SettingsStore},
};

/// Interval workout timer
#[derive(Parser, Debug)]
#[command(name = "intervals", version, about)]
pub struct Cli {
    /// Directory holding the workout store and settings
    #[arg(long, env = "INTERVALS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List saved workouts
    List,
    /// Print the segments of a workout
    Show { id: String },
    /// Import a workout (or an array of workouts) from a JSON file
    Import { path: PathBuf },
    /// Delete a workout
    Delete { id: String },
    /// Play a workout in the terminal
    Play {
        id: String,
        /// Override the preparation countdown, in seconds
        #[arg(long)]
        prep: Option<u32>,
        /// Do not render cues as sound
        #[arg(long)]
        mute: bool,
    },
    /// Show or change settings
    Settings {
        #[arg(long)]
        sound: Option<bool>,
        #[arg(long)]
        voice: Option<bool>,
        #[arg(long)]
        prep: Option<u32>,
    },
}

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
}

pub(crate) async fn dispatch(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::List => list(state).await,
        Command::Show { id } => show(state, &id).await,
        Command::Import { path } => import(state, path).await,
        Command::Delete { id } => delete(state, &id).await,
        Command::Play { id, prep, mute } => play(state, &id, prep, mute).await,
        Command::Settings { sound, voice, prep } => settings(state, sound, voice, prep),
    }
}

/// `M:SS`
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

async fn list(state: &AppState) -> Result<()> {
    let workouts = state.db.list_workouts().await?;
    if workouts.is_empty() {
        println!("No workouts saved.");
    }
    for workout in workouts {
        println!(
            "{:<12} {:<28} {:>2} segments  {}",
            workout.id(),
            workout.name(),
            workout.len(),
            format_time(workout.total_duration_secs())
        );
    }
    Ok(())
}

async fn show(state: &AppState, id: &str) -> Result<()> {
    let Some(workout) = state.db.get_workout(id).await? else {
        bail!("workout '{id}' not found");
    };

    println!("{}", workout.name());
    if let Some(description) = workout.description() {
        println!("{description}");
    }
    for (index, segment) in workout.segments().iter().enumerate() {
        let marker = match segment.kind {
            SegmentKind::Exercise => "*",
            SegmentKind::Rest => "-",
        };
        println!(
            "{:>3}. {marker} {:<24} {}",
            index + 1,
            segment.name,
            format_time(u64::from(segment.duration_secs))
        );
    }
    println!("Total {}", format_time(workout.total_duration_secs()));
    Ok(())
}

async fn import(state: &AppState, path: PathBuf) -> Result<()> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let workouts: Vec<Workout> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|workout| vec![workout])
    }
    .with_context(|| format!("{} does not contain playable workouts", path.display()))?;

    for workout in &workouts {
        let saved = state.db.put_workout(workout).await?;
        println!("Imported {} ({})", saved.name(), saved.id());
    }
    Ok(())
}

async fn delete(state: &AppState, id: &str) -> Result<()> {
    if state.db.delete_workout(id).await? {
        println!("Deleted {id}");
        Ok(())
    } else {
        bail!("workout '{id}' not found")
    }
}

fn settings(
    state: &AppState,
    sound: Option<bool>,
    voice: Option<bool>,
    prep: Option<u32>,
) -> Result<()> {
    if sound.is_some() || voice.is_some() {
        let current = state.settings.audio();
        state.settings.update_audio(AudioSettings {
            sound_enabled: sound.unwrap_or(current.sound_enabled),
            voice_prompts: voice.unwrap_or(current.voice_prompts),
        })?;
    }
    if let Some(preparation_secs) = prep {
        state
            .settings
            .update_playback(PlaybackSettings { preparation_secs })?;
    }

    let audio = state.settings.audio();
    let playback = state.settings.playback();
    println!("sound effects   {}", audio.sound_enabled);
    println!("voice prompts   {}", audio.voice_prompts);
    println!("preparation     {}s", playback.preparation_secs);
    Ok(())
}

#[cfg(feature = "audio")]
fn audio_sink(enabled: bool) -> Option<Box<dyn CueSink>> {
    enabled.then(|| Box::new(crate::audio::AudioCueSink::new()) as Box<dyn CueSink>)
}

#[cfg(not(feature = "audio"))]
fn audio_sink(_enabled: bool) -> Option<Box<dyn CueSink>> {
    None
}

fn render(snapshot: &PlayerSnapshot) {
    let position = match snapshot.segment_index {
        Some(index) => format!(
            "{} ({} of {})",
            snapshot.segment_name.as_deref().unwrap_or(""),
            index + 1,
            snapshot.segment_count
        ),
        None => match (&snapshot.phase, &snapshot.next_segment_name) {
            (Phase::Preparing { .. }, Some(next)) => format!("up next: {next}"),
            _ => String::new(),
        },
    };
    let paused = if snapshot.running || snapshot.phase == Phase::Complete {
        ""
    } else {
        "  [paused]"
    };
    println!(
        "{:<10} {:>5}  {position}{paused}",
        snapshot.phase.label().to_uppercase(),
        format_time(u64::from(snapshot.seconds_remaining))
    );
}

async fn play(state: &AppState, id: &str, prep: Option<u32>, mute: bool) -> Result<()> {
    let mut playback = state.settings.playback();
    if let Some(preparation_secs) = prep {
        playback.preparation_secs = preparation_secs;
    }
    let audio = state.settings.audio();

    let (cue_tx, mut cue_rx) = mpsc::unbounded_channel();
    let mut sinks: Vec<Box<dyn CueSink>> =
        vec![Box::new(LogCueSink), Box::new(ChannelCueSink::new(cue_tx))];
    sinks.extend(audio_sink(audio.sound_enabled && !mute));

    let config = PlayerConfig {
        session: playback.session_config(),
        ..PlayerConfig::default()
    };
    let player = open_session(&state.db, id, config, Arc::new(FanoutCueSink::new(sinks))).await?;

    println!("{}", player.snapshot().workout_name);
    println!("Enter: start/pause   r: reset   q: quit");

    let mut updates = player.subscribe();
    render(&updates.borrow_and_update());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                render(&snapshot);
                if snapshot.phase == Phase::Complete {
                    break;
                }
            }
            Some(cue) = cue_rx.recv() => {
                if audio.voice_prompts {
                    println!("  >> {}", cue.spoken_text());
                }
            }
            line = lines.next_line() => {
                match line?.as_deref().map(str::trim) {
                    None | Some("q") => break,
                    Some("") | Some("p") => {
                        player.toggle().await?;
                    }
                    Some("r") => {
                        player.reset().await?;
                    }
                    Some(other) => println!("unknown input '{other}'"),
                }
            }
        }
    }

    while let Ok(cue) = cue_rx.try_recv() {
        if audio.voice_prompts {
            println!("  >> {}", cue.spoken_text());
        }
    }
    player.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_is_minutes_and_padded_seconds() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(9), "0:09");
        assert_eq!(format_time(75), "1:15");
        assert_eq!(format_time(600), "10:00");
    }

    #[test]
    fn cli_parses_play_options() {
        let cli = Cli::try_parse_from(["intervals", "play", "1", "--prep", "3", "--mute"]).unwrap();
        match cli.command {
            Command::Play { id, prep, mute } => {
                assert_eq!(id, "1");
                assert_eq!(prep, Some(3));
                assert!(mute);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
