use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::player::{state::DEFAULT_PREPARATION_SECS, SessionConfig};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub sound_enabled: bool,
    pub voice_prompts: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            voice_prompts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    pub preparation_secs: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            preparation_secs: DEFAULT_PREPARATION_SECS,
        }
    }
}

impl PlaybackSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.preparation_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    audio: AudioSettings,
    playback: PlaybackSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn audio(&self) -> AudioSettings {
        self.read().audio.clone()
    }

    pub fn playback(&self) -> PlaybackSettings {
        self.read().playback.clone()
    }

    pub fn update_audio(&self, settings: AudioSettings) -> Result<()> {
        let mut guard = self.write();
        guard.audio = settings;
        self.persist(&guard)
    }

    pub fn update_playback(&self, settings: PlaybackSettings) -> Result<()> {
        let mut guard = self.write();
        guard.playback = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.audio(), AudioSettings::default());
        assert_eq!(store.playback().preparation_secs, DEFAULT_PREPARATION_SECS);
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_audio(AudioSettings {
                sound_enabled: false,
                voice_prompts: true,
            })
            .unwrap();
        store
            .update_playback(PlaybackSettings {
                preparation_secs: 3,
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert!(!reopened.audio().sound_enabled);
        assert_eq!(reopened.playback().session_config().preparation_secs, 3);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "audio": { "voicePrompts": false } }"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert!(store.audio().sound_enabled);
        assert!(!store.audio().voice_prompts);
        assert_eq!(store.playback(), PlaybackSettings::default());
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.audio(), AudioSettings::default());
    }

    #[test]
    fn zero_preparation_is_clamped_for_sessions() {
        let settings = PlaybackSettings {
            preparation_secs: 0,
        };
        assert_eq!(settings.session_config().preparation_secs, 1);
    }
}
