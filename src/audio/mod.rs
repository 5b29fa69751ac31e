pub mod chime;

use chime::Chime;

use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use crate::{
    log_error, log_info, log_warn,
    player::{Cue, CueSink},
};

const ENABLE_LOGS: bool = true;

/// One tone of a cue pattern; `freq` 0 is a pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq: f32,
    pub millis: u64,
}

const fn tone(freq: f32, millis: u64) -> Tone {
    Tone { freq, millis }
}

/// Tone pattern used to render a cue.
pub fn pattern(cue: &Cue) -> Vec<Tone> {
    match cue {
        Cue::Countdown {
            seconds_remaining: 1,
        } => vec![tone(880.0, 180)],
        Cue::Countdown { .. } => vec![tone(660.0, 120)],
        Cue::Start { .. } => vec![tone(880.0, 450)],
        Cue::Rest => vec![tone(440.0, 200), tone(0.0, 80), tone(440.0, 200)],
        Cue::Complete => vec![
            tone(523.25, 180),
            tone(659.25, 180),
            tone(783.99, 180),
            tone(1046.5, 400),
        ],
    }
}

enum AudioCommand {
    Play(Vec<Tone>),
}

/// Renders cues as tones on a dedicated audio thread, started on the first
/// cue. Output failures are logged on that thread and never reach the player.
/// Only build one when sound is enabled.
#[derive(Default)]
pub struct AudioCueSink {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl AudioCueSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, command: AudioCommand) {
        let result = self.ensure_thread().and_then(|tx| {
            tx.send(command)
                .map_err(|e| format!("audio thread is gone: {e}"))
        });
        if let Err(err) = result {
            log_error!("audio cue dropped: {err}");
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        // OutputStream is not Send; it lives and dies on this thread.
        thread::Builder::new()
            .name("audio-cues".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(tones) => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                log_warn!("{err}");
                                continue;
                            }
                            if let Some(ref s) = sink {
                                for t in tones {
                                    s.append(Chime::new(t.freq, Duration::from_millis(t.millis)));
                                }
                            }
                        }
                    }
                }
                log_info!("audio cue thread exiting");
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl CueSink for AudioCueSink {
    fn emit(&self, cue: &Cue) {
        self.send(AudioCommand::Play(pattern(cue)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_countdown_second_is_distinct() {
        let one = pattern(&Cue::Countdown {
            seconds_remaining: 1,
        });
        let three = pattern(&Cue::Countdown {
            seconds_remaining: 3,
        });
        assert_ne!(one, three);
    }

    #[test]
    fn audio_thread_starts_lazily() {
        let sink = AudioCueSink::new();
        assert!(sink.tx.lock().unwrap().is_none());
    }
}
