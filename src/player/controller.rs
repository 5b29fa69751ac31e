use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender},
        oneshot, watch,
    },
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{log_info, models::Workout};

use super::{
    cue::CueSink,
    state::{Phase, PlayerSnapshot, Session, SessionConfig},
};

const ENABLE_LOGS: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Start,
    Pause,
    Toggle,
    Reset,
    Tick,
}

enum Envelope {
    Command(PlayerCommand, Option<oneshot::Sender<PlayerSnapshot>>),
    /// Tick from the internal pulse, tagged with the generation that sent it.
    Pulse(u64),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    pub session: SessionConfig,
    /// Period of the internal pulse. `None` leaves pulsing to the caller via
    /// [`PlayerController::tick`].
    pub pulse_interval: Option<Duration>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            pulse_interval: Some(Duration::from_secs(1)),
        }
    }
}

impl PlayerConfig {
    pub fn manual(session: SessionConfig) -> Self {
        Self {
            session,
            pulse_interval: None,
        }
    }
}

/// Handle to a running player. Every mutation is queued to a single task that
/// owns the [`Session`]; handles are cheap to clone. The task stops once every
/// handle is dropped or [`PlayerController::shutdown`] is called.
#[derive(Clone)]
pub struct PlayerController {
    commands: UnboundedSender<Envelope>,
    snapshots: watch::Receiver<PlayerSnapshot>,
    pulsing: Arc<AtomicBool>,
}

impl PlayerController {
    /// Must be called from within a tokio runtime.
    pub fn spawn(workout: Arc<Workout>, config: PlayerConfig, sink: Arc<dyn CueSink>) -> Self {
        let session = Session::new(workout, config.session);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let pulsing = Arc::new(AtomicBool::new(false));

        let mut actor = PlayerActor {
            session,
            sink,
            snapshots: snapshot_tx,
            commands: command_tx.downgrade(),
            pulse_interval: config.pulse_interval,
            pulse: None,
            pulse_generation: 0,
            pulsing: pulsing.clone(),
        };
        actor.acquire_pulse();

        info!(
            "player ready for workout {} ({} segments)",
            actor.session.workout().id(),
            actor.session.workout().len()
        );
        tokio::spawn(actor.run(command_rx));

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            pulsing,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Whether the internal pulse task is currently held.
    pub fn is_pulsing(&self) -> bool {
        self.pulsing.load(Ordering::SeqCst)
    }

    pub async fn start(&self) -> Result<PlayerSnapshot> {
        self.send(PlayerCommand::Start).await
    }

    pub async fn pause(&self) -> Result<PlayerSnapshot> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn toggle(&self) -> Result<PlayerSnapshot> {
        self.send(PlayerCommand::Toggle).await
    }

    pub async fn reset(&self) -> Result<PlayerSnapshot> {
        self.send(PlayerCommand::Reset).await
    }

    /// Delivers one pulse by hand.
    pub async fn tick(&self) -> Result<PlayerSnapshot> {
        self.send(PlayerCommand::Tick).await
    }

    pub async fn send(&self, command: PlayerCommand) -> Result<PlayerSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Envelope::Command(command, Some(reply_tx)))
            .map_err(|_| anyhow!("player task is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("player task stopped before replying to {command:?}"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Envelope::Shutdown(ack_tx))
            .map_err(|_| anyhow!("player task is not running"))?;
        ack_rx
            .await
            .map_err(|_| anyhow!("player task stopped before acknowledging shutdown"))
    }
}

/// The one-second pulse task. Cancelled when dropped. Its first tick lands one
/// full period after it is spawned.
struct Pulse {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl Pulse {
    fn spawn(period: Duration, generation: u64, commands: WeakUnboundedSender<Envelope>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(pulse_loop(period, generation, commands, token.clone()));
        Self {
            token,
            _handle: handle,
        }
    }
}

impl Drop for Pulse {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn pulse_loop(
    period: Duration,
    generation: u64,
    commands: WeakUnboundedSender<Envelope>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pulses: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(tx) = commands.upgrade() else {
                    break;
                };
                if tx.send(Envelope::Pulse(generation)).is_err() {
                    break;
                }
                pulses += 1;
                log_info!("pulse {pulses}");
            }
            _ = cancel_token.cancelled() => {
                log_info!("pulse cancelled after {pulses} pulses");
                break;
            }
        }
    }
}

struct PlayerActor {
    session: Session,
    sink: Arc<dyn CueSink>,
    snapshots: watch::Sender<PlayerSnapshot>,
    commands: WeakUnboundedSender<Envelope>,
    pulse_interval: Option<Duration>,
    pulse: Option<Pulse>,
    pulse_generation: u64,
    pulsing: Arc<AtomicBool>,
}

impl PlayerActor {
    async fn run(mut self, mut commands: UnboundedReceiver<Envelope>) {
        while let Some(envelope) = commands.recv().await {
            match envelope {
                Envelope::Command(command, reply) => {
                    let snapshot = self.apply(command);
                    if let Some(reply) = reply {
                        let _ = reply.send(snapshot);
                    }
                }
                Envelope::Pulse(generation) => {
                    // Ticks queued by a pulse that has since been replaced are stale.
                    if self.pulse.is_some() && generation == self.pulse_generation {
                        self.apply(PlayerCommand::Tick);
                    }
                }
                Envelope::Shutdown(ack) => {
                    self.release_pulse();
                    let _ = ack.send(());
                    break;
                }
            }
        }

        self.release_pulse();
        debug!("player task for {} exited", self.session.workout().id());
    }

    fn apply(&mut self, command: PlayerCommand) -> PlayerSnapshot {
        let before = self.session.phase();
        let was_running = self.session.is_running();
        let cues = match command {
            PlayerCommand::Start => self.session.start(),
            PlayerCommand::Pause => {
                self.session.pause();
                Vec::new()
            }
            PlayerCommand::Toggle => self.session.toggle(),
            PlayerCommand::Reset => {
                self.session.reset();
                self.release_pulse();
                self.acquire_pulse();
                Vec::new()
            }
            PlayerCommand::Tick => self.session.tick(),
        };

        // Resuming restarts the pulse so the first second after start is whole.
        if !was_running && self.session.is_running() {
            self.release_pulse();
            self.acquire_pulse();
        }

        for cue in &cues {
            self.sink.emit(cue);
        }

        let after = self.session.phase();
        if std::mem::discriminant(&before) != std::mem::discriminant(&after)
            || segment_of(&before) != segment_of(&after)
        {
            info!(
                "workout {}: {} -> {} ({:?})",
                self.session.workout().id(),
                before.label(),
                after.label(),
                command
            );
        }

        if self.session.is_complete() {
            self.release_pulse();
        }

        let snapshot = self.session.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn acquire_pulse(&mut self) {
        if self.pulse.is_some() {
            return;
        }
        if let Some(period) = self.pulse_interval {
            self.pulse_generation += 1;
            self.pulse = Some(Pulse::spawn(
                period,
                self.pulse_generation,
                self.commands.clone(),
            ));
            self.pulsing.store(true, Ordering::SeqCst);
        }
    }

    fn release_pulse(&mut self) {
        if self.pulse.take().is_some() {
            debug!("released pulse for {}", self.session.workout().id());
        }
        self.pulsing.store(false, Ordering::SeqCst);
    }
}

fn segment_of(phase: &Phase) -> Option<usize> {
    match phase {
        Phase::Active { segment_index, .. } | Phase::Resting { segment_index, .. } => {
            Some(*segment_index)
        }
        Phase::Preparing { .. } | Phase::Complete => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Segment,
        player::cue::{ChannelCueSink, Cue},
    };

    fn scenario() -> Arc<Workout> {
        Arc::new(
            Workout::new(
                "scenario",
                "Scenario",
                vec![
                    Segment::exercise("a", "Squats", 5),
                    Segment::rest("b", 3),
                    Segment::exercise("c", "Lunges", 5),
                ],
            )
            .unwrap(),
        )
    }

    fn player(pulse_interval: Option<Duration>) -> (PlayerController, UnboundedReceiver<Cue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = PlayerConfig {
            session: SessionConfig::new(3),
            pulse_interval,
        };
        let controller =
            PlayerController::spawn(scenario(), config, Arc::new(ChannelCueSink::new(tx)));
        (controller, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Cue>) -> Vec<Cue> {
        let mut cues = Vec::new();
        while let Ok(cue) = rx.try_recv() {
            cues.push(cue);
        }
        cues
    }

    #[tokio::test]
    async fn manual_pulses_drive_the_scenario() {
        let (player, mut cues) = player(None);
        assert!(!player.is_pulsing());

        player.start().await.unwrap();
        let mut last = player.snapshot();
        for _ in 0..16 {
            last = player.tick().await.unwrap();
        }
        assert_eq!(last.phase, Phase::Complete);
        assert!(!last.running);

        let spoken: Vec<&'static str> = drain(&mut cues)
            .iter()
            .filter(|cue| !matches!(cue, Cue::Countdown { .. }))
            .map(Cue::name)
            .collect();
        assert_eq!(spoken, vec!["start", "rest", "start", "complete"]);
    }

    #[tokio::test]
    async fn paused_player_ignores_pulses() {
        let (player, _cues) = player(None);
        player.start().await.unwrap();
        for _ in 0..6 {
            player.tick().await.unwrap();
        }
        let frozen = player.pause().await.unwrap();
        assert_eq!(
            frozen.phase,
            Phase::Active {
                segment_index: 0,
                seconds_remaining: 2
            }
        );

        for _ in 0..10 {
            assert_eq!(player.tick().await.unwrap().phase, frozen.phase);
        }

        player.start().await.unwrap();
        let resumed = player.tick().await.unwrap();
        assert_eq!(
            resumed.phase,
            Phase::Active {
                segment_index: 0,
                seconds_remaining: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn internal_pulse_completes_and_releases() {
        let (player, mut cues) = player(Some(Duration::from_secs(1)));
        assert!(player.is_pulsing());

        player.start().await.unwrap();
        time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Active {
                segment_index: 2,
                seconds_remaining: 1
            }
        );
        assert!(player.is_pulsing());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(player.snapshot().phase, Phase::Complete);
        assert!(!player.is_pulsing());
        assert_eq!(drain(&mut cues).last(), Some(&Cue::Complete));
    }

    #[tokio::test(start_paused = true)]
    async fn start_waits_a_full_period_before_the_first_tick() {
        let (player, _cues) = player(Some(Duration::from_secs(1)));
        time::sleep(Duration::from_millis(950)).await;
        player.start().await.unwrap();

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 3 }
        );

        time::sleep(Duration::from_millis(950)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resume_keeps_the_whole_second() {
        let (player, _cues) = player(Some(Duration::from_secs(1)));
        player.start().await.unwrap();
        time::sleep(Duration::from_millis(1_500)).await;
        player.pause().await.unwrap();
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 2 }
        );

        time::sleep(Duration::from_millis(400)).await;
        assert!(player.toggle().await.unwrap().running);

        // The old pulse would have ticked 100ms after the resume.
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 2 }
        );

        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 1 }
        );
        assert!(player.is_pulsing());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_reacquires_pulse_after_completion() {
        let (player, _cues) = player(Some(Duration::from_secs(1)));
        player.start().await.unwrap();
        time::sleep(Duration::from_millis(16_500)).await;
        assert!(!player.is_pulsing());

        let fresh = player.reset().await.unwrap();
        assert_eq!(fresh.phase, Phase::Preparing { seconds_remaining: 3 });
        assert!(!fresh.running);
        assert!(player.is_pulsing());

        // Pulses keep arriving but a fresh session waits for start.
        time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(
            player.snapshot().phase,
            Phase::Preparing { seconds_remaining: 3 }
        );
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let (player, _cues) = player(None);
        let mut updates = player.subscribe();
        assert!(!updates.borrow().running);

        player.toggle().await.unwrap();
        updates.changed().await.unwrap();
        assert!(updates.borrow_and_update().running);

        player.tick().await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().seconds_remaining, 2);
    }

    #[tokio::test]
    async fn closed_cue_receiver_does_not_stall_playback() {
        let (player, cues) = player(None);
        drop(cues);
        player.start().await.unwrap();
        for _ in 0..16 {
            player.tick().await.unwrap();
        }
        assert_eq!(player.snapshot().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let (player, _cues) = player(None);
        player.shutdown().await.unwrap();
        assert!(player.start().await.is_err());
    }
}
