//! Adaptive game status poller.
//!
//! A single worker task reads the connected account's game status, bet
//! history, token balance and (optionally) contract stats. The cadence follows
//! the last observed status: fast while a game is active, slow otherwise.
//! Results are published as `Arc<GameView>` through a watch channel, so every
//! reader between two cycles sees the same allocation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::recovery::{RecoveryStatus, RecoveryTracker};
use crate::domain::{
    BetRecord, ContractStats, GameSnapshot, PollKey, SessionPhase, SessionState,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the game status poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Cadence while the last snapshot shows an active game
    pub active_interval: Duration,
    /// Cadence while no game is active
    pub idle_interval: Duration,
    /// Cadence before the first snapshot
    pub default_interval: Duration,
    /// Age after which a snapshot is reported stale
    pub cache_horizon: Duration,
    pub fetch_stats: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(2),
            idle_interval: Duration::from_secs(10),
            default_interval: Duration::from_secs(5),
            cache_horizon: Duration::from_secs(30),
            fetch_stats: true,
        }
    }
}

impl PollerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let ms = |key: &str, default: u64| {
            Duration::from_millis(
                env::var(key)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        };

        let fetch_stats = env::var("VRF_DICE_POLL_FETCH_STATS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        Self {
            active_interval: ms("VRF_DICE_POLL_ACTIVE_MS", 2_000),
            idle_interval: ms("VRF_DICE_POLL_IDLE_MS", 10_000),
            default_interval: ms("VRF_DICE_POLL_DEFAULT_MS", 5_000),
            cache_horizon: ms("VRF_DICE_POLL_CACHE_HORIZON_MS", 30_000),
            fetch_stats,
        }
    }

    /// Next delay given what the last status said about the game
    pub fn interval_for(&self, has_active_game: Option<bool>) -> Duration {
        match has_active_game {
            Some(true) => self.active_interval,
            Some(false) => self.idle_interval,
            None => self.default_interval,
        }
    }
}

// ============================================================================
// VIEW
// ============================================================================

/// Everything the poller knows about one (account, chain)
#[derive(Debug, Clone)]
pub struct GameView {
    pub key: PollKey,
    pub snapshot: Option<Arc<GameSnapshot>>,
    pub history: Option<Arc<Vec<BetRecord>>>,
    pub stats: Option<ContractStats>,
    pub token_balance: Option<u128>,
    pub recovery: Option<RecoveryStatus>,
    pub fetched_at: DateTime<Utc>,
    /// Completed cycles for this key
    pub cycle: u64,
    pub next_interval: Duration,
}

impl GameView {
    pub fn has_active_game(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_active)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        self.snapshot
            .as_ref()
            .is_none_or(|s| s.is_stale(now, horizon))
    }
}

enum PollCommand {
    Refresh(oneshot::Sender<Option<Arc<GameView>>>),
    Shutdown,
}

// ============================================================================
// POLLER HANDLE
// ============================================================================

/// Handle to the polling worker
pub struct GameStatusPoller {
    commands: mpsc::Sender<PollCommand>,
    view: watch::Receiver<Option<Arc<GameView>>>,
    task: JoinHandle<()>,
    config: PollerConfig,
}

impl GameStatusPoller {
    /// Spawn the worker. It reads only while the session exposes a poll key.
    pub fn spawn(
        session: watch::Receiver<SessionState>,
        tracker: RecoveryTracker,
        config: PollerConfig,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        let (view_tx, view) = watch::channel(None);

        let worker = PollWorker {
            session,
            tracker,
            config: config.clone(),
            view: view_tx,
            key: None,
            paused: false,
            has_active_game: None,
            cycle: 0,
        };
        let task = tokio::spawn(worker.run(command_rx));
        info!(
            active_ms = config.active_interval.as_millis() as u64,
            idle_ms = config.idle_interval.as_millis() as u64,
            "Game status poller started"
        );

        Self {
            commands,
            view,
            task,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Latest published view
    pub fn current(&self) -> Option<Arc<GameView>> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<GameView>>> {
        self.view.clone()
    }

    /// Run a cycle now and restart the timer. Returns the resulting view,
    /// or `None` when nothing can be polled.
    pub async fn refresh(&self) -> Option<Arc<GameView>> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(PollCommand::Refresh(tx)).await.ok()?;
        rx.await.ok().flatten()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(PollCommand::Shutdown).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for GameStatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// WORKER
// ============================================================================

struct PollWorker {
    session: watch::Receiver<SessionState>,
    tracker: RecoveryTracker,
    config: PollerConfig,
    view: watch::Sender<Option<Arc<GameView>>>,
    key: Option<PollKey>,
    /// A switch is in flight over the bindings `key` was read from
    paused: bool,
    has_active_game: Option<bool>,
    cycle: u64,
}

impl PollWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<PollCommand>) {
        self.sync_key();
        let mut next_poll = Instant::now();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_poll), if self.is_polling() => {
                    self.poll_once().await;
                    next_poll = Instant::now() + self.interval();
                }
                command = commands.recv() => match command {
                    Some(PollCommand::Refresh(reply)) => {
                        self.sync_key();
                        let view = if self.is_polling() {
                            self.poll_once().await
                        } else {
                            None
                        };
                        next_poll = Instant::now() + self.interval();
                        let _ = reply.send(view);
                    }
                    Some(PollCommand::Shutdown) | None => {
                        info!("Game status poller stopped");
                        break;
                    }
                },
                changed = self.session.changed() => {
                    if changed.is_err() {
                        debug!("Session closed, poller exiting");
                        break;
                    }
                    if self.sync_key() {
                        next_poll = Instant::now();
                    }
                }
            }
        }
    }

    fn interval(&self) -> Duration {
        self.config.interval_for(self.has_active_game)
    }

    fn is_polling(&self) -> bool {
        self.key.is_some() && !self.paused
    }

    /// Adopt the session's current poll key. Returns true when it changed,
    /// in which case cached results are dropped. A switch in flight over the
    /// cached bindings only pauses reads.
    fn sync_key(&mut self) -> bool {
        let (key, switching) = {
            let state = self.session.borrow_and_update();
            (state.poll_key(), switching_key(&state))
        };
        if switching.is_some() && switching == self.key {
            if !self.paused {
                debug!("Network switch in flight, polling paused");
                self.paused = true;
            }
            return false;
        }
        self.paused = false;
        if key == self.key {
            return false;
        }
        debug!(?key, "Poll key changed, cache reset");
        self.key = key;
        self.has_active_game = None;
        self.cycle = 0;
        self.view.send_replace(None);
        true
    }

    #[instrument(skip(self), fields(cycle = self.cycle + 1))]
    async fn poll_once(&mut self) -> Option<Arc<GameView>> {
        let state = self.session.borrow().clone();
        let key = state.poll_key()?;
        if Some(&key) != self.key.as_ref() {
            self.sync_key();
        }
        let contracts = state.contracts?;
        let account = key.account.clone();

        let stats_read = async {
            if self.config.fetch_stats {
                Some(contracts.game.get_contract_stats().await)
            } else {
                None
            }
        };
        let (status, history, balance, stats) = tokio::join!(
            contracts.game.get_game_status(&account),
            contracts.game.get_bet_history(&account),
            contracts.token.balance_of(&account),
            stats_read,
        );

        // The session may have moved on while reads were in flight
        if self.session.borrow().poll_key().as_ref() != Some(&key) {
            debug!("Discarding poll results for a superseded session");
            return None;
        }

        let now = Utc::now();
        let previous = self.view.borrow().clone().filter(|v| v.key == key);

        let snapshot = match status {
            Ok(status) => Some(Arc::new(GameSnapshot::from_status(status, now))),
            Err(e) => {
                warn!(error = %e, "Game status read failed, keeping previous value");
                previous.as_ref().and_then(|v| v.snapshot.clone())
            }
        };
        let history = match history {
            Ok(history) => Some(Arc::new(history)),
            Err(e) => {
                warn!(error = %e, "Bet history read failed, keeping previous value");
                previous.as_ref().and_then(|v| v.history.clone())
            }
        };
        let token_balance = match balance {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(error = %e, "Token balance read failed, keeping previous value");
                previous.as_ref().and_then(|v| v.token_balance)
            }
        };
        let stats = match stats {
            Some(Ok(stats)) => Some(stats),
            Some(Err(e)) => {
                debug!(error = %e, "Contract stats unavailable");
                previous.as_ref().and_then(|v| v.stats.clone())
            }
            None => None,
        };

        if let Some(snapshot) = &snapshot {
            let was_active = self.has_active_game.replace(snapshot.is_active);
            if was_active == Some(true) && !snapshot.is_active {
                info!(account = %key.account, "Game resolved");
            }
        }

        self.cycle += 1;
        let view = Arc::new(GameView {
            recovery: snapshot
                .as_ref()
                .map(|s| self.tracker.evaluate(s, now)),
            key,
            snapshot,
            history,
            stats,
            token_balance,
            fetched_at: now,
            cycle: self.cycle,
            next_interval: self.interval(),
        });
        self.view.send_replace(Some(Arc::clone(&view)));
        Some(view)
    }
}

/// Key of the live bindings a network switch in flight may return to
fn switching_key(state: &SessionState) -> Option<PollKey> {
    if state.phase != SessionPhase::SwitchingNetwork || !state.has_live_contracts() {
        return None;
    }
    Some(PollKey {
        account: state.account.clone()?,
        chain_id: state.chain_id?,
        epoch: state.epoch,
    })
}
