//! VRF recovery tracker.
//!
//! A wager whose VRF callback never arrives can be reclaimed once the game
//! contract's timeout has passed. The contract's `recoveryEligible` flag is
//! the only gate for the action; the time-based estimate here drives the
//! countdown shown while waiting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::domain::{AppError, GameSnapshot};

/// Seconds after the last play before the contract allows recovery
pub const GAME_TIMEOUT_SECS: u64 = 3600;

/// Advisory block count matching [`GAME_TIMEOUT_SECS`]
pub const BLOCK_THRESHOLD: u64 = 300;

/// Configuration for recovery estimation
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub game_timeout: Duration,
    pub block_threshold: u64,
    /// Average block time, used only to estimate elapsed blocks
    pub block_time: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            game_timeout: Duration::from_secs(GAME_TIMEOUT_SECS),
            block_threshold: BLOCK_THRESHOLD,
            block_time: Duration::from_secs(2),
        }
    }
}

impl RecoveryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let game_timeout_secs = env::var("VRF_DICE_GAME_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(GAME_TIMEOUT_SECS);

        let block_threshold = env::var("VRF_DICE_BLOCK_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(BLOCK_THRESHOLD);

        let block_time_ms = env::var("VRF_DICE_BLOCK_TIME_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);

        Self {
            game_timeout: Duration::from_secs(game_timeout_secs),
            block_threshold,
            block_time: Duration::from_millis(block_time_ms),
        }
    }
}

/// Derived recovery state for one snapshot at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStatus {
    pub has_active_game: bool,
    pub elapsed_secs: u64,
    pub seconds_until_eligible: u64,
    /// Time-based estimate, display only
    pub estimated_eligible: bool,
    /// On-chain flag; the only gate for the recovery action
    pub can_recover: bool,
    pub estimated_blocks_elapsed: u64,
    /// 0.0..=1.0 toward the timeout
    pub progress: f64,
}

/// Pure derivation of recovery eligibility
#[derive(Debug, Clone, Default)]
pub struct RecoveryTracker {
    config: RecoveryConfig,
}

impl RecoveryTracker {
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn evaluate(&self, snapshot: &GameSnapshot, now: DateTime<Utc>) -> RecoveryStatus {
        let timeout = self.config.game_timeout.as_secs();

        if !snapshot.is_active {
            return RecoveryStatus {
                has_active_game: false,
                elapsed_secs: 0,
                seconds_until_eligible: 0,
                estimated_eligible: false,
                can_recover: false,
                estimated_blocks_elapsed: 0,
                progress: 0.0,
            };
        }

        // Clock skew can put the last play in the future
        let elapsed_secs = u64::try_from(now.timestamp())
            .unwrap_or(0)
            .saturating_sub(snapshot.last_play_timestamp);
        let seconds_until_eligible = timeout.saturating_sub(elapsed_secs);

        let block_secs = self.config.block_time.as_secs_f64();
        let estimated_blocks_elapsed = if block_secs > 0.0 {
            (elapsed_secs as f64 / block_secs) as u64
        } else {
            0
        };

        let progress = if timeout == 0 {
            1.0
        } else {
            (elapsed_secs as f64 / timeout as f64).min(1.0)
        };

        RecoveryStatus {
            has_active_game: true,
            elapsed_secs,
            seconds_until_eligible,
            estimated_eligible: snapshot.recovery_eligible || elapsed_secs >= timeout,
            can_recover: snapshot.recovery_eligible,
            estimated_blocks_elapsed,
            progress,
        }
    }

    /// Gate for the self-recovery action
    pub fn ensure_can_recover(
        &self,
        snapshot: &GameSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RecoveryStatus, AppError> {
        if !snapshot.is_active {
            return Err(AppError::NotSupported(
                "no active game to recover".to_string(),
            ));
        }
        let status = self.evaluate(snapshot, now);
        if status.can_recover {
            Ok(status)
        } else {
            Err(AppError::RecoveryNotYetEligible {
                // On-chain flag still false after the local timeout: wait for the next read
                seconds_remaining: status.seconds_until_eligible,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameStatus;
    use chrono::TimeZone;

    const PLAYED_AT: i64 = 1_700_000_000;

    fn snapshot(active: bool, eligible: bool) -> GameSnapshot {
        GameSnapshot::from_status(
            GameStatus {
                is_active: active,
                recovery_eligible: eligible,
                last_play_timestamp: PLAYED_AT as u64,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(PLAYED_AT + offset_secs, 0).unwrap()
    }

    #[test]
    fn test_countdown_reaches_zero_after_timeout() {
        let tracker = RecoveryTracker::default();
        let status = tracker.evaluate(&snapshot(true, false), at(3601));
        assert_eq!(status.seconds_until_eligible, 0);
        assert!(status.estimated_eligible);
        assert_eq!(status.progress, 1.0);
    }

    #[test]
    fn test_countdown_midway() {
        let tracker = RecoveryTracker::default();
        let status = tracker.evaluate(&snapshot(true, false), at(600));
        assert_eq!(status.elapsed_secs, 600);
        assert_eq!(status.seconds_until_eligible, 3000);
        assert_eq!(status.estimated_blocks_elapsed, 300);
        assert!(!status.estimated_eligible);
    }

    #[test]
    fn test_action_gated_on_chain_flag() {
        let tracker = RecoveryTracker::default();

        // Past the timeout locally, but the contract has not flagged it yet
        let result = tracker.ensure_can_recover(&snapshot(true, false), at(7200));
        assert!(matches!(
            result,
            Err(AppError::RecoveryNotYetEligible {
                seconds_remaining: 0
            })
        ));

        // Flagged on chain even though the local clock says otherwise
        let status = tracker
            .ensure_can_recover(&snapshot(true, true), at(10))
            .unwrap();
        assert!(status.can_recover);
        assert_eq!(status.seconds_until_eligible, 3590);
    }

    #[test]
    fn test_future_timestamp_clamps_to_zero() {
        let tracker = RecoveryTracker::default();
        let status = tracker.evaluate(&snapshot(true, false), at(-120));
        assert_eq!(status.elapsed_secs, 0);
        assert_eq!(status.seconds_until_eligible, 3600);
    }

    #[test]
    fn test_inactive_game_is_never_recoverable() {
        let tracker = RecoveryTracker::default();
        let status = tracker.evaluate(&snapshot(false, true), at(9999));
        assert!(!status.has_active_game);
        assert!(!status.can_recover);
        assert!(
            tracker
                .ensure_can_recover(&snapshot(false, true), at(9999))
                .is_err()
        );
    }
}
