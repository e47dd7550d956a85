//! Application layer: session state machine, switching, polling and notifications.

pub mod contracts;
pub mod network_switch;
pub mod notifications;
pub mod poller;
pub mod recovery;
pub mod session;
pub mod state;
pub mod subscription;

pub use contracts::ContractBindingFactory;
pub use network_switch::{NetworkSwitchCoordinator, SwitchConfig, SwitchOutcome};
pub use notifications::{Notifier, NotifierConfig, NotifyOutcome};
pub use poller::{GameStatusPoller, GameView, PollerConfig};
pub use recovery::{
    BLOCK_THRESHOLD, GAME_TIMEOUT_SECS, RecoveryConfig, RecoveryStatus, RecoveryTracker,
};
pub use session::{SessionAction, SessionConfig, WalletSession, transition};
pub use state::{NetworkHealthReport, SyncEngine};
pub use subscription::Disposer;
