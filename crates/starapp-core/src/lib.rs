//! StarApp bot core: outcome tracking, coin bookkeeping and the chat webhook logic shared
//! by the gateway and the notification daemon.

pub mod cards;
pub mod config;
pub mod dispatch;
pub mod event;
pub mod model;
pub mod notify;
pub mod store;
pub mod tracker;

pub use cards::{CardStyle, ChatResponse, IconSet};
pub use config::{BotConfig, StorageKind};
pub use dispatch::{BotCommand, CardAction, Dispatcher, Reply};
pub use event::{decode_selection, ChatEvent, EventType, SelectionError};
pub use model::{
    completion_ratio, CoinSummary, DailyTally, LogEntry, MoodTier, NewOutcome, Outcome,
    OutcomeStatus, OutcomeType, User, OUTCOME_COINS,
};
pub use notify::{
    due_slot, run_round, NotificationSink, NotifyConfig, NotifyError, NotifySlot, Notifier,
    RoundReport, SentLog,
};
pub use store::{JsonFileStore, OutcomeStore, SqliteStore, StoreError};
pub use tracker::{OutcomeSelection, OutcomeTracker, TrackerError};
