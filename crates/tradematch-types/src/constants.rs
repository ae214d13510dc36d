//! System-wide constants for the TradeMatch engine.

/// Score of a Perfect match (both sides want what the other offers).
pub const PERFECT_SCORE: u8 = 100;

/// Score of an Interest match (one side wants what the other offers).
pub const INTEREST_SCORE: u8 = 75;

/// Score of a Keyword match (shared category vocabulary only).
pub const KEYWORD_SCORE: u8 = 50;

/// Closed category vocabulary used by Keyword matching.
pub const KEYWORD_VOCABULARY: [&str; 10] = [
    "sword",
    "shield",
    "armor",
    "weapon",
    "rare",
    "epic",
    "legendary",
    "pet",
    "mount",
    "accessory",
];

/// Default lifetime of a pending request before it becomes sweepable (5 hours).
pub const DEFAULT_REQUEST_TTL_SECS: u64 = 5 * 3600;

/// Default cadence of the expiry reaper (hourly).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Default directory for persisted documents.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default file name of the offer store document.
pub const OFFERS_FILE: &str = "trade_offers.json";

/// Default file name of the notification index document.
pub const NOTIFICATIONS_FILE: &str = "notifications.json";

/// Default file name of the pending request ledger document.
pub const PENDING_REQUESTS_FILE: &str = "pending_requests.json";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TradeMatch";
