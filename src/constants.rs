// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const WS_PATH: &str = "ws";
pub const DEFAULT_GAME_SERVICE_URL: &str = "http://localhost:5001";

// Connection tuning
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_PROXY_BODY: usize = 8 * 1024 * 1024;

/// Device string a display client announces in its handshake
pub const DISPLAY_DEVICE: &str = "display_client";

/// Rendering sent in place of a player's own view after an action
pub const RELOAD_SENTINEL: &str = "RELOAD";
