//! Endpoint and protocol constants for the broker API.

/// Default REST API base URL (web login).
pub const DEFAULT_API_URL: &str = "https://api.traderepublic.com";

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://api.traderepublic.com";

/// Protocol version announced in the `connect` handshake.
pub const CONNECT_PROTOCOL_VERSION: u32 = 31;

/// Reply that acknowledges the handshake.
pub const CONNECTED_REPLY: &str = "connected";

pub const PLATFORM_ID: &str = "webtrading";
pub const PLATFORM_VERSION: &str = "chrome - 120.0.0";
pub const CLIENT_ID: &str = "app.traderepublic.com";
pub const CLIENT_VERSION: &str = "3.151.3";

/// Request types understood by the timeline endpoints.
pub mod request_type {
    pub const TRANSACTIONS: &str = "timelineTransactions";
    pub const ACTIVITY_LOG: &str = "timelineActivityLog";
    pub const DETAILS: &str = "timelineDetailV2";
}

/// Name of the session cookie set by the web login.
pub const SESSION_COOKIE: &str = "tr_session";
