//! High-level client — `PortfolioClient` with nested sub-client accessors.
//!
//! Each domain has its own sub-client in `domain/<name>/client.rs`. All of
//! them share this client's single WS connection; this module keeps the
//! builder and the accessor methods.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{SessionProvider, SessionToken, StaticSession};
use crate::domain::activity::client::ActivityLog;
use crate::domain::detail::client::Details;
use crate::domain::transaction::client::Transactions;
use crate::error::PortfolioError;
use crate::http::RetryConfig;
use crate::shared::NumberFormat;
use crate::transport::Transport;
use crate::ws::{ListConfig, WsClient, WsConfig};

// Re-export sub-client types for convenience.
pub use crate::domain::activity::client::ActivityLog as ActivityLogClient;
pub use crate::domain::detail::client::Details as DetailsClient;
pub use crate::domain::transaction::client::Transactions as TransactionsClient;

/// The primary entry point.
///
/// Provides nested sub-client accessors for each timeline resource:
/// `client.transactions()`, `client.details()`, `client.activity_log()`.
pub struct PortfolioClient {
    pub(crate) ws: WsClient,
    pub(crate) list_config: ListConfig,
    pub(crate) detail_retry: RetryConfig,
    number_format: NumberFormat,
}

impl PortfolioClient {
    pub fn builder() -> PortfolioClientBuilder {
        PortfolioClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn transactions(&self) -> Transactions<'_> {
        Transactions { client: self }
    }

    pub fn details(&self) -> Details<'_> {
        Details { client: self }
    }

    pub fn activity_log(&self) -> ActivityLog<'_> {
        ActivityLog { client: self }
    }

    /// The underlying correlated WS client.
    pub fn ws(&self) -> &WsClient {
        &self.ws
    }

    /// Number format of the connection's locale, for detail tables.
    pub fn number_format(&self) -> NumberFormat {
        self.number_format
    }

    /// Stop the dispatch task. Outstanding calls fail with `Closed`.
    pub async fn close(&mut self) {
        self.ws.close().await;
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct PortfolioClientBuilder {
    ws_config: WsConfig,
    list_config: ListConfig,
    detail_retry: RetryConfig,
    session: Option<Arc<dyn SessionProvider>>,
}

impl Default for PortfolioClientBuilder {
    fn default() -> Self {
        Self {
            ws_config: WsConfig::default(),
            list_config: ListConfig::default(),
            detail_retry: RetryConfig::page_fetch(),
            session: None,
        }
    }
}

impl PortfolioClientBuilder {
    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_config.url = url.to_string();
        self
    }

    /// Locale sent in the handshake; also picks the detail number format.
    pub fn locale(mut self, locale: &str) -> Self {
        self.ws_config.locale = locale.to_string();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.ws_config.request_timeout = timeout;
        self
    }

    pub fn ws_config(mut self, config: WsConfig) -> Self {
        self.ws_config = config;
        self
    }

    pub fn list_config(mut self, config: ListConfig) -> Self {
        self.list_config = config;
        self
    }

    pub fn detail_retry(mut self, retry: RetryConfig) -> Self {
        self.detail_retry = retry;
        self
    }

    /// Use a known session token.
    pub fn session_token(self, token: SessionToken) -> Self {
        self.session_provider(Arc::new(StaticSession::new(token)))
    }

    /// Obtain the session token when the client is built.
    pub fn session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(provider);
        self
    }

    /// Start the client over an already connected transport.
    pub async fn build_with_transport(
        mut self,
        transport: impl Transport,
    ) -> Result<PortfolioClient, PortfolioError> {
        if let Some(provider) = self.session.take() {
            self.ws_config.session = Some(provider.session().await?);
        }
        let number_format = NumberFormat::for_locale(&self.ws_config.locale);
        tracing::debug!(
            "Starting client (locale {}, session {})",
            self.ws_config.locale,
            if self.ws_config.session.is_some() { "set" } else { "none" }
        );

        Ok(PortfolioClient {
            ws: WsClient::start(transport, self.ws_config),
            list_config: self.list_config,
            detail_retry: self.detail_retry,
            number_format,
        })
    }

    /// Connect to the live endpoint and start the client.
    #[cfg(feature = "native")]
    pub async fn connect(self) -> Result<PortfolioClient, PortfolioError> {
        let transport =
            crate::transport::native::connect(&self.ws_config.url, &self.ws_config.locale).await?;
        self.build_with_transport(transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use crate::ws::MessageOut;

    #[tokio::test]
    async fn test_build_resolves_session_and_locale() {
        let (transport, mut peer) = memory::pair();
        let client = PortfolioClient::builder()
            .locale("de")
            .session_token(SessionToken::new("secret"))
            .build_with_transport(transport)
            .await
            .unwrap();

        assert_eq!(client.number_format(), NumberFormat::Continental);
        assert!(client.ws().is_connected());

        client
            .ws()
            .request("timelineTransactions", serde_json::json!({}))
            .unwrap();
        let frame = peer.recv().await.unwrap();
        match MessageOut::decode(&frame).unwrap() {
            MessageOut::Subscribe { body, .. } => assert_eq!(body["token"], "secret"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
