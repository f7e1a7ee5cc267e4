//! Transactions sub-client — the paginated `timelineTransactions` list.

use serde_json::json;

use crate::client::PortfolioClient;
use crate::error::WsError;
use crate::network::request_type;
use crate::resolver::{Domain, TypedEvent};
use crate::ws::ListGetter;

pub struct Transactions<'a> {
    pub(crate) client: &'a PortfolioClient,
}

impl<'a> Transactions<'a> {
    /// A list getter configured with the client's pagination settings.
    pub fn list(&self) -> ListGetter<'a> {
        ListGetter::new(&self.client.ws, request_type::TRANSACTIONS, Domain::Transactions)
            .with_config(self.client.list_config.clone())
    }

    /// Every transaction event, oldest page last.
    pub async fn get_all(&self) -> Result<Vec<TypedEvent>, WsError> {
        self.list().get_list(json!({})).await
    }
}
