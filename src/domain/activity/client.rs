//! Activity-log sub-client — the paginated `timelineActivityLog` list.

use serde_json::json;

use crate::client::PortfolioClient;
use crate::error::WsError;
use crate::network::request_type;
use crate::resolver::{Domain, TypedEvent};
use crate::ws::ListGetter;

pub struct ActivityLog<'a> {
    pub(crate) client: &'a PortfolioClient,
}

impl<'a> ActivityLog<'a> {
    pub fn list(&self) -> ListGetter<'a> {
        ListGetter::new(&self.client.ws, request_type::ACTIVITY_LOG, Domain::ActivityLog)
            .with_config(self.client.list_config.clone())
    }

    pub async fn get_all(&self) -> Result<Vec<TypedEvent>, WsError> {
        self.list().get_list(json!({})).await
    }
}
