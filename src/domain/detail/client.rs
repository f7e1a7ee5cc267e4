//! Details sub-client — one `timelineDetailV2` request per event.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::client::PortfolioClient;
use crate::error::WsError;
use crate::network::request_type;
use crate::resolver::{Domain, TypedEvent};
use crate::shared::EventId;
use crate::ws::retry::with_retry;

pub struct Details<'a> {
    pub(crate) client: &'a PortfolioClient,
}

impl<'a> Details<'a> {
    /// Raw detail body for event `id`. Timeouts are retried.
    pub async fn get(&self, id: &EventId, cancel: Option<&CancellationToken>) -> Result<Value, WsError> {
        let ws = &self.client.ws;
        let timeout = ws.config().request_timeout;
        let payload = json!({ "id": id.as_str() });

        with_retry(&self.client.detail_retry, cancel, request_type::DETAILS, || async {
            let frame = ws
                .call_with(request_type::DETAILS, payload.clone(), timeout, cancel)
                .await?;
            Ok(frame.body)
        })
        .await
    }

    /// Detail of `parent`, tagged with the parent's type so the details
    /// registry can pick a strategy.
    pub async fn get_for(
        &self,
        parent: &TypedEvent,
        id: &EventId,
        cancel: Option<&CancellationToken>,
    ) -> Result<TypedEvent, WsError> {
        let body = self.get(id, cancel).await?;
        Ok(TypedEvent::tagged(
            parent.sequence,
            Domain::Details,
            parent.type_tag.clone(),
            body,
        ))
    }
}
