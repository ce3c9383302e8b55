//! Act handlers: one per remote method, each a thin consumer of the engine.
//!
//! A handler opens a scope, sends the caller's message, declares the
//! replies it expects and converts the outcome into the method's reply.

use std::sync::Arc;
use std::time::Duration;

use act_core::{ActResult, FilterSet, Message, RequestStatus};
use act_engine::{ActEngine, CallAttributes, RequestProcessor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::security_list::security_list_dictionary;
use crate::types::{
    ActMethod, ActResponse, PlaceMessageMultipleResponse, PlaceMessageRequest,
    PlaceMessageResponse, PlaceSecurityListResponse, SendMessageResponse,
};

const ORDER_REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_BURST_WINDOW: Duration = Duration::from_secs(5);
const SECURITY_LIST_TIMEOUT: Duration = Duration::from_secs(20);

/// `message_type` replies whose `reply_key` equals `expected`.
/// An absent `expected` (request lacked the field) never matches.
fn reply_to(
    message_type: &'static str,
    reply_key: &'static str,
    expected: Option<&str>,
) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
    let expected = expected.map(str::to_string);
    move |m: &Message| {
        m.is_type(message_type)
            && expected.as_deref().is_some_and(|value| m.field_eq(reply_key, value))
    }
}

pub struct ActHandler {
    engine: Arc<ActEngine>,
    default_session: String,
}

impl ActHandler {
    pub fn new(engine: Arc<ActEngine>, default_session: impl Into<String>) -> Self {
        ActHandler {
            engine,
            default_session: default_session.into(),
        }
    }

    pub fn engine(&self) -> &Arc<ActEngine> {
        &self.engine
    }

    /// Route one request to its handler. `cancel` aborts the call's waits
    /// (e.g. the caller disconnected).
    pub async fn dispatch(
        &self,
        method: ActMethod,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<ActResponse> {
        debug!(
            %method,
            message_type = %request.message.message_type,
            "received request"
        );

        Ok(match method {
            ActMethod::PlaceOrderFix => ActResponse::Place(self.place_order_fix(request, cancel).await?),
            ActMethod::SendMessage => ActResponse::Send(self.send_message(request, cancel).await?),
            ActMethod::PlaceQuoteRequestFix => {
                ActResponse::Place(self.place_quote_request_fix(request, cancel).await?)
            }
            ActMethod::PlaceQuoteFix => ActResponse::Multiple(self.place_quote_fix(request, cancel).await?),
            ActMethod::PlaceOrderMassCancelRequestFix => {
                ActResponse::Place(self.place_order_mass_cancel_request_fix(request, cancel).await?)
            }
            ActMethod::PlaceQuoteCancelFix => {
                ActResponse::Place(self.place_quote_cancel_fix(request, cancel).await?)
            }
            ActMethod::PlaceQuoteResponseFix => {
                ActResponse::Place(self.place_quote_response_fix(request, cancel).await?)
            }
            ActMethod::PlaceSecurityListRequest => {
                ActResponse::SecurityList(self.place_security_list_request(request, cancel).await?)
            }
        })
    }

    fn attributes(method: ActMethod, request: &PlaceMessageRequest) -> CallAttributes {
        CallAttributes::new(method.act_name())
            .with_parent_event_id(request.parent_event_id.clone())
            .with_description(request.description.clone())
    }

    /// The session the request addresses, falling back to the configured one.
    fn session_for(&self, request: &PlaceMessageRequest) -> String {
        match request.message.session_alias() {
            "" => self.default_session.clone(),
            alias => alias.to_string(),
        }
    }

    /// Scope with the default heartbeat-excluding prefilter.
    fn open(
        &self,
        method: ActMethod,
        request: &PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> RequestProcessor {
        self.engine
            .scope(Self::attributes(method, request), self.session_for(request))
            .cancel_on(cancel)
            .open()
    }

    /// Single-answer act: send, then first reply accepted by `filters`.
    async fn send_and_await_first(
        &self,
        method: ActMethod,
        request: PlaceMessageRequest,
        filters: FilterSet,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        let mut rp = self.open(method, &request, cancel);
        rp.send(request.message).await?;

        let timeout = rp.config().default_timeout();
        let result = rp.receive_first_matching(&filters, timeout).await?;
        Ok(result.into())
    }

    pub async fn place_order_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        let mut rp = self.open(ActMethod::PlaceOrderFix, &request, cancel);
        let cl_ord_id = request.message.get_str("ClOrdID").map(str::to_string);

        let echo = rp.send_with_echo(request.message, "ClOrdID").await?;
        let echo_seq = echo.sequence().to_string();

        let filters = FilterSet::new()
            .success(
                "execution_report",
                reply_to("ExecutionReport", "ClOrdID", cl_ord_id.as_deref()),
            )
            .error(
                "business_reject",
                reply_to("BusinessMessageReject", "BusinessRejectRefID", cl_ord_id.as_deref()),
            )
            .error("session_reject", move |m: &Message| m.field_eq("RefSeqNum", &echo_seq));

        let result = rp.receive_first_matching(&filters, ORDER_REPLY_TIMEOUT).await?;
        Ok(result.into())
    }

    /// Fire-and-forget.
    pub async fn send_message(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<SendMessageResponse> {
        let mut rp = self.open(ActMethod::SendMessage, &request, cancel);
        rp.send(request.message).await?;

        Ok(SendMessageResponse {
            status: RequestStatus::Success,
            checkpoint: rp.checkpoint().clone(),
        })
    }

    pub async fn place_quote_request_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        let quote_req_id = request.message.get_str("QuoteReqID");
        let filters = FilterSet::new().success(
            "quote_status_report",
            reply_to("QuoteStatusReport", "QuoteReqID", quote_req_id),
        );
        self.send_and_await_first(ActMethod::PlaceQuoteRequestFix, request, filters, cancel)
            .await
    }

    /// Status report first, then whatever quotes the counterparty streams
    /// back within the burst window.
    pub async fn place_quote_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageMultipleResponse> {
        let mut rp = self.open(ActMethod::PlaceQuoteFix, &request, cancel);
        let quote_id = request.message.get_str("QuoteID").map(str::to_string);
        let symbol = request.message.get_str("Symbol").map(str::to_string);
        rp.send(request.message).await?;

        let quote_status = |status: &'static str| {
            let report = reply_to("QuoteStatusReport", "QuoteID", quote_id.as_deref());
            move |m: &Message| report(m) && m.field_eq("QuoteStatus", status)
        };
        let status_filters = FilterSet::new()
            .success("quote_accepted", quote_status("0"))
            .error("quote_rejected", quote_status("5"));
        let report = rp
            .receive_first_matching(&status_filters, QUOTE_STATUS_TIMEOUT)
            .await?;

        let quote_filters = FilterSet::new().success("quote", move |m: &Message| {
            symbol.as_deref().is_some_and(|s| m.field_eq("Symbol", s))
                && m.get_path_str("NoQuoteQualifiers.0.QuoteQualifier") == Some("R")
                && m.field_eq("QuoteType", "0")
        });
        let quotes = rp
            .receive_all_matching(&quote_filters, QUOTE_BURST_WINDOW)
            .await?;

        let mut response_messages = Vec::with_capacity(quotes.len() + 1);
        response_messages.extend(report.message);
        response_messages.extend(quotes.messages);

        Ok(PlaceMessageMultipleResponse {
            response_messages,
            status: report.status,
            checkpoint: report.checkpoint,
        })
    }

    pub async fn place_order_mass_cancel_request_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        let cl_ord_id = request.message.get_str("ClOrdID");
        let filters = FilterSet::new().success(
            "order_mass_cancel_report",
            reply_to("OrderMassCancelReport", "ClOrdID", cl_ord_id),
        );
        self.send_and_await_first(ActMethod::PlaceOrderMassCancelRequestFix, request, filters, cancel)
            .await
    }

    pub async fn place_quote_cancel_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        // The acknowledgement echoes the cancel's QuoteMsgID as its QuoteID.
        let quote_msg_id = request.message.get_str("QuoteMsgID");
        let filters = FilterSet::new().success(
            "mass_quote_acknowledgement",
            reply_to("MassQuoteAcknowledgement", "QuoteID", quote_msg_id),
        );
        self.send_and_await_first(ActMethod::PlaceQuoteCancelFix, request, filters, cancel)
            .await
    }

    pub async fn place_quote_response_fix(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceMessageResponse> {
        let rfq_id = request.message.get_str("RFQID");
        let execution_report = reply_to("ExecutionReport", "RFQID", rfq_id);
        let status_report = reply_to("QuoteStatusReport", "RFQID", rfq_id);
        let filters = FilterSet::new().success("quote_response_reply", move |m: &Message| {
            execution_report(m) || status_report(m)
        });
        self.send_and_await_first(ActMethod::PlaceQuoteResponseFix, request, filters, cancel)
            .await
    }

    /// Collect every fragment of the list up to the one flagged last.
    pub async fn place_security_list_request(
        &self,
        request: PlaceMessageRequest,
        cancel: &CancellationToken,
    ) -> ActResult<PlaceSecurityListResponse> {
        let method = ActMethod::PlaceSecurityListRequest;
        let fragments_of_request = reply_to(
            "SecurityList",
            "SecurityReqID",
            request.message.get_str("SecurityReqID"),
        );

        let mut rp = self
            .engine
            .scope(Self::attributes(method, &request), self.session_for(&request))
            .prefilter(fragments_of_request)
            .cancel_on(cancel)
            .open();
        rp.send(request.message).await?;

        let filters = FilterSet::new().success("last_fragment", |m: &Message| {
            m.field_eq("LastFragment", "true")
        });
        let fragments = rp
            .receive_all_before_matching(&filters, SECURITY_LIST_TIMEOUT)
            .await?;

        Ok(PlaceSecurityListResponse {
            security_list_dictionary: security_list_dictionary(&fragments.messages),
            status: fragments.status,
            checkpoint: fragments.checkpoint,
        })
    }
}

impl std::fmt::Debug for ActHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActHandler")
            .field("default_session", &self.default_session)
            .finish_non_exhaustive()
    }
}
