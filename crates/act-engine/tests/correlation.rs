// crates/act-engine/tests/correlation.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use act_core::{ActError, Direction, FilterSet, Message, RequestStatus, HEARTBEAT};
use act_engine::{CallAttributes, CallState, CancellationToken, SubscriptionBuffer};
use tokio::time::Instant;

use common::{deliver_later, harness, incoming, stalled_engine, Harness, SESSION};

const MS: Duration = Duration::from_millis(1);

fn order(cl_ord_id: &str) -> Message {
    Message::new(SESSION, "NewOrderSingle")
        .with_field("ClOrdID", cl_ord_id)
        .with_field("OrderQty", "100")
}

/// The filters an order placement declares, in precedence order.
fn order_filters(cl_ord_id: &str, echo_seq: u64) -> FilterSet {
    let report_id = cl_ord_id.to_string();
    let reject_id = cl_ord_id.to_string();
    let seq = echo_seq.to_string();

    FilterSet::new()
        .success("execution_report", move |m: &Message| {
            m.is_type("ExecutionReport") && m.field_eq("ClOrdID", &report_id)
        })
        .error("business_reject", move |m: &Message| {
            m.is_type("BusinessMessageReject") && m.field_eq("BusinessRejectRefID", &reject_id)
        })
        .error("session_reject", move |m: &Message| m.field_eq("RefSeqNum", &seq))
}

#[tokio::test(start_paused = true)]
async fn order_reply_is_correlated_through_its_echo() {
    let h = harness(42);
    let mut rp = h.engine.open(CallAttributes::new("Place order FIX"), SESSION);

    let echo = rp.send_with_echo(order("A1"), "ClOrdID").await.unwrap();
    assert_eq!(echo.sequence(), 42);
    assert_eq!(echo.direction(), Direction::Outgoing);
    assert_eq!(rp.state(), CallState::Sent);

    deliver_later(
        &h.router,
        5 * MS,
        vec![
            incoming(HEARTBEAT, &[]),
            incoming("ExecutionReport", &[("ClOrdID", "Z9")]),
            incoming("ExecutionReport", &[("ClOrdID", "A1"), ("OrdStatus", "0")]),
        ],
    );

    let result = rp
        .receive_first_matching(&order_filters("A1", echo.sequence()), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Success);
    let reply = result.message.unwrap();
    assert!(reply.field_eq("ClOrdID", "A1"));
    assert!(reply.field_eq("OrdStatus", "0"));
    assert_eq!(&result.checkpoint, rp.checkpoint());
    assert_eq!(rp.state(), CallState::Resolved);
}

#[tokio::test(start_paused = true)]
async fn sequence_reject_is_an_error() {
    let h = harness(42);
    let mut rp = h.engine.open(CallAttributes::new("Place order FIX"), SESSION);
    let echo = rp.send_with_echo(order("A1"), "ClOrdID").await.unwrap();

    deliver_later(
        &h.router,
        5 * MS,
        vec![incoming("Reject", &[("RefSeqNum", "42"), ("Text", "bad tag")])],
    );

    let result = rp
        .receive_first_matching(&order_filters("A1", echo.sequence()), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Error);
    assert!(result.message.unwrap().field_eq("Text", "bad tag"));
}

#[tokio::test(start_paused = true)]
async fn declaration_order_breaks_ties() {
    let h = harness(1);
    let both = incoming("ExecutionReport", &[("ClOrdID", "T1")]);
    let is_report = |m: &Message| m.is_type("ExecutionReport");
    let is_t1 = |m: &Message| m.field_eq("ClOrdID", "T1");

    let mut rp = h.engine.open(CallAttributes::new("tie"), SESSION);
    h.router.deliver(both);

    let success_first = FilterSet::new().success("report", is_report).error("t1", is_t1);
    let error_first = FilterSet::new().error("t1", is_t1).success("report", is_report);

    let a = rp.receive_first_matching(&success_first, MS).await.unwrap();
    let b = rp.receive_first_matching(&error_first, MS).await.unwrap();

    assert_eq!(a.status, RequestStatus::Success);
    assert_eq!(b.status, RequestStatus::Error);
    assert_eq!(a.message, b.message);
}

#[tokio::test(start_paused = true)]
async fn earliest_matching_message_wins_over_later_ones() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("earliest"), SESSION);

    h.router.deliver(incoming("BusinessMessageReject", &[("BusinessRejectRefID", "A1")]));
    h.router.deliver(incoming("ExecutionReport", &[("ClOrdID", "A1")]));

    let result = rp
        .receive_first_matching(&order_filters("A1", 999), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result.status, RequestStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn first_matching_times_out_without_a_message() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("silent"), SESSION);
    rp.send(order("A1")).await.unwrap();

    deliver_later(&h.router, 100 * MS, vec![incoming("News", &[])]);

    let timeout = Duration::from_millis(750);
    let started = Instant::now();
    let result = rp
        .receive_first_matching(&order_filters("A1", 1), timeout)
        .await
        .unwrap();

    assert!(started.elapsed() >= timeout);
    assert_eq!(result.status, RequestStatus::Timeout);
    assert!(result.message.is_none());
    assert_eq!(rp.state(), CallState::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn all_matching_collects_the_burst_inside_the_window() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("Place quote FIX"), SESSION);
    rp.send(Message::new(SESSION, "Quote").with_field("Symbol", "EUR/USD"))
        .await
        .unwrap();

    h.router.deliver(incoming("Quote", &[("Symbol", "EUR/USD"), ("QuoteID", "q1")]));
    let router = Arc::clone(&h.router);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        router.deliver(incoming("Quote", &[("Symbol", "GBP/USD"), ("QuoteID", "other")]));
        router.deliver(incoming("Quote", &[("Symbol", "EUR/USD"), ("QuoteID", "q2")]));
        tokio::time::sleep(Duration::from_secs(10)).await;
        router.deliver(incoming("Quote", &[("Symbol", "EUR/USD"), ("QuoteID", "late")]));
    });

    let quotes = FilterSet::new().success("quote", |m: &Message| {
        m.is_type("Quote") && m.field_eq("Symbol", "EUR/USD")
    });
    let started = Instant::now();
    let result = rp
        .receive_all_matching(&quotes, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(result.status, RequestStatus::Success);
    let ids: Vec<&str> = result
        .messages
        .iter()
        .filter_map(|m| m.get_str("QuoteID"))
        .collect();
    assert_eq!(ids, vec!["q1", "q2"]);
    // Our own outbound Quote is never part of the scope's burst.
    assert_eq!(result.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn all_matching_accepts_an_empty_burst() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("empty"), SESSION);

    let quotes = FilterSet::new().success("quote", |m: &Message| m.is_type("Quote"));
    let result = rp
        .receive_all_matching(&quotes, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Success);
    assert!(result.is_empty());
}

#[tokio::test(start_paused = true)]
async fn all_matching_reports_error_classified_replies() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("mixed"), SESSION);
    h.router.deliver(incoming("Quote", &[("QuoteID", "ok")]));
    h.router.deliver(incoming("QuoteStatusReport", &[("QuoteStatus", "5")]));

    let filters = FilterSet::new()
        .success("quote", |m: &Message| m.is_type("Quote"))
        .error("rejected", |m: &Message| m.field_eq("QuoteStatus", "5"));
    let result = rp
        .receive_all_matching(&filters, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Error);
    assert_eq!(result.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fragments_are_collected_through_the_last_one() {
    let h = harness(1);
    let mut rp = h
        .engine
        .scope(CallAttributes::new("Place security list request"), SESSION)
        .prefilter(|m: &Message| m.is_type("SecurityList") && m.field_eq("SecurityReqID", "sl-1"))
        .open();
    rp.send(Message::new(SESSION, "SecurityListRequest").with_field("SecurityReqID", "sl-1"))
        .await
        .unwrap();

    deliver_later(
        &h.router,
        20 * MS,
        vec![
            incoming("SecurityList", &[("SecurityReqID", "sl-1"), ("Part", "1"), ("LastFragment", "false")]),
            incoming("SecurityList", &[("SecurityReqID", "sl-2"), ("Part", "x"), ("LastFragment", "true")]),
            incoming("SecurityList", &[("SecurityReqID", "sl-1"), ("Part", "2"), ("LastFragment", "false")]),
            incoming("SecurityList", &[("SecurityReqID", "sl-1"), ("Part", "3"), ("LastFragment", "true")]),
            incoming("SecurityList", &[("SecurityReqID", "sl-1"), ("Part", "4"), ("LastFragment", "false")]),
        ],
    );

    let last = FilterSet::new().success("last_fragment", |m: &Message| m.field_eq("LastFragment", "true"));
    let result = rp
        .receive_all_before_matching(&last, Duration::from_secs(20))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Success);
    let parts: Vec<&str> = result.messages.iter().filter_map(|m| m.get_str("Part")).collect();
    assert_eq!(parts, vec!["1", "2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn fragments_time_out_with_partial_collection() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("partial"), SESSION);

    deliver_later(
        &h.router,
        10 * MS,
        vec![
            incoming("SecurityList", &[("LastFragment", "false")]),
            incoming("SecurityList", &[("LastFragment", "false")]),
        ],
    );

    let last = FilterSet::new().success("last_fragment", |m: &Message| m.field_eq("LastFragment", "true"));
    let result = rp
        .receive_all_before_matching(&last, Duration::from_secs(3))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Timeout);
    assert_eq!(result.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_not_a_timeout() {
    let h = harness(1);
    let token = CancellationToken::new();
    let mut rp = h
        .engine
        .scope(CallAttributes::new("disconnecting caller"), SESSION)
        .cancel_on(&token)
        .open();
    let buffer = rp.buffer();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = rp
        .receive_first_matching(&order_filters("A1", 1), Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(result.status, RequestStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(rp.state(), CallState::Cancelled);
    assert!(buffer.is_closed());

    // Further sends are refused; further waits resolve as cancelled at once.
    assert!(matches!(
        rp.send(order("A2")).await,
        Err(ActError::Cancelled { .. })
    ));
    let again = rp
        .receive_all_matching(&order_filters("A1", 1), Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(again.status, RequestStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn missing_echo_is_fatal_and_closes_the_scope() {
    let h = harness(1);
    h.transport.disable_echo();
    let mut rp = h.engine.open(CallAttributes::new("no echo"), SESSION);
    let buffer = rp.buffer();

    let err = rp.send_with_echo(order("A1"), "ClOrdID").await.unwrap_err();
    assert!(matches!(err, ActError::EchoTimeout { ref key_value, .. } if key_value == "A1"));
    assert_eq!(rp.state(), CallState::Closed);
    assert!(buffer.is_closed());
    assert_eq!(h.router.active_subscriptions(), 0);

    let misuse = rp
        .receive_first_matching(&order_filters("A1", 1), Duration::from_secs(1))
        .await;
    assert!(matches!(misuse, Err(ActError::ScopeClosed { .. })));
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_a_stalled_send() {
    let (router, engine) = stalled_engine();
    let token = CancellationToken::new();
    let mut rp = engine
        .scope(CallAttributes::new("stalled session"), SESSION)
        .cancel_on(&token)
        .open();
    let buffer = rp.buffer();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = rp.send_with_echo(order("A1"), "ClOrdID").await.unwrap_err();

    assert!(matches!(err, ActError::Cancelled { .. }));
    assert!(started.elapsed() < engine.config().send_timeout());
    assert_eq!(rp.state(), CallState::Closed);
    assert!(buffer.is_closed());
    assert_eq!(router.active_subscriptions(), 0);
    assert!(matches!(
        rp.receive_first_matching(&order_filters("A1", 1), Duration::from_secs(1)).await,
        Err(ActError::ScopeClosed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_send_fails_after_the_send_timeout() {
    let (router, engine) = stalled_engine();
    let mut rp = engine.open(CallAttributes::new("stalled session"), SESSION);
    let budget = engine.config().send_timeout();

    let started = Instant::now();
    let err = rp.send(order("A1")).await.unwrap_err();

    assert!(matches!(err, ActError::SendFailed { ref message_type, .. } if message_type == "NewOrderSingle"));
    assert!(started.elapsed() >= budget);
    assert_eq!(rp.state(), CallState::Closed);
    assert_eq!(router.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn echo_key_must_be_present() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("no key"), SESSION);

    let err = rp
        .send_with_echo(Message::new(SESSION, "NewOrderSingle"), "ClOrdID")
        .await
        .unwrap_err();
    assert!(matches!(err, ActError::MissingEchoKey { .. }));
    assert!(h.transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_fatal() {
    let h = harness(1);
    h.transport.reject_sends();
    let mut rp = h.engine.open(CallAttributes::new("rejected"), SESSION);

    let err = rp.send(order("A1")).await.unwrap_err();
    assert!(matches!(err, ActError::SendFailed { .. }));
    assert!(matches!(rp.send(order("A1")).await, Err(ActError::ScopeClosed { .. })));
}

#[tokio::test(start_paused = true)]
async fn waits_must_be_bounded_and_non_zero() {
    let h = harness(1);
    let mut rp = h.engine.open(CallAttributes::new("misuse"), SESSION);

    let zero = rp
        .receive_first_matching(&order_filters("A1", 1), Duration::ZERO)
        .await;
    assert!(matches!(zero, Err(ActError::InvalidWait { .. })));

    let forever = rp
        .receive_all_before_matching(&order_filters("A1", 1), Duration::from_secs(u64::MAX / 2))
        .await;
    assert!(matches!(forever, Err(ActError::InvalidWait { .. })));
}

#[tokio::test(start_paused = true)]
async fn buffer_is_released_on_every_exit_path() {
    let h = harness(1);
    let filters = order_filters("A1", 1);

    // Normal close.
    let rp = h.engine.open(CallAttributes::new("normal"), SESSION);
    let normal = rp.buffer();
    h.router.deliver(incoming("News", &[]));
    assert_eq!(normal.len(), 1);
    rp.close();

    // Timeout, then an early return through `?`.
    async fn bail_out(
        h: &Harness,
        filters: &FilterSet,
        seen: &mut Option<Arc<SubscriptionBuffer>>,
    ) -> Result<(), ActError> {
        let mut rp = h.engine.open(CallAttributes::new("bail out"), SESSION);
        *seen = Some(rp.buffer());

        let first = rp.receive_first_matching(filters, Duration::from_millis(50)).await?;
        assert_eq!(first.status, RequestStatus::Timeout);
        rp.receive_first_matching(filters, Duration::ZERO).await?;
        Ok(())
    }
    let mut bailed = None;
    assert!(bail_out(&h, &filters, &mut bailed).await.is_err());
    let bailed = bailed.unwrap();

    // Panic inside the scope.
    let panicked = {
        let rp = h.engine.open(CallAttributes::new("panic"), SESSION);
        let buffer = rp.buffer();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scope = rp;
            panic!("handler bug");
        }));
        assert!(outcome.is_err());
        buffer
    };

    h.router.deliver(incoming("ExecutionReport", &[("ClOrdID", "A1")]));
    h.router.deliver(incoming("News", &[]));

    for buffer in [&normal, &bailed, &panicked] {
        assert!(buffer.is_closed());
        assert!(buffer.is_empty());
    }
    assert_eq!(h.router.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn parallel_scopes_see_only_their_own_replies() {
    let h = Arc::new(harness(100));

    let mut calls = Vec::new();
    for id in ["P1", "P2", "P3"] {
        let h = Arc::clone(&h);
        calls.push(tokio::spawn(async move {
            let mut rp = h.engine.open(CallAttributes::new("parallel"), SESSION);
            let echo = rp.send_with_echo(order(id), "ClOrdID").await.unwrap();
            rp.receive_first_matching(&order_filters(id, echo.sequence()), Duration::from_secs(5))
                .await
                .unwrap()
        }));
    }

    deliver_later(
        &h.router,
        10 * MS,
        vec![
            incoming("ExecutionReport", &[("ClOrdID", "P3")]),
            incoming("ExecutionReport", &[("ClOrdID", "P1")]),
            incoming("ExecutionReport", &[("ClOrdID", "P2")]),
        ],
    );

    let mut seen = Vec::new();
    for call in calls {
        let result = call.await.unwrap();
        assert_eq!(result.status, RequestStatus::Success);
        seen.push(result.message.unwrap().get_str("ClOrdID").unwrap().to_string());
    }
    assert_eq!(seen, vec!["P1", "P2", "P3"]);
    assert_eq!(h.transport.sent().len(), 3);
}
