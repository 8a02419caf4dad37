//! End-to-end routing against the in-memory transport

mod common;

use common::*;
use topicbus::constants::headers::{
    RETRY_EXCEPTION_MESSAGE, RETRY_EXCEPTION_STACKTRACE, RETRY_EXCEPTION_TYPE,
    RETRY_HEADERS, RETRY_REQUEUE_COUNT,
};
use topicbus::dispatch::{BoxError, HandlerFailure};
use topicbus::messaging::{DeliveryTag, HeaderValue, Headers, RetryMetadata, TopicPublisher};

#[tokio::test]
async fn test_exact_topic_success_is_acknowledged_once() {
    let calls = Calls::default();
    let seen = calls.clone();
    let mut builder = builder();
    builder
        .handle("orders.created", move |order: OrderCreated| {
            let seen = seen.clone();
            async move {
                assert_eq!(order.region, "eu");
                seen.hit();
                Ok::<_, BillingRejected>(())
            }
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    let tag = deliver(&transport, "orders.created", OrderCreated::body(1));

    assert!(transport.wait_for_acks(1, WAIT).await);
    listener.stop().await.unwrap();

    assert_eq!(calls.count(), 1);
    assert_eq!(transport.acknowledged(), vec![DeliveryTag(tag)]);
    assert!(transport.published().is_empty());
    assert_eq!(listener.stats().handled, 1);
}

#[tokio::test]
async fn test_multi_segment_wildcard_routes_deep_topics() {
    let calls = Calls::default();
    let seen = calls.clone();
    let mut builder = builder();
    builder
        .handle_pattern_sync("orders.#", move |_order: OrderCreated| {
            seen.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created.eu", OrderCreated::body(2));

    assert!(transport.wait_for_acks(1, WAIT).await);
    listener.stop().await.unwrap();
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn test_handler_failure_republishes_then_acknowledges() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |order: OrderCreated| {
            Err(BillingRejected { id: order.id })
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    let body = OrderCreated::body(3);
    let tag = deliver(&transport, "orders.created", body.clone());

    assert!(transport.wait_for_acks(1, WAIT).await);
    listener.stop().await.unwrap();

    let published = transport.published();
    assert_eq!(published.len(), 1);
    let retry = &published[0];
    assert_eq!(retry.exchange, EXCHANGE);
    assert_eq!(retry.routing_key, "orders.created");
    assert_eq!(retry.body, body);
    assert_eq!(
        retry.headers.get(RETRY_REQUEUE_COUNT),
        Some(&HeaderValue::Integer(1))
    );
    assert_eq!(
        retry.headers.get(RETRY_EXCEPTION_MESSAGE),
        Some(&HeaderValue::from("order 3 rejected by billing"))
    );
    assert!(retry
        .headers
        .get(RETRY_EXCEPTION_TYPE)
        .and_then(HeaderValue::as_str)
        .is_some_and(|kind| kind.ends_with("BillingRejected")));
    assert!(retry.headers.contains_key(RETRY_EXCEPTION_STACKTRACE));
    assert_eq!(transport.acknowledged(), vec![DeliveryTag(tag)]);
    assert_eq!(listener.stats().retried, 1);
}

#[tokio::test]
async fn test_unroutable_delivery_is_neither_acked_nor_republished() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |_: OrderCreated| Ok::<_, BillingRejected>(()))
        .unwrap()
        .handle_pattern_sync("invoices.*", |_: serde_json::Value| {
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "shipments.dispatched", OrderCreated::body(4));
    listener.stop().await.unwrap();

    assert!(transport.acknowledged().is_empty());
    assert!(transport.published().is_empty());
    let stats = listener.stats();
    assert_eq!(stats.unroutable, 1);
    assert_eq!(stats.handled, 0);
}

#[tokio::test]
async fn test_exact_binding_beats_earlier_wildcard() {
    let wildcard_calls = Calls::default();
    let exact_calls = Calls::default();
    let (w, e) = (wildcard_calls.clone(), exact_calls.clone());

    let mut builder = builder();
    builder
        .handle_pattern_sync("orders.*", move |_: OrderCreated| {
            w.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap()
        .handle_sync("orders.created", move |_: OrderCreated| {
            e.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created", OrderCreated::body(5));
    deliver(&transport, "orders.cancelled", OrderCreated::body(6));

    assert!(transport.wait_for_acks(2, WAIT).await);
    listener.stop().await.unwrap();
    assert_eq!(exact_calls.count(), 1);
    assert_eq!(wildcard_calls.count(), 1);
}

#[tokio::test]
async fn test_first_registered_wildcard_wins() {
    let first = Calls::default();
    let second = Calls::default();
    let (f, s) = (first.clone(), second.clone());

    let mut builder = builder();
    builder
        .handle_pattern_sync("orders.#", move |_: OrderCreated| {
            f.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap()
        .handle_pattern_sync("orders.*", move |_: OrderCreated| {
            s.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    for id in 0..3 {
        deliver(&transport, "orders.created", OrderCreated::body(id));
    }

    assert!(transport.wait_for_acks(3, WAIT).await);
    listener.stop().await.unwrap();
    assert_eq!(first.count(), 3);
    assert_eq!(second.count(), 0);
}

#[tokio::test]
async fn test_decode_failure_takes_retry_path() {
    let calls = Calls::default();
    let seen = calls.clone();
    let mut builder = builder();
    builder
        .handle_sync("orders.created", move |_: OrderCreated| {
            seen.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created", b"null".to_vec());
    deliver(&transport, "orders.created", Vec::new());
    deliver(&transport, "orders.created", br#"{"id":"seven"}"#.to_vec());

    assert!(transport.wait_for_acks(3, WAIT).await);
    listener.stop().await.unwrap();

    assert_eq!(calls.count(), 0);
    let published = transport.published();
    assert_eq!(published.len(), 3);
    for message in &published {
        assert!(message
            .headers
            .get(RETRY_EXCEPTION_TYPE)
            .and_then(HeaderValue::as_str)
            .is_some_and(|kind| kind.ends_with("DispatchError::Decode")));
    }
}

#[tokio::test]
async fn test_handler_panic_is_retried_and_listener_keeps_running() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |order: OrderCreated| {
            if order.id == 13 {
                panic!("unlucky order");
            }
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created", OrderCreated::body(13));
    deliver(&transport, "orders.created", OrderCreated::body(14));

    assert!(transport.wait_for_acks(2, WAIT).await);
    listener.stop().await.unwrap();

    let published = transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].headers.get(RETRY_EXCEPTION_MESSAGE),
        Some(&HeaderValue::from("Handler panicked: unlucky order"))
    );
    assert_eq!(listener.stats().handled, 1);
}

#[tokio::test]
async fn test_retry_chain_increments_requeue_count() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |order: OrderCreated| {
            Err(BillingRejected { id: order.id })
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created", OrderCreated::body(8));
    assert!(transport.wait_for_publishes(1, WAIT).await);

    // Feed the republished message back in, as the broker would
    let first_retry = transport.published()[0].clone();
    transport
        .deliver(
            QUEUE,
            &first_retry.routing_key,
            first_retry.headers.clone(),
            first_retry.body.clone(),
        )
        .unwrap();
    assert!(transport.wait_for_publishes(2, WAIT).await);
    assert!(transport.wait_for_acks(2, WAIT).await);
    listener.stop().await.unwrap();

    let second_retry = &transport.published()[1];
    let metadata = RetryMetadata::read(&second_retry.headers).unwrap();
    assert_eq!(metadata.requeue_count, 2);
    assert_eq!(metadata.exception_message, "order 8 rejected by billing");
    for header in RETRY_HEADERS {
        assert!(second_retry.headers.contains_key(header), "missing {header}");
    }
}

#[tokio::test]
async fn test_failed_republish_leaves_delivery_unacknowledged() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |order: OrderCreated| {
            Err(BillingRejected { id: order.id })
        })
        .unwrap();
    let (listener, transport) = start(builder).await;
    transport.fail_next_publishes(1);

    deliver(&transport, "orders.created", OrderCreated::body(9));
    listener.stop().await.unwrap();

    assert!(transport.published().is_empty());
    assert!(transport.acknowledged().is_empty());
    let stats = listener.stats();
    assert_eq!(stats.republish_failures, 1);
    assert_eq!(stats.retried, 0);
}

#[tokio::test]
async fn test_retry_preserves_unrelated_headers() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |order: OrderCreated| {
            Err(BillingRejected { id: order.id })
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    let mut headers = Headers::new();
    headers.insert("x-correlation-id".to_string(), HeaderValue::from("c-42"));
    transport
        .deliver(QUEUE, "orders.created", headers, OrderCreated::body(10))
        .unwrap();

    assert!(transport.wait_for_acks(1, WAIT).await);
    listener.stop().await.unwrap();

    let published = transport.published();
    assert_eq!(
        published[0].headers.get("x-correlation-id"),
        Some(&HeaderValue::from("c-42"))
    );
}

#[tokio::test]
async fn test_fanout_publication_reaches_type_handler() {
    let calls = Calls::default();
    let seen = calls.clone();
    let mut builder = builder();
    builder
        .handle_fanout(move |order: OrderCreated| {
            let seen = seen.clone();
            async move {
                assert_eq!(order.id, 11);
                seen.hit();
                Ok::<_, BillingRejected>(())
            }
        })
        .unwrap();
    let (listener, transport) = start(builder).await;
    assert_eq!(transport.bound_keys(QUEUE), vec![String::new()]);

    // Publish through the publisher, then play the broker's part
    let publisher = TopicPublisher::new(transport.clone(), EXCHANGE);
    publisher
        .publish_fanout(&OrderCreated {
            id: 11,
            region: "us".to_string(),
        })
        .await
        .unwrap();
    let published = transport.published()[0].clone();
    transport
        .deliver(QUEUE, &published.routing_key, published.headers, published.body)
        .unwrap();

    assert!(transport.wait_for_acks(1, WAIT).await);
    listener.stop().await.unwrap();
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn test_failed_acknowledge_is_counted_and_left_with_broker() {
    let calls = Calls::default();
    let seen = calls.clone();
    let mut builder = builder();
    builder
        .handle_sync("orders.created", move |_: OrderCreated| {
            seen.hit();
            Ok::<_, BillingRejected>(())
        })
        .unwrap();
    let (listener, transport) = start(builder).await;
    transport.set_fail_acks(true);

    deliver(&transport, "orders.created", OrderCreated::body(15));
    assert!(listener.engine().drain(WAIT).await);

    assert_eq!(calls.count(), 1);
    assert!(transport.acknowledged().is_empty());
    assert!(transport.published().is_empty());
    let stats = listener.stats();
    assert_eq!(stats.ack_failures, 1);
    assert_eq!(stats.handled, 0);

    listener.stop().await.unwrap();
}

#[tokio::test]
async fn test_erased_handler_errors_report_concrete_kind() {
    let mut builder = builder();
    builder
        .handle_sync("orders.created", |_: OrderCreated| {
            Err::<(), BoxError>(Box::new(std::io::Error::other("ledger unavailable")))
        })
        .unwrap()
        .handle_sync("orders.refunded", |order: OrderCreated| {
            Err::<(), _>(HandlerFailure::new(
                "billing.refund_rejected",
                anyhow::anyhow!("refund of order {} rejected", order.id),
            ))
        })
        .unwrap();
    let (listener, transport) = start(builder).await;

    deliver(&transport, "orders.created", OrderCreated::body(16));
    assert!(transport.wait_for_publishes(1, WAIT).await);
    deliver(&transport, "orders.refunded", OrderCreated::body(17));
    assert!(transport.wait_for_publishes(2, WAIT).await);

    assert!(transport.wait_for_acks(2, WAIT).await);
    listener.stop().await.unwrap();

    let published = transport.published();
    let boxed = RetryMetadata::read(&published[0].headers).unwrap();
    assert_eq!(boxed.exception_type, std::any::type_name::<std::io::Error>());
    assert_eq!(boxed.exception_message, "ledger unavailable");

    let explicit = RetryMetadata::read(&published[1].headers).unwrap();
    assert_eq!(explicit.exception_type, "billing.refund_rejected");
    assert_eq!(explicit.exception_message, "refund of order 17 rejected");
}
