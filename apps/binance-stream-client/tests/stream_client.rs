//! Stream Client Integration Tests
//!
//! Subscribe/unsubscribe behaviour against an in-memory transport.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use mockall::mock;
use parking_lot::Mutex;

use binance_stream_client::application::ports::{ConnectionFactory, Transport, TransportError};
use binance_stream_client::{
    KlineEvent, KlineInterval, OrderSide, ProtocolOptions, StreamClient, StreamClientConfig,
    StreamClientError, StreamKind,
};

use common::{
    ACCOUNT, BASE, ConnectBehavior, DEPTH, KLINE, LISTEN_KEY, ORDER, TRADE, client, count, counter,
};

// =============================================================================
// Market Streams
// =============================================================================

#[tokio::test]
async fn subscribe_returns_strictly_increasing_ids() {
    let (client, _factory) = client();

    let mut ids = Vec::new();
    for symbol in ["BTCUSDT", "ETHUSDT", "BNBBTC", "LTCBTC", "XRPUSDT"] {
        ids.push(client.subscribe_depth(symbol, |_| {}).await.unwrap());
        ids.push(client.subscribe_trades(symbol, |_| {}).await.unwrap());
    }

    assert_eq!(ids.first(), Some(&1));
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(client.active_streams().len(), 10);
}

#[tokio::test]
async fn kline_address_and_delivery() {
    let (client, factory) = client();
    let received = Arc::new(Mutex::new(Vec::<KlineEvent>::new()));
    let sink = Arc::clone(&received);

    let id = client
        .subscribe_kline("BTCUSDT", KlineInterval::OneMinute, move |event| {
            sink.lock().push(event);
        })
        .await
        .unwrap();

    let transport = factory.last();
    assert!(transport.url().ends_with("btcusdt@kline_1m"));
    assert_eq!(transport.url(), format!("{BASE}btcusdt@kline_1m"));

    transport.deliver(KLINE);

    let events = received.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].symbol, "BTCUSDT");
    assert_eq!(events[0].kline.interval, KlineInterval::OneMinute);

    let info = client.active_streams();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].stream_id, id);
    assert_eq!(info[0].kind, StreamKind::Kline(KlineInterval::OneMinute));
    assert!(!info[0].is_user_stream);
}

#[tokio::test]
async fn depth_and_trade_addresses() {
    let (client, factory) = client();

    client.subscribe_depth("BNBBTC", |_| {}).await.unwrap();
    client.subscribe_trades("BNBBTC", |_| {}).await.unwrap();

    let urls: Vec<String> = factory
        .transports()
        .iter()
        .map(|t| t.url().to_string())
        .collect();
    assert_eq!(
        urls,
        vec![format!("{BASE}bnbbtc@depth"), format!("{BASE}bnbbtc@aggTrade")]
    );
}

#[tokio::test]
async fn undecodable_payloads_are_dropped() {
    let (client, factory) = client();
    let (calls, handle) = counter();

    client
        .subscribe_trades("BNBBTC", move |_| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    let transport = factory.last();
    transport.deliver("not json");
    transport.deliver(DEPTH);
    transport.deliver("");
    assert_eq!(count(&calls), 0);

    // Dispatch survives bad payloads
    transport.deliver(TRADE);
    assert_eq!(count(&calls), 1);
}

#[tokio::test]
async fn protocol_options_are_applied_to_every_connection() {
    let factory = common::MockFactory::new();
    let options = ProtocolOptions {
        max_message_size: Some(1 << 20),
        max_frame_size: Some(1 << 16),
    };
    let client = StreamClient::new(
        StreamClientConfig::new(BASE).with_protocol_options(options),
        factory.clone(),
    );

    client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    assert!(factory.transports().iter().all(|t| t.options() == options));
}

#[tokio::test]
async fn transport_error_does_not_remove_stream() {
    let (client, factory) = client();

    client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    factory
        .last()
        .fire_error(&TransportError::Connect("reset".to_string()));

    assert_eq!(client.active_streams().len(), 1);
}

// =============================================================================
// Connection Failures
// =============================================================================

#[tokio::test]
async fn connect_failure_is_reported_and_not_registered() {
    let (client, factory) = client();
    factory.set_behavior(ConnectBehavior::Fail);

    let err = client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap_err();

    match err {
        StreamClientError::ConnectionFailed { address, source } => {
            assert_eq!(address, format!("{BASE}btcusdt@depth"));
            assert!(matches!(source, TransportError::Connect(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(client.active_streams().is_empty());
}

#[tokio::test]
async fn close_during_connect_is_purged() {
    let (client, factory) = client();
    factory.set_behavior(ConnectBehavior::CloseDuringConnect);

    let id = client.subscribe_trades("BTCUSDT", |_| {}).await.unwrap();

    assert!(id >= 1);
    assert!(client.active_streams().is_empty());
}

mock! {
    pub Factory {}

    impl ConnectionFactory for Factory {
        fn create(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError>;
    }
}

#[tokio::test]
async fn factory_failure_becomes_connection_failed() {
    let mut factory = MockFactory::new();
    factory.expect_create().times(1).returning(|address| {
        Err(TransportError::InvalidAddress {
            address: address.to_string(),
            reason: "rejected".to_string(),
        })
    });
    let client = StreamClient::new(StreamClientConfig::new(BASE), Arc::new(factory));

    let result = client.subscribe_kline("BTCUSDT", KlineInterval::OneHour, |_| {}).await;

    assert!(matches!(
        result,
        Err(StreamClientError::ConnectionFailed {
            source: TransportError::InvalidAddress { .. },
            ..
        })
    ));
    assert!(client.active_streams().is_empty());
}

// =============================================================================
// User Data Stream
// =============================================================================

#[tokio::test]
async fn account_then_order_share_one_connection() {
    let (client, factory) = client();

    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    assert_eq!(factory.created(), 1);
    assert_eq!(factory.by_url(&format!("{BASE}{LISTEN_KEY}")).len(), 1);
    assert!(client.has_user_stream());

    let streams = client.active_streams();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].is_user_stream);
    assert_eq!(streams[0].kind, StreamKind::UserData);
}

#[tokio::test]
async fn order_then_account_share_one_connection() {
    let (client, factory) = client();

    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn concurrent_user_subscriptions_open_one_connection() {
    let (client, factory) = client();

    let (account, order) = tokio::join!(
        client.subscribe_account_updates(LISTEN_KEY, |_| {}),
        client.subscribe_order_updates(LISTEN_KEY, |_| {}),
    );
    account.unwrap();
    order.unwrap();

    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn second_listen_key_is_ignored() {
    let (client, factory) = client();

    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    client
        .subscribe_order_updates("another-key", |_| {})
        .await
        .unwrap();

    assert_eq!(factory.created(), 1);
    assert_eq!(factory.last().url(), format!("{BASE}{LISTEN_KEY}"));
}

#[tokio::test]
async fn blank_listen_key_is_rejected() {
    let (client, factory) = client();

    let result = client.subscribe_account_updates("  ", |_| {}).await;
    assert!(matches!(result, Err(StreamClientError::MissingListenKey)));

    let result = client.subscribe_order_updates("", |_| {}).await;
    assert!(matches!(result, Err(StreamClientError::MissingListenKey)));

    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn user_stream_routes_by_marker() {
    let (client, factory) = client();
    let (accounts, account_handle) = counter();
    let orders = Arc::new(Mutex::new(Vec::new()));
    let order_sink = Arc::clone(&orders);

    client
        .subscribe_account_updates(LISTEN_KEY, move |event| {
            assert_eq!(event.balances[0].asset, "LTC");
            account_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    client
        .subscribe_order_updates(LISTEN_KEY, move |event| {
            order_sink.lock().push((event.order_id, event.side));
        })
        .await
        .unwrap();

    let transport = factory.last();
    transport.deliver(ACCOUNT);
    transport.deliver(ORDER);
    transport.deliver(TRADE);

    assert_eq!(count(&accounts), 1);
    assert_eq!(*orders.lock(), vec![(4_293_153, OrderSide::Buy)]);
}

#[tokio::test]
async fn unsubscribing_one_user_handler_keeps_connection() {
    let (client, factory) = client();
    let (accounts, account_handle) = counter();
    let (orders, order_handle) = counter();

    client
        .subscribe_account_updates(LISTEN_KEY, move |_| {
            account_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    client
        .subscribe_order_updates(LISTEN_KEY, move |_| {
            order_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    client.unsubscribe_account_updates();

    let transport = factory.last();
    assert_eq!(transport.close_calls(), 0);
    assert!(client.has_user_stream());

    transport.deliver(ACCOUNT);
    transport.deliver(ORDER);
    assert_eq!(count(&accounts), 0);
    assert_eq!(count(&orders), 1);
}

#[tokio::test]
async fn unsubscribing_both_user_handlers_closes_once() {
    let (client, factory) = client();

    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    client.unsubscribe_order_updates();
    client.unsubscribe_account_updates();
    // Already unsubscribed
    client.unsubscribe_account_updates();
    client.unsubscribe_order_updates();

    assert_eq!(factory.last().close_calls(), 1);
    assert!(!client.has_user_stream());
    assert!(client.active_streams().is_empty());
}

#[tokio::test]
async fn unsubscribe_user_handler_without_stream_is_noop() {
    let (client, factory) = client();

    client.unsubscribe_account_updates();
    client.unsubscribe_order_updates();

    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn failed_user_stream_open_rolls_back_handler() {
    let (client, factory) = client();
    let (accounts, account_handle) = counter();

    factory.set_behavior(ConnectBehavior::Fail);
    let result = client
        .subscribe_account_updates(LISTEN_KEY, move |_| {
            account_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert!(matches!(
        result,
        Err(StreamClientError::ConnectionFailed { .. })
    ));

    factory.set_behavior(ConnectBehavior::Succeed);
    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    factory.last().deliver(ACCOUNT);
    assert_eq!(count(&accounts), 0);
}

#[tokio::test]
async fn user_stream_reopens_after_server_close() {
    let (client, factory) = client();

    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    factory.last().fire_close();
    assert!(!client.has_user_stream());

    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    assert_eq!(factory.created(), 2);
    assert!(client.has_user_stream());
}

#[tokio::test]
async fn draining_user_stream_is_replaced_not_duplicated() {
    let (client, factory) = client();
    factory.set_deferred_close(true);

    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();
    let draining = factory.last();

    client.unsubscribe_account_updates();
    assert!(draining.is_closed());
    assert!(!client.has_user_stream());

    client
        .subscribe_order_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    let user_streams: Vec<_> = client
        .active_streams()
        .into_iter()
        .filter(|info| info.is_user_stream)
        .map(|info| info.stream_id)
        .collect();
    assert_eq!(user_streams, vec![2]);

    // The old connection finishes draining
    draining.fire_close();

    assert!(client.has_user_stream());
    assert_eq!(client.active_streams().len(), 1);
    assert_eq!(factory.last().close_calls(), 0);
}

// =============================================================================
// Unsubscribe and Teardown
// =============================================================================

#[tokio::test]
async fn unsubscribe_closes_only_that_stream() {
    let (client, factory) = client();

    let depth = client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    let trades = client.subscribe_trades("BTCUSDT", |_| {}).await.unwrap();

    client.unsubscribe(depth);

    let transports = factory.transports();
    assert_eq!(transports[0].close_calls(), 1);
    assert_eq!(transports[1].close_calls(), 0);

    let remaining: Vec<_> = client
        .active_streams()
        .iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(remaining, vec![trades]);
}

#[tokio::test]
async fn unsubscribe_unknown_or_removed_id_is_noop() {
    let (client, factory) = client();

    let id = client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();

    client.unsubscribe(999);
    client.unsubscribe(id);
    client.unsubscribe(id);

    assert_eq!(factory.last().close_calls(), 1);
    assert!(client.active_streams().is_empty());
}

#[tokio::test]
async fn double_close_notification_removes_once() {
    let (client, factory) = client();

    client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    client.subscribe_trades("BTCUSDT", |_| {}).await.unwrap();

    let transports = factory.transports();
    let first = &transports[0];
    first.fire_close();
    first.fire_close();

    let streams = client.active_streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].kind, StreamKind::Trades);
}

#[tokio::test]
async fn unsubscribe_all_silences_every_handler() {
    let (client, factory) = client();
    let (calls, handle) = counter();

    let kline_handle = Arc::clone(&handle);
    client
        .subscribe_kline("BTCUSDT", KlineInterval::OneMinute, move |_| {
            kline_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    let account_handle = Arc::clone(&handle);
    client
        .subscribe_account_updates(LISTEN_KEY, move |_| {
            account_handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    client
        .subscribe_order_updates(LISTEN_KEY, move |_| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    client.unsubscribe_all();

    assert!(client.active_streams().is_empty());
    assert!(!client.has_user_stream());

    let transports = factory.transports();
    transports[0].deliver(KLINE);
    // Even a transport that keeps delivering reaches no user handler
    transports[1].force_deliver(ACCOUNT);
    transports[1].force_deliver(ORDER);

    assert_eq!(count(&calls), 0);
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (client, factory) = client();

    client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    client
        .subscribe_account_updates(LISTEN_KEY, |_| {})
        .await
        .unwrap();

    client.shutdown();
    client.shutdown();

    assert!(client.active_streams().is_empty());
    assert!(factory.transports().iter().all(|t| t.close_calls() == 1));
}

#[tokio::test]
async fn drop_closes_every_connection() {
    let (client, factory) = client();

    client.subscribe_depth("BTCUSDT", |_| {}).await.unwrap();
    client.subscribe_trades("ETHUSDT", |_| {}).await.unwrap();

    drop(client);

    assert!(factory.transports().iter().all(|t| t.is_closed()));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribes_keep_registry_consistent() {
    let (client, _factory) = client();
    let client = Arc::new(client);

    let mut tasks = Vec::new();
    for i in 0..32 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let symbol = format!("SYM{i}USDT");
            let id = client.subscribe_depth(&symbol, |_| {}).await.unwrap();
            (symbol, id)
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    let ids: HashSet<_> = results.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids.len(), 32);

    let streams = client.active_streams();
    assert_eq!(streams.len(), 32);
    for (symbol, id) in &results {
        let info = streams.iter().find(|s| s.stream_id == *id).unwrap();
        assert_eq!(
            info.url,
            format!("{BASE}{}@depth", symbol.to_lowercase())
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribe_and_unsubscribe() {
    let (client, _factory) = client();
    let client = Arc::new(client);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let keep = client
                .subscribe_trades(&format!("KEEP{i}"), |_| {})
                .await
                .unwrap();
            let dropped = client
                .subscribe_trades(&format!("DROP{i}"), |_| {})
                .await
                .unwrap();
            client.unsubscribe(dropped);
            keep
        }));
    }

    let mut kept = HashSet::new();
    for task in tasks {
        kept.insert(task.await.unwrap());
    }

    let remaining: HashSet<_> = client
        .active_streams()
        .iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(remaining, kept);
}
