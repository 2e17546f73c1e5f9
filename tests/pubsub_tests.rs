use cachegrid_backend::pubsub::PubSubBroker;

#[tokio::test]
async fn test_fanout_counts_channel_and_pattern_subscribers() {
    let broker = PubSubBroker::new();

    let (_s1, mut rx1) = broker.subscribe(vec!["orders".into()], vec![]);
    let (_s2, mut rx2) = broker.subscribe(vec![], vec!["ord*".into()]);

    assert_eq!(broker.publish("orders", "x", None), 2);

    assert_eq!(rx1.recv().await.unwrap().message, "x");
    assert_eq!(rx2.recv().await.unwrap().message, "x");
}

#[tokio::test]
async fn test_pattern_does_not_match_unrelated_channels() {
    let broker = PubSubBroker::new();
    let (_id, mut rx) = broker.subscribe(vec![], vec!["ord*".into()]);

    assert_eq!(broker.publish("users", "m", None), 0);
    assert_eq!(broker.publish("orders", "m", None), 1);
    assert_eq!(rx.recv().await.unwrap().channel, "orders");
}

#[tokio::test]
async fn test_publisher_order_is_preserved_per_subscriber() {
    let broker = PubSubBroker::new();
    let (_id, mut rx) = broker.subscribe(vec!["seq".into()], vec![]);

    for i in 0..10 {
        broker.publish("seq", &format!("m{i}"), Some("pub-1".into()));
    }
    for i in 0..10 {
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.message, format!("m{i}"));
    }
}

#[tokio::test]
async fn test_subscriber_on_both_tables_counts_twice() {
    // An id subscribed to the exact channel and a matching pattern gets the
    // message through both routes, mirroring Redis semantics.
    let broker = PubSubBroker::new();
    let (_id, mut rx) = broker.subscribe(vec!["orders".into()], vec!["ord*".into()]);

    assert_eq!(broker.publish("orders", "x", None), 2);
    assert_eq!(rx.recv().await.unwrap().message, "x");
    assert_eq!(rx.recv().await.unwrap().message, "x");
}

#[tokio::test]
async fn test_disconnect_cleans_all_tables() {
    let broker = PubSubBroker::new();
    let (id, rx) = broker.subscribe(vec!["a".into(), "b".into()], vec!["c*".into()]);

    drop(rx);
    broker.unsubscribe(id);

    assert!(broker.channels(None).is_empty());
    assert_eq!(broker.num_pat(), 0);
    assert_eq!(broker.publish("a", "m", None), 0);
}
