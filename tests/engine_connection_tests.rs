use packetflow::core::{InformationPacket, Inputs, Outputs};
use packetflow::engine::{Component, ComponentStatus, Connection};
use packetflow::error::ConnectionError;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::task::LocalSet;
use tokio::time::{sleep, Duration};

type Seen = Rc<RefCell<Vec<(Value, usize)>>>;

/// Sink reading one packet per execution, recording what is still pending.
fn one_at_a_time(name: &str) -> (Rc<Component>, Seen) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let component = Component::local(name, move |input: &Inputs, _: &Outputs| {
        if let Some(ip) = input.port("in").and_then(|p| p.read()) {
            log.borrow_mut().push((ip.into_data(), input.pending("in")));
        }
    });
    (component, seen)
}

fn packet(data: Value) -> InformationPacket {
    InformationPacket::new(data)
}

#[test]
fn test_pending_count_tracks_puts_and_gets() {
    let conn = Connection::plain();
    for i in 0..3 {
        conn.put_data(packet(json!(i))).unwrap();
    }
    assert_eq!(conn.pending_count(), 3);
    assert!(conn.has_data());

    assert_eq!(conn.get_data().unwrap().into_data(), json!(0));
    assert_eq!(conn.pending_count(), 2);
    assert_eq!(conn.all_data().len(), 2);

    conn.close();
    assert_eq!(conn.pending_count(), 0);
    assert!(conn.get_data().is_none());
}

#[test]
fn test_closed_connection_rejects_puts() {
    let conn = Connection::plain();
    conn.close();
    conn.close();

    assert_eq!(conn.put_data(packet(json!(1))), Err(ConnectionError::Closed));
    assert_eq!(conn.pending_count(), 0);
}

#[test]
fn test_sentinel_waits_for_drain() {
    let conn = Connection::plain();
    conn.put_data(packet(json!("last"))).unwrap();
    conn.end_of_stream(None);
    assert!(!conn.is_closed());

    assert_eq!(conn.get_data().unwrap().into_data(), json!("last"));
    assert!(conn.is_closed());
}

#[test]
fn test_sentinel_on_empty_closes_immediately() {
    let conn = Connection::plain();
    conn.end_of_stream(None);
    assert!(conn.is_closed());
}

#[test]
fn test_fan_in_closes_after_every_producer_ends() {
    let conn = Connection::plain();
    let first = Component::local("first", |_: &Inputs, _: &Outputs| {});
    let second = Component::local("second", |_: &Inputs, _: &Outputs| {});
    first.add_output("out", conn.clone());
    second.add_output("out", conn.clone());

    first.outputs().port("out").unwrap().close();
    assert!(!conn.is_closed());
    second.outputs().port("out").unwrap().close();
    assert!(conn.is_closed());
}

#[test]
fn test_initial_connection_is_single_shot() {
    let conn = Connection::initial();
    conn.put_data(packet(json!({"length": 3}))).unwrap();
    assert!(conn.is_initial());

    assert_eq!(conn.get_data().unwrap().into_data(), json!({"length": 3}));
    assert!(conn.is_closed());
    assert!(conn.get_data().is_none());
}

#[test]
fn test_dequeue_assigns_owner() {
    let conn = Connection::plain();
    let consumer = Component::local("consumer", |_: &Inputs, _: &Outputs| {});
    consumer.add_input("in", conn.clone());

    let sent = packet(json!(1)).with_owner(None);
    conn.put_data(sent).unwrap();
    let ip = consumer.inputs().port("in").unwrap().read().unwrap();
    assert_eq!(ip.owner(), Some(consumer.id()));
}

#[tokio::test]
async fn test_capacity_gates_activation() {
    LocalSet::new()
        .run_until(async {
            let producer = Component::local("producer", |_: &Inputs, _: &Outputs| {});
            let (consumer, seen) = one_at_a_time("consumer");
            let conn = Connection::buffered(3, None);
            producer.add_output("out", conn.clone());
            consumer.add_input("in", conn.clone());
            let out = producer.outputs().port("out").unwrap();

            assert!(out.send(json!(0)));
            assert_eq!(consumer.status(), ComponentStatus::ReadyToExecute);
            assert!(out.send(json!(1)));
            assert!(seen.borrow().is_empty());

            assert!(out.send(json!(2)));
            assert_eq!(consumer.status(), ComponentStatus::Active);
            assert_eq!(
                *seen.borrow(),
                vec![(json!(0), 2), (json!(1), 1), (json!(2), 0)]
            );

            // once active every arrival is consumed right away
            assert!(out.send(json!(3)));
            assert_eq!(seen.borrow().last(), Some(&(json!(3), 0)));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_closes_without_delivering() {
    LocalSet::new()
        .run_until(async {
            let producer = Component::local("producer", |_: &Inputs, _: &Outputs| {});
            let (consumer, seen) = one_at_a_time("consumer");
            let conn = Connection::buffered(5, Some(Duration::from_millis(100)));
            producer.add_output("out", conn.clone());
            consumer.add_input("in", conn.clone());
            let out = producer.outputs().port("out").unwrap();

            out.send(json!(0));
            out.send(json!(1));
            sleep(Duration::from_millis(60)).await;
            out.send(json!(2));

            // the third arrival restarted the idle window
            sleep(Duration::from_millis(60)).await;
            assert!(!conn.is_closed());
            assert_eq!(conn.pending_count(), 3);

            sleep(Duration::from_millis(60)).await;
            assert!(conn.is_closed());
            assert_eq!(conn.pending_count(), 0);
            assert!(seen.borrow().is_empty());
            assert_eq!(consumer.status(), ComponentStatus::Done);
            assert!(!out.send(json!(3)));
        })
        .await;
}

#[tokio::test]
async fn test_close_lets_consumer_finish() {
    LocalSet::new()
        .run_until(async {
            let producer = Component::local("producer", |_: &Inputs, _: &Outputs| {});
            let (consumer, seen) = one_at_a_time("consumer");
            let conn = Connection::buffered(0, None);
            producer.add_output("out", conn.clone());
            consumer.add_input("in", conn.clone());
            let out = producer.outputs().port("out").unwrap();

            out.send(json!("a"));
            out.close();

            assert_eq!(seen.borrow().len(), 1);
            assert!(conn.is_closed());
            // a sink with all inputs closed is done at once
            assert_eq!(consumer.status(), ComponentStatus::Done);
        })
        .await;
}

#[tokio::test]
async fn test_repeated_close_from_one_producer_counts_once() {
    LocalSet::new()
        .run_until(async {
            let first = Component::local("first", |_: &Inputs, _: &Outputs| {});
            let second = Component::local("second", |_: &Inputs, _: &Outputs| {});
            let (consumer, seen) = one_at_a_time("consumer");
            let conn = Connection::buffered(0, None);
            first.add_output("out", conn.clone());
            second.add_output("out", conn.clone());
            consumer.add_input("in", conn.clone());

            assert!(first.outputs().send(json!(1)));
            first.outputs().close();
            first.outputs().close();
            // the second producer is still live
            assert!(!conn.is_closed());

            assert!(second.outputs().send(json!(2)));
            second.outputs().close();

            let values: Vec<Value> = seen.borrow().iter().map(|(v, _)| v.clone()).collect();
            assert_eq!(values, vec![json!(1), json!(2)]);
            assert!(conn.is_closed());
        })
        .await;
}
