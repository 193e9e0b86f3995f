use std::sync::{Arc, Mutex};

use aria2_orchestrator::events::EventDispatcher;

#[test]
fn test_all_subscribers_receive_identical_payload() {
    let dispatcher: EventDispatcher<String> = EventDispatcher::new("test");
    let seen = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let seen = Arc::clone(&seen);
        dispatcher.subscribe(move |event: &String| {
            seen.lock().unwrap().push((name, event.clone()));
            Ok(())
        });
    }

    assert_eq!(dispatcher.publish(&"gid-1".to_string()), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("first", "gid-1".to_string()), ("second", "gid-1".to_string())]
    );
}

#[test]
fn test_late_subscriber_misses_earlier_events() {
    let dispatcher: EventDispatcher<u32> = EventDispatcher::new("test");
    dispatcher.publish(&1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    dispatcher.subscribe(move |event| {
        sink.lock().unwrap().push(*event);
        Ok(())
    });
    dispatcher.publish(&2);

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn test_failing_handlers_are_counted_but_isolated() {
    let dispatcher: EventDispatcher<u32> = EventDispatcher::new("test");
    dispatcher.subscribe(|_| Err(anyhow::anyhow!("nope")));
    dispatcher.subscribe(|_| panic!("handler panicked"));

    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    dispatcher.subscribe(move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });

    assert_eq!(dispatcher.publish(&7), 1);
    assert_eq!(dispatcher.publish(&8), 1);
    assert_eq!(*seen.lock().unwrap(), 2);
    assert_eq!(dispatcher.subscriber_count(), 3);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let dispatcher: EventDispatcher<u32> = EventDispatcher::new("test");
    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    let subscription = dispatcher.subscribe(move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });

    dispatcher.publish(&1);
    subscription.unsubscribe();
    dispatcher.publish(&2);

    assert_eq!(*seen.lock().unwrap(), 1);
    assert_eq!(dispatcher.subscriber_count(), 0);
}

#[test]
fn test_handler_may_subscribe_during_publish() {
    let dispatcher = Arc::new(EventDispatcher::<u32>::new("test"));
    let inner = Arc::downgrade(&dispatcher);
    dispatcher.subscribe(move |_| {
        if let Some(dispatcher) = inner.upgrade() {
            dispatcher.subscribe(|_| Ok(()));
        }
        Ok(())
    });

    // 新订阅者从下一次发布开始生效
    assert_eq!(dispatcher.publish(&1), 1);
    assert_eq!(dispatcher.subscriber_count(), 2);
}
