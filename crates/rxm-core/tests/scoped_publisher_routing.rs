//! Routing between live subscribers and the default sink of a
//! `ScopedPublisher`, across the schedulers shipped with the crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rxm_core::{
    CurrentThreadScheduler, Error, ImmediateScheduler, Observable, ObservableExt, Observer,
    QueueScheduler, ScopedPublisher, SharedObserver, observer_fn,
};

fn recording() -> (Arc<Mutex<Vec<String>>>, SharedObserver<String>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    (
        seen,
        observer_fn(move |v: &String| s.lock().unwrap().push(v.clone())),
    )
}

#[test]
fn subscribe_swaps_default_out_and_back_in() {
    let (fallback, sink) = recording();
    let publisher = ScopedPublisher::with_default_sink(ImmediateScheduler::shared(), sink);

    publisher.publish(&"before".to_owned()).unwrap();
    let (live, observer) = recording();
    let sub = publisher.subscribe(observer);
    publisher.publish(&"during".to_owned()).unwrap();
    sub.unsubscribe();
    publisher.publish(&"after".to_owned()).unwrap();

    assert_eq!(*fallback.lock().unwrap(), vec!["before", "after"]);
    assert_eq!(*live.lock().unwrap(), vec!["during"]);
}

#[test]
fn publisher_as_observer_forwards_from_upstream() {
    let upstream = rxm_core::Subject::<String>::new();
    let publisher = ScopedPublisher::<String>::new(ImmediateScheduler::shared());
    let _wire = upstream.subscribe(Arc::new(publisher.clone()));
    let (seen, observer) = recording();
    let _sub = publisher.subscribe(observer);

    upstream.on_next(&"x".to_owned()).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["x"]);
}

#[test]
fn errors_reach_the_active_consumer() {
    let publisher = ScopedPublisher::<String>::new(ImmediateScheduler::shared());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::clone(&failures);
    let observer = rxm_core::FnObserver::new(|_: &String| Ok::<(), Error>(())).with_error(
        move |e: &Error| {
            f.lock().unwrap().push(e.to_string());
            Ok::<(), Error>(())
        },
    );
    let _sub = publisher.subscribe(Arc::new(observer));
    publisher.publish_error(&Error::msg("upstream broke")).unwrap();
    assert_eq!(*failures.lock().unwrap(), vec!["upstream broke"]);
}

#[test]
fn queued_delivery_survives_unsubscribe_of_default() {
    let queue = Arc::new(QueueScheduler::new());
    let (fallback, sink) = recording();
    let publisher = ScopedPublisher::with_default_sink(queue.clone(), sink);
    publisher.publish(&"queued".to_owned()).unwrap();
    let _sub = publisher.subscribe_next(|_| {});
    assert!(fallback.lock().unwrap().is_empty());
    queue.run_pending();
    assert_eq!(*fallback.lock().unwrap(), vec!["queued"]);
}

#[test]
fn trampoline_orders_reentrant_publishes() {
    let publisher = ScopedPublisher::<String>::new(CurrentThreadScheduler::shared());
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = Arc::clone(&order);
    let inner = publisher.clone();
    let _sub = publisher.try_subscribe_next(move |v: &String| {
        o.lock().unwrap().push(format!("start {v}"));
        if v == "outer" {
            inner.publish(&"nested".to_owned())?;
        }
        o.lock().unwrap().push(format!("end {v}"));
        Ok(())
    });
    publisher.publish(&"outer".to_owned()).unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["start outer", "end outer", "start nested", "end nested"]
    );
}

#[test]
fn subscriber_churn_never_leaves_a_publish_unheard() {
    const ITEMS: usize = 2_000;
    let heard = Arc::new(Mutex::new(vec![0_u32; ITEMS]));
    let tally = |heard: &Arc<Mutex<Vec<u32>>>| -> SharedObserver<usize> {
        let h = Arc::clone(heard);
        observer_fn(move |v: &usize| h.lock().unwrap()[*v] += 1)
    };
    let publisher = ScopedPublisher::with_default_sink(ImmediateScheduler::shared(), tally(&heard));
    let stop = Arc::new(AtomicBool::new(false));

    let churn = {
        let publisher = publisher.clone();
        let stop = Arc::clone(&stop);
        let observer = tally(&heard);
        std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                drop(publisher.subscribe(Arc::clone(&observer)));
            }
        })
    };
    for v in 0..ITEMS {
        publisher.publish(&v).unwrap();
    }
    stop.store(true, Ordering::Release);
    churn.join().unwrap();

    let heard = heard.lock().unwrap();
    assert!(heard.iter().all(|n| *n >= 1));
    assert!(publisher.is_default_sink_active());
}
