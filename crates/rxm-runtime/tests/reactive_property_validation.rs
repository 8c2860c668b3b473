//! Validation behavior of `ReactiveProperty`: plain validators, stream
//! validators and the error channels.

use std::sync::{Arc, Mutex};

use rxm_core::{
    BoxObservable, Error, Observable, ObservableExt, QueueScheduler, Subscription,
};
use rxm_runtime::{PropertyEvent, Reactive, ReactiveProperty, ReactivePropertyOptions};

fn record<T: Clone + Send + 'static>(
    source: &impl Observable<T>,
) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let sub = source.subscribe_next(move |v: &T| s.lock().unwrap().push(v.clone()));
    (seen, sub)
}

fn required(value: &String) -> Option<String> {
    value.is_empty().then(|| "name is required".to_owned())
}

fn short(value: &String) -> Option<String> {
    (value.len() > 8).then(|| "name is too long".to_owned())
}

#[test]
fn initial_value_is_checked_unless_ignored() {
    let checked = ReactiveProperty::new(String::new());
    checked.add_validation_error(required, false).unwrap();
    assert!(checked.has_errors());
    assert_eq!(checked.error_message().as_deref(), Some("name is required"));

    let ignored = ReactiveProperty::new(String::new());
    ignored.add_validation_error(required, true).unwrap();
    assert!(!ignored.has_errors());

    ignored.set_value("x".to_owned()).unwrap();
    ignored.set_value(String::new()).unwrap();
    assert!(ignored.has_errors());
}

#[test]
fn errors_follow_validator_registration_order() {
    let name = ReactiveProperty::new("ok".to_owned());
    name.add_validation_error(short, false).unwrap();
    name.add_validation_error(|v: &String| v.contains(' ').then(|| "no spaces".to_owned()), false)
        .unwrap();

    name.set_value("far too long name".to_owned()).unwrap();
    assert_eq!(name.errors(), vec!["name is too long", "no spaces"]);
    assert_eq!(name.error_message().as_deref(), Some("name is too long"));

    name.set_value("fine".to_owned()).unwrap();
    assert!(name.errors().is_empty());
    assert_eq!(name.error_message(), None);
}

#[test]
fn error_channel_emits_only_on_change() {
    let name = ReactiveProperty::new("ok".to_owned());
    name.add_validation_error(required, false).unwrap();
    let (changes, _sub) = record(&name.observe_error_changed());

    name.set_value(String::new()).unwrap();
    name.refresh().unwrap();
    name.set_value("back".to_owned()).unwrap();
    name.set_value("again".to_owned()).unwrap();

    assert_eq!(
        *changes.lock().unwrap(),
        vec![
            Vec::<String>::new(),
            vec!["name is required".to_owned()],
            Vec::new(),
        ]
    );
}

#[test]
fn has_errors_and_message_channels() {
    let name = ReactiveProperty::new("ok".to_owned());
    name.add_validation_error(required, false).unwrap();
    name.add_validation_error(short, false).unwrap();
    let (flags, _a) = record(&name.observe_has_errors());
    let (messages, _b) = record(&name.observe_validation_errors());

    name.set_value(String::new()).unwrap();
    name.set_value("much too long".to_owned()).unwrap();
    name.set_value("ok".to_owned()).unwrap();

    assert_eq!(*flags.lock().unwrap(), vec![false, true, false]);
    assert_eq!(
        *messages.lock().unwrap(),
        vec![
            None,
            Some("name is required".to_owned()),
            Some("name is too long".to_owned()),
            None,
        ]
    );
}

#[test]
fn property_events_announce_value_and_error_changes() {
    let name = ReactiveProperty::new("ok".to_owned());
    name.add_validation_error(required, false).unwrap();
    let (events, _sub) = record(&name.property_changed());

    name.set_value(String::new()).unwrap();
    name.set_value("x".to_owned()).unwrap();
    name.set_value("y".to_owned()).unwrap();

    let names: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e: &PropertyEvent| e.property_name().unwrap_or("*").to_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "value",
            "has_errors",
            "error_message",
            "value",
            "has_errors",
            "error_message",
            "value",
        ]
    );
}

#[test]
fn delayed_property_events_coalesce() {
    let name = ReactiveProperty::new(0);
    let (events, _sub) = record(&name.property_changed());

    let guard = name.delay_change_notifications();
    for v in 1..=5 {
        name.set_value(v).unwrap();
    }
    guard.release().unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(name.value(), 5);
}

// ---------------------------------------------------------------------------
// Stream validators
// ---------------------------------------------------------------------------

#[test]
fn stream_validator_sees_current_value_and_updates() {
    let age = ReactiveProperty::new(-1_i32);
    age.add_stream_validation(|values: BoxObservable<i32>| {
        values
            .map(|v: &i32| (*v < 0).then(|| "age must not be negative".to_owned()))
            .boxed()
    });
    assert_eq!(age.errors(), vec!["age must not be negative"]);

    age.set_value(30).unwrap();
    assert!(!age.has_errors());
}

#[test]
fn stream_and_plain_errors_combine() {
    let age = ReactiveProperty::new(200_i32);
    age.add_validation_error(|v: &i32| (*v > 150).then(|| "too old".to_owned()), false)
        .unwrap();
    age.add_stream_validation(|values| {
        values
            .map(|v: &i32| (v % 2 != 0).then(|| "must be even".to_owned()))
            .boxed()
    });

    age.set_value(201).unwrap();
    assert_eq!(age.errors(), vec!["too old", "must be even"]);
}

#[test]
fn scheduled_stream_validator_reports_after_drain() {
    let queue = Arc::new(QueueScheduler::new());
    let name = ReactiveProperty::new("ok".to_owned());
    let scheduler = queue.clone();
    name.add_stream_validation(move |values| {
        values
            .observe_on(scheduler)
            .map(|v: &String| required(v))
            .boxed()
    });
    queue.run_pending();
    assert!(!name.has_errors());

    name.set_value(String::new()).unwrap();
    assert!(!name.has_errors());
    queue.run_pending();
    assert!(name.has_errors());
}

// ---------------------------------------------------------------------------
// Options and lifecycle
// ---------------------------------------------------------------------------

#[test]
fn allow_duplicates_re_validates_equal_values() {
    let calls = Arc::new(Mutex::new(0));
    let c = Arc::clone(&calls);
    let prop = ReactiveProperty::with_options(
        1,
        ReactivePropertyOptions {
            allow_duplicate_values: true,
            ..ReactivePropertyOptions::default()
        },
    );
    prop.add_validation_error(
        move |_: &i32| {
            *c.lock().unwrap() += 1;
            None
        },
        true,
    )
    .unwrap();

    prop.set_value(1).unwrap();
    prop.set_value(1).unwrap();
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[test]
fn dispose_completes_every_channel() {
    let prop = ReactiveProperty::new(1);
    let completed = Arc::new(Mutex::new(0));
    let mut subscriptions = Vec::new();
    for source in [prop.clone().boxed(), prop.observe_has_errors().map(|_: &bool| 0).boxed()] {
        let c = Arc::clone(&completed);
        let observer = rxm_core::FnObserver::new(|_: &i32| Ok::<(), Error>(())).with_completed(
            move || {
                *c.lock().unwrap() += 1;
                Ok::<(), Error>(())
            },
        );
        subscriptions.push(source.subscribe(Arc::new(observer)));
    }

    prop.dispose();
    prop.dispose();

    assert!(prop.is_disposed());
    assert_eq!(*completed.lock().unwrap(), 2);
    assert!(matches!(prop.set_value(2), Err(Error::Disposed)));
}

#[test]
fn default_property_holds_default_value() {
    let prop = ReactiveProperty::<String>::default();
    assert_eq!(prop.value(), "");
    assert!(!prop.has_errors());
}
