// Tests for dnnop-core: event signaling across threads, blob sharing, operator state

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dnnop_core::{
    Argument, DeviceOption, DeviceType, Error, Event, EventStatus, OperatorBase, OperatorDef,
    Workspace,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Events

#[test]
fn test_waiters_released_by_failure() {
    init_tracing();
    let event = Arc::new(Event::new(&DeviceOption::mkldnn()));
    event.record(DeviceType::Mkldnn, None).unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let ev = Arc::clone(&event);
            thread::spawn(move || {
                ev.wait().unwrap();
                ev.query().unwrap()
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(10));
    event.set_finished(Some("upstream broke")).unwrap();

    for w in waiters {
        assert_eq!(w.join().unwrap(), EventStatus::Failed);
    }
    assert_eq!(
        event.error_message().unwrap().as_deref(),
        Some("upstream broke")
    );
}

#[test]
fn test_chain_of_events() {
    init_tracing();
    // Each stage waits for the previous one before finishing its own event.
    let events: Vec<Arc<Event>> = (0..3)
        .map(|_| Arc::new(Event::new(&DeviceOption::mkldnn())))
        .collect();
    for ev in &events {
        ev.record(DeviceType::Mkldnn, None).unwrap();
    }

    let handles: Vec<_> = (1..events.len())
        .map(|i| {
            let prev = Arc::clone(&events[i - 1]);
            let own = Arc::clone(&events[i]);
            thread::spawn(move || {
                prev.wait().unwrap();
                assert!(prev.query().unwrap().is_terminal());
                own.set_finished(None).unwrap();
            })
        })
        .collect();

    events[0].set_finished(None).unwrap();
    for h in handles {
        h.join().unwrap();
    }
    for ev in &events {
        assert_eq!(ev.query().unwrap(), EventStatus::Success);
    }
}

#[test]
fn test_event_lifecycle_across_runs() {
    let event = Event::new(&DeviceOption::mkldnn());
    event.record(DeviceType::Mkldnn, None).unwrap();
    assert!(matches!(
        event.record(DeviceType::Mkldnn, None),
        Err(Error::EventMultipleRecord)
    ));
    event.set_finished(None).unwrap();
    assert!(matches!(
        event.set_finished(Some("late")),
        Err(Error::EventAlreadyFinished {
            status: EventStatus::Success
        })
    ));

    event.reset().unwrap();
    assert_eq!(event.query().unwrap(), EventStatus::Initialized);
    event.record(DeviceType::Mkldnn, Some("bad input")).unwrap();
    assert_eq!(event.query().unwrap(), EventStatus::Failed);
    // Nothing is pending on a failed event.
    event.wait().unwrap();
}

#[test]
fn test_event_ids_are_unique() {
    let a = Event::new(&DeviceOption::cpu());
    let b = Event::new(&DeviceOption::cpu());
    assert_ne!(a.id(), b.id());
    assert_eq!(a.device_type(), DeviceType::Cpu);
}

// Workspace and operator state

#[test]
fn test_operators_share_blobs_through_workspace() {
    let mut ws = Workspace::new();
    ws.create_blob("X").reset(Arc::new(vec![1.0f32, 2.0])).unwrap();

    let producer = OperatorBase::new(
        &OperatorDef::new("Copy").with_input("X").with_output("Y"),
        &mut ws,
    )
    .unwrap();
    let consumer = OperatorBase::new(
        &OperatorDef::new("Sum").with_input("Y").with_output("Z"),
        &mut ws,
    )
    .unwrap();

    let x = producer.input::<Arc<Vec<f32>>>(0).unwrap();
    producer
        .output_blob(0)
        .unwrap()
        .reset(Arc::clone(&x))
        .unwrap();

    let y = consumer.input::<Arc<Vec<f32>>>(0).unwrap();
    assert!(Arc::ptr_eq(&x, &y));
    assert_eq!(ws.blob_names(), vec!["X", "Y", "Z"]);
}

#[test]
fn test_operator_reads_arguments_and_device() {
    let def = OperatorDef::new("Conv")
        .with_name("conv1")
        .with_arg(Argument::int("stride", 2))
        .with_arg(Argument::ints("pads", vec![1, 1, 1, 1]))
        .with_device_option(DeviceOption::mkldnn().with_numa_node(1));
    let mut ws = Workspace::new();
    let op = OperatorBase::new(&def, &mut ws).unwrap();

    assert_eq!(op.device_option().device_type, DeviceType::Mkldnn);
    assert_eq!(op.device_option().numa_node_id, Some(1));
    let kept = op.debug_def().unwrap();
    assert_eq!(kept.get_single_argument::<usize>("stride", 1).unwrap(), 2);
    assert_eq!(kept.get_single_argument::<i32>("group", 1).unwrap(), 1);
    assert_eq!(
        kept.get_repeated_argument::<i64>("pads").unwrap(),
        vec![1, 1, 1, 1]
    );
    assert!(kept.get_single_argument::<f32>("pads", 0.0).is_err());
}
