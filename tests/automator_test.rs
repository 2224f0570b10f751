mod common;

use autochain::device::Point;
use autochain::{Automator, Config, Error, Priority, TaskError, TaskStatus};
use common::{eventually, fixture, gate, FakeDevice, MAIN_DEVICE};
use std::io::Write;
use std::time::Duration;

const LONG: Option<Duration> = Some(Duration::from_secs(5));

#[test]
fn test_status_snapshot() {
    let fx = fixture(2);

    let status = fx.automator.status();
    assert!(!status.running);
    assert!(!status.paused);
    assert_eq!(status.worker_count, 0);
    assert_eq!(status.queue_depth, 0);
    assert_eq!(status.last_error, None);
    assert_eq!(status.active_device.as_deref(), Some(MAIN_DEVICE));
    assert_eq!(status.devices, vec![MAIN_DEVICE.to_string()]);

    fx.automator.start().unwrap();
    fx.automator.pause();
    let status = fx.automator.status();
    assert!(status.running);
    assert!(status.paused);
    assert_eq!(status.worker_count, 2);

    fx.automator.resume();
    fx.automator.stop();
    assert!(!fx.automator.status().running);
}

#[test]
fn test_invalid_priority_is_rejected_before_enqueue() {
    let fx = fixture(1);

    let result = fx
        .automator
        .submit_with_priority(|| Ok::<_, TaskError>(()), 0);
    assert!(matches!(result, Err(Error::InvalidPriority(0))));

    let result = fx
        .automator
        .submit_with_priority(|| Ok::<_, TaskError>(()), 11);
    assert!(matches!(result, Err(Error::InvalidPriority(11))));
    assert_eq!(fx.automator.queue_size(), 0);

    let handle = fx
        .automator
        .submit_with_priority(|| Ok::<_, TaskError>(()), 10)
        .unwrap();
    assert_eq!(handle.priority(), Priority::LOWEST);
    assert_eq!(fx.automator.queue_size(), 1);
}

#[test]
fn test_cancel_and_adjust_through_automator() {
    let fx = fixture(1);
    let handle = fx.automator.submit(|| Ok::<_, TaskError>(()));

    assert!(matches!(
        fx.automator.adjust_task_priority(handle.id(), 42),
        Err(Error::InvalidPriority(42))
    ));
    assert!(fx.automator.adjust_task_priority(handle.id(), 2).unwrap());
    assert_eq!(handle.priority().get(), 2);

    assert!(fx.automator.cancel_task(handle.id()));
    assert!(!fx.automator.cancel_task(handle.id()));
    assert!(!fx.automator.adjust_task_priority(handle.id(), 3).unwrap());
    assert_eq!(fx.automator.stats().cancelled, 1);
}

#[test]
fn test_submitted_failures_reach_last_error() {
    let fx = fixture(1);
    fx.automator.start().unwrap();

    let handle = fx
        .automator
        .submit(|| Err::<(), _>(TaskError::failed("no energy left")));
    assert!(handle.wait(LONG));
    assert!(eventually(Duration::from_secs(2), || {
        fx.automator.last_error().as_deref() == Some("no energy left")
    }));
    assert_eq!(
        fx.automator.status().last_error.as_deref(),
        Some("no energy left")
    );

    fx.automator.clear_last_error();
    assert_eq!(fx.automator.last_error(), None);
}

#[test]
fn test_stop_is_noop_when_not_running() {
    let fx = fixture(1);
    fx.automator.stop();
    assert!(!fx.automator.is_running());

    fx.automator.start().unwrap();
    fx.automator.start().unwrap();
    assert_eq!(fx.automator.worker_count(), 1);
}

#[test]
fn test_drop_cancels_queued_work() {
    let fx = fixture(1);
    let handle = fx.automator.submit(|| Ok::<_, TaskError>(()));
    drop(fx);

    assert!(handle.wait(LONG));
    assert_eq!(handle.status(), TaskStatus::Cancelled);
}

#[test]
fn test_devices_can_be_switched() {
    let fx = fixture(1);
    let second = FakeDevice::new(800, 600);
    fx.automator
        .add_device("fake://second", second.clone())
        .unwrap();
    assert_eq!(
        fx.automator.devices().uris(),
        vec![MAIN_DEVICE.to_string(), "fake://second".to_string()]
    );
    assert!(fx.automator.set_active_device("fake://missing").is_err());

    fx.automator.set_active_device("fake://second").unwrap();
    fx.automator.start().unwrap();

    let chain = fx
        .automator
        .chain()
        .add_click_task((700, 500), Duration::ZERO, None)
        .wait(LONG);
    assert_eq!(chain.result(), Some(Point::new(700, 500)));
    assert_eq!(second.clicks(), vec![Point::new(700, 500)]);
    assert!(fx.device.clicks().is_empty());
}

#[test]
fn test_pause_via_automator_keeps_tasks_queued() {
    let fx = fixture(1);
    let (release, op) = gate();
    fx.automator.start().unwrap();
    let running = fx.automator.submit(op);
    assert!(eventually(Duration::from_secs(2), || {
        running.status() == TaskStatus::Running
    }));

    fx.automator.pause();
    let queued = fx.automator.submit(|| Ok::<_, TaskError>(()));
    release.send(()).unwrap();
    assert!(running.wait(LONG));

    assert!(!queued.wait(Some(Duration::from_millis(100))));
    assert_eq!(fx.automator.queue_size(), 1);

    fx.automator.resume();
    assert!(queued.wait(LONG));
}

#[test]
fn test_config_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "num_workers = 3\nthread_name_prefix = \"bot\"\nstep_wait_timeout_ms = 1500\ndefault_priority = 7"
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.step_wait_timeout, Duration::from_millis(1500));

    let automator = Automator::new(config).unwrap();
    assert_eq!(automator.config().default_priority.get(), 7);
    automator.start().unwrap();
    assert_eq!(automator.worker_count(), 3);

    let handle = automator.submit(|| Ok::<_, TaskError>(std::thread::current().name().map(str::to_owned)));
    assert!(handle.wait(LONG));
    let name = handle.result().flatten().unwrap();
    assert!(name.starts_with("bot-"), "unexpected thread name {}", name);
    assert_eq!(handle.priority().get(), 7);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}
