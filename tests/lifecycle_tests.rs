//! Lifecycle tests: idempotent close and free, exactly-once release of the
//! device handle, and behaviour after free.

mod common;

use common::{created_mock, open_mock};
use serial_session::port::{
    ErrorKind, FlowControl, LifecycleState, OpenOptions, PortError, StatusCode, TimeoutPolicy,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_double_close() {
    let mock = open_mock(&OpenOptions::new());

    mock.port.close().unwrap();
    mock.port.close().unwrap();

    assert_eq!(mock.port.state(), LifecycleState::Closed);
    assert_eq!(mock.device.close_count(), 1);
    assert!(!mock.device.double_close_detected());
}

#[test]
fn test_free_after_close() {
    let mock = open_mock(&OpenOptions::new());

    mock.port.close().unwrap();
    mock.port.free().unwrap();
    mock.port.free().unwrap();

    assert_eq!(mock.port.state(), LifecycleState::Freed);
    assert_eq!(mock.device.close_count(), 1);
}

#[test]
fn test_free_without_open() {
    let mock = created_mock();
    mock.port.free().unwrap();

    assert_eq!(mock.port.state(), LifecycleState::Freed);
    assert_eq!(mock.device.open_count(), 0);
    assert_eq!(mock.device.close_count(), 0);
}

#[test]
fn test_close_before_open_is_noop() {
    let mock = created_mock();
    mock.port.close().unwrap();
    assert_eq!(mock.port.state(), LifecycleState::Created);
}

#[test]
fn test_concurrent_close_releases_once() {
    let mock = open_mock(&OpenOptions::new());
    let port = Arc::new(mock.port);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let port = Arc::clone(&port);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    port.close()
                } else {
                    port.free()
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(port.state(), LifecycleState::Freed);
    assert_eq!(mock.device.close_count(), 1);
    assert!(!mock.device.double_close_detected());
}

#[test]
fn test_drop_releases_handle() {
    let mock = open_mock(&OpenOptions::new());
    let device = mock.device.clone();
    assert!(device.is_open());

    drop(mock);

    assert!(!device.is_open());
    assert_eq!(device.close_count(), 1);
}

#[test]
fn test_drop_after_close() {
    let mock = open_mock(&OpenOptions::new());
    let device = mock.device.clone();

    mock.port.close().unwrap();
    drop(mock);

    assert_eq!(device.close_count(), 1);
    assert!(!device.double_close_detected());
}

#[test]
fn test_use_after_free() {
    let mock = open_mock(&OpenOptions::new());
    mock.port.free().unwrap();

    let port = &mock.port;
    assert_eq!(port.read(&mut [0u8; 4]).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.write(b"x").unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.baud_rate().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.set_baud_rate(9600).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.name().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.usb_vid_pid().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.pending_config().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(port.flush().unwrap_err().kind(), ErrorKind::InvalidState);

    // Close stays a no-op
    port.close().unwrap();
}

#[test]
fn test_open_twice_rejected() {
    let mock = open_mock(&OpenOptions::new());

    let err = mock.port.open(&OpenOptions::new()).unwrap_err();
    assert_eq!(err, PortError::invalid_state("open", LifecycleState::Opened));
    assert_eq!(mock.device.open_count(), 1);

    mock.port.close().unwrap();
    assert_eq!(
        mock.port.open(&OpenOptions::new()).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn test_rejected_open_keeps_timeout_policy() {
    let mock = open_mock(&OpenOptions::new());
    assert_eq!(mock.port.timeout_policy(), TimeoutPolicy::ZeroCount);

    let err = mock
        .port
        .open(&OpenOptions::new().timeout_policy(TimeoutPolicy::Error))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(mock.port.timeout_policy(), TimeoutPolicy::ZeroCount);
}

#[test]
fn test_failed_negotiation_keeps_timeout_policy() {
    let mock = created_mock();
    mock.device.fail_set_config(Some(StatusCode::FAIL));

    mock.port
        .open(&OpenOptions::new().timeout_policy(TimeoutPolicy::Error))
        .unwrap_err();
    assert_eq!(mock.port.timeout_policy(), TimeoutPolicy::ZeroCount);

    mock.device.fail_set_config(None);
    mock.port
        .open(&OpenOptions::new().timeout_policy(TimeoutPolicy::Error))
        .unwrap();
    assert_eq!(mock.port.timeout_policy(), TimeoutPolicy::Error);
}

#[test]
fn test_retry_after_failed_open_uses_only_its_own_options() {
    let mock = created_mock();
    mock.device.fail_set_config(Some(StatusCode::FAIL));

    let err = mock
        .port
        .open(
            &OpenOptions::new()
                .baud_rate(115200)
                .flow_control(FlowControl::RtsCts),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SystemFailure);
    assert_eq!(mock.port.state(), LifecycleState::Created);

    mock.device.fail_set_config(None);
    mock.port.open(&OpenOptions::new()).unwrap();

    assert_eq!(mock.port.baud_rate().unwrap(), 9600);
    assert_eq!(mock.port.flow_control().unwrap(), Some(FlowControl::None));
    assert_eq!(mock.device.hardware_config().baud_rate, 9600);
}

#[test]
fn test_failed_negotiation_closes_handle() {
    let mock = created_mock();
    mock.device.fail_set_config(Some(StatusCode::FAIL));

    let err = mock.port.open(&OpenOptions::new()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SystemFailure);
    assert_eq!(mock.port.state(), LifecycleState::Created);
    assert_eq!(mock.device.open_count(), 1);
    assert_eq!(mock.device.close_count(), 1);
    assert!(!mock.device.is_open());
}

#[test]
fn test_provider_open_failure() {
    let mock = created_mock();
    mock.provider.fail_open(Some(StatusCode::MEM));

    let err = mock.port.open(&OpenOptions::new()).unwrap_err();
    assert_eq!(err, PortError::ResourceExhausted);
    assert_eq!(mock.port.state(), LifecycleState::Created);

    mock.provider.fail_open(None);
    mock.port.open(&OpenOptions::new()).unwrap();
    assert_eq!(mock.port.state(), LifecycleState::Opened);
}

#[test]
fn test_close_while_reader_blocked() {
    let mock = open_mock(&OpenOptions::new());
    let port = Arc::new(mock.port);

    let reader = {
        let port = Arc::clone(&port);
        thread::spawn(move || port.read(&mut [0u8; 8]))
    };

    thread::sleep(Duration::from_millis(30));
    port.close().unwrap();

    // A reader that lost the race to close sees the port closed instead
    let kind = reader.join().unwrap().unwrap_err().kind();
    assert!(
        matches!(kind, ErrorKind::SystemFailure | ErrorKind::InvalidState),
        "unexpected error kind {kind:?}"
    );
    assert_eq!(mock.device.close_count(), 1);
}
