//! Unit tests for `AppError` display format and conversions.

use std::io;

use netcore_client::AppError;

#[test]
fn display_prefixes_each_kind() {
    let cases = [
        (AppError::Connect("refused".into()), "connect: refused"),
        (AppError::Protocol("bad".into()), "protocol: bad"),
        (AppError::NotConnected("closed".into()), "not connected: closed"),
        (AppError::Timeout("slow".into()), "timeout: slow"),
        (AppError::Remote("Unknown event type: x".into()), "remote: Unknown event type: x"),
        (AppError::Config("empty".into()), "config: empty"),
        (AppError::Io("disk".into()), "io: disk"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn error_message_has_no_trailing_period() {
    let err = AppError::Protocol("malformed json".into());
    assert!(!err.to_string().ends_with('.'));
}

#[test]
fn broken_pipe_maps_to_not_connected() {
    let err = AppError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
    assert!(matches!(err, AppError::NotConnected(_)), "got: {err:?}");
}

#[test]
fn connection_reset_maps_to_not_connected() {
    let err = AppError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
    assert!(matches!(err, AppError::NotConnected(_)), "got: {err:?}");
}

#[test]
fn other_io_errors_map_to_io() {
    let err = AppError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
    assert!(matches!(err, AppError::Io(_)), "got: {err:?}");
}

#[test]
fn json_errors_map_to_protocol() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(AppError::from(json_err), AppError::Protocol(_)));
}

#[test]
fn errors_are_cloneable_for_broadcast() {
    let err = AppError::Protocol("malformed json".into());
    assert_eq!(err.clone(), err);
}
