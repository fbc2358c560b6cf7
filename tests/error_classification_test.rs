use fslock::{FsLockError, TimeoutError};
use std::io;
use std::path::PathBuf;

#[test]
fn test_timeout_sentinel() {
    let err = FsLockError::from(TimeoutError);
    assert!(err.is_timeout());
    assert_eq!(err, TimeoutError);
    assert!(TimeoutError.timeout());
    assert_eq!(err.to_string(), "lock timeout exceeded");
    assert!(err.io_error().is_none());
}

#[test]
fn test_os_errors_are_not_timeouts() {
    let err = FsLockError::Lock {
        path: PathBuf::from("test.lock"),
        source: io::Error::from(io::ErrorKind::PermissionDenied),
    };
    assert!(!err.is_timeout());
    assert_ne!(err, TimeoutError);
    assert_eq!(
        err.io_error().unwrap().kind(),
        io::ErrorKind::PermissionDenied
    );
}

#[test]
fn test_timeout_converts_to_timed_out_io_error() {
    let io_err: io::Error = FsLockError::from(TimeoutError).into();
    assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
}

#[test]
fn test_os_error_converts_back_to_source() {
    let err = FsLockError::Unlock {
        path: PathBuf::from("test.lock"),
        source: io::Error::from(io::ErrorKind::Interrupted),
    };
    let io_err: io::Error = err.into();
    assert_eq!(io_err.kind(), io::ErrorKind::Interrupted);
}

#[test]
fn test_error_messages_name_the_path() {
    let err = FsLockError::Open {
        path: PathBuf::from("/nowhere/test.lock"),
        source: io::Error::from(io::ErrorKind::NotFound),
    };
    assert!(err.to_string().contains("/nowhere/test.lock"));
}
