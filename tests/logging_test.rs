//! Subscriber installation. Kept in its own test binary because `init`
//! installs a process-global subscriber.

use roundtable_mcp::logging::{self, LOG_FILE_NAME};

#[test]
fn test_init_writes_file_log_and_refuses_second_install() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_dir = dir.path().join("logs");

    let guard = logging::init(true, Some(&log_dir)).expect("first init");
    tracing::info!(target: "roundtable_mcp", "file layer check");
    assert!(logging::init(false, None).is_err());
    drop(guard);

    let path = log_dir.join(LOG_FILE_NAME);
    assert!(path.exists());
    if std::env::var_os("RUST_LOG").is_none() {
        let contents = std::fs::read_to_string(&path).expect("read log");
        assert!(contents.contains("logging initialized"));
        assert!(contents.contains("debug_enabled=true"));
        assert!(contents.contains("file layer check"));
    }
}
