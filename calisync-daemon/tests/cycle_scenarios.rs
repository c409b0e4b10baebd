//! End-to-end sync cycle scenarios against real child processes, a real
//! watched file and either a counting reloader or a one-shot HTTP server.

#![cfg(unix)]

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use calisync_core::SyncConfig;
use calisync_daemon::{
    ChangeDetector, CycleOutcome, LineFormat, LogFileSlot, ProcessRunner, ReloadError, Reloader,
    Scheduler, ServerController, SyncCycle, TeeMakeWriter,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    fn position(&self, needle: &str) -> Option<usize> {
        self.text().find(needle)
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs() -> (Capture, DefaultGuard) {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .event_format(LineFormat)
        .with_writer(TeeMakeWriter::new(capture.clone(), LogFileSlot::default()))
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

#[derive(Clone)]
struct CountingReloader {
    calls: Arc<AtomicUsize>,
    result: Result<(), ReloadError>,
}

impl CountingReloader {
    fn ok() -> Self {
        Self {
            calls: Arc::default(),
            result: Ok(()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reloader for CountingReloader {
    async fn notify_reload(&self) -> Result<(), ReloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn sh(script: &str) -> ProcessRunner {
    ProcessRunner::new(vec!["sh".into(), "-c".into(), script.into()])
}

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn watched_db(dir: &TempDir, mtime_secs: i64) -> std::path::PathBuf {
    let path = dir.path().join("metadata.db");
    std::fs::write(&path, b"sqlite").expect("write db");
    set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).expect("set mtime");
    path
}

fn cycle<R: Reloader>(
    script: &str,
    db: &Path,
    baseline: Option<u64>,
    reloader: R,
) -> SyncCycle<R> {
    let mut detector = ChangeDetector::new(db);
    if let Some(secs) = baseline {
        detector = detector.with_baseline(at(secs));
    }
    SyncCycle::from_parts(sh(script), detector, reloader, None)
}

/// Serve one HTTP request with `status`.
fn one_shot_server(status: &'static str) -> (u16, std::thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");
        let mut header = String::new();
        while reader.read_line(&mut header).expect("header") > 0 && header != "\r\n" {
            header.clear();
        }
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .expect("respond");
        request_line.trim_end().to_string()
    });
    (port, handle)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_first_check_records_baseline_without_reload() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 1000);
    let reloader = CountingReloader::ok();
    let mut cycle = cycle("echo Syncing...; echo Done", &db, None, reloader.clone());

    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkNoChange);

    assert_eq!(reloader.calls(), 0);
    assert_eq!(cycle.detector().last_modified(), Some(at(1000)));
    let finished = logs.position("OneDrive sync finished.").expect("finished line");
    let no_prior = logs.position("No prior state").expect("baseline line");
    assert!(finished < no_prior);
}

#[tokio::test]
async fn scenario_b_equal_mtime_is_no_change() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 1000);
    let reloader = CountingReloader::ok();
    let mut cycle = cycle("echo Syncing...", &db, Some(1000), reloader.clone());

    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkNoChange);

    assert_eq!(reloader.calls(), 0);
    assert!(logs
        .text()
        .contains("No changes detected in metadata.db. No need to reload CalibreWeb DB."));
}

#[tokio::test]
async fn scenario_c_newer_mtime_triggers_exactly_one_reload() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 2000);
    let reloader = CountingReloader::ok();
    let mut cycle = cycle("echo Syncing...; echo Done", &db, Some(1000), reloader.clone());

    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkChanged);

    assert_eq!(reloader.calls(), 1);
    assert_eq!(cycle.detector().last_modified(), Some(at(2000)));
    let text = logs.text();
    for expected in [
        "Starting OneDrive sync...",
        " - Syncing...\n",
        " - Done\n",
        "OneDrive sync finished.",
        "Changes detected in metadata.db. Reloading CalibreWeb DB...",
    ] {
        assert!(text.contains(expected), "missing {expected:?} in:\n{text}");
    }

    // Same mtime on the next cycle: no second reload.
    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkNoChange);
    assert_eq!(reloader.calls(), 1);
}

#[tokio::test]
async fn scenario_d_failed_sync_skips_check_and_reload() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 2000);
    let reloader = CountingReloader::ok();
    let mut cycle = cycle("echo partial; exit 1", &db, Some(1000), reloader.clone());

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, CycleOutcome::SyncFailed(ref reason) if reason.contains("exit status 1")));
    assert_eq!(reloader.calls(), 0);
    // The detector was never consulted, so the newer mtime is not recorded.
    assert_eq!(cycle.detector().last_modified(), Some(at(1000)));
    let text = logs.text();
    assert!(text.contains("OneDrive sync failed: command `sh -c echo partial; exit 1` returned non-zero exit status 1"));
    assert!(!text.contains("OneDrive sync finished."));
}

#[tokio::test]
async fn scenario_e_reload_500_is_logged_and_schedule_continues() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 2000);
    let (port, server) = one_shot_server("500 Internal Server Error");
    let controller = ServerController::new(&SyncConfig {
        server_host: "127.0.0.1".to_string(),
        server_port: port,
        reload_timeout_secs: 5,
        ..SyncConfig::default()
    });
    let mut cycle = cycle("echo Syncing...", &db, Some(1000), controller);

    let tally = Scheduler::new(Duration::from_millis(20))
        .run_cycles(&mut cycle, 2)
        .await;

    assert_eq!(server.join().unwrap(), "GET /reconnect HTTP/1.1");
    assert_eq!(tally.completed, 2);
    assert_eq!(tally.changed, 1);
    assert_eq!(tally.failed, 0);
    let text = logs.text();
    assert!(text.contains("Attempting to reconnect Calibre server..."));
    assert!(text.contains("Failed to reconnect. Status code: 500"));
    assert!(text.contains("No changes detected in metadata.db."));
}

#[tokio::test]
async fn unreadable_watched_file_is_treated_as_no_change() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("metadata.db");
    let reloader = CountingReloader::ok();
    let mut cycle = cycle("true", &missing, Some(1000), reloader.clone());

    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkNoChange);

    assert_eq!(reloader.calls(), 0);
    assert_eq!(cycle.detector().last_modified(), Some(at(1000)));
    let text = logs.text();
    assert!(text.contains("Error getting last modified time for"));
    assert!(text.contains("Could not determine the last modified time of the metadata database."));
}

#[tokio::test]
async fn failed_reload_does_not_change_the_outcome() {
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 2000);
    let reloader = CountingReloader {
        calls: Arc::default(),
        result: Err(ReloadError::Transport {
            message: "Connection refused".to_string(),
        }),
    };
    let mut cycle = cycle("true", &db, Some(1000), reloader.clone());

    assert_eq!(cycle.run_once().await, CycleOutcome::SyncOkChanged);
    assert_eq!(reloader.calls(), 1);
}

#[tokio::test]
async fn hung_sync_tool_is_killed_after_timeout() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 2000);
    let reloader = CountingReloader::ok();
    let mut cycle = SyncCycle::from_parts(
        sh("echo started; sleep 30"),
        ChangeDetector::new(&db).with_baseline(at(1000)),
        reloader.clone(),
        Some(Duration::from_secs(1)),
    );

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, CycleOutcome::SyncFailed(ref reason) if reason.contains("timed out after 1s")));
    assert_eq!(reloader.calls(), 0);
    assert!(logs.text().contains(" - started\n"));
}

#[tokio::test]
async fn missing_sync_tool_is_a_failed_cycle() {
    let dir = TempDir::new().unwrap();
    let db = watched_db(&dir, 1000);
    let reloader = CountingReloader::ok();
    let mut cycle = SyncCycle::from_parts(
        ProcessRunner::new(vec!["calisync-no-such-sync-tool".into()]),
        ChangeDetector::new(&db),
        reloader.clone(),
        None,
    );

    assert!(matches!(cycle.run_once().await, CycleOutcome::SyncFailed(_)));
    assert_eq!(cycle.detector().last_modified(), None);
}
