//! End-to-end hot-reload behaviour of the policy watcher thread.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tether_policy::{
    watch, Configuration, ErrorCode, ErrorDetail, NotifyDetector, PolicyCompiler, PolicyStore,
    PolicyWatcher, RuleTables, StatementCompiler, WatchHandle,
};

const POLL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(10);
const QUIET: Duration = Duration::from_millis(200);

const INITIAL: &str = r#"permit (principal, action == Action::"FileOpenReadOnly", resource in Dir::"/etc");"#;
const VALID: &str = r#"
// widen read access
permit (principal, action in [Action::"FileOpen", Action::"FileOpenReadOnly"], resource)
when { resource in [ Dir::"/tmp", Dir::"/var/log" ] };
"#;
const INVALID: &str = r#"permit (principal, action == Action::"FileOpen", resource in Dir::"/tmp""#;
const RECOVERED: &str = r#"forbid (principal, action == Action::"NetworkConnect", resource == Host::"10.0.0.1");
permit (principal, action == Action::"FileOpen", resource in Dir::"/srv");"#;

fn write_atomic(path: &Path, content: &str) {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).unwrap();
    fs::rename(&tmp, path).unwrap();
}

struct Harness {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    handle: WatchHandle,
    updates: Receiver<Arc<Configuration>>,
    errors: Receiver<ErrorDetail>,
}

fn start(initial: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, initial);

    let (update_tx, updates) = mpsc::channel();
    let (error_tx, errors) = mpsc::channel();
    let handle = watch(
        &path,
        POLL,
        move |cfg| {
            let _ = update_tx.send(cfg);
        },
        move |err| {
            let _ = error_tx.send(err);
        },
    )
    .expect("initial policy must load");

    Harness {
        _dir: dir,
        path,
        handle,
        updates,
        errors,
    }
}

#[test]
fn valid_write_yields_exactly_one_update() {
    let h = start(INITIAL);
    assert_eq!(h.handle.active().unwrap().version, 1);

    write_atomic(&h.path, VALID);
    let cfg = h.updates.recv_timeout(WAIT).expect("update callback");
    assert_eq!(cfg.version, 2);
    assert!(!cfg.rules.open.is_empty());
    assert_eq!(cfg.rules.open.len(), 4);

    assert!(h.updates.recv_timeout(QUIET).is_err(), "no duplicate update");
    assert!(h.errors.try_recv().is_err(), "no error callbacks");
    assert_eq!(h.handle.active().unwrap().version, 2);
}

#[test]
fn invalid_write_reports_parse_error_once_and_keeps_store() {
    let h = start(INITIAL);
    let before = h.handle.active().unwrap();

    write_atomic(&h.path, INVALID);
    let err = h.errors.recv_timeout(WAIT).expect("error callback");
    assert_eq!(err.code, ErrorCode::Parse);
    assert!(err.line.is_some());

    assert!(h.errors.recv_timeout(QUIET).is_err(), "same content not re-reported");
    assert!(h.updates.try_recv().is_err(), "no update callbacks");
    let after = h.handle.active().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn valid_write_after_invalid_recovers() {
    let h = start(INITIAL);

    write_atomic(&h.path, INVALID);
    h.errors.recv_timeout(WAIT).expect("error callback");

    write_atomic(&h.path, RECOVERED);
    let cfg = h.updates.recv_timeout(WAIT).expect("update after recovery");
    assert_eq!(cfg.rules.connect.len(), 1);
    assert_eq!(cfg.rules.open.len(), 1);
    assert!(h.errors.recv_timeout(QUIET).is_err());
}

#[test]
fn missing_initial_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let err = watch(dir.path().join("absent.cedar"), POLL, |_| {}, |_| {})
        .err()
        .expect("startup must fail");
    assert_eq!(err.code, ErrorCode::Io);
}

#[test]
fn invalid_initial_content_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, INVALID);

    let store = Arc::new(PolicyStore::new());
    let err = PolicyWatcher::new(&path, Arc::clone(&store), Arc::new(StatementCompiler::new()))
        .spawn(|_| {}, |_| {})
        .err()
        .expect("startup must fail");
    assert_eq!(err.code, ErrorCode::Parse);
    assert!(store.active().is_none());
}

#[test]
fn empty_path_is_a_config_error() {
    let err = watch("", POLL, |_| {}, |_| {}).err().expect("startup must fail");
    assert_eq!(err.code, ErrorCode::Config);
}

#[test]
fn no_callbacks_after_cancel() {
    let mut h = start(INITIAL);
    h.handle.cancel();
    assert!(!h.handle.is_running());

    write_atomic(&h.path, VALID);
    assert!(h.updates.recv_timeout(QUIET * 2).is_err());
    assert_eq!(h.handle.active().unwrap().version, 1);

    // Idempotent.
    h.handle.cancel();
}

#[test]
fn io_outage_is_reported_once() {
    let h = start(INITIAL);

    fs::remove_file(&h.path).unwrap();
    let err = h.errors.recv_timeout(WAIT).expect("io error callback");
    assert_eq!(err.code, ErrorCode::Io);
    assert!(h.errors.recv_timeout(QUIET).is_err(), "outage reported once");

    write_atomic(&h.path, VALID);
    let cfg = h.updates.recv_timeout(WAIT).expect("update after outage");
    assert_eq!(cfg.version, 2);
}

#[test]
fn readers_see_previous_config_until_callback_returns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, INITIAL);

    let store = Arc::new(PolicyStore::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();
    let handle = {
        let store = Arc::clone(&store);
        let observed = Arc::clone(&observed);
        PolicyWatcher::new(&path, Arc::clone(&store), Arc::new(StatementCompiler::new()))
            .interval(POLL)
            .spawn(
                move |cfg| {
                    let active = store.active().map(|c| c.version);
                    observed.lock().unwrap().push((cfg.version, active));
                    let _ = done_tx.send(());
                },
                |_| {},
            )
            .unwrap()
    };

    write_atomic(&path, VALID);
    done_rx.recv_timeout(WAIT).expect("update callback");
    assert_eq!(observed.lock().unwrap().as_slice(), &[(2, Some(1))]);
    drop(handle);
    assert_eq!(store.version(), 2);
}

#[test]
fn cancel_from_inside_callback_does_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, INITIAL);

    let slot: Arc<Mutex<Option<WatchHandle>>> = Arc::new(Mutex::new(None));
    let (done_tx, done_rx) = mpsc::channel();
    let handle = {
        let slot = Arc::clone(&slot);
        watch(
            &path,
            POLL,
            move |_| {
                if let Some(mut handle) = slot.lock().unwrap().take() {
                    handle.cancel();
                }
                let _ = done_tx.send(());
            },
            |_| {},
        )
        .unwrap()
    };
    *slot.lock().unwrap() = Some(handle);

    write_atomic(&path, VALID);
    done_rx.recv_timeout(WAIT).expect("callback ran and returned");

    write_atomic(&path, RECOVERED);
    assert!(done_rx.recv_timeout(QUIET).is_err(), "watcher stopped");
}

#[test]
fn notify_detector_keeps_callback_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, INITIAL);

    let (tx, rx) = mpsc::channel();
    let _handle = PolicyWatcher::new(&path, Arc::new(PolicyStore::new()), Arc::new(StatementCompiler::new()))
        .interval(POLL)
        .detector(NotifyDetector::new())
        .spawn(
            move |cfg| {
                let _ = tx.send(cfg.version);
            },
            |_| {},
        )
        .unwrap();

    write_atomic(&path, VALID);
    assert_eq!(rx.recv_timeout(WAIT).expect("update via notify"), 2);
    assert!(rx.recv_timeout(QUIET).is_err());
}

/// Compiles like [`StatementCompiler`], but every compile after the first
/// announces itself and then takes a while.
struct SlowCompiler {
    inner: StatementCompiler,
    calls: AtomicUsize,
    started: Mutex<Sender<()>>,
}

impl PolicyCompiler for SlowCompiler {
    fn compile(&self, origin: &Path, source: &str) -> Result<RuleTables, ErrorDetail> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            let _ = self.started.lock().unwrap().send(());
            thread::sleep(Duration::from_millis(400));
        }
        self.inner.compile(origin, source)
    }
}

#[test]
fn cancel_during_compile_still_delivers_that_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.cedar");
    write_atomic(&path, INITIAL);

    let (started_tx, started_rx) = mpsc::channel();
    let compiler = Arc::new(SlowCompiler {
        inner: StatementCompiler::new(),
        calls: AtomicUsize::new(0),
        started: Mutex::new(started_tx),
    });
    let store = Arc::new(PolicyStore::new());
    let (update_tx, updates) = mpsc::channel();
    let mut handle = PolicyWatcher::new(&path, Arc::clone(&store), compiler)
        .interval(POLL)
        .spawn(
            move |cfg| {
                let _ = update_tx.send(cfg.version);
            },
            |_| {},
        )
        .unwrap();

    write_atomic(&path, VALID);
    started_rx.recv_timeout(WAIT).expect("compile of the new content started");
    handle.cancel();

    assert_eq!(updates.try_recv(), Ok(2));
    assert_eq!(updates.try_recv(), Err(TryRecvError::Disconnected));
    assert_eq!(store.version(), 2);
}
