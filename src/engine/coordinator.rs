//! Background task dispatch.
//!
//! Each submitted operation runs on its own thread and reports through a
//! single event channel: `Started`, then exactly one of `Finished` or
//! `Cancelled`. Single-flight tasks are rejected at submission time, before
//! any thread is spawned.

use crate::engine::{CancelToken, Engine, ScanReport};
use crate::error::Result;
use crate::orchestrator::{ActionOutcome, InstallMode, InstallationStatus};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Identifier assigned to each submitted task.
pub type TaskId = u64;

/// What a task does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Scan,
    Status,
    Install { key: String, mode: InstallMode },
    InstallUnidentified { path: PathBuf, mode: InstallMode },
    Uninstall { key: String },
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Scan => write!(f, "scan"),
            TaskKind::Status => write!(f, "status check"),
            TaskKind::Install { key, mode } => write!(f, "install {key} ({mode})"),
            TaskKind::InstallUnidentified { path, mode } => {
                write!(f, "install {} ({mode})", path.display())
            }
            TaskKind::Uninstall { key } => write!(f, "uninstall {key}"),
        }
    }
}

/// Payload of a finished task.
#[derive(Debug)]
pub enum TaskResult {
    Scan(Result<ScanReport>),
    Status(Vec<InstallationStatus>),
    Action(Result<ActionOutcome>),
}

/// Progress notification.
#[derive(Debug)]
pub enum TaskEvent {
    Started { id: TaskId, kind: TaskKind },
    Finished { id: TaskId, kind: TaskKind, result: TaskResult },
    Cancelled { id: TaskId, kind: TaskKind },
}

impl TaskEvent {
    pub fn id(&self) -> TaskId {
        match self {
            TaskEvent::Started { id, .. }
            | TaskEvent::Finished { id, .. }
            | TaskEvent::Cancelled { id, .. } => *id,
        }
    }

    /// Whether this is the last event for its task.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Started { .. })
    }
}

/// Handle to a running task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: TaskId,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl TaskHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker thread to exit.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("Task {} panicked", self.id);
        }
    }
}

/// Dispatches engine operations to background threads.
pub struct Coordinator {
    engine: Arc<Engine>,
    events: Sender<TaskEvent>,
    next_id: AtomicU64,
    /// Tokens of tasks that have not yet reported their terminal event.
    tokens: Arc<Mutex<HashMap<TaskId, CancelToken>>>,
}

impl Coordinator {
    /// Create a coordinator and the receiving end of its event channel.
    pub fn new(engine: Arc<Engine>) -> (Self, Receiver<TaskEvent>) {
        let (events, rx) = mpsc::channel();
        let coordinator = Self {
            engine,
            events,
            next_id: AtomicU64::new(1),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        };
        (coordinator, rx)
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Start a scan of the engine's search root.
    ///
    /// Fails immediately with `TaskBusy` if a scan is running.
    pub fn submit_scan(&self) -> Result<TaskHandle> {
        let flight = self.engine.begin_scan()?;
        Ok(self.spawn(TaskKind::Scan, move |engine, cancel| {
            let result = engine.run_scan(flight, cancel);
            if result.as_ref().is_ok_and(ScanReport::is_cancelled) {
                return None;
            }
            Some(TaskResult::Scan(result))
        }))
    }

    /// Start a status check for `keys`, or the whole catalog.
    ///
    /// Fails immediately with `TaskBusy` if a check is running.
    pub fn submit_status(&self, keys: Option<Vec<String>>) -> Result<TaskHandle> {
        let flight = self.engine.begin_status()?;
        Ok(self.spawn(TaskKind::Status, move |engine, cancel| {
            let statuses = engine.run_status(flight, keys.as_deref(), cancel);
            (!cancel.is_cancelled()).then_some(TaskResult::Status(statuses))
        }))
    }

    pub fn submit_install(&self, key: &str, mode: InstallMode) -> TaskHandle {
        let kind = TaskKind::Install {
            key: key.to_string(),
            mode,
        };
        let key = key.to_string();
        self.spawn_action(kind, move |engine| engine.install(&key, mode))
    }

    pub fn submit_install_unidentified(&self, path: PathBuf, mode: InstallMode) -> TaskHandle {
        let kind = TaskKind::InstallUnidentified {
            path: path.clone(),
            mode,
        };
        self.spawn_action(kind, move |engine| engine.install_unidentified(&path, mode))
    }

    pub fn submit_uninstall(&self, key: &str) -> TaskHandle {
        let kind = TaskKind::Uninstall {
            key: key.to_string(),
        };
        let key = key.to_string();
        self.spawn_action(kind, move |engine| engine.uninstall(&key))
    }

    /// Cancel every task that is still running.
    pub fn cancel_all(&self) {
        let tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        for token in tokens.values() {
            token.cancel();
        }
    }

    /// Number of tasks that have not yet reported their terminal event.
    pub fn active_tasks(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Actions are checked for cancellation once, before launch. A launched
    /// process always runs to verification.
    fn spawn_action<F>(&self, kind: TaskKind, action: F) -> TaskHandle
    where
        F: FnOnce(&Engine) -> Result<ActionOutcome> + Send + 'static,
    {
        self.spawn(kind, move |engine, cancel| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(TaskResult::Action(action(engine)))
        })
    }

    fn spawn<F>(&self, kind: TaskKind, work: F) -> TaskHandle
    where
        F: FnOnce(&Engine, &CancelToken) -> Option<TaskResult> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();
        {
            let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
            tokens.insert(id, cancel.clone());
        }

        let registry = Arc::clone(&self.tokens);
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let token = cancel.clone();
        let thread = thread::spawn(move || {
            debug!("Task {} started: {}", id, kind);
            let _ = events.send(TaskEvent::Started {
                id,
                kind: kind.clone(),
            });

            let event = match work(&engine, &token) {
                Some(result) => {
                    debug!("Task {} finished: {}", id, kind);
                    TaskEvent::Finished { id, kind, result }
                }
                None => {
                    debug!("Task {} cancelled: {}", id, kind);
                    TaskEvent::Cancelled { id, kind }
                }
            };
            registry
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&id);
            if events.send(event).is_err() {
                debug!("Task {} result dropped, no listener", id);
            }
        });

        TaskHandle {
            id,
            cancel,
            thread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{parse_catalog, Hive};
    use crate::engine::EngineOptions;
    use crate::error::ScoutError;
    use crate::inspector::{ConfigStore, Inspector, MemoryStore};
    use crate::metadata::StaticMetadataProvider;
    use crate::orchestrator::Timeouts;
    use crate::shell::{ProcessOutcome, ScriptedRunner};
    use std::sync::Barrier;
    use std::time::Duration;

    const CATALOG: &str = r#"
software:
  - key: widget
    display_name: Widget Studio
    detection:
      - kind: exists
        path: SOFTWARE\Vendor\Widget
    install_commands:
      exe: "{installer_path} /S"
  - key: gadget
    display_name: Gadget
"#;

    fn engine_with(runner: ScriptedRunner, store: &MemoryStore) -> Arc<Engine> {
        Arc::new(Engine::new(
            parse_catalog(CATALOG).unwrap(),
            Inspector::new(Arc::new(store.clone())),
            Arc::new(runner),
            Arc::new(StaticMetadataProvider::new()),
            EngineOptions {
                timeouts: Timeouts::default(),
                ledger_path: None,
            },
        ))
    }

    /// Collect events until the task with `id` ends.
    fn drain(rx: &Receiver<TaskEvent>, id: TaskId) -> Vec<TaskEvent> {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            let done = event.id() == id && event.is_terminal();
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    #[test]
    fn status_task_reports_started_then_finished() {
        let store = MemoryStore::new();
        store.insert_key(Hive::Machine, r"SOFTWARE\Vendor\Widget");
        let (coordinator, rx) = Coordinator::new(engine_with(ScriptedRunner::exiting(0), &store));

        let handle = coordinator.submit_status(None).unwrap();
        let id = handle.id;
        handle.join();

        let events = drain(&rx, id);
        assert!(matches!(events[0], TaskEvent::Started { kind: TaskKind::Status, .. }));
        match events.last().unwrap() {
            TaskEvent::Finished {
                result: TaskResult::Status(statuses),
                ..
            } => {
                assert_eq!(statuses.len(), 2);
                assert!(statuses.iter().any(|s| s.key == "widget" && s.is_installed()));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn second_status_check_is_rejected_while_running() {
        let store = MemoryStore::new();
        let engine = engine_with(ScriptedRunner::exiting(0), &store);
        let (coordinator, _rx) = Coordinator::new(Arc::clone(&engine));

        let flight = engine.begin_status().unwrap();
        let err = coordinator.submit_status(None).unwrap_err();
        assert!(matches!(err, ScoutError::TaskBusy { .. }));
        drop(flight);
        coordinator.submit_status(None).unwrap().join();
    }

    #[test]
    fn scan_without_root_finishes_with_error() {
        let (coordinator, rx) =
            Coordinator::new(engine_with(ScriptedRunner::exiting(0), &MemoryStore::new()));
        let handle = coordinator.submit_scan().unwrap();
        let id = handle.id;
        handle.join();

        match drain(&rx, id).pop().unwrap() {
            TaskEvent::Finished {
                result: TaskResult::Scan(Err(ScoutError::InvalidSearchPath { .. })),
                ..
            } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// Store whose first key lookup blocks until the test releases it.
    struct GatedStore {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl ConfigStore for GatedStore {
        fn key_exists(&self, _hive: Hive, _path: &str) -> bool {
            let _ = self.gate.lock().unwrap().recv();
            false
        }

        fn read_value(&self, _hive: Hive, _path: &str, _name: &str) -> Option<String> {
            None
        }

        fn subkeys(&self, _hive: Hive, _path: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn cancelled_status_check_reports_cancelled() {
        let (release, gate) = mpsc::channel();
        let engine = Arc::new(Engine::new(
            parse_catalog(CATALOG).unwrap(),
            Inspector::new(Arc::new(GatedStore {
                gate: Mutex::new(gate),
            })),
            Arc::new(ScriptedRunner::exiting(0)),
            Arc::new(StaticMetadataProvider::new()),
            EngineOptions {
                timeouts: Timeouts::default(),
                ledger_path: None,
            },
        ));
        let (coordinator, rx) = Coordinator::new(engine);

        let handle = coordinator.submit_status(None).unwrap();
        let id = handle.id;
        // The worker is parked inside the first key's evaluation.
        coordinator.cancel_all();
        release.send(()).unwrap();
        handle.join();

        let last = drain(&rx, id).pop().unwrap();
        assert!(matches!(last, TaskEvent::Cancelled { kind: TaskKind::Status, .. }));
    }

    #[test]
    fn finished_tasks_release_their_cancel_tokens() {
        let (coordinator, rx) =
            Coordinator::new(engine_with(ScriptedRunner::exiting(0), &MemoryStore::new()));

        let handles: Vec<_> = (0..5)
            .map(|_| coordinator.submit_install("gadget", InstallMode::Auto))
            .collect();
        let ids: Vec<_> = handles.iter().map(|h| h.id).collect();
        for handle in handles {
            handle.join();
        }

        assert_eq!(coordinator.active_tasks(), 0);
        let terminal = rx
            .try_iter()
            .filter(|e| e.is_terminal() && ids.contains(&e.id()))
            .count();
        assert_eq!(terminal, 5);
        // Nothing left to cancel; later submissions are unaffected.
        coordinator.cancel_all();
        coordinator.submit_status(None).unwrap().join();
        assert_eq!(coordinator.active_tasks(), 0);
    }

    #[test]
    fn actions_on_different_keys_run_concurrently() {
        let store = MemoryStore::new();
        let ledger_store = store.clone();
        let barrier = Arc::new(Barrier::new(2));
        let runner_barrier = Arc::clone(&barrier);
        let runner = ScriptedRunner::new(move |_| {
            // Both uninstalls must be inside the runner at once to pass.
            runner_barrier.wait();
            Ok(ProcessOutcome::with_code(0))
        });
        for (id, name) in [("A", "Widget Studio"), ("B", "Gadget")] {
            let path = format!(r"{}\{id}", crate::inspector::UNINSTALL_KEY);
            ledger_store.set_value(Hive::Machine, &path, "DisplayName", name);
            ledger_store.set_value(Hive::Machine, &path, "UninstallString", "uninst.exe /S");
        }
        let (coordinator, rx) = Coordinator::new(engine_with(runner, &store));

        let first = coordinator.submit_uninstall("widget");
        let second = coordinator.submit_uninstall("gadget");
        let ids = [first.id, second.id];
        first.join();
        second.join();

        let finished: Vec<_> = rx
            .try_iter()
            .filter(|e| e.is_terminal() && ids.contains(&e.id()))
            .collect();
        assert_eq!(finished.len(), 2);
        for event in finished {
            assert!(matches!(
                event,
                TaskEvent::Finished {
                    result: TaskResult::Action(Ok(ActionOutcome::Verified { .. })),
                    ..
                }
            ));
        }
    }
}
