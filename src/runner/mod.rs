//! # Test Runner Module
//!
//! Sequences a selected batch of protocol operations against one
//! session and streams progress to a single consumer.
//!
//! This module handles:
//! - The static catalog of named operations
//! - Executing a selection strictly in catalog order on one worker task
//! - The Started/Log/Result progress-event stream
//! - The reducer that folds progress events into displayable results

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::wire::StorageKind;
use crate::session::{OpLog, ProtocolSession, ShockChannel};
use crate::transport::SerialLink;

/// A protocol operation the runner knows how to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EnterNormal,
    EnterInspect,
    CheckStorage(StorageKind),
    ReadLoadCell,
    ReadShock(ShockChannel),
    ReadImu,
    ReadAltimeter,
    ClearStorage(StorageKind),
    EnterLaunch,
}

impl Operation {
    /// Operations that change board state beyond its operating mode
    ///
    /// Clearing storage erases flight data and launch mode is
    /// irreversible; neither belongs in a default batch.
    pub const fn is_destructive(self) -> bool {
        matches!(self, Operation::ClearStorage(_) | Operation::EnterLaunch)
    }
}

/// A named catalog entry
#[derive(Debug, Clone, Copy)]
pub struct TestDefinition {
    pub name: &'static str,
    pub op: Operation,
}

/// Every operation the bench offers, in execution order
///
/// Selections index into this catalog; execution always follows catalog
/// order, never the order the user picked items in.
pub const CATALOG: &[TestDefinition] = &[
    TestDefinition { name: "Enter Normal Mode", op: Operation::EnterNormal },
    TestDefinition { name: "Enter Inspect Mode", op: Operation::EnterInspect },
    TestDefinition { name: "Check Analog SD Card", op: Operation::CheckStorage(StorageKind::Analog) },
    TestDefinition { name: "Check Digital SD Card", op: Operation::CheckStorage(StorageKind::Digital) },
    TestDefinition { name: "Check Radio SD Card", op: Operation::CheckStorage(StorageKind::Radio) },
    TestDefinition { name: "Read Load Cell", op: Operation::ReadLoadCell },
    TestDefinition { name: "Read Shock Sensor 1", op: Operation::ReadShock(ShockChannel::One) },
    TestDefinition { name: "Read Shock Sensor 2", op: Operation::ReadShock(ShockChannel::Two) },
    TestDefinition { name: "Read IMU", op: Operation::ReadImu },
    TestDefinition { name: "Read Altimeter", op: Operation::ReadAltimeter },
    TestDefinition { name: "Clear Analog SD Card", op: Operation::ClearStorage(StorageKind::Analog) },
    TestDefinition { name: "Clear Digital SD Card", op: Operation::ClearStorage(StorageKind::Digital) },
    TestDefinition { name: "Clear Radio SD Card", op: Operation::ClearStorage(StorageKind::Radio) },
    TestDefinition { name: "Enter Launch Mode", op: Operation::EnterLaunch },
];

/// Catalog indices of the non-destructive operations
pub fn default_selection() -> Vec<usize> {
    CATALOG
        .iter()
        .enumerate()
        .filter(|(_, def)| !def.op.is_destructive())
        .map(|(i, _)| i)
        .collect()
}

/// Progress emitted by the worker task, in emission order
///
/// `index` refers to the position within the run's result list (the
/// selected items in catalog order), not the catalog index.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { index: usize },
    Log { text: String, timestamp: DateTime<Local> },
    Result { index: usize, success: bool },
}

/// Lifecycle of one result entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pending,
    Running,
    Pass,
    Fail,
}

/// One timestamped diagnostic line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

/// Outcome and log of one selected operation
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: &'static str,
    pub status: TestStatus,
    pub logs: Vec<LogEntry>,
}

/// Result list driven purely by applying progress events
///
/// The consumer owns this state; the worker only ever communicates
/// through the event stream.
#[derive(Debug, Default)]
pub struct RunState {
    pub results: Vec<TestResult>,
}

impl RunState {
    /// Result entries for a selection, all Pending, in catalog order
    pub fn new(selection: &[usize]) -> Self {
        let results = plan(selection)
            .into_iter()
            .map(|def| TestResult {
                name: def.name,
                status: TestStatus::Pending,
                logs: Vec::new(),
            })
            .collect();
        Self { results }
    }

    /// Fold one progress event into the result list
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { index } => {
                if let Some(result) = self.results.get_mut(*index) {
                    result.status = TestStatus::Running;
                }
            }
            ProgressEvent::Log { text, timestamp } => {
                // log lines attach to whichever entry is running
                if let Some(result) = self
                    .results
                    .iter_mut()
                    .find(|r| r.status == TestStatus::Running)
                {
                    result.logs.push(LogEntry {
                        timestamp: *timestamp,
                        text: text.clone(),
                    });
                }
            }
            ProgressEvent::Result { index, success } => {
                if let Some(result) = self.results.get_mut(*index) {
                    result.status = if *success {
                        TestStatus::Pass
                    } else {
                        TestStatus::Fail
                    };
                }
            }
        }
    }

    /// True once every entry has a final status
    pub fn finished(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|r| matches!(r.status, TestStatus::Pass | TestStatus::Fail))
    }
}

/// Resolve a selection to catalog entries in catalog order
///
/// Out-of-range indices are dropped and duplicates collapse.
pub fn plan(selection: &[usize]) -> Vec<&'static TestDefinition> {
    let selected: BTreeSet<usize> = selection
        .iter()
        .copied()
        .filter(|&i| i < CATALOG.len())
        .collect();
    selected.into_iter().map(|i| &CATALOG[i]).collect()
}

/// A running batch: the worker handle and its event stream
pub struct TestRun {
    pub handle: JoinHandle<()>,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// Writer adapter: operation log lines become timestamped Log events
struct EventLog {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl OpLog for EventLog {
    fn line(&self, text: &str) {
        let _ = self.tx.send(ProgressEvent::Log {
            text: text.to_string(),
            timestamp: Local::now(),
        });
    }
}

/// Execute a selection sequentially on a background task
///
/// The session is moved into the worker: all operations share one
/// physical link and must not interleave. Each selected item emits a
/// Started event, its log lines, then a Result event; the stream closes
/// after the last item.
pub fn spawn<L>(mut session: ProtocolSession<L>, selection: Vec<usize>) -> TestRun
where
    L: SerialLink + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let log = EventLog { tx: tx.clone() };

        for (run_index, def) in plan(&selection).into_iter().enumerate() {
            let _ = tx.send(ProgressEvent::Started { index: run_index });

            let success = match def.op {
                Operation::EnterNormal => session.enter_normal(&log).await,
                Operation::EnterInspect => session.enter_inspect(&log).await,
                Operation::CheckStorage(kind) => session.check_storage(kind, &log).await,
                Operation::ReadLoadCell => session.read_load_cell(&log).await,
                Operation::ReadShock(channel) => session.read_shock(channel, &log).await,
                Operation::ReadImu => session.read_imu(&log).await,
                Operation::ReadAltimeter => session.read_altimeter(&log).await,
                Operation::ClearStorage(kind) => session.clear_storage(kind, &log).await,
                Operation::EnterLaunch => session.enter_launch(&log).await,
            };

            let _ = tx.send(ProgressEvent::Result {
                index: run_index,
                success,
            });
        }
    });

    TestRun { handle, events }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::wire::DEFAULT_TERMINATOR;
    use crate::transport::link::mock::ScriptedLink;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.protocol.read_timeout_ms = 50;
        config.protocol.settle_secs = 0;
        config.protocol.stabilize_ms = 0;
        config
    }

    async fn collect_events(mut run: TestRun) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = run.events.recv().await {
            events.push(event);
        }
        run.handle.await.unwrap();
        events
    }

    fn skeleton(events: &[ProgressEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Started { index } => Some(format!("started {}", index)),
                ProgressEvent::Result { index, success } => {
                    Some(format!("result {} {}", index, success))
                }
                ProgressEvent::Log { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<_> = CATALOG.iter().map(|d| d.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_default_selection_excludes_destructive_ops() {
        let selection = default_selection();
        for &index in &selection {
            assert!(!CATALOG[index].op.is_destructive());
        }
        // clears and launch are in the catalog but not the default batch
        assert_eq!(selection.len(), CATALOG.len() - 4);
    }

    #[test]
    fn test_plan_orders_by_catalog_and_dedupes() {
        let defs = plan(&[5, 1, 1, 99, 0]);
        let names: Vec<_> = defs.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["Enter Normal Mode", "Enter Inspect Mode", "Read Load Cell"]
        );
    }

    #[tokio::test]
    async fn test_run_executes_in_catalog_order_not_selection_order() {
        let link = ScriptedLink::new();
        // catalog order: Enter Normal (0x00) then Enter Inspect (0x01)
        link.feed_frame(&[0x00], DEFAULT_TERMINATOR);
        link.feed_frame(&[0x01], DEFAULT_TERMINATOR);

        let written = link.clone();
        let session = ProtocolSession::new(link, &test_config());

        // user picked inspect first; catalog order must win
        let run = spawn(session, vec![1, 0]);
        let events = collect_events(run).await;

        assert_eq!(
            skeleton(&events),
            vec!["started 0", "result 0 true", "started 1", "result 1 true"]
        );

        let frames = written.written_frames();
        assert_eq!(frames[0][0], 0x00);
        assert_eq!(frames[1][0], 0x01);
    }

    #[tokio::test]
    async fn test_one_started_result_pair_per_item() {
        let link = ScriptedLink::new();
        link.feed_frame(&[0x00], DEFAULT_TERMINATOR); // normal: pass
                                                      // inspect: silent board, fails on timeout

        let session = ProtocolSession::new(link, &test_config());
        let run = spawn(session, vec![0, 1]);
        let events = collect_events(run).await;

        assert_eq!(
            skeleton(&events),
            vec!["started 0", "result 0 true", "started 1", "result 1 false"]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_remaining_items() {
        let link = ScriptedLink::new();
        link.feed_frame(&[0x42], DEFAULT_TERMINATOR); // normal: wrong ack
        link.feed_frame(&[0x01], DEFAULT_TERMINATOR); // inspect: pass

        let session = ProtocolSession::new(link, &test_config());
        let run = spawn(session, vec![0, 1]);
        let events = collect_events(run).await;

        assert_eq!(
            skeleton(&events),
            vec!["started 0", "result 0 false", "started 1", "result 1 true"]
        );
    }

    #[tokio::test]
    async fn test_log_events_carry_operation_lines() {
        let link = ScriptedLink::new();
        link.feed_frame(&[0x01], DEFAULT_TERMINATOR);

        let session = ProtocolSession::new(link, &test_config());
        let run = spawn(session, vec![1]);
        let events = collect_events(run).await;

        let logs: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Log { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(logs.iter().any(|l| l.contains("inspect mode transition acknowledged")));
    }

    #[tokio::test]
    async fn test_stream_closes_after_last_item() {
        let link = ScriptedLink::new();
        link.feed_frame(&[0x00], DEFAULT_TERMINATOR);

        let session = ProtocolSession::new(link, &test_config());
        let mut run = spawn(session, vec![0]);

        while run.events.recv().await.is_some() {}
        // recv returned None: channel closed, worker done
        run.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_state_reducer_follows_events() {
        let link = ScriptedLink::new();
        link.feed_frame(&[0x00], DEFAULT_TERMINATOR);
        link.feed_frame(&[0x42], DEFAULT_TERMINATOR); // inspect: wrong ack

        let session = ProtocolSession::new(link, &test_config());
        let selection = vec![0, 1];
        let mut state = RunState::new(&selection);
        assert_eq!(state.results.len(), 2);
        assert_eq!(state.results[0].status, TestStatus::Pending);
        assert!(!state.finished());

        let run = spawn(session, selection);
        for event in collect_events(run).await {
            state.apply(&event);
        }

        assert!(state.finished());
        assert_eq!(state.results[0].name, "Enter Normal Mode");
        assert_eq!(state.results[0].status, TestStatus::Pass);
        assert_eq!(state.results[1].status, TestStatus::Fail);
        assert!(!state.results[0].logs.is_empty());
        assert!(state.results[1]
            .logs
            .iter()
            .any(|l| l.text.contains("acknowledgment mismatch")));
    }

    #[test]
    fn test_run_state_log_ignored_when_nothing_running() {
        let mut state = RunState::new(&[0]);
        state.apply(&ProgressEvent::Log {
            text: "stray".to_string(),
            timestamp: Local::now(),
        });
        assert!(state.results[0].logs.is_empty());
    }
}
