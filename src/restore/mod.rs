//! Restore workflow: query the latest restore point, confirm, restore,
//! reboot. One state machine run per trigger, executed on its own task so
//! the confirmation prompt and a long-running restore never block the
//! caller. Concurrent runs are serialized through an internal async mutex.

pub mod powershell;

use crate::model::{AppEvent, RestoreEvent, RestoreFailure, RestorePointInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// System boundary for restore-point operations. The production
/// implementation shells out to PowerShell; tests substitute fakes.
#[async_trait]
pub trait RestoreBackend: Send + Sync {
    /// Most recent restore point (creation time descending, first result),
    /// or `None` when the system has none.
    async fn latest_restore_point(&self) -> Result<Option<RestorePointInfo>>;

    /// Restore the system to the given restore point.
    async fn restore_to(&self, sequence_number: u32) -> Result<()>;

    /// Ask the OS to reboot. Fire-and-forget from the workflow's view.
    async fn request_reboot(&self) -> Result<()>;

    /// Create a new restore point with the given description.
    async fn create_restore_point(&self, description: &str) -> Result<()>;
}

/// Asks the operator whether to proceed with a restore. The presenter side
/// owns how the question is actually posed.
#[async_trait]
pub trait ConfirmRestore: Send + Sync {
    async fn confirm(&self, point: &RestorePointInfo) -> bool;
}

pub struct RestoreWorkflow {
    backend: Arc<dyn RestoreBackend>,
    // Two concurrent workflow runs against the same OS restore state would
    // race each other; take the single-writer route instead.
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl RestoreWorkflow {
    pub fn new(backend: Arc<dyn RestoreBackend>) -> Self {
        Self {
            backend,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Trigger one workflow run. Returns immediately; every state the run
    /// enters is reported as an `AppEvent::Restore` on `event_tx`, ending
    /// with exactly one of `Done`, `Cancelled` or `Failed`.
    pub fn spawn(
        &self,
        confirm: Arc<dyn ConfirmRestore>,
        event_tx: UnboundedSender<AppEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let backend = self.backend.clone();
        let gate = self.gate.clone();
        tokio::spawn(async move {
            let _serialized = gate.lock().await;
            run_workflow(backend.as_ref(), confirm.as_ref(), &event_tx).await;
        })
    }

    /// Create a new restore point. Runs on the caller's task; this is a
    /// plain backend call, not part of the state machine.
    pub async fn create_restore_point(&self, description: &str) -> Result<()> {
        self.backend.create_restore_point(description).await
    }
}

async fn run_workflow(
    backend: &dyn RestoreBackend,
    confirm: &dyn ConfirmRestore,
    event_tx: &UnboundedSender<AppEvent>,
) {
    let send = |ev: RestoreEvent| {
        let _ = event_tx.send(AppEvent::Restore(ev));
    };

    send(RestoreEvent::Querying);
    let point = match backend.latest_restore_point().await {
        Err(e) => {
            send(RestoreEvent::Failed {
                reason: RestoreFailure::QueryError {
                    detail: format!("{e:#}"),
                },
            });
            return;
        }
        Ok(None) => {
            send(RestoreEvent::Failed {
                reason: RestoreFailure::NoRestorePointAvailable,
            });
            return;
        }
        Ok(Some(point)) => point,
    };

    send(RestoreEvent::AwaitingConfirmation {
        point: point.clone(),
    });
    if !confirm.confirm(&point).await {
        send(RestoreEvent::Cancelled);
        return;
    }

    send(RestoreEvent::Restoring {
        point: point.clone(),
    });
    if let Err(e) = backend.restore_to(point.sequence_number).await {
        // System state is assumed unchanged; no reboot is attempted.
        send(RestoreEvent::Failed {
            reason: RestoreFailure::RestoreError {
                detail: format!("{e:#}"),
            },
        });
        return;
    }

    // The restore has already happened; a failed reboot request cannot
    // undo it, so it is logged and the workflow still completes.
    send(RestoreEvent::RebootRequested);
    if let Err(e) = backend.request_reboot().await {
        tracing::warn!(error = %format!("{e:#}"), "reboot request failed after successful restore");
    }
    send(RestoreEvent::Done { point });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn point(seq: u32) -> RestorePointInfo {
        RestorePointInfo {
            sequence_number: seq,
            description: "Before driver update".into(),
            creation_time: "8/20/2026 10:15:04 AM".into(),
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        latest: Option<RestorePointInfo>,
        query_fails: bool,
        restore_fails: bool,
        reboot_fails: bool,
        restore_calls: AtomicUsize,
        reboot_calls: AtomicUsize,
        restored_seq: AtomicUsize,
    }

    #[async_trait]
    impl RestoreBackend for FakeBackend {
        async fn latest_restore_point(&self) -> Result<Option<RestorePointInfo>> {
            if self.query_fails {
                anyhow::bail!("WMI query refused");
            }
            Ok(self.latest.clone())
        }

        async fn restore_to(&self, sequence_number: u32) -> Result<()> {
            self.restore_calls.fetch_add(1, Ordering::SeqCst);
            self.restored_seq
                .store(sequence_number as usize, Ordering::SeqCst);
            if self.restore_fails {
                anyhow::bail!("Restore-Computer exited with status 1");
            }
            Ok(())
        }

        async fn request_reboot(&self) -> Result<()> {
            self.reboot_calls.fetch_add(1, Ordering::SeqCst);
            if self.reboot_fails {
                anyhow::bail!("Restart-Computer failed");
            }
            Ok(())
        }

        async fn create_restore_point(&self, _description: &str) -> Result<()> {
            Ok(())
        }
    }

    struct Answer {
        yes: bool,
        prompts: AtomicUsize,
    }

    impl Answer {
        fn new(yes: bool) -> Self {
            Self {
                yes,
                prompts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConfirmRestore for Answer {
        async fn confirm(&self, _point: &RestorePointInfo) -> bool {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.yes
        }
    }

    async fn collect_events(
        backend: Arc<FakeBackend>,
        confirm: Arc<Answer>,
    ) -> Vec<RestoreEvent> {
        let workflow = RestoreWorkflow::new(backend);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _ = workflow.spawn(confirm, tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            match ev {
                AppEvent::Restore(ev) => events.push(ev),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        events
    }

    #[tokio::test]
    async fn happy_path_restores_and_reboots_exactly_once() {
        let backend = Arc::new(FakeBackend {
            latest: Some(point(5)),
            ..Default::default()
        });
        let events = collect_events(backend.clone(), Arc::new(Answer::new(true))).await;

        assert!(matches!(events[0], RestoreEvent::Querying));
        assert!(matches!(events[1], RestoreEvent::AwaitingConfirmation { .. }));
        assert!(matches!(events[2], RestoreEvent::Restoring { .. }));
        assert!(matches!(events[3], RestoreEvent::RebootRequested));
        assert!(matches!(events[4], RestoreEvent::Done { .. }));
        assert_eq!(events.len(), 5);
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.reboot_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.restored_seq.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn decline_cancels_without_touching_the_system() {
        let backend = Arc::new(FakeBackend {
            latest: Some(point(7)),
            ..Default::default()
        });
        let confirm = Arc::new(Answer::new(false));
        let events = collect_events(backend.clone(), confirm.clone()).await;

        assert!(matches!(events.last(), Some(RestoreEvent::Cancelled)));
        assert_eq!(confirm.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.reboot_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_restore_point_fails_before_any_prompt() {
        let backend = Arc::new(FakeBackend::default());
        let confirm = Arc::new(Answer::new(true));
        let events = collect_events(backend.clone(), confirm.clone()).await;

        assert!(matches!(
            events.last(),
            Some(RestoreEvent::Failed {
                reason: RestoreFailure::NoRestorePointAvailable
            })
        ));
        assert_eq!(confirm.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_error_carries_the_diagnostic() {
        let backend = Arc::new(FakeBackend {
            query_fails: true,
            ..Default::default()
        });
        let events = collect_events(backend, Arc::new(Answer::new(true))).await;

        match events.last() {
            Some(RestoreEvent::Failed {
                reason: RestoreFailure::QueryError { detail },
            }) => assert!(detail.contains("WMI query refused")),
            other => panic!("expected QueryError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn restore_failure_skips_the_reboot() {
        let backend = Arc::new(FakeBackend {
            latest: Some(point(3)),
            restore_fails: true,
            ..Default::default()
        });
        let events = collect_events(backend.clone(), Arc::new(Answer::new(true))).await;

        match events.last() {
            Some(RestoreEvent::Failed {
                reason: RestoreFailure::RestoreError { detail },
            }) => assert!(detail.contains("Restore-Computer")),
            other => panic!("expected RestoreError, got {other:?}"),
        }
        assert_eq!(backend.reboot_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reboot_failure_still_reports_done() {
        let backend = Arc::new(FakeBackend {
            latest: Some(point(9)),
            reboot_fails: true,
            ..Default::default()
        });
        let events = collect_events(backend.clone(), Arc::new(Answer::new(true))).await;

        assert!(matches!(events.last(), Some(RestoreEvent::Done { .. })));
        assert_eq!(backend.reboot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_workflow_runs_are_serialized() {
        let backend = Arc::new(FakeBackend {
            latest: Some(point(1)),
            ..Default::default()
        });
        let workflow = RestoreWorkflow::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let h1 = workflow.spawn(Arc::new(Answer::new(true)), tx.clone());
        let h2 = workflow.spawn(Arc::new(Answer::new(true)), tx);
        let (r1, r2) = tokio::join!(h1, h2);
        r1.unwrap();
        r2.unwrap();

        let mut done = 0;
        while let Some(ev) = rx.recv().await {
            if matches!(ev, AppEvent::Restore(RestoreEvent::Done { .. })) {
                done += 1;
            }
        }
        // Both runs completed; the gate only orders them, it drops nothing.
        assert_eq!(done, 2);
        assert_eq!(backend.restore_calls.load(Ordering::SeqCst), 2);
    }
}
