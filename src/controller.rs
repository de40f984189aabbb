//! Optimistic task status changes.
//!
//! A card dropped into another status column moves there immediately; the
//! change is then sent to the server. The server's reply replaces the local
//! record, or, if the call fails, the card snaps back to exactly where it was
//! and a notice is queued for the user.
//!
//! Only one status request per task is in flight at a time. A task with a
//! pending request ignores further drops until that request resolves.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::fields::Status;
use crate::store::{Notice, TaskStore};
use crate::task::{Task, TaskPatch};
use crate::utils::format_status;

/// A card location on the board: status column and index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub status: Status,
    pub index: usize,
}

impl Position {
    pub fn new(status: Status, index: usize) -> Self {
        Position { status, index }
    }
}

/// Result of a drag gesture as reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropEvent {
    pub task_id: u64,
    pub source: Position,
    /// `None` when the card was dropped outside every column.
    pub destination: Option<Position>,
}

/// What `move_task` did with a drop.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// No destination, or the task is no longer loaded.
    Ignored,
    /// Dropped back where it started.
    Unchanged,
    /// Reordered within its column; nothing to persist.
    Reordered,
    /// A status request for this task is still pending.
    Busy,
    /// The server accepted the new status; holds the reconciled record.
    Persisted(Task),
    /// The server call failed and the task was restored.
    RolledBack(Notice),
}

struct PreImage {
    task: Task,
    index: usize,
}

enum Stage {
    Missing,
    Busy,
    Unchanged,
    Reordered,
    Optimistic(PreImage),
}

/// Clears a task's in-flight mark when the move finishes or its future is dropped.
struct Pending<'a> {
    in_flight: &'a Mutex<HashSet<u64>>,
    id: u64,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

/// Applies drops to a `TaskStore`.
#[derive(Clone)]
pub struct StatusController {
    store: TaskStore,
    in_flight: Arc<Mutex<HashSet<u64>>>,
}

impl StatusController {
    pub fn new(store: TaskStore) -> Self {
        StatusController {
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// True while a status request for `task_id` is outstanding.
    pub fn is_pending(&self, task_id: u64) -> bool {
        self.in_flight.lock().contains(&task_id)
    }

    /// Move a task to the drop destination.
    pub async fn move_task(&self, event: DropEvent) -> MoveOutcome {
        let id = event.task_id;
        let Some(to) = event.destination else {
            debug!(id, "drop outside any column");
            return MoveOutcome::Ignored;
        };

        let stage = {
            let mut in_flight = self.in_flight.lock();
            self.store.edit(|tasks| {
                let Some(index) = tasks.position(id) else {
                    return Stage::Missing;
                };
                if in_flight.contains(&id) {
                    return Stage::Busy;
                }
                let pre_image = tasks.tasks()[index].clone();
                if pre_image.status == to.status {
                    if event.source.index == to.index {
                        return Stage::Unchanged;
                    }
                    tasks.place(id, to.status, to.index);
                    return Stage::Reordered;
                }
                tasks.place(id, to.status, to.index);
                in_flight.insert(id);
                Stage::Optimistic(PreImage { task: pre_image, index })
            })
        };

        let pre = match stage {
            Stage::Missing => {
                debug!(id, "dropped task is no longer loaded");
                return MoveOutcome::Ignored;
            }
            Stage::Busy => {
                debug!(id, "status change already pending");
                return MoveOutcome::Busy;
            }
            Stage::Unchanged => return MoveOutcome::Unchanged,
            Stage::Reordered => return MoveOutcome::Reordered,
            Stage::Optimistic(pre) => pre,
        };
        let _pending = Pending {
            in_flight: &self.in_flight,
            id,
        };

        let result = self
            .store
            .api()
            .update_task(id, &TaskPatch::status(to.status))
            .await;

        match result {
            Ok(server) => {
                let merged = server.reconciled_with(&pre.task);
                self.store.edit(|tasks| tasks.replace_task(merged.clone()));
                info!(id, from = ?pre.task.status, to = ?merged.status, "task status saved");
                MoveOutcome::Persisted(merged)
            }
            Err(e) => {
                warn!(id, error = %e, "status change failed, restoring task");
                let from = pre.task.status;
                let notice = Notice::new(
                    Some(id),
                    format!(
                        "Couldn't move \"{}\" to {}; it stays in {}. ({e})",
                        pre.task.title,
                        format_status(to.status),
                        format_status(from),
                    ),
                );
                self.store.edit(|tasks| tasks.restore(pre.task, pre.index));
                self.store.push_notice(notice.clone());
                MoveOutcome::RolledBack(notice)
            }
        }
    }

    /// Move a task to the end of a status column. Already last there is `Unchanged`.
    pub async fn move_to_status(&self, task_id: u64, status: Status) -> MoveOutcome {
        let source = self.store.read(|tasks| {
            let task = tasks.get(task_id)?;
            let index = tasks.column(task.status).iter().position(|t| t.id == task_id)?;
            Some(Position::new(task.status, index))
        });
        let Some(source) = source else {
            return MoveOutcome::Ignored;
        };
        let len = self.store.read(|tasks| tasks.column(status).len());
        // Within its own column the last slot is len - 1.
        let end = if status == source.status { len.saturating_sub(1) } else { len };
        self.move_task(DropEvent {
            task_id,
            source,
            destination: Some(Position::new(status, end)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::task::Assignee;
    use crate::testing::{task, FakeApi};
    use rstest::rstest;

    async fn loaded(api: Arc<FakeApi>) -> StatusController {
        let store = TaskStore::new(api);
        store.fetch_tasks(1).await.unwrap();
        StatusController::new(store)
    }

    fn drop_to(task_id: u64, from: (Status, usize), to: (Status, usize)) -> DropEvent {
        DropEvent {
            task_id,
            source: Position::new(from.0, from.1),
            destination: Some(Position::new(to.0, to.1)),
        }
    }

    fn dana() -> Assignee {
        Assignee { id: 3, name: "Dana".into(), avatar_url: None }
    }

    #[tokio::test]
    async fn same_position_drop_changes_nothing() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, Status::ToDo), task(2, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let before = ctl.store().tasks();
        let revision = ctl.store().revision();

        let outcome = ctl.move_task(drop_to(2, (Status::ToDo, 1), (Status::ToDo, 1))).await;

        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert_eq!(ctl.store().tasks(), before);
        assert_eq!(ctl.store().revision(), revision);
        assert_eq!(api.calls(), vec!["GET /api/tasks?projectId=1"]);
    }

    #[tokio::test]
    async fn reorder_within_column_is_local_only() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, Status::ToDo), task(2, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;

        let outcome = ctl.move_task(drop_to(2, (Status::ToDo, 1), (Status::ToDo, 0))).await;

        assert_eq!(outcome, MoveOutcome::Reordered);
        let order: Vec<u64> = ctl.store().tasks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn unknown_task_is_ignored_without_api_call() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let before = ctl.store().tasks();

        let outcome = ctl.move_task(drop_to(42, (Status::ToDo, 0), (Status::Done, 0))).await;

        assert_eq!(outcome, MoveOutcome::Ignored);
        assert_eq!(ctl.store().tasks(), before);
        assert_eq!(api.calls().len(), 1);
        assert!(ctl.store().take_notices().is_empty());
    }

    #[tokio::test]
    async fn drop_outside_columns_is_ignored() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let event = DropEvent {
            task_id: 1,
            source: Position::new(Status::ToDo, 0),
            destination: None,
        };
        assert_eq!(ctl.move_task(event).await, MoveOutcome::Ignored);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn status_is_applied_before_server_replies() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(7, Status::ToDo)]).holding_updates());
        let ctl = loaded(api.clone()).await;
        let mut rx = ctl.store().subscribe();
        rx.borrow_and_update();

        let handle = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_task(drop_to(7, (Status::ToDo, 0), (Status::InProgress, 0))).await }
        });
        api.update_started().await;

        assert_eq!(ctl.store().task(7).unwrap().status, Status::InProgress);
        assert!(rx.has_changed().unwrap());
        assert!(ctl.is_pending(7));

        api.release_update();
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Persisted(ref t) if t.status == Status::InProgress));
        assert!(!ctl.is_pending(7));
        assert_eq!(api.calls(), vec!["GET /api/tasks?projectId=1", "PUT /api/tasks/7"]);
    }

    #[tokio::test]
    async fn failed_update_restores_pre_image_and_notifies() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(7, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let before = ctl.store().task(7).unwrap();
        api.fail_next_update(ApiError::Transport("connection reset".into()));

        let outcome = ctl.move_task(drop_to(7, (Status::ToDo, 0), (Status::InProgress, 0))).await;

        assert_eq!(ctl.store().task(7).unwrap(), before);
        let notices = ctl.store().take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].task_id, Some(7));
        assert!(notices[0].message.contains("connection reset"));
        assert!(matches!(outcome, MoveOutcome::RolledBack(n) if n == notices[0]));
        assert!(!ctl.is_pending(7));
    }

    #[tokio::test]
    async fn rollback_returns_card_to_original_slot() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task(1, Status::ToDo),
            task(2, Status::ToDo),
            task(3, Status::Done),
        ]));
        let ctl = loaded(api.clone()).await;
        api.fail_next_update(ApiError::Status { status: 409, message: "Conflict".into() });

        ctl.move_task(drop_to(1, (Status::ToDo, 0), (Status::Done, 1))).await;

        let order: Vec<u64> = ctl.store().tasks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn reply_without_assignee_keeps_local_assignee() {
        let mut local = task(8, Status::ToDo);
        local.assignee = Some(dana());
        let api = Arc::new(FakeApi::with_tasks(vec![local]));
        let ctl = loaded(api.clone()).await;
        api.strip_assignee_on_update();

        let outcome = ctl.move_task(drop_to(8, (Status::ToDo, 0), (Status::Done, 0))).await;

        let stored = ctl.store().task(8).unwrap();
        assert_eq!(stored.status, Status::Done);
        assert_eq!(stored.assignee, Some(dana()));
        assert_eq!(outcome, MoveOutcome::Persisted(stored));
    }

    #[tokio::test]
    async fn server_record_replaces_local_fields() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(4, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let mut reply = task(4, Status::InProgress);
        reply.title = "Renamed on server".into();
        api.reply_next_update(reply);

        ctl.move_task(drop_to(4, (Status::ToDo, 0), (Status::InProgress, 0))).await;

        let stored = ctl.store().task(4).unwrap();
        assert_eq!(stored.title, "Renamed on server");
        assert_eq!(stored.status, Status::InProgress);
    }

    #[tokio::test]
    async fn second_drop_while_pending_is_refused() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(5, Status::ToDo)]).holding_updates());
        let ctl = loaded(api.clone()).await;

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_task(drop_to(5, (Status::ToDo, 0), (Status::InProgress, 0))).await }
        });
        api.update_started().await;

        let second = ctl.move_task(drop_to(5, (Status::InProgress, 0), (Status::Done, 0))).await;
        assert_eq!(second, MoveOutcome::Busy);
        assert_eq!(ctl.store().task(5).unwrap().status, Status::InProgress);

        api.release_update();
        assert!(matches!(first.await.unwrap(), MoveOutcome::Persisted(_)));
        assert_eq!(api.calls().iter().filter(|c| c.starts_with("PUT")).count(), 1);
    }

    #[tokio::test]
    async fn task_deleted_while_pending_is_not_resurrected() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(6, Status::ToDo)]).holding_updates());
        let ctl = loaded(api.clone()).await;
        api.fail_next_update(ApiError::Transport("timeout".into()));

        let pending = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_task(drop_to(6, (Status::ToDo, 0), (Status::Done, 0))).await }
        });
        api.update_started().await;
        ctl.store().edit(|tasks| tasks.remove(6));
        api.release_update();

        assert!(matches!(pending.await.unwrap(), MoveOutcome::RolledBack(_)));
        assert!(ctl.store().task(6).is_none());
    }

    #[rstest]
    #[case(Status::ToDo, Status::Done)]
    #[case(Status::Done, Status::ToDo)]
    #[case(Status::InProgress, Status::ToDo)]
    #[case(Status::Done, Status::InProgress)]
    #[tokio::test]
    async fn any_status_can_move_to_any_other(#[case] from: Status, #[case] to: Status) {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, from)]));
        let ctl = loaded(api).await;
        let outcome = ctl.move_task(drop_to(1, (from, 0), (to, 0))).await;
        assert!(matches!(outcome, MoveOutcome::Persisted(ref t) if t.status == to));
    }

    #[tokio::test]
    async fn scenario_rejected_move_snaps_back() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(7, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        api.fail_next_update(ApiError::Transport("simulated network error".into()));

        ctl.move_to_status(7, Status::InProgress).await;

        assert_eq!(ctl.store().task(7).unwrap().status, Status::ToDo);
        assert_eq!(ctl.store().take_notices().len(), 1);
    }

    #[tokio::test]
    async fn scenario_null_assignee_reply_is_merged() {
        let mut local = task(8, Status::ToDo);
        local.assignee = Some(dana());
        let api = Arc::new(FakeApi::with_tasks(vec![local]));
        let ctl = loaded(api.clone()).await;
        api.reply_next_update(task(8, Status::Done));

        ctl.move_to_status(8, Status::Done).await;

        let stored = ctl.store().task(8).unwrap();
        assert_eq!(stored.status, Status::Done);
        assert_eq!(stored.assignee, Some(dana()));
    }

    #[tokio::test]
    async fn move_to_status_appends_to_target_column() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task(1, Status::ToDo),
            task(2, Status::Done),
            task(3, Status::Done),
        ]));
        let ctl = loaded(api).await;

        ctl.move_to_status(1, Status::Done).await;

        let done: Vec<u64> = ctl.store().read(|c| c.column(Status::Done).iter().map(|t| t.id).collect());
        assert_eq!(done, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn move_to_own_status_when_already_last_is_unchanged() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(1, Status::ToDo), task(2, Status::ToDo)]));
        let ctl = loaded(api.clone()).await;
        let revision = ctl.store().revision();

        assert_eq!(ctl.move_to_status(2, Status::ToDo).await, MoveOutcome::Unchanged);
        assert_eq!(ctl.store().revision(), revision);

        assert_eq!(ctl.move_to_status(1, Status::ToDo).await, MoveOutcome::Reordered);
        let order: Vec<u64> = ctl.store().tasks().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![2, 1]);
        assert!(!api.calls().iter().any(|c| c.starts_with("PUT")));
    }

    #[tokio::test]
    async fn abandoned_move_releases_the_task() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(4, Status::ToDo)]).holding_updates());
        let ctl = loaded(api.clone()).await;

        let handle = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.move_task(drop_to(4, (Status::ToDo, 0), (Status::Done, 0))).await }
        });
        api.update_started().await;
        assert!(ctl.is_pending(4));

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!ctl.is_pending(4));

        api.release_update();
        let retry = ctl.move_task(drop_to(4, (Status::Done, 0), (Status::InProgress, 0))).await;
        assert!(matches!(retry, MoveOutcome::Persisted(ref t) if t.status == Status::InProgress));
    }
}
