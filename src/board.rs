//! Kanban column model and keyboard drops.
//!
//! The board shows one column per status, in `Status::ALL` order. Columns hold
//! task ids in collection order, so index `n` on screen is index `n` within the
//! status column the controller works with (when no filter is applied).

use crate::controller::{DropEvent, Position};
use crate::fields::Status;
use crate::store::TaskCollection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub status: Status,
    pub task_ids: Vec<u64>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub columns: [Column; Status::ALL.len()],
}

impl Board {
    /// Lay out every task in the collection.
    pub fn columns(tasks: &TaskCollection) -> Self {
        Self::filtered(tasks, "")
    }

    /// Lay out tasks whose title contains `query`, ignoring case.
    pub fn filtered(tasks: &TaskCollection, query: &str) -> Self {
        let needle = query.trim().to_lowercase();
        let columns = Status::ALL.map(|status| Column {
            status,
            task_ids: tasks
                .column(status)
                .into_iter()
                .filter(|t| needle.is_empty() || t.title.to_lowercase().contains(&needle))
                .map(|t| t.id)
                .collect(),
        });
        Board { columns }
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    /// Column and row of a task on the board.
    pub fn locate(&self, task_id: u64) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(c, column)| {
            column
                .task_ids
                .iter()
                .position(|&id| id == task_id)
                .map(|row| (c, row))
        })
    }
}

/// Direction of a keyboard card move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Left,
    Right,
    Up,
    Down,
}

/// Translate a keyboard move of `task_id` into the drop a drag would report.
/// Left/Right append to the neighbouring column; Up/Down swap with the
/// neighbouring card. `None` at the board edges or for unknown tasks.
pub fn plan_move(tasks: &TaskCollection, task_id: u64, step: Step) -> Option<DropEvent> {
    let task = tasks.get(task_id)?;
    let column = tasks.column(task.status);
    let index = column.iter().position(|t| t.id == task_id)?;
    let source = Position::new(task.status, index);

    let destination = match step {
        Step::Left => {
            let status = Status::from_column(task.status.column().checked_sub(1)?)?;
            Position::new(status, tasks.column(status).len())
        }
        Step::Right => {
            let status = Status::from_column(task.status.column() + 1)?;
            Position::new(status, tasks.column(status).len())
        }
        Step::Up => Position::new(task.status, index.checked_sub(1)?),
        Step::Down if index + 1 < column.len() => Position::new(task.status, index + 1),
        Step::Down => return None,
    };

    Some(DropEvent {
        task_id,
        source,
        destination: Some(destination),
    })
}
