//! Enumerations and field types for task management.
//!
//! This module defines the fixed value sets a task can carry (status and
//! priority) along with the CLI-only sorting and filtering options.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task workflow stage. Each value is one kanban column.
///
/// Any status may move to any other; there is no terminal stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    ToDo,
    InProgress,
    Done,
}

impl Status {
    /// Board column order.
    pub const ALL: [Status; 3] = [Status::ToDo, Status::InProgress, Status::Done];

    /// Position of this status on the board, left to right.
    pub fn column(self) -> usize {
        match self {
            Status::ToDo => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }

    /// Status of the column at `index`, if there is one.
    pub fn from_column(index: usize) -> Option<Status> {
        Status::ALL.get(index).copied()
    }
}

/// Task importance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Higher ranks sort first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Due,
    Priority,
    Id,
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    Tomorrow,
    ThisWeek,
    Overdue,
    None,
}
