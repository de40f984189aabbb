//! Summary views over a project's tasks: status counts and the due-date agenda.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::fields::Status;
use crate::task::Task;
use crate::utils::start_end_of_week;

/// Task counts per status plus overdue work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub to_do: usize,
    pub in_progress: usize,
    pub done: usize,
    pub overdue: usize,
}

impl StatusCounts {
    pub fn of(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut counts = StatusCounts::default();
        for t in tasks {
            match t.status {
                Status::ToDo => counts.to_do += 1,
                Status::InProgress => counts.in_progress += 1,
                Status::Done => counts.done += 1,
            }
            if t.is_overdue(now) {
                counts.overdue += 1;
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.to_do + self.in_progress + self.done
    }

    /// Share of tasks that are done, 0-100.
    pub fn percent_done(&self) -> u8 {
        match self.total() {
            0 => 0,
            total => ((self.done * 100) / total) as u8,
        }
    }
}

/// Tasks grouped by when they are due.
#[derive(Debug, Default)]
pub struct Agenda<'a> {
    pub today: Vec<&'a Task>,
    pub tomorrow: Vec<&'a Task>,
    pub this_week: Vec<&'a Task>,
    /// Later this year or beyond, past-week leftovers, and tasks with no due date.
    pub upcoming: Vec<&'a Task>,
}

impl<'a> Agenda<'a> {
    /// Group by local due day. Each group is sorted by priority, highest first,
    /// then by due date.
    pub fn build(tasks: &'a [Task], today: NaiveDate) -> Self {
        let mut agenda = Agenda::default();
        let tomorrow = today + Duration::days(1);
        let (week_start, week_end) = start_end_of_week(today);

        for t in tasks {
            let Some(due) = t.due_date else {
                agenda.upcoming.push(t);
                continue;
            };
            let day = due.with_timezone(&Local).date_naive();
            if day == today {
                agenda.today.push(t);
            } else if day == tomorrow {
                agenda.tomorrow.push(t);
            } else if day >= week_start && day <= week_end {
                agenda.this_week.push(t);
            } else {
                agenda.upcoming.push(t);
            }
        }

        for group in [
            &mut agenda.today,
            &mut agenda.tomorrow,
            &mut agenda.this_week,
            &mut agenda.upcoming,
        ] {
            sort_by_priority_then_due(group);
        }
        agenda
    }

    pub fn groups(&self) -> [(&'static str, &[&'a Task]); 4] {
        [
            ("Today", self.today.as_slice()),
            ("Tomorrow", self.tomorrow.as_slice()),
            ("This week", self.this_week.as_slice()),
            ("Upcoming", self.upcoming.as_slice()),
        ]
    }
}

fn sort_by_priority_then_due(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}
