//! Parsing and formatting helpers shared by the CLI and the board.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::fields::*;
use crate::task::Task;

/// Parse human-readable due date input.
///
/// Supports:
/// - "today", "tomorrow"
/// - weekday names, "next monday", "this friday"
/// - "end of week"/"eow", "end of month"/"eom"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD" (end of that day, local time) or a full RFC 3339 timestamp
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<DateTime<Utc>> {
    let raw = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_due_date(raw, today).and_then(end_of_day_utc)
}

fn parse_due_date(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "end of week" | "eow" => {
            let (_, end) = start_end_of_week(today);
            return Some(end);
        }
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)?;
            return Some(first_of_next - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let mut chars = rest.trim().chars();
        let days_per_unit = match chars.next_back() {
            Some('d') => Some(1),
            Some('w') => Some(7),
            // Approximate: 30 days per month
            Some('m') => Some(30),
            _ => None,
        };
        if let (Some(per), Ok(n)) = (days_per_unit, chars.as_str().trim().parse::<i64>()) {
            return n
                .checked_mul(per)
                .and_then(Duration::try_days)
                .and_then(|offset| today.checked_add_signed(offset));
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];
    let current = today.weekday().num_days_from_monday() as i64;
    for (name, target) in weekdays {
        let days_ahead = (target + 7 - current) % 7;
        if s == name || s == format!("this {name}") {
            return Some(today + Duration::days(days_ahead));
        }
        if s == format!("next {name}") {
            let days = if days_ahead == 0 { 7 } else { days_ahead + 7 };
            return Some(today + Duration::days(days));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Last second of the given local day, as UTC.
fn end_of_day_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(23, 59, 59)?;
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start and end dates of the ISO week (Monday to Sunday) containing `today`.
pub fn start_end_of_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    (start, start + Duration::days(6))
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<DateTime<Utc>>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let days = (d.with_timezone(&Local).date_naive() - today).num_days();
            match days {
                0 => "today".into(),
                1 => "tomorrow".into(),
                n if n > 1 => format!("in {n}d"),
                n => format!("{}d late", -n),
            }
        }
    }
}

/// Column title for a status.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::ToDo => "To Do",
        Status::InProgress => "In Progress",
        Status::Done => "Done",
    }
}

pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
    }
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[&Task]) {
    println!(
        "{:<5} {:<12} {:<7} {:<10} {:<16} {}",
        "ID", "Status", "Pri", "Due", "Assignee", "Title"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let assignee = t.assignee.as_ref().map(|a| a.name.as_str()).unwrap_or("-");
        println!(
            "{:<5} {:<12} {:<7} {:<10} {:<16} {}",
            t.id,
            format_status(t.status),
            format_priority(t.priority),
            format_due_relative(t.due_date, today),
            truncate(assignee, 16),
            t.title,
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn local_day(d: DateTime<Utc>) -> NaiveDate {
        d.with_timezone(&Local).date_naive()
    }

    #[rstest]
    #[case("today", 19)]
    #[case("tomorrow", 20)]
    #[case("friday", 23)]
    #[case("this fri", 23)]
    #[case("monday", 19)]
    #[case("next monday", 26)]
    #[case("next wed", 28)]
    #[case("eow", 25)]
    #[case("in 3d", 22)]
    #[case("in 1w", 26)]
    #[case("2026-10-30", 30)]
    fn parses_relative_dates(#[case] input: &str, #[case] day: u32) {
        let due = parse_due_input(input, monday()).unwrap();
        assert_eq!(local_day(due), NaiveDate::from_ymd_opt(2026, 10, day).unwrap());
    }

    #[test]
    fn end_of_month_handles_december() {
        let dec = NaiveDate::from_ymd_opt(2026, 12, 5).unwrap();
        let due = parse_due_input("eom", dec).unwrap();
        assert_eq!(local_day(due), NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn accepts_rfc3339_timestamps() {
        let due = parse_due_input("2026-11-02T09:30:00Z", monday()).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2026, 11, 2, 9, 30, 0).unwrap());
    }

    #[rstest]
    #[case("someday")]
    #[case("in xd")]
    #[case("in 3é")]
    #[case("in é")]
    #[case("in 99999999999d")]
    #[case("in 9223372036854775807m")]
    #[case("in -99999999999w")]
    fn rejects_garbage_and_out_of_range(#[case] input: &str) {
        assert!(parse_due_input(input, monday()).is_none());
    }

    #[test]
    fn relative_formatting() {
        let today = monday();
        let at = |d: u32| parse_due_input(&format!("2026-10-{d:02}"), today);
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(at(19), today), "today");
        assert_eq!(format_due_relative(at(20), today), "tomorrow");
        assert_eq!(format_due_relative(at(24), today), "in 5d");
        assert_eq!(format_due_relative(at(17), today), "2d late");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("Dana", 16), "Dana");
        assert_eq!(truncate("Alexandria Ocasio", 8), "Alexand…");
    }
}
