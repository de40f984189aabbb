//! Colors for the board columns and selection.

use ratatui::style::Color;

use crate::fields::Status;

pub const SLATE: Color = Color::Rgb(90, 100, 115);
pub const OCEAN: Color = Color::Rgb(30, 90, 160);
pub const DARK_GREEN: Color = Color::Rgb(0, 110, 40);

/// Highlight for the selected card.
pub const SELECTED: Color = Color::Rgb(255, 215, 0);

/// Accent color of a status column.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::ToDo => SLATE,
        Status::InProgress => OCEAN,
        Status::Done => DARK_GREEN,
    }
}
