//! Kanban board interface.
//!
//! Tasks are laid out in one column per status. Moving a card sends a drop
//! event to the `StatusController`, which updates the store optimistically and
//! persists in the background; the board redraws whenever the store changes.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::debug;

use crate::board::{plan_move, Board, Step};
use crate::controller::StatusController;
use crate::fields::Status;
use crate::store::{TaskCollection, TaskStore};
use crate::task::Task;
use crate::tui::colors::{status_color, SELECTED};
use crate::tui::input::InputField;
use crate::utils::{format_due_relative, format_priority, format_status};

const COLUMNS: usize = Status::ALL.len();

/// Main board state.
pub struct BoardApp {
    controller: StatusController,
    project_id: u64,
    project_name: String,
    tasks: Vec<Task>,
    board: Board,
    column_scroll_offsets: [usize; COLUMNS],
    selected_column: usize,
    selected_card: usize,
    /// Keep the selection on this card after the next refresh.
    follow: Option<u64>,
    status_message: String,
    show_task_detail: bool,
    filter_active: bool,
    filter: InputField,
}

impl BoardApp {
    pub fn new(controller: StatusController, project_id: u64, project_name: impl Into<String>) -> Self {
        let mut app = BoardApp {
            controller,
            project_id,
            project_name: project_name.into(),
            tasks: Vec::new(),
            board: Board::columns(&Default::default()),
            column_scroll_offsets: [0; COLUMNS],
            selected_column: 0,
            selected_card: 0,
            follow: None,
            status_message: String::new(),
            show_task_detail: false,
            filter_active: false,
            filter: InputField::new(),
        };
        app.refresh();
        app
    }

    fn store(&self) -> &TaskStore {
        self.controller.store()
    }

    /// Pull the latest collection and notices from the store and rebuild the columns.
    fn refresh(&mut self) {
        self.tasks = self.store().tasks();
        if let Some(notice) = self.store().take_notices().pop() {
            self.status_message = notice.message;
        }

        self.board = self.store().read(|tasks| Board::filtered(tasks, &self.filter.value));

        if let Some((column, card)) = self.follow.and_then(|id| self.board.locate(id)) {
            self.selected_column = column;
            self.selected_card = card;
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.selected_column >= COLUMNS {
            self.selected_column = 0;
        }
        let len = self.board.columns[self.selected_column].len();
        if len == 0 {
            self.selected_card = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    fn selected_task_id(&self) -> Option<u64> {
        self.board.columns[self.selected_column].task_ids.get(self.selected_card).copied()
    }

    fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    /// Move the selected card and let the controller persist it in the background.
    fn move_selected(&mut self, step: Step) {
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        if self.controller.is_pending(task_id) {
            self.set_status_message(format!("Task #{task_id} is still saving"));
            return;
        }
        let Some(event) = self.store().read(|tasks| plan_move(tasks, task_id, step)) else {
            return;
        };
        if let Some(to) = event.destination {
            if to.status != event.source.status {
                self.set_status_message(format!("Moving task to {}", format_status(to.status)));
            }
        }
        debug!(?event, "board drop");
        self.follow = Some(task_id);
        let controller = self.controller.clone();
        tokio::spawn(async move {
            controller.move_task(event).await;
        });
    }

    fn reload(&mut self) {
        let store = self.store().clone();
        let project_id = self.project_id;
        self.set_status_message("Refreshing...");
        tokio::spawn(async move {
            // Failures are recorded on the store and shown on the next refresh.
            let _ = store.fetch_tasks(project_id).await;
        });
    }

    /// Handle one key press. Returns true when the board should close.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.filter_active {
            match key.code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter = InputField::new();
                    self.status_message.clear();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    let shown = self.board.total();
                    if self.filter.value.is_empty() {
                        self.set_status_message("Filter cleared");
                    } else {
                        self.set_status_message(format!("Filter: '{}' ({shown} tasks shown)", self.filter.value));
                    }
                }
                KeyCode::Backspace => self.filter.handle_backspace(),
                KeyCode::Left => self.filter.move_cursor_left(),
                KeyCode::Right => self.filter.move_cursor_right(),
                KeyCode::Char(c) => self.filter.handle_char(c),
                _ => {}
            }
            return false;
        }

        self.status_message.clear();

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Esc | KeyCode::Char('q') => {
                if self.show_task_detail {
                    self.show_task_detail = false;
                } else {
                    return true;
                }
            }

            KeyCode::Enter => self.show_task_detail = !self.show_task_detail,

            // Card movement (check modifiers before plain navigation)
            KeyCode::Left if key.modifiers.contains(KeyModifiers::CONTROL) => self.move_selected(Step::Left),
            KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => self.move_selected(Step::Right),
            KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => self.move_selected(Step::Up),
            KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => self.move_selected(Step::Down),

            KeyCode::Left => {
                self.follow = None;
                self.selected_column = self.selected_column.saturating_sub(1);
                self.clamp_selection();
            }
            KeyCode::Right => {
                self.follow = None;
                if self.selected_column + 1 < COLUMNS {
                    self.selected_column += 1;
                }
                self.clamp_selection();
            }
            KeyCode::Up => {
                self.follow = None;
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down => {
                self.follow = None;
                let len = self.board.columns[self.selected_column].len();
                if self.selected_card + 1 < len {
                    self.selected_card += 1;
                }
            }

            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('/') => {
                self.filter_active = true;
                self.set_status_message("Filter: type to search titles, Enter to apply, Esc to cancel");
            }
            KeyCode::Char('h') => {
                self.set_status_message(
                    "Ctrl+←/→: Move card | Shift+↑/↓: Reorder | Enter: Details | /: Filter | r: Refresh | q: Exit",
                );
            }
            _ => {}
        }
        false
    }

    /// Main event loop. Redraws on key presses, store changes and a slow tick.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let mut events = EventStream::new();
        let mut revisions = self.store().subscribe();
        let mut tick = tokio::time::interval(Duration::from_millis(500));

        loop {
            self.refresh();
            terminal.draw(|f| self.render(f))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
                _ = revisions.changed() => {}
                _ = tick.tick() => {}
            }
        }
        Ok(())
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let loading = if self.store().is_loading() { "  (loading...)" } else { "" };
        let header = Line::from(vec![
            Span::styled("KANBAN", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!(
                    "Project: {} ({} tasks){loading}",
                    self.project_name,
                    self.store().read(TaskCollection::len)
                ),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]);
        let block = Paragraph::new(header)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(block, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let constraints: Vec<Constraint> = (0..COLUMNS)
            .map(|_| Constraint::Ratio(1, COLUMNS as u32))
            .collect();
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, &column_area) in layout.iter().enumerate() {
            self.render_column(f, column_area, i);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize) {
        let status = Status::ALL[column_index];
        let is_selected = column_index == self.selected_column;
        let border_style = if is_selected {
            Style::default().fg(status_color(status)).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let title = format!("{} ({})", format_status(status), self.board.columns[column_index].len());
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let card_height = 5;
        let visible_cards = (inner.height as usize / card_height).max(1);

        // Keep the selected card on screen
        let mut offset = self.column_scroll_offsets[column_index];
        if is_selected {
            if self.selected_card < offset {
                offset = self.selected_card;
            } else if self.selected_card >= offset + visible_cards {
                offset = self.selected_card + 1 - visible_cards;
            }
        }
        offset = offset.min(self.board.columns[column_index].len().saturating_sub(1));
        self.column_scroll_offsets[column_index] = offset;

        let mut y = 0;
        for (card_index, &task_id) in self.board.columns[column_index].task_ids.iter().enumerate().skip(offset) {
            if y + card_height > inner.height as usize {
                break;
            }
            let Some(task) = self.task(task_id) else {
                continue;
            };
            let card_area = Rect {
                x: inner.x,
                y: inner.y + y as u16,
                width: inner.width,
                height: card_height as u16,
            };
            self.render_card(f, card_area, task, is_selected && card_index == self.selected_card);
            y += card_height;
        }

        if offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
        let style = if is_selected {
            Style::default().bg(SELECTED).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Color::DarkGray)
        };

        let saving = if self.controller.is_pending(task.id) { "  saving…" } else { "" };
        let today = Local::now().date_naive();
        let assignee = task.assignee.as_ref().map(|a| a.name.as_str()).unwrap_or("unassigned");
        let lines = vec![
            Line::from(format!("#{}{saving}", task.id)),
            Line::from(task.title.clone()),
            Line::from(format!(
                "{} | {} | {}",
                format_priority(task.priority),
                format_due_relative(task.due_date, today),
                assignee
            )),
        ];

        let card = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .style(style)
            .wrap(Wrap { trim: true });
        f.render_widget(card, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if self.filter_active {
            format!("Filter: {} | Enter to apply, Esc to cancel", self.filter.value)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else if let Some(error) = self.store().last_error() {
            format!("Could not load tasks: {error} | r: Retry")
        } else {
            let total = self.board.total();
            let filter = if self.filter.value.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter.value)
            };
            format!("Tasks: {total}{filter} | Ctrl+←/→: Move | /: Filter | r: Refresh | h: Help")
        };

        let status = Paragraph::new(text)
            .style(Style::default().bg(status_color(Status::ALL[self.selected_column])).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task_id().and_then(|id| self.task(id)) else {
            return;
        };

        let area = f.area();
        let popup = Rect::new(
            area.width / 10,
            area.height / 10,
            area.width * 8 / 10,
            area.height * 8 / 10,
        );
        f.render_widget(Clear, popup);

        let today = Local::now().date_naive();
        let due = match task.due_date {
            Some(d) => format!("{} ({})", d.with_timezone(&Local).format("%Y-%m-%d %H:%M"), format_due_relative(Some(d), today)),
            None => "-".into(),
        };
        let lines = vec![
            Line::from(Span::styled(
                format!("Task #{}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Status:    {}", format_status(task.status))),
            Line::from(format!("Priority:  {}", format_priority(task.priority))),
            Line::from(format!("Due:       {due}")),
            Line::from(format!(
                "Assignee:  {}",
                task.assignee.as_ref().map(|a| a.name.as_str()).unwrap_or("-")
            )),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.clone().unwrap_or_else(|| "-".into())),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(status_color(task.status)).add_modifier(Modifier::BOLD));
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(paragraph, popup);
    }
}
