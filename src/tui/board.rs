//! Kanban board interface.
//!
//! Four columns, one per task status, fed from the search engine's filtered
//! view. Cards move between columns with Ctrl/Shift + arrows, the search
//! prompt and the filter keys narrow the view, and a background poller keeps
//! the collection fresh. Failures show up as toasts in the status bar and
//! never close the board.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::{debug, info};

use crate::cache::CacheOptions;
use crate::display::format_due_relative;
use crate::error::Error;
use crate::fields::{Priority, Status};
use crate::gateway::client::Gateway;
use crate::notify::Notifier;
use crate::poller::Poller;
use crate::prefs::{LocalState, ThemePrefs};
use crate::project::Project;
use crate::search::{FilterPatch, SearchEngine};
use crate::stats::{kanban_columns, Column};
use crate::store::EntityStore;
use crate::task::Task;
use crate::tui::colors::Palette;
use crate::tui::input::InputField;
use crate::tui::utils::{popup_area, wrap_words};

const COLUMN_COUNT: usize = 4;
const CARD_HEIGHT: usize = 6;

const HELP: &str = "←/→ column | ↑/↓ card | Ctrl/Shift+←/→ move | Enter details | c done | / search | \
                    s/p/o status/priority/project | x reset | X clear | r refresh | T theme | q quit";

/// Step an optional filter value through `options` and back to `None`.
pub fn cycle<'a>(current: Option<&str>, options: &[&'a str]) -> Option<&'a str> {
    match current.and_then(|c| options.iter().position(|o| *o == c)) {
        Some(i) => options.get(i + 1).copied(),
        None if current.is_none() => options.first().copied(),
        None => None,
    }
}

/// Main board state
pub struct Board {
    tasks: EntityStore<Task>,
    projects: EntityStore<Project>,
    engine: SearchEngine,
    poller: Option<Poller<Task>>,
    poll_failing: bool,
    notifier: Notifier,
    theme: ThemePrefs,
    state: LocalState,
    /// Store version last copied into the engine.
    synced_version: Option<u64>,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; COLUMN_COUNT],
    show_task_detail: bool,
    search: InputField,
}

impl Board {
    pub fn new(gateway: Arc<dyn Gateway>, cache: CacheOptions, state: LocalState) -> Self {
        let theme = ThemePrefs::load(&state);
        Board {
            tasks: EntityStore::with_cache(Arc::clone(&gateway), cache),
            projects: EntityStore::with_cache(gateway, cache),
            engine: SearchEngine::new(),
            poller: None,
            poll_failing: false,
            notifier: Notifier::new(),
            theme,
            state,
            synced_version: None,
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; COLUMN_COUNT],
            show_task_detail: false,
            search: InputField::new(),
        }
    }

    /// Refresh the task collection in the background every `interval`.
    pub fn with_polling(mut self, interval: Duration) -> Self {
        self.poller = Some(Poller::start(self.tasks.gateway(), interval));
        self
    }

    /// Initial fetch. Failures become toasts so the board still opens.
    pub fn load(&mut self) {
        if let Err(e) = self.projects.fetch_all() {
            self.report(e);
        }
        match self.tasks.fetch_all() {
            Ok(items) => info!(count = items.len(), "board loaded"),
            Err(e) => self.report(e),
        }
        self.sync_engine();
    }

    fn report(&mut self, e: Error) {
        self.notifier.error(e.to_string());
    }

    /// Copy the store's collection into the engine if it changed.
    fn sync_engine(&mut self) {
        let version = self.tasks.version();
        if self.synced_version != Some(version) {
            self.engine.set_tasks(self.tasks.items().to_vec());
            self.synced_version = Some(version);
            self.clamp_selection();
        }
    }

    /// Apply finished polls, expire toasts and resync the engine.
    fn tick(&mut self) {
        let results = match &self.poller {
            Some(poller) => poller.drain(),
            None => Vec::new(),
        };
        for result in results {
            match result {
                Ok(items) => {
                    if self.poll_failing {
                        self.notifier.info("Connection restored");
                    }
                    self.poll_failing = false;
                    self.tasks.apply_fetched(items);
                }
                Err(e) => {
                    if !self.poll_failing {
                        self.notifier.warning(format!("Background refresh failed: {e}"));
                    }
                    self.poll_failing = true;
                }
            }
        }
        self.sync_engine();
        self.notifier.prune_expired(Instant::now());
    }

    fn columns(&self) -> Vec<Column<'_>> {
        kanban_columns(self.engine.filtered_view())
    }

    fn column_len(&self, index: usize) -> usize {
        self.columns().get(index).map_or(0, |c| c.tasks.len())
    }

    fn selected_task_id(&self) -> Option<String> {
        let columns = self.columns();
        let task = columns.get(self.selected_column)?.tasks.get(self.selected_card)?;
        Some(task.id.clone())
    }

    /// Keep the selected card inside its column
    fn clamp_selection(&mut self) {
        let len = self.column_len(self.selected_column);
        if self.selected_card >= len {
            self.selected_card = len.saturating_sub(1);
        }
    }

    fn select_task(&mut self, id: &str) {
        let position = self
            .columns()
            .iter()
            .enumerate()
            .find_map(|(c, col)| col.tasks.iter().position(|t| t.id == id).map(|p| (c, p)));
        if let Some((column, card)) = position {
            self.selected_column = column;
            self.selected_card = card;
        } else {
            self.clamp_selection();
        }
    }

    /// Move the selected card `step` columns right (negative for left).
    fn move_card(&mut self, step: isize) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let target = self.selected_column as isize + step;
        if !(0..COLUMN_COUNT as isize).contains(&target) {
            return;
        }
        let status = Status::ALL[target as usize];
        match self.tasks.move_to(&id, status) {
            Ok(task) => {
                debug!(id = %task.id, status = status.as_str(), "card moved");
                self.sync_engine();
                self.select_task(&id);
                self.notifier.success(format!("Moved task to {}", status.label()));
            }
            Err(e) => self.report(e),
        }
    }

    /// Complete/uncomplete the selected task
    fn toggle_done(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let next = if Status::ALL[self.selected_column] == Status::Done { Status::Todo } else { Status::Done };
        match self.tasks.move_to(&id, next) {
            Ok(_) => {
                self.sync_engine();
                self.select_task(&id);
                self.notifier.success(format!("Marked {}", next.label()));
            }
            Err(e) => self.report(e),
        }
    }

    fn refresh(&mut self) {
        match self.tasks.fetch_all() {
            Ok(items) => {
                let count = items.len();
                self.notifier.info(format!("Loaded {count} tasks"));
            }
            Err(e) => self.report(e),
        }
        self.sync_engine();
    }

    fn filters_changed(&mut self) {
        self.selected_card = 0;
        self.column_scroll_offsets = [0; COLUMN_COUNT];
        self.clamp_selection();
    }

    fn cycle_status_filter(&mut self) {
        let options = Status::ALL.map(Status::as_str);
        let next = cycle(self.engine.criteria().status.as_deref(), &options);
        self.engine.update_filters(FilterPatch::status(next));
        self.filters_changed();
    }

    fn cycle_priority_filter(&mut self) {
        let options = Priority::ALL.map(Priority::as_str);
        let next = cycle(self.engine.criteria().priority.as_deref(), &options);
        self.engine.update_filters(FilterPatch::priority(next));
        self.filters_changed();
    }

    fn cycle_project_filter(&mut self) {
        let ids: Vec<&str> = self.projects.items().iter().map(|p| p.id.as_str()).collect();
        let next = cycle(self.engine.criteria().project_id.as_deref(), &ids).map(str::to_string);
        self.engine.update_filters(FilterPatch::project(next.as_deref()));
        self.filters_changed();
    }

    fn toggle_theme(&mut self) {
        match self.theme.toggle(&mut self.state) {
            Ok(theme) => {
                self.notifier.info(format!("Theme: {}", theme.as_str()));
            }
            Err(e) => self.report(e),
        }
    }

    /// Handle keyboard input
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(self.handle_key(key));
                }
            }
        }
        Ok(false)
    }

    /// Apply one key press. Returns true when the board should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.search.active {
            self.handle_search_key(key);
            return false;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') => return true,
            KeyCode::Esc if self.show_task_detail => self.show_task_detail = false,
            KeyCode::Esc => return true,

            KeyCode::Enter => self.show_task_detail = !self.show_task_detail,

            // Card movement (check first, before regular navigation)
            KeyCode::Left if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SHIFT) => {
                self.move_card(-1)
            }
            KeyCode::Right if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SHIFT) => {
                self.move_card(1)
            }

            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right => {
                if self.selected_column < COLUMN_COUNT - 1 {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Up => self.selected_card = self.selected_card.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_card + 1 < self.column_len(self.selected_column) {
                    self.selected_card += 1;
                }
            }

            KeyCode::Char('c') => self.toggle_done(),
            KeyCode::Char('/') => {
                self.search = InputField::with_value(&self.engine.criteria().query);
                self.search.active = true;
            }
            KeyCode::Char('s') => self.cycle_status_filter(),
            KeyCode::Char('p') => self.cycle_priority_filter(),
            KeyCode::Char('o') => self.cycle_project_filter(),
            KeyCode::Char('x') => {
                self.engine.reset_filters();
                self.filters_changed();
                self.notifier.info("Filters reset");
            }
            KeyCode::Char('X') => {
                self.engine.clear_filters();
                self.filters_changed();
                self.notifier.info("Search and filters cleared");
            }
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('T') => self.toggle_theme(),
            KeyCode::Char('h') | KeyCode::Char('?') => {
                self.notifier.info(HELP);
            }
            _ => {}
        }
        false
    }

    /// The search prompt filters live as the user types.
    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.search.active = false;
                self.search.clear();
            }
            KeyCode::Enter => {
                self.search.active = false;
                let count = self.engine.filtered_count();
                self.notifier.info(format!("{count} tasks match"));
                return;
            }
            KeyCode::Backspace => self.search.handle_backspace(),
            KeyCode::Delete => self.search.handle_delete(),
            KeyCode::Left => {
                self.search.move_cursor_left();
                return;
            }
            KeyCode::Right => {
                self.search.move_cursor_right();
                return;
            }
            KeyCode::Char(c) => self.search.handle_char(c),
            _ => return,
        }
        self.engine.update_filters(FilterPatch::query(self.search.value.clone()));
        self.filters_changed();
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.tick();
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }

    /// Render the kanban board
    fn render(&mut self, f: &mut Frame) {
        let palette = Palette::for_theme(self.theme.theme());
        f.render_widget(Block::default().style(Style::default().bg(palette.background).fg(palette.text)), f.area());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0], &palette);

        let columns = kanban_columns(self.engine.filtered_view());
        let areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, COLUMN_COUNT as u32); COLUMN_COUNT])
            .split(chunks[1]);
        for (i, column) in columns.iter().enumerate() {
            let selected = (i == self.selected_column).then_some(self.selected_card);
            render_column(f, areas[i], column, selected, &mut self.column_scroll_offsets[i], &palette);
        }

        self.render_status_bar(f, chunks[2], &palette);

        if self.show_task_detail {
            let task = columns.get(self.selected_column).and_then(|c| c.tasks.get(self.selected_card));
            if let Some(task) = task {
                self.render_task_detail_popup(f, task, &palette);
            }
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect, palette: &Palette) {
        let criteria = self.engine.criteria();
        let mut parts = vec![format!("{} of {} tasks", self.engine.filtered_count(), self.engine.tasks().len())];
        if !criteria.query.is_empty() {
            parts.push(format!("search '{}'", criteria.query));
        }
        if let Some(s) = criteria.status.as_deref() {
            parts.push(format!("status {s}"));
        }
        if let Some(p) = criteria.priority.as_deref() {
            parts.push(format!("priority {p}"));
        }
        if let Some(p) = criteria.project_id.as_deref() {
            parts.push(format!("project {}", self.projects.name_of(p)));
        }
        if self.engine.active_filter_count() > 0 {
            parts.push(format!("{} filters", self.engine.active_filter_count()));
        }

        let header_text = vec![Line::from(vec![
            Span::styled("TASKFLOW BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(parts.join(" | "), Style::default().fg(palette.accent).add_modifier(Modifier::ITALIC)),
        ])];

        let header_block =
            Paragraph::new(header_text).block(Block::default().borders(Borders::ALL)).alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    /// Render the status bar
    fn render_status_bar(&self, f: &mut Frame, area: Rect, palette: &Palette) {
        let (text, bg) = if self.search.active {
            (format!("Search: {}▏ | Enter to apply, Esc to clear", self.search.value), palette.accent)
        } else if let Some(toast) = self.notifier.latest() {
            (format!("[{}] {}", toast.kind.label(), toast.message), palette.toast(toast.kind))
        } else {
            ("h: Help | /: Search | Ctrl+←/→: Move | c: Done | r: Refresh | q: Quit".to_string(), palette.accent)
        };
        let status = Paragraph::new(text).style(Style::default().bg(bg).fg(palette.text_on(bg))).alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Render the task detail popup
    fn render_task_detail_popup(&self, f: &mut Frame, task: &Task, palette: &Palette) {
        let popup = popup_area(f.area(), 80);
        f.render_widget(Clear, popup);

        let today = Local::now().date_naive();
        let hours = |h: Option<f64>| h.map_or("-".to_string(), |h| format!("{h:.1}h"));
        let detail_lines = vec![
            Line::from(vec![Span::styled(
                format!("Task #{}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Status:     {}", task.status.label())),
            Line::from(vec![
                Span::raw("Priority:   "),
                Span::styled(task.priority.label(), Style::default().fg(palette.priority(task.priority))),
            ]),
            Line::from(format!("Project:    {}", self.projects.name_of(&task.project_id))),
            Line::from(format!("Assignee:   {}", task.assignee.as_deref().unwrap_or("-"))),
            Line::from(format!("Due:        {}", format_due_relative(task.due_date.as_deref(), today))),
            Line::from(format!("Estimate:   {}   Actual: {}", hours(task.estimated_hours), hours(task.actual_hours))),
            Line::from(format!("Tags:       {}", if task.tags.is_empty() { "-".to_string() } else { task.tags.join(", ") })),
            Line::from(format!("Created:    {}", task.created_at)),
            Line::from(""),
            Line::from("Description:"),
            Line::from(if task.description.is_empty() { "-" } else { task.description.as_str() }),
        ];

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(palette.status(task.status)).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(palette.background).fg(palette.text));

        f.render_widget(popup_paragraph, popup);
    }
}

/// Render a single column, scrolling so the selected card stays visible.
fn render_column(
    f: &mut Frame,
    area: Rect,
    column: &Column<'_>,
    selected: Option<usize>,
    scroll_offset: &mut usize,
    palette: &Palette,
) {
    let color = palette.status(column.status);
    let border_style = if selected.is_some() {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.muted)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} ({})", column.status.label(), column.tasks.len()))
        .border_style(border_style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if column.tasks.is_empty() {
        *scroll_offset = 0;
        return;
    }

    let available_height = inner.height as usize;
    let visible_cards = available_height / CARD_HEIGHT;
    if visible_cards == 0 {
        return;
    }

    if let Some(card) = selected {
        if card < *scroll_offset {
            *scroll_offset = card;
        } else if card >= *scroll_offset + visible_cards {
            *scroll_offset = card + 1 - visible_cards;
        }
    }
    *scroll_offset = (*scroll_offset).min(column.tasks.len().saturating_sub(1));

    let mut rendered = 0;
    for (index, task) in column.tasks.iter().enumerate().skip(*scroll_offset).take(visible_cards) {
        let card_area = Rect {
            x: inner.x,
            y: inner.y + (rendered * CARD_HEIGHT) as u16,
            width: inner.width,
            height: CARD_HEIGHT as u16,
        };
        render_card(f, card_area, task, selected == Some(index), palette);
        rendered += 1;
    }

    // Scroll indicators
    if *scroll_offset > 0 {
        let indicator = Paragraph::new(format!("▲ +{} above", *scroll_offset)).style(Style::default().fg(palette.accent));
        f.render_widget(indicator, Rect { height: 1, ..inner });
    }
    let remaining = column.tasks.len() - *scroll_offset - rendered;
    if remaining > 0 {
        let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(palette.accent));
        f.render_widget(indicator, Rect { y: inner.y + inner.height.saturating_sub(1), height: 1, ..inner });
    }
}

/// Render a single task card
fn render_card(f: &mut Frame, area: Rect, task: &Task, is_selected: bool, palette: &Palette) {
    let status_color = palette.status(task.status);
    let style = if is_selected {
        Style::default().bg(status_color).fg(palette.text_on(status_color)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(palette.card).fg(palette.text)
    };

    let mut card_text = vec![Line::from(vec![
        Span::raw(format!("#{} ", task.id)),
        Span::styled(task.priority.label(), Style::default().fg(palette.priority(task.priority))),
    ])];
    let available_width = area.width.saturating_sub(2) as usize;
    card_text.extend(wrap_words(&task.title, available_width, 2).into_iter().map(Line::from));
    let today = Local::now().date_naive();
    card_text.push(Line::from(format!(
        "{} | {}",
        format_due_relative(task.due_date.as_deref(), today),
        task.assignee.as_deref().unwrap_or("-")
    )));

    let card_block = Paragraph::new(card_text).block(Block::default().borders(Borders::ALL)).style(style);
    f.render_widget(card_block, area);
}
