use crate::commands::Context;
use anyhow::{Context as _, Result};
use chrono::Utc;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use stickyboard::api::ApiClient;
use stickyboard::config::Config;
use stickyboard::drag::{clamp_to_viewport, Drag, Pointer, NOTE_HEIGHT, NOTE_WIDTH};
use stickyboard::model::{BoardScope, Note, NoteDraft, NoteId, Viewport};
use stickyboard::storage::{Preferences, Session, StorageLocation};
use stickyboard::store::{Completion, NoteStore, Request, StoreError};
use stickyboard::sync::{dispatch, fetch};
use stickyboard::theme::{note_color, NoteStyle, Palette, ThemeName};
use stickyboard::views::View;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

pub fn run(
    ctx: &Context,
    session: Session,
    scope: BoardScope,
    preferences: Preferences,
) -> Result<()> {
    let runtime = Runtime::new().context("starting async runtime")?;
    let username = session.username.clone();
    let api = ApiClient::new(&ctx.config, session)?;
    let mut app = App::new(ctx, api, runtime, scope, username, preferences);
    app.refresh();
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    info!("board closed");
    result
}

struct App {
    config: Config,
    storage: StorageLocation,
    api: ApiClient,
    runtime: Runtime,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    scope: BoardScope,
    username: Option<String>,
    store: NoteStore,
    drag: Drag,
    /// Board size in pixels, taken from the last drawn board area.
    viewport: Viewport,
    board_area: Rect,
    view: View,
    mode: Mode,
    selected: usize,
    status: String,
    theme: ThemeName,
    note_style: NoteStyle,
    in_flight: usize,
    last_refresh: Option<Instant>,
}

enum Mode {
    Normal,
    Creating(FieldValue),
    ConfirmPurge { id: NoteId },
}

/// Single-line text input with a cursor.
#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(
        ctx: &Context,
        api: ApiClient,
        runtime: Runtime,
        scope: BoardScope,
        username: Option<String>,
        preferences: Preferences,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        let viewport = ctx.config.viewport;
        App {
            config: ctx.config.clone(),
            storage: ctx.storage.clone(),
            api,
            runtime,
            tx,
            rx,
            status: format!("Opened {} board", scope.label()),
            scope,
            username,
            store: NoteStore::new(ctx.config.note_limit),
            drag: Drag::new(viewport),
            viewport,
            board_area: Rect::default(),
            view: View::Board,
            mode: Mode::Normal,
            selected: 0,
            theme: preferences.theme,
            note_style: preferences.note_style,
            in_flight: 0,
            last_refresh: None,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_completions();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn submit(&mut self, request: Request) {
        debug!(id = %request.id(), "{}", request.describe());
        let api = self.api.clone();
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let completion = dispatch(&api, request).await;
            let _ = tx.send(completion);
        });
    }

    fn refresh(&mut self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        let scope = self.scope.clone();
        self.in_flight += 1;
        self.status = "Refreshing...".into();
        self.runtime.spawn(async move {
            let completion = fetch(&api, &scope).await;
            let _ = tx.send(completion);
        });
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let refreshed = matches!(completion, Completion::Refresh(Ok(_)));
            match self.store.settle(completion) {
                Some(message) => self.status = message,
                None if refreshed => {
                    self.last_refresh = Some(Instant::now());
                    self.status = format!("Loaded {} notes", self.store.notes().count());
                }
                None if self.in_flight == 0 => self.status = "All changes saved".into(),
                None => {}
            }
            let vanished = self
                .drag
                .dragged()
                .is_some_and(|id| self.store.get(id).is_none());
            if vanished {
                self.drag.cancel();
            }
            self.clamp_selection();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Creating(_) => {
                self.handle_form_key(key);
                Ok(false)
            }
            Mode::ConfirmPurge { .. } => {
                self.handle_confirm_key(key);
                Ok(false)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char(c @ '1'..='5') => {
                self.set_view(View::ALL[usize::from(c as u8 - b'1')]);
            }
            KeyCode::Tab => self.set_view(self.view.next()),
            KeyCode::Left if shift => self.nudge(-1, 0),
            KeyCode::Right if shift => self.nudge(1, 0),
            KeyCode::Up if shift => self.nudge(0, -1),
            KeyCode::Down if shift => self.nudge(0, 1),
            KeyCode::Char('H') => self.nudge(-1, 0),
            KeyCode::Char('L') => self.nudge(1, 0),
            KeyCode::Char('K') => self.nudge(0, -1),
            KeyCode::Char('J') => self.nudge(0, 1),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.select_prev(),
            KeyCode::Char('n') => self.open_create(),
            KeyCode::Char('+') => self.act(|store, id| store.begin_like(id)),
            KeyCode::Char('-') => self.act(|store, id| store.begin_dislike(id)),
            KeyCode::Char('c') => self.act(|store, id| store.begin_toggle_done(id)),
            KeyCode::Char('p') => {
                let private = self.current_note().map(|n| n.is_private).unwrap_or(false);
                self.act(|store, id| store.begin_set_private(id, !private));
            }
            KeyCode::Char('u') => self.act(|store, id| store.begin_restore(id)),
            KeyCode::Char('d') if self.view.is_archive() => self.open_confirm(),
            KeyCode::Char('d') => self.act(|store, id| store.begin_delete(id)),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('t') => self.cycle_theme(),
            KeyCode::Char('s') => self.cycle_note_style(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close_form = false;
        if let Mode::Creating(field) = &mut mode {
            match key.code {
                KeyCode::Esc => {
                    close_form = true;
                    self.status = "Canceled".into();
                }
                KeyCode::Enter => close_form = self.try_create(&field.value),
                KeyCode::Left => field.move_left(),
                KeyCode::Right => field.move_right(),
                KeyCode::Backspace => field.backspace(),
                KeyCode::Char(c)
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    field.insert_char(c)
                }
                _ => {}
            }
        }
        self.mode = if close_form { Mode::Normal } else { mode };
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let id = match &self.mode {
            Mode::ConfirmPurge { id } => id.clone(),
            _ => return,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                match self.store.begin_purge(&id) {
                    Ok(request) => {
                        self.status = format!("{}...", request.describe());
                        self.submit(request);
                    }
                    Err(err) => self.status = err.to_string(),
                }
                self.mode = Mode::Normal;
                self.clamp_selection();
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Permanent delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.view != View::Board || !matches!(self.mode, Mode::Normal) {
            return;
        }
        let area = self.board_area;
        let local = MouseEvent {
            column: mouse.column.saturating_sub(area.x),
            row: mouse.row.saturating_sub(area.y),
            ..mouse
        };
        let pointer = Pointer::from_mouse(&local, &self.config);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(id) = self.hit_test(mouse.column, mouse.row) else {
                    return;
                };
                self.select_id(&id);
                if let Err(err) = self.drag.press(&mut self.store, &id, pointer) {
                    self.status = err.to_string();
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                match self.drag.motion(&mut self.store, pointer, Instant::now()) {
                    Ok(Some(request)) => self.submit(request),
                    Ok(None) => {}
                    Err(err) => {
                        self.drag.cancel();
                        self.status = err.to_string();
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                match self.drag.release(&mut self.store, pointer) {
                    Ok(Some(request)) => {
                        self.status = "Note moved".into();
                        self.submit(request);
                    }
                    Ok(None) => {}
                    Err(err) => self.status = err.to_string(),
                }
            }
            _ => {}
        }
    }

    fn act<F>(&mut self, begin: F)
    where
        F: FnOnce(&mut NoteStore, &NoteId) -> Result<Request, StoreError>,
    {
        let Some(id) = self.current_id() else {
            self.status = "No note selected".into();
            return;
        };
        match begin(&mut self.store, &id) {
            Ok(request) => {
                self.status = format!("{}...", request.describe());
                self.submit(request);
            }
            Err(err) => self.status = err.to_string(),
        }
        self.clamp_selection();
    }

    /// Moves the selected note by whole cells and saves the new position.
    fn nudge(&mut self, columns: i32, rows: i32) {
        if self.view != View::Board {
            return;
        }
        let Some(note) = self.current_note() else {
            return;
        };
        let (x, y) = clamp_to_viewport(
            self.viewport,
            note.x + f64::from(columns) * self.config.cell_width,
            note.y + f64::from(rows) * self.config.cell_height,
        );
        let id = note.id.clone();
        let moved = self
            .store
            .begin_move(&id, x, y)
            .and_then(|()| self.store.begin_persist_position(&id));
        match moved {
            Ok(request) => self.submit(request),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn open_create(&mut self) {
        if self.view != View::Board {
            self.status = "Switch to the board (1) to add notes".into();
            return;
        }
        let limit = self.store.note_limit();
        if self.store.active_count() >= limit {
            self.status = StoreError::NoteLimit { limit }.to_string();
            return;
        }
        self.mode = Mode::Creating(FieldValue::new(""));
    }

    /// Returns whether the form should close.
    fn try_create(&mut self, text: &str) -> bool {
        let position = self.viewport.center_for_new_note();
        let draft = NoteDraft::new(text.trim(), &self.scope, self.username.clone(), position);
        match self.store.begin_create(draft, Utc::now()) {
            Ok(request) => {
                self.status = format!("{}...", request.describe());
                self.submit(request);
                self.selected = self.store.active_count().saturating_sub(1);
                true
            }
            Err(StoreError::EmptyText) => {
                self.status = "Type something first".into();
                false
            }
            Err(err) => {
                self.status = err.to_string();
                true
            }
        }
    }

    fn open_confirm(&mut self) {
        match self.current_id() {
            Some(id) => self.mode = Mode::ConfirmPurge { id },
            None => self.status = "No note selected".into(),
        }
    }

    fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        self.status = match self.save_preferences() {
            Ok(()) => format!("Theme: {}", self.theme),
            Err(err) => format!("Theme not saved: {:#}", err),
        };
    }

    fn cycle_note_style(&mut self) {
        self.note_style = self.note_style.next();
        self.status = match self.save_preferences() {
            Ok(()) => format!("Note style: {}", self.note_style),
            Err(err) => format!("Note style not saved: {:#}", err),
        };
    }

    fn save_preferences(&self) -> Result<()> {
        self.storage.save_preferences(&Preferences {
            theme: self.theme,
            note_style: self.note_style,
        })
    }

    fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.selected = 0;
            self.status = format!("Switched to {} view", view);
        }
    }

    fn visible(&self) -> Vec<&Note> {
        self.view.project(self.store.notes())
    }

    fn current_note(&self) -> Option<&Note> {
        self.visible().get(self.selected).copied()
    }

    fn current_id(&self) -> Option<NoteId> {
        self.current_note().map(|n| n.id.clone())
    }

    fn select_id(&mut self, id: &NoteId) {
        if let Some(idx) = self.visible().iter().position(|n| &n.id == id) {
            self.selected = idx;
        }
    }

    fn select_next(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    fn select_prev(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Topmost note under a terminal cell.
    fn hit_test(&self, column: u16, row: u16) -> Option<NoteId> {
        self.store
            .paint_order()
            .iter()
            .rev()
            .map(|(_, note)| (note_rect(&self.config, self.board_area, note), note))
            .find(|(rect, _)| {
                column >= rect.x
                    && column < rect.x + rect.width
                    && row >= rect.y
                    && row < rect.y + rect.height
            })
            .map(|(_, note)| note.id.clone())
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            View::Board => self.draw_board(f, layout[1]),
            _ => self.draw_list(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(field) => self.draw_form(f, field),
            Mode::ConfirmPurge { id } => self.draw_confirm(f, id),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let palette = self.theme.palette();
        let sync = if self.in_flight > 0 {
            Span::styled(
                format!("syncing {}", self.in_flight),
                Style::default().fg(Color::LightYellow),
            )
        } else {
            Span::styled("synced", Style::default().fg(Color::Green))
        };
        let refreshed = self
            .last_refresh
            .map(|at| format!("refreshed {}", format_elapsed(at)))
            .unwrap_or_else(|| "not loaded".into());
        let title = Line::from(vec![
            Span::styled(
                "stickyboard ",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.scope.label(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.to_string().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!(
                    "{} / {} notes",
                    self.store.active_count(),
                    self.store.note_limit()
                ),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} {}", palette.ornament, self.theme),
                Style::default().fg(palette.accent),
            ),
            Span::raw("  •  "),
            sync,
            Span::raw("  •  "),
            Span::styled(refreshed, Style::default().fg(Color::DarkGray)),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_board(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let palette = self.theme.palette();
        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", self.scope.label()),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border))
            .style(Style::default().bg(palette.background));
        let inner = block.inner(area);
        f.render_widget(block, area);

        self.board_area = inner;
        self.viewport = Viewport::new(
            f64::from(inner.width) * self.config.cell_width,
            f64::from(inner.height) * self.config.cell_height,
        );
        self.drag.set_viewport(self.viewport);
        f.render_widget(Paragraph::new(ornament_lines(inner, &palette)), inner);

        let layers = self.store.paint_order();
        if layers.is_empty() {
            let hint = Paragraph::new("No notes yet. Press n to add one.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(palette.text));
            f.render_widget(hint, centered_rect(60, 20, inner));
            return;
        }
        let selected = self.current_id();
        for (_, note) in layers {
            let rect = note_rect(&self.config, inner, note);
            if rect.width < 3 || rect.height < 3 {
                continue;
            }
            let card = note_card(
                note,
                self.note_style,
                selected.as_ref() == Some(&note.id),
                self.store.is_pending(&note.id),
            );
            f.render_widget(Clear, rect);
            f.render_widget(card, rect);
        }
    }

    fn draw_list(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let palette = self.theme.palette();
        let notes = self.visible();
        let width = area.width.saturating_sub(2);
        let items = if notes.is_empty() {
            vec![ListItem::new(Line::from(empty_message(self.view)))]
        } else {
            notes
                .iter()
                .enumerate()
                .map(|(idx, note)| note_item(note, width, idx == self.selected))
                .collect::<Vec<_>>()
        };
        let mut state = ListState::default();
        if !notes.is_empty() {
            state.select(Some(self.selected));
        }
        let block = Block::default()
            .title(Span::styled(
                format!(" {} ({}) ", self.view, notes.len()),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border))
            .style(Style::default().bg(palette.background));
        let list = List::new(items).block(block);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = match self.current_note() {
            Some(note) => selected_note_detail(note),
            None => Line::from("No note selected"),
        };
        let detail = Paragraph::new(detail).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Selected"),
        );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        let mut spans = vec![
            key("1-5", Color::LightCyan),
            Span::raw(" views  "),
            key("↑↓", Color::LightCyan),
            Span::raw(" select  "),
        ];
        if self.view.is_archive() {
            spans.extend([
                key("u", Color::LightGreen),
                Span::raw(" restore  "),
                key("d", Color::LightRed),
                Span::raw(" delete forever  "),
            ]);
        } else {
            if self.view == View::Board {
                spans.extend([
                    key("drag / shift+←↑↓→", Color::LightCyan),
                    Span::raw(" move  "),
                    key("n", Color::LightMagenta),
                    Span::raw(" new  "),
                ]);
            }
            spans.extend([
                key("+/-", Color::LightGreen),
                Span::raw(" like/dislike  "),
                key("c", Color::LightYellow),
                Span::raw(" done  "),
                key("p", Color::LightYellow),
                Span::raw(" private  "),
                key("d", Color::LightRed),
                Span::raw(" delete  "),
            ]);
        }
        spans.extend([
            key("r", Color::LightCyan),
            Span::raw(" refresh  "),
            key("t", Color::LightMagenta),
            Span::raw(" theme  "),
            key("s", Color::LightMagenta),
            Span::raw(" note style  "),
            key("q", Color::LightRed),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_form(&self, f: &mut ratatui::Frame<'_>, field: &FieldValue) {
        let area = centered_rect(60, 25, f.size());
        let lines = vec![
            field_line("Text", field),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        "New Note",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, id: &NoteId) {
        let area = centered_rect(50, 30, f.size());
        let text = self
            .store
            .get(id)
            .map(|n| truncate_text(&n.text, 40))
            .unwrap_or_else(|| id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Permanently delete \"{}\"?", text),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Cells a note covers inside `area`, clipped to it.
fn note_rect(config: &Config, area: Rect, note: &Note) -> Rect {
    let (column, row) = config.px_to_cell(note.x, note.y);
    let width = (NOTE_WIDTH / config.cell_width).ceil() as u16;
    let height = (NOTE_HEIGHT / config.cell_height).ceil() as u16;
    if column >= area.width || row >= area.height {
        return Rect::new(area.x, area.y, 0, 0);
    }
    Rect::new(
        area.x + column,
        area.y + row,
        width.min(area.width - column),
        height.min(area.height - row),
    )
}

// Faint theme pattern behind the notes.
fn ornament_lines(area: Rect, palette: &Palette) -> Vec<Line<'static>> {
    let style = Style::default().fg(palette.border).add_modifier(Modifier::DIM);
    (0..area.height)
        .map(|row| {
            let text: String = (0..area.width)
                .map(|col| {
                    let shifted = col + if row % 8 == 4 { 6 } else { 0 };
                    if row % 4 == 0 && shifted % 12 == 0 {
                        palette.ornament
                    } else {
                        ' '
                    }
                })
                .collect();
            Line::from(Span::styled(text, style))
        })
        .collect()
}

fn note_card(note: &Note, style: NoteStyle, selected: bool, pending: bool) -> Paragraph<'static> {
    let color = note_color(note.display_color());
    let mut title = format!(" +{} -{} ", note.likes, note.dislikes);
    if note.is_private {
        title.push_str("private ");
    }
    if pending {
        title.push_str("* ");
    }
    let border = if selected {
        BorderType::Double
    } else {
        style.border()
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(border)
        .border_style(Style::default().fg(Color::Black))
        .title(title);
    if selected {
        block = block.border_style(
            Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    }
    Paragraph::new(note.text.clone())
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(color).fg(Color::Black))
        .block(block)
}

fn empty_message(view: View) -> &'static str {
    match view {
        View::Board => "No notes yet",
        View::Done => "No completed notes",
        View::Deleted => "No deleted notes",
        View::Top => "No notes to rank yet",
        View::Important => "Nothing important right now",
    }
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn note_item(note: &Note, width: u16, selected: bool) -> ListItem<'static> {
    let inner_width = width.saturating_sub(4).max(10) as usize;
    let border_char = if selected { "=" } else { "-" };
    let horiz = border_char.repeat(inner_width + 2);
    let top = format!("+{}+", horiz);
    let text = truncate_text(&note.text, inner_width);
    let counts = format!("+{} -{}", note.likes, note.dislikes);
    let when = note
        .last_touched()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let meta = truncate_text(&format!("{}   {}", counts, when), inner_width);
    let lines = vec![
        Line::raw(top.clone()),
        Line::raw(format!("| {:width$} |", text, width = inner_width)),
        Line::raw(format!("| {:width$} |", meta, width = inner_width)),
        Line::raw(top),
    ];
    let accent = note_color(note.display_color());
    let mut item = ListItem::new(lines).style(Style::default().bg(Color::Rgb(22, 24, 30)).fg(accent));
    if selected {
        item = item.style(
            Style::default()
                .bg(accent)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    }
    item
}

fn field_line(label: &str, field: &FieldValue) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{}: ", label),
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD | Modifier::DIM),
        ),
        Span::styled(field.with_caret(), Style::default().fg(Color::Cyan)),
    ])
}

fn selected_note_detail(note: &Note) -> Line<'static> {
    let mut spans = vec![Span::styled(
        truncate_text(&note.text, 60),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("+{} -{}", note.likes, note.dislikes),
        Style::default().fg(Color::LightGreen),
    ));
    if let Some(author) = &note.username {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("@{}", author),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if note.is_private {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "private",
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
