use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::warn;

use crate::library::Library;
use crate::models::AddUserOutcome;

use super::forms::{FormKind, InputForm, MessageBox, Submission};
use super::helpers::{centered_rect, surface_error};
use super::screens::{MenuItem, ReportKind, ReportScreen, MENU_ITEMS};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height of the banner above the menu.
const HEADER_HEIGHT: u16 = 3;

/// High-level navigation states.
enum Screen {
    Menu,
    Report(ReportScreen),
}

/// Modal layer drawn over the current screen.
enum Mode {
    Normal,
    Editing(InputForm),
    Message(MessageBox),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state. Owns the store handle for the whole session.
pub struct App {
    library: Library,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            selected: 0,
            screen: Screen::Menu,
            mode: Mode::Normal,
            status: None,
        }
    }

    /// Give the store handle back once the UI is done with it.
    pub fn into_library(self) -> Library {
        self.library
    }

    /// Process one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Editing(form) => self.handle_form(code, form),
            Mode::Message(message) => self.handle_message(code, message),
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        if matches!(self.screen, Screen::Report(_)) {
            return self.handle_report_key(code, exit);
        }

        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Up => self.move_menu(-1),
            KeyCode::Down => self.move_menu(1),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = MENU_ITEMS.len() - 1,
            KeyCode::Enter => {
                let item = MENU_ITEMS[self.selected];
                return self.activate(item, exit);
            }
            KeyCode::Char(ch) => {
                if let Some(item) = MenuItem::from_shortcut(ch) {
                    if let Some(idx) = MENU_ITEMS.iter().position(|i| *i == item) {
                        self.selected = idx;
                    }
                    return self.activate(item, exit);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_report_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Report(report) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.screen = Screen::Menu;
                self.clear_status();
            }
            KeyCode::Up => report.move_selection(-1),
            KeyCode::Down => report.move_selection(1),
            KeyCode::PageUp => report.move_selection(-10),
            KeyCode::PageDown => report.move_selection(10),
            KeyCode::Home => report.select_first(),
            KeyCode::End => report.select_last(),
            KeyCode::Right | KeyCode::Tab => {
                let kind = report.kind.next();
                self.open_report(kind);
            }
            KeyCode::Left | KeyCode::BackTab => {
                let kind = report.kind.previous();
                self.open_report(kind);
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn activate(&mut self, item: MenuItem, exit: &mut bool) -> Result<Mode> {
        self.clear_status();
        let kind = match item {
            MenuItem::AddBook => FormKind::AddBook,
            MenuItem::AddUser => FormKind::AddUser,
            MenuItem::Checkout => FormKind::Checkout,
            MenuItem::Return => FormKind::Return,
            MenuItem::Search => FormKind::Search,
            MenuItem::Reports => {
                self.open_report(ReportKind::AvailableBooks);
                return Ok(Mode::Normal);
            }
            MenuItem::Quit => {
                *exit = true;
                return Ok(Mode::Normal);
            }
        };
        Ok(Mode::Editing(InputForm::new(kind)))
    }

    fn handle_form(&mut self, code: KeyCode, mut form: InputForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status(
                    format!("{} cancelled.", form.kind.title()),
                    StatusKind::Info,
                );
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => return self.submit(form),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::Editing(form)
    }

    /// Validate and forward the form to the store. Input problems keep the
    /// form open; store outcomes close it and open a message dialog.
    fn submit(&mut self, mut form: InputForm) -> Mode {
        let submission = match form.submission() {
            Ok(submission) => submission,
            Err(err) => {
                let message = err.to_string();
                form.error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                return Mode::Editing(form);
            }
        };

        match self.perform(submission) {
            Ok(message) => {
                let kind = if message.is_error {
                    StatusKind::Error
                } else {
                    StatusKind::Info
                };
                let summary = message.lines.first().cloned().unwrap_or_default();
                self.set_status(summary, kind);
                Mode::Message(message)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "store operation failed");
                let message = surface_error(&err);
                form.error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                Mode::Editing(form)
            }
        }
    }

    /// Exactly one store call per submission.
    fn perform(&mut self, submission: Submission) -> Result<MessageBox> {
        let message = match submission {
            Submission::AddBook {
                title,
                author,
                year,
                copies,
            } => {
                let book = self.library.add_book(&title, &author, year, copies)?;
                MessageBox::info(
                    "Book Added",
                    vec![format!("Book '{}' added with ID #{}.", book.title, book.id)],
                )
            }
            Submission::AddUser {
                name,
                external_id,
                contact,
            } => {
                let outcome = self.library.add_user(&name, &external_id, &contact)?;
                match outcome {
                    AddUserOutcome::Added(_) => {
                        MessageBox::info("User Added", vec![outcome.to_string()])
                    }
                    AddUserOutcome::DuplicateKey { .. } => {
                        MessageBox::error("Duplicate User", outcome.to_string())
                    }
                }
            }
            Submission::Checkout { book, external_id } => {
                let outcome = self.library.checkout_ref(&book, &external_id)?;
                if outcome.is_success() {
                    MessageBox::info("Checkout Result", vec![outcome.to_string()])
                } else {
                    MessageBox::error("Checkout Result", outcome.to_string())
                }
            }
            Submission::Return { book, external_id } => {
                let outcome = self.library.return_ref(&book, &external_id)?;
                if outcome.is_success() {
                    MessageBox::info("Return Result", vec![outcome.to_string()])
                } else {
                    MessageBox::error("Return Result", outcome.to_string())
                }
            }
            Submission::Search(query) => {
                let books = self.library.search_books(&query)?;
                if books.is_empty() {
                    MessageBox::error("Search Results", "No books found.")
                } else {
                    MessageBox::info(
                        "Search Results",
                        books.iter().map(|book| book.summary()).collect(),
                    )
                }
            }
        };
        Ok(message)
    }

    fn handle_message(&mut self, code: KeyCode, mut message: MessageBox) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => return Mode::Normal,
            KeyCode::Up => message.scroll_by(-1),
            KeyCode::Down => message.scroll_by(1),
            KeyCode::PageUp => message.scroll_by(-10),
            KeyCode::PageDown => message.scroll_by(10),
            KeyCode::Home => message.scroll_to_top(),
            KeyCode::End => message.scroll_to_bottom(),
            _ => {}
        }
        Mode::Message(message)
    }

    /// Switch to a report. A store fault leaves the current screen in place
    /// and shows the cause in the footer.
    fn open_report(&mut self, kind: ReportKind) {
        match ReportScreen::load(&self.library, kind) {
            Ok(report) => self.screen = Screen::Report(report),
            Err(err) => {
                warn!(error = %format!("{err:#}"), report = kind.title(), "report failed to load");
                self.set_status(surface_error(&err), StatusKind::Error);
            }
        }
    }

    fn move_menu(&mut self, offset: isize) {
        let last = MENU_ITEMS.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Menu => self.draw_menu(frame, content_area),
            Screen::Report(report) => self.draw_report(frame, content_area, report),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::Editing(form) => self.draw_form(frame, area, form),
            Mode::Message(message) => self.draw_message(frame, area, message),
            Mode::Normal => {}
        }
    }

    fn draw_menu(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(HEADER_HEIGHT), Constraint::Min(1)])
            .split(area);

        let header = Paragraph::new(Line::from(Span::styled(
            "Library Catalog",
            Style::default().add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let key_style = Style::default().fg(Color::Cyan);
        let items: Vec<ListItem> = MENU_ITEMS
            .iter()
            .map(|item| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("[{}] ", item.shortcut()), key_style),
                    Span::raw(item.label()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Menu"))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_report(&self, frame: &mut Frame, area: Rect, report: &ReportScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", report.kind.title(), report.lines.len()));

        if report.lines.is_empty() {
            let message = Paragraph::new(report.kind.empty_message())
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = report
            .lines
            .iter()
            .map(|line| ListItem::new(line.clone()))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow));

        let mut state = ListState::default();
        state.select(Some(report.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        match (&self.screen, &self.mode) {
            (_, Mode::Editing(_)) => Line::from(vec![
                Span::styled("[Tab]", key_style),
                Span::raw(" Next Field   "),
                Span::styled("[Enter]", key_style),
                Span::raw(" Submit   "),
                Span::styled("[Esc]", key_style),
                Span::raw(" Cancel"),
            ]),
            (_, Mode::Message(_)) => Line::from(vec![
                Span::styled("[Up/Down]", key_style),
                Span::raw(" Scroll   "),
                Span::styled("[Enter]", key_style),
                Span::raw(" Close"),
            ]),
            (Screen::Report(_), _) => Line::from(vec![
                Span::styled("[Up/Down]", key_style),
                Span::raw(" Scroll   "),
                Span::styled("[Left/Right]", key_style),
                Span::raw(" Switch Report   "),
                Span::styled("[Esc]", key_style),
                Span::raw(" Menu   "),
                Span::styled("[q]", key_style),
                Span::raw(" Quit"),
            ]),
            (Screen::Menu, _) => Line::from(vec![
                Span::styled("[Up/Down]", key_style),
                Span::raw(" Navigate   "),
                Span::styled("[Enter]", key_style),
                Span::raw(" Open   "),
                Span::styled("[q]", key_style),
                Span::raw(" Quit"),
            ]),
        }
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, form: &InputForm) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(form.kind.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.fields.len())
            .map(|idx| form.build_line(idx))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to submit | Tab to switch field | Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
            if matches!(form.kind, FormKind::Checkout | FormKind::Return) {
                lines.push(Line::from(Span::styled(
                    "Titles starting with # are typed as \\#",
                    Style::default().fg(Color::Gray),
                )));
            }
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let active = form.active;
        let cursor_x = inner.x
            + form.fields[active].prefix_len() as u16
            + form.value_len(active) as u16;
        let cursor_y = inner.y + active as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_message(&self, frame: &mut Frame, area: Rect, message: &MessageBox) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let border_style = if message.is_error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let body_height = chunks[0].height as usize;
        let total = message.lines.len();
        let overflowing = total > body_height;

        // Long result lists get a position marker so nothing is hidden silently.
        block = if overflowing {
            let first = message.scroll + 1;
            let last = (message.scroll + body_height).min(total);
            block.title(format!("{} ({first}-{last} of {total})", message.title))
        } else {
            block.title(message.title.clone())
        };
        frame.render_widget(block, popup_area);

        let lines: Vec<Line> = message
            .lines
            .iter()
            .map(|line| Line::from(line.clone()))
            .collect();
        let body = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .scroll((message.scroll as u16, 0));
        frame.render_widget(body, chunks[0]);

        let hint = if overflowing {
            "Up/Down to scroll | Enter to close"
        } else {
            "Press Enter to close"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(Color::Gray))),
            chunks[1],
        );
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}
