use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::error::InputError;
use crate::models::{BookQuery, BookRef};

/// Which dialog a form backs. Decides the fields and what a submission means.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FormKind {
    AddBook,
    AddUser,
    Checkout,
    Return,
    Search,
}

impl FormKind {
    pub(crate) fn title(self) -> &'static str {
        match self {
            FormKind::AddBook => "Add Book",
            FormKind::AddUser => "Add User",
            FormKind::Checkout => "Checkout Book",
            FormKind::Return => "Return Book",
            FormKind::Search => "Search Books",
        }
    }
}

/// Characters a field accepts while typing.
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    /// Digits only.
    Count,
    /// Digits with an optional leading minus.
    Year,
}

#[derive(Clone)]
pub(crate) struct FormField {
    pub(crate) label: &'static str,
    pub(crate) value: String,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
}

impl FormField {
    fn new(label: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            label,
            value: String::new(),
            kind,
            required,
        }
    }

    /// Length of the `Label: ` prefix, used to place the cursor.
    pub(crate) fn prefix_len(&self) -> usize {
        self.label.chars().count() + 2
    }
}

/// Typed values ready for the store, one variant per dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Submission {
    AddBook {
        title: String,
        author: String,
        year: i32,
        copies: u32,
    },
    AddUser {
        name: String,
        external_id: String,
        contact: String,
    },
    Checkout {
        book: BookRef,
        external_id: String,
    },
    Return {
        book: BookRef,
        external_id: String,
    },
    Search(BookQuery),
}

/// State of an open dialog: its fields, which one has focus, and the last
/// validation error.
#[derive(Clone)]
pub(crate) struct InputForm {
    pub(crate) kind: FormKind,
    pub(crate) fields: Vec<FormField>,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

impl InputForm {
    pub(crate) fn new(kind: FormKind) -> Self {
        let fields = match kind {
            FormKind::AddBook => vec![
                FormField::new("Title", FieldKind::Text, true),
                FormField::new("Author", FieldKind::Text, true),
                FormField::new("Year", FieldKind::Year, true),
                FormField::new("Copies", FieldKind::Count, true),
            ],
            FormKind::AddUser => vec![
                FormField::new("Name", FieldKind::Text, true),
                FormField::new("User ID", FieldKind::Text, true),
                FormField::new("Contact", FieldKind::Text, true),
            ],
            FormKind::Checkout | FormKind::Return => vec![
                FormField::new("Book (title or #id)", FieldKind::Text, true),
                FormField::new("User ID", FieldKind::Text, true),
            ],
            FormKind::Search => vec![
                FormField::new("Title", FieldKind::Text, false),
                FormField::new("Author", FieldKind::Text, false),
                FormField::new("Year", FieldKind::Year, false),
            ],
        };

        Self {
            kind,
            fields,
            active: 0,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = (self.active + self.fields.len() - 1) % self.fields.len();
    }

    /// Append a character to the active field, rejecting characters the field
    /// cannot hold.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let field = &mut self.fields[self.active];
        let accepted = match field.kind {
            FieldKind::Text => !ch.is_control(),
            FieldKind::Count => ch.is_ascii_digit(),
            FieldKind::Year => ch.is_ascii_digit() || (ch == '-' && field.value.is_empty()),
        };
        if accepted {
            field.value.push(ch);
        }
        accepted
    }

    pub(crate) fn backspace(&mut self) {
        self.fields[self.active].value.pop();
    }

    /// Validate every field and produce the typed request.
    pub(crate) fn submission(&self) -> Result<Submission, InputError> {
        match self.kind {
            FormKind::AddBook => Ok(Submission::AddBook {
                title: self.text(0)?,
                author: self.text(1)?,
                year: self.number(2)?,
                copies: self.number(3)?,
            }),
            FormKind::AddUser => Ok(Submission::AddUser {
                name: self.text(0)?,
                external_id: self.text(1)?,
                contact: self.text(2)?,
            }),
            FormKind::Checkout => Ok(Submission::Checkout {
                book: BookRef::parse(&self.text(0)?),
                external_id: self.text(1)?,
            }),
            FormKind::Return => Ok(Submission::Return {
                book: BookRef::parse(&self.text(0)?),
                external_id: self.text(1)?,
            }),
            FormKind::Search => {
                let query = BookQuery {
                    title: self.optional_text(0),
                    author: self.optional_text(1),
                    year: self.optional_number(2)?,
                };
                if query.is_empty() {
                    return Err(InputError::Missing {
                        field: "A search term",
                    });
                }
                Ok(Submission::Search(query))
            }
        }
    }

    fn optional_text(&self, idx: usize) -> Option<String> {
        let trimmed = self.fields[idx].value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn text(&self, idx: usize) -> Result<String, InputError> {
        self.optional_text(idx).ok_or(InputError::Missing {
            field: self.fields[idx].label,
        })
    }

    fn optional_number<T>(&self, idx: usize) -> Result<Option<T>, InputError>
    where
        T: FromStr<Err = ParseIntError>,
    {
        let Some(raw) = self.optional_text(idx) else {
            return Ok(None);
        };
        let field = self.fields[idx].label;
        raw.parse::<T>().map(Some).map_err(|err| match err.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                InputError::OutOfRange { field }
            }
            _ => InputError::NotANumber { field, value: raw },
        })
    }

    fn number<T>(&self, idx: usize) -> Result<T, InputError>
    where
        T: FromStr<Err = ParseIntError>,
    {
        self.optional_number(idx)?.ok_or(InputError::Missing {
            field: self.fields[idx].label,
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, idx: usize) -> Line<'static> {
        let field = &self.fields[idx];
        let is_active = self.active == idx;

        let display = if field.value.is_empty() {
            if field.required {
                "<required>".to_string()
            } else {
                "<optional>".to_string()
            }
        } else {
            field.value.clone()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if field.value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label)),
            Span::styled(display, style),
        ])
    }

    pub(crate) fn value_len(&self, idx: usize) -> usize {
        self.fields[idx].value.chars().count()
    }

    #[cfg(test)]
    pub(crate) fn with_values(kind: FormKind, values: &[&str]) -> Self {
        let mut form = Self::new(kind);
        for (field, value) in form.fields.iter_mut().zip(values) {
            field.value = value.to_string();
        }
        form
    }
}

/// Modal result dialog, the terminal stand-in for a message box. `scroll` is
/// the index of the first line shown.
#[derive(Clone, Debug)]
pub(crate) struct MessageBox {
    pub(crate) title: String,
    pub(crate) lines: Vec<String>,
    pub(crate) is_error: bool,
    pub(crate) scroll: usize,
}

impl MessageBox {
    pub(crate) fn info(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
            is_error: false,
            scroll: 0,
        }
    }

    pub(crate) fn error(title: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: vec![line.into()],
            is_error: true,
            scroll: 0,
        }
    }

    pub(crate) fn scroll_by(&mut self, offset: isize) {
        let last = self.lines.len().saturating_sub(1) as isize;
        self.scroll = (self.scroll as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub(crate) fn scroll_to_bottom(&mut self) {
        self.scroll = self.lines.len().saturating_sub(1);
    }
}
