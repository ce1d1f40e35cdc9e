//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI, plus the outcome values the store hands back for loan and user
//! operations. These types stay light-weight data holders so the persistence
//! and presentation layers can focus on their own concerns.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A catalog entry. `copies` counts the copies still on the shelf, so it drops
/// on every checkout and climbs back on every return.
pub struct Book {
    /// Primary key assigned by SQLite.
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Publication year. Signed so ancient works can be catalogued.
    pub year: i32,
    /// Copies available for loan. Unsigned because the schema never lets it go
    /// below zero.
    pub copies: u32,
}

impl Book {
    /// `Title by Author (Year) - N copies available`, the line used by search
    /// results and the availability report.
    pub fn summary(&self) -> String {
        format!(
            "{} by {} ({}) - {} copies available",
            self.title, self.author, self.year, self.copies
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A registered patron. `external_id` is the code the librarian types in and
/// is what loans reference.
pub struct User {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub contact: String,
}

impl User {
    pub fn summary(&self) -> String {
        format!(
            "{} (ID: {}) - Contact: {}",
            self.name, self.external_id, self.contact
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One outstanding checkout.
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Loan row joined with the book title and patron name for display.
pub struct LoanView {
    pub loan_id: i64,
    pub book_id: i64,
    pub title: String,
    pub external_id: String,
    pub user_name: String,
}

impl LoanView {
    pub fn summary(&self) -> String {
        format!("{} - loaned to {}", self.title, self.user_name)
    }
}

/// How the loan dialogs address a book: by title, or by `#id` when several
/// books share a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Title(String),
    Id(i64),
}

impl BookRef {
    /// Interpret raw form input. `#12` selects book 12; anything else is taken
    /// verbatim as a title. A leading `\#` escapes the marker so a title such
    /// as `#1 Ladies` stays reachable.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(escaped) = trimmed.strip_prefix('\\') {
            if escaped.starts_with('#') {
                return BookRef::Title(escaped.to_string());
            }
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            if let Ok(id) = rest.trim().parse::<i64>() {
                return BookRef::Id(id);
            }
        }
        BookRef::Title(trimmed.to_string())
    }
}

/// Filters accepted by the search dialog. Empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
}

impl BookQuery {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.year.is_none()
    }
}

/// Result of registering a patron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddUserOutcome {
    Added(User),
    DuplicateKey { external_id: String },
}

impl fmt::Display for AddUserOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddUserOutcome::Added(user) => {
                write!(f, "User '{}' registered with ID {}.", user.name, user.external_id)
            }
            AddUserOutcome::DuplicateKey { external_id } => {
                write!(f, "User ID '{external_id}' is already registered.")
            }
        }
    }
}

/// Result of a checkout attempt. Only `CheckedOut` changes the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    CheckedOut { title: String, user_name: String },
    BookNotFound,
    AmbiguousTitle { title: String, matches: usize },
    UserNotFound,
    Unavailable { title: String },
}

impl CheckoutOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CheckoutOutcome::CheckedOut { .. })
    }
}

impl fmt::Display for CheckoutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutOutcome::CheckedOut { title, user_name } => {
                write!(f, "Book '{title}' checked out to '{user_name}'.")
            }
            CheckoutOutcome::BookNotFound => write!(f, "Book not found."),
            CheckoutOutcome::AmbiguousTitle { title, matches } => write!(
                f,
                "{matches} books are titled '{title}'. Enter #<id> to pick one."
            ),
            CheckoutOutcome::UserNotFound => write!(f, "User not found."),
            CheckoutOutcome::Unavailable { title } => {
                write!(f, "Book '{title}' is unavailable for loan.")
            }
        }
    }
}

/// Result of a return attempt. Only `Returned` changes the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    Returned { title: String },
    BookNotFound,
    AmbiguousTitle { title: String, matches: usize },
    LoanNotFound,
}

impl ReturnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReturnOutcome::Returned { .. })
    }
}

impl fmt::Display for ReturnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnOutcome::Returned { title } => write!(f, "Book '{title}' returned."),
            ReturnOutcome::BookNotFound => write!(f, "Book not found."),
            ReturnOutcome::AmbiguousTitle { title, matches } => write!(
                f,
                "{matches} books are titled '{title}'. Enter #<id> to pick one."
            ),
            ReturnOutcome::LoanNotFound => write!(f, "Loan not found."),
        }
    }
}
