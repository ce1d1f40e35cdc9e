use anyhow::Result;

use crate::library::Library;

/// Entries on the main menu, in display order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MenuItem {
    AddBook,
    AddUser,
    Checkout,
    Return,
    Search,
    Reports,
    Quit,
}

pub(crate) const MENU_ITEMS: [MenuItem; 7] = [
    MenuItem::AddBook,
    MenuItem::AddUser,
    MenuItem::Checkout,
    MenuItem::Return,
    MenuItem::Search,
    MenuItem::Reports,
    MenuItem::Quit,
];

impl MenuItem {
    pub(crate) fn label(self) -> &'static str {
        match self {
            MenuItem::AddBook => "Add Book",
            MenuItem::AddUser => "Add User",
            MenuItem::Checkout => "Checkout Book",
            MenuItem::Return => "Return Book",
            MenuItem::Search => "Search Books",
            MenuItem::Reports => "Reports",
            MenuItem::Quit => "Quit",
        }
    }

    pub(crate) fn shortcut(self) -> char {
        match self {
            MenuItem::AddBook => 'b',
            MenuItem::AddUser => 'u',
            MenuItem::Checkout => 'c',
            MenuItem::Return => 'r',
            MenuItem::Search => 's',
            MenuItem::Reports => 'l',
            MenuItem::Quit => 'q',
        }
    }

    pub(crate) fn from_shortcut(ch: char) -> Option<Self> {
        let ch = ch.to_ascii_lowercase();
        MENU_ITEMS.into_iter().find(|item| item.shortcut() == ch)
    }
}

/// The three flat listings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReportKind {
    AvailableBooks,
    LoanedBooks,
    Users,
}

impl ReportKind {
    pub(crate) fn title(self) -> &'static str {
        match self {
            ReportKind::AvailableBooks => "Available Books",
            ReportKind::LoanedBooks => "Loaned Books",
            ReportKind::Users => "Registered Users",
        }
    }

    pub(crate) fn empty_message(self) -> &'static str {
        match self {
            ReportKind::AvailableBooks => "No books available.",
            ReportKind::LoanedBooks => "No books on loan.",
            ReportKind::Users => "No users registered.",
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            ReportKind::AvailableBooks => ReportKind::LoanedBooks,
            ReportKind::LoanedBooks => ReportKind::Users,
            ReportKind::Users => ReportKind::AvailableBooks,
        }
    }

    pub(crate) fn previous(self) -> Self {
        match self {
            ReportKind::AvailableBooks => ReportKind::Users,
            ReportKind::LoanedBooks => ReportKind::AvailableBooks,
            ReportKind::Users => ReportKind::LoanedBooks,
        }
    }
}

/// A loaded listing plus the highlighted row.
pub(crate) struct ReportScreen {
    pub(crate) kind: ReportKind,
    pub(crate) lines: Vec<String>,
    pub(crate) selected: usize,
}

impl ReportScreen {
    pub(crate) fn load(library: &Library, kind: ReportKind) -> Result<Self> {
        let lines = match kind {
            ReportKind::AvailableBooks => library
                .list_available_books()?
                .iter()
                .map(|book| book.summary())
                .collect(),
            ReportKind::LoanedBooks => library
                .list_loans()?
                .iter()
                .map(|loan| loan.summary())
                .collect(),
            ReportKind::Users => library
                .list_users()?
                .iter()
                .map(|user| user.summary())
                .collect(),
        };

        Ok(Self {
            kind,
            lines,
            selected: 0,
        })
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.lines.is_empty() {
            return;
        }
        let last = self.lines.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.lines.len().saturating_sub(1);
    }
}
