//! The store handle. `Library` owns the single SQLite connection for the
//! process and exposes the catalog, patron and circulation operations as
//! methods. The UI receives it by value and hands it back on exit so the
//! connection can be closed explicitly.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::models::{
    AddUserOutcome, Book, BookQuery, BookRef, CheckoutOutcome, LoanView, ReturnOutcome, User,
};

pub struct Library {
    conn: Connection,
}

impl Library {
    /// Open the database described by `config`, creating the schema on first
    /// run. The data directory must already exist (`Config::ensure_data_dir`).
    pub fn open(config: &Config) -> Result<Self> {
        let conn = db::open_database(&config.db_path)?;
        info!(path = %config.db_path.display(), "library opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }

    /// Close the connection now and report any error, instead of relying on
    /// `Drop`, which has to swallow it.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("failed to close database")
    }

    pub fn add_book(&self, title: &str, author: &str, year: i32, copies: u32) -> Result<Book> {
        db::create_book(&self.conn, title, author, year, copies)
    }

    pub fn add_user(&self, name: &str, external_id: &str, contact: &str) -> Result<AddUserOutcome> {
        db::create_user(&self.conn, name, external_id, contact)
    }

    pub fn find_book_by_title(&self, title: &str) -> Result<Option<Book>> {
        db::fetch_first_book_by_title(&self.conn, title)
    }

    pub fn find_books_by_author(&self, author: &str) -> Result<Vec<Book>> {
        db::fetch_books_by_author(&self.conn, author)
    }

    pub fn find_books_by_year(&self, year: i32) -> Result<Vec<Book>> {
        db::fetch_books_by_year(&self.conn, year)
    }

    pub fn find_book(&self, id: i64) -> Result<Option<Book>> {
        db::fetch_book(&self.conn, id)
    }

    pub fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        db::fetch_user_by_external_id(&self.conn, external_id)
    }

    pub fn search_books(&self, query: &BookQuery) -> Result<Vec<Book>> {
        db::search_books(&self.conn, query)
    }

    pub fn checkout(&mut self, title: &str, external_id: &str) -> Result<CheckoutOutcome> {
        self.checkout_ref(&BookRef::Title(title.to_string()), external_id)
    }

    /// Checkout addressed by book id, for titles shared by several books.
    pub fn checkout_book(&mut self, book_id: i64, external_id: &str) -> Result<CheckoutOutcome> {
        self.checkout_ref(&BookRef::Id(book_id), external_id)
    }

    pub fn checkout_ref(&mut self, book: &BookRef, external_id: &str) -> Result<CheckoutOutcome> {
        db::checkout(&mut self.conn, book, external_id)
    }

    pub fn return_book(&mut self, title: &str, external_id: &str) -> Result<ReturnOutcome> {
        self.return_ref(&BookRef::Title(title.to_string()), external_id)
    }

    pub fn return_book_by_id(&mut self, book_id: i64, external_id: &str) -> Result<ReturnOutcome> {
        self.return_ref(&BookRef::Id(book_id), external_id)
    }

    pub fn return_ref(&mut self, book: &BookRef, external_id: &str) -> Result<ReturnOutcome> {
        db::return_book(&mut self.conn, book, external_id)
    }

    pub fn list_available_books(&self) -> Result<Vec<Book>> {
        db::fetch_available_books(&self.conn)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        db::fetch_users(&self.conn)
    }

    pub fn list_loans(&self) -> Result<Vec<LoanView>> {
        db::fetch_loans(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_title_is_not_an_error() {
        let library = Library::open_in_memory().expect("open");
        assert_eq!(library.find_book_by_title("Nowhere").expect("lookup"), None);
    }

    #[test]
    fn id_based_circulation() {
        let mut library = Library::open_in_memory().expect("open");
        let book = library.add_book("Dune", "Herbert", 1965, 1).expect("book");
        library.add_user("Alice", "u1", "a@x").expect("user");

        assert!(library.checkout_book(book.id, "u1").expect("checkout").is_success());
        assert_eq!(
            library.checkout_book(book.id, "u1").expect("checkout"),
            CheckoutOutcome::Unavailable {
                title: "Dune".into()
            }
        );
        assert_eq!(
            library.checkout_book(book.id + 100, "u1").expect("checkout"),
            CheckoutOutcome::BookNotFound
        );
        assert!(library
            .return_book_by_id(book.id, "u1")
            .expect("return")
            .is_success());
        assert_eq!(library.find_book(book.id).expect("load").map(|b| b.copies), Some(1));
    }

    #[test]
    fn listings_reflect_circulation() {
        let mut library = Library::open_in_memory().expect("open");
        library.add_book("Dune", "Herbert", 1965, 1).expect("book");
        library.add_book("Emma", "Austen", 1815, 1).expect("book");
        library.add_user("Alice", "u1", "a@x").expect("user");

        library.checkout("Dune", "u1").expect("checkout");

        let available: Vec<String> = library
            .list_available_books()
            .expect("available")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(available, vec!["Emma"]);
        assert_eq!(library.list_loans().expect("loans").len(), 1);
        assert_eq!(library.list_users().expect("users").len(), 1);
        library.close().expect("close");
    }
}
