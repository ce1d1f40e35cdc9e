//! Persistence module split across logical submodules.

mod books;
mod connection;
mod loans;
mod users;

pub use books::{
    create_book, fetch_available_books, fetch_book, fetch_books_by_author, fetch_books_by_title,
    fetch_books_by_year, fetch_first_book_by_title, search_books,
};
pub use connection::{ensure_schema, open_database, open_in_memory};
pub use loans::{checkout, fetch_loans, return_book};
pub use users::{create_user, fetch_user_by_external_id, fetch_users};
