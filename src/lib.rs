//! Core library surface for the library catalog TUI.
//!
//! The store (`Library` plus the `db` query helpers) is usable on its own; the
//! `ui` module wraps it in an interactive terminal front-end.
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod logging;
pub mod models;
pub mod ui;

pub use config::Config;
pub use error::InputError;
pub use library::Library;

/// Domain types and operation outcomes that other layers manipulate.
pub use models::{
    AddUserOutcome, Book, BookQuery, BookRef, CheckoutOutcome, Loan, LoanView, ReturnOutcome,
    User,
};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
