//! Ratatui front-end. A main menu launches modal forms for each store
//! operation, results come back as message dialogs, and the reports screen
//! shows the flat listings.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
