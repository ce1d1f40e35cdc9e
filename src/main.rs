//! Binary entry point: resolve the data directory, start logging, open the
//! store, and drive the Ratatui event loop until the user exits. The store
//! handle is handed to the UI and closed explicitly afterwards.
use library_catalog::{logging, run_app, App, Config, Library};

fn main() -> anyhow::Result<()> {
    let config = Config::from_home()?;
    config.ensure_data_dir()?;
    logging::init(&config)?;

    let library = Library::open(&config)?;
    let mut app = App::new(library);
    let result = run_app(&mut app);

    app.into_library().close()?;
    result
}
