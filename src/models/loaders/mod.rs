pub mod toml_loader;

pub use toml_loader::{load_wizard_table, parse_wizard_table};
