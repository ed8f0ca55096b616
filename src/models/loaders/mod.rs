pub mod toml_loader;

pub use toml_loader::{load_targets, parse_targets, select_targets};
