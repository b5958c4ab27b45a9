pub mod analyze;
pub mod config_cmd;
pub mod languages;

use std::path::Path;

use codeshape::analyzer::registry;
use codeshape::config::Config;

/// Loads config for `root` and builds the global registry from it.
/// Falls back to defaults when the config can't be read.
pub fn init(root: &Path) -> Config {
    let config = Config::load(root).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    if !registry::initialize(|r| config.register_aliases(r)) {
        tracing::debug!("Analyzer registry already initialized");
    }
    config
}
