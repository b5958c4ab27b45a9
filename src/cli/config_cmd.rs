use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use codeshape::config::{CONFIG_FILENAME, Config, ConfigError, global_config_path};
use codeshape::output::style;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a config template with the default settings
    Init(Location),
    /// Check a config file for JSON errors, unknown fields and unknown alias languages
    Validate(Location),
    /// Print the effective configuration
    Show(Location),
}

/// Which config file a subcommand acts on.
#[derive(Args)]
pub struct Location {
    /// Directory holding .codeshape.json (defaults to current directory)
    #[arg(long, conflicts_with = "global")]
    pub path: Option<PathBuf>,
    /// Use ~/.config/codeshape/config.json instead
    #[arg(long, short)]
    pub global: bool,
}

impl Location {
    fn file(&self) -> Result<PathBuf> {
        if self.global {
            return global_config_path()
                .context("Could not determine config directory for this platform");
        }
        let dir = self.path.clone().unwrap_or_else(|| PathBuf::from("."));
        Ok(dir.join(CONFIG_FILENAME))
    }
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Init(location) => init(&location.file()?),
        ConfigCommand::Validate(location) => validate(&location.file()?),
        ConfigCommand::Show(location) => show(&location),
    }
}

fn init(file: &Path) -> Result<()> {
    if !write_template(file)? {
        println!("{}", style::warn(&format!("{} already exists", file.display())));
        return Ok(());
    }
    println!("{}", style::success(&format!("Created {}", file.display())));
    Ok(())
}

/// Writes the default config to `file` unless it exists. Returns whether it wrote.
fn write_template(file: &Path) -> Result<bool> {
    if file.exists() {
        return Ok(false);
    }
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let template = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(file, format!("{template}\n"))
        .with_context(|| format!("Failed to write {}", file.display()))?;
    Ok(true)
}

fn validate(file: &Path) -> Result<()> {
    let config = match Config::validate_file(file) {
        Ok(config) => config,
        Err(ConfigError::NotFound { path }) => {
            println!("No config at {}", path.display());
            return Ok(());
        }
        Err(e) => {
            println!("{}", style::error(&e.to_string()));
            anyhow::bail!("Config validation failed");
        }
    };

    let problems = alias_problems(&config);
    for problem in &problems {
        println!("{}", style::error(problem));
    }
    if !problems.is_empty() {
        anyhow::bail!("Config validation failed: {} bad alias(es)", problems.len());
    }

    println!("{}", style::success(&format!("{} is valid", file.display())));
    for (ext, language) in &config.analyzer.extensions {
        println!("  .{ext} -> {language}");
    }
    Ok(())
}

fn alias_problems(config: &Config) -> Vec<String> {
    config
        .unknown_aliases()
        .into_iter()
        .map(|(ext, language)| {
            format!("analyzer.extensions.{ext}: no built-in analyzer for language \"{language}\"")
        })
        .collect()
}

fn show(location: &Location) -> Result<()> {
    let config = if location.global {
        match Config::validate_file(&location.file()?) {
            Ok(config) => config,
            Err(ConfigError::NotFound { .. }) => {
                println!("{}", style::info("No global config, showing defaults"));
                Config::default()
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        let dir = location.path.clone().unwrap_or_else(|| PathBuf::from("."));
        Config::load(&dir)?
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_template_creates_parents_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/codeshape/config.json");

        assert!(write_template(&file).unwrap());
        assert!(!write_template(&file).unwrap());

        let written = Config::validate_file(&file).unwrap();
        assert_eq!(written.walk.max_file_size, Config::default().walk.max_file_size);
    }

    #[test]
    fn test_validate_rejects_unknown_alias_language() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &file,
            r#"{ "analyzer": { "extensions": { "vue": "typescript", "pyx": "cython" } } }"#,
        )
        .unwrap();

        let config = Config::validate_file(&file).unwrap();
        assert_eq!(
            alias_problems(&config),
            vec!["analyzer.extensions.pyx: no built-in analyzer for language \"cython\""]
        );
        assert!(validate(&file).is_err());
    }

    #[test]
    fn test_validate_accepts_known_aliases_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILENAME);
        assert!(validate(&file).is_ok());

        std::fs::write(&file, r#"{ "analyzer": { "extensions": { "vue": "typescript" } } }"#)
            .unwrap();
        assert!(validate(&file).is_ok());
    }

    #[test]
    fn test_validate_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&file, "{ \"walk\": ").unwrap();
        assert!(validate(&file).is_err());
    }

    #[test]
    fn test_location_resolves_local_file() {
        let location = Location {
            path: Some(PathBuf::from("proj")),
            global: false,
        };
        assert_eq!(location.file().unwrap(), Path::new("proj").join(CONFIG_FILENAME));
    }
}
