use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::task::JoinSet;

use codeshape::analyzer::{self, Chunk, registry};
use codeshape::config::{Config, OutputFormat, WalkConfig};
use codeshape::output::{FileReport, SourceOptions, formatter_for};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Output format (overrides output.format from config)
    #[arg(long, short, value_enum)]
    pub format: Option<OutputFormat>,
    /// Line number the input starts at, for analyzing an excerpt of a larger file
    #[arg(long, default_value_t = 1)]
    pub start_line: usize,
    /// Include each element's source text
    #[arg(long)]
    pub include_source: bool,
}

pub async fn run(args: AnalyzeArgs, config: &Config) -> Result<()> {
    let files = collect_files(&args.paths, &config.walk)?;
    if files.is_empty() {
        tracing::warn!("No analyzable files found");
    }

    let mut tasks = JoinSet::new();
    for path in files {
        let start_line = args.start_line;
        tasks.spawn_blocking(move || analyze_file(&path, start_line));
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.context("Analysis task panicked")? {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable file"),
        }
    }
    reports.sort_by(|a, b| a.path.cmp(&b.path));

    let format = args.format.unwrap_or(config.output.format);
    let mut source = SourceOptions::from(&config.output);
    source.include_source |= args.include_source;

    let formatter = formatter_for(format, source);
    println!("{}", formatter.format_reports(&reports));
    Ok(())
}

fn analyze_file(path: &Path, start_line: usize) -> Result<FileReport> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path.to_string_lossy().into_owned();

    let chunk = Chunk::new(&filename, &source).starting_at(start_line);
    let result = analyzer::analyze(&chunk);
    tracing::debug!(
        file = %filename,
        elements = result.elements().count(),
        calls = result.calls.len(),
        "Analyzed"
    );
    Ok(FileReport {
        path: filename,
        result,
    })
}

/// Expands the given paths into a sorted file list. Explicit files are always
/// kept; directory walks keep only files with a registered extension.
fn collect_files(paths: &[PathBuf], walk: &WalkConfig) -> Result<Vec<PathBuf>> {
    let registry = registry::global();
    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            anyhow::bail!("No such file or directory: {}", root.display());
        }

        for entry in ignore::WalkBuilder::new(root).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if registry.lookup(name).is_none() {
                continue;
            }

            let rel_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if matches_ignore_pattern(&rel_path, &walk.ignore) {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > walk.max_file_size {
                    tracing::debug!(file = %path.display(), size = meta.len(), "Skipping large file");
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn matches_ignore_pattern(rel_path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(suffix) = pattern.strip_prefix('*') {
            rel_path.ends_with(suffix)
        } else if pattern.ends_with('/') {
            rel_path.starts_with(pattern.as_str()) || rel_path.contains(&format!("/{pattern}"))
        } else {
            rel_path == pattern || rel_path.ends_with(&format!("/{pattern}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_matches_ignore_pattern() {
        let patterns = vec![
            "*.min.js".to_string(),
            "generated/".to_string(),
            "schema.py".to_string(),
        ];
        assert!(matches_ignore_pattern("web/app.min.js", &patterns));
        assert!(matches_ignore_pattern("generated/api.ts", &patterns));
        assert!(matches_ignore_pattern("src/generated/api.ts", &patterns));
        assert!(matches_ignore_pattern("db/schema.py", &patterns));
        assert!(!matches_ignore_pattern("src/app.js", &patterns));
        assert!(!matches_ignore_pattern("src/schema.pyi", &patterns));
    }

    #[test]
    fn test_collect_files_filters_directory_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/generated")).unwrap();
        fs::write(dir.path().join("src/main.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("src/generated/out.py"), "y = 2\n").unwrap();
        fs::write(dir.path().join("src/big.ts"), "let a = 1;\n".repeat(100)).unwrap();
        fs::write(dir.path().join("notes.unknownext"), "text").unwrap();

        let walk = WalkConfig {
            ignore: vec!["generated/".to_string()],
            max_file_size: 500,
        };
        let files = collect_files(&[dir.path().to_path_buf()], &walk).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["src/main.py"]);
    }

    #[test]
    fn test_collect_files_keeps_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.unknownext");
        fs::write(&file, "text").unwrap();

        let files = collect_files(&[file.clone()], &WalkConfig::default()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_collect_files_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(collect_files(&[missing], &WalkConfig::default()).is_err());
    }

    #[test]
    fn test_analyze_file_offsets_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.py");
        fs::write(&file, "def f():\n    pass\n").unwrap();

        let report = analyze_file(&file, 40).unwrap();
        let f = report.result.find("f").unwrap();
        assert_eq!(f.start_line, 40);
        assert_eq!(f.end_line, 41);
    }
}
