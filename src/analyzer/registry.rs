use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::AnalysisWarning;
use super::languages::{self, Analyzer, AnalyzerKind};

/// Maps file extensions (lowercase, no dot) to analyzers.
#[derive(Default)]
pub struct AnalyzerRegistry {
    by_extension: HashMap<String, Arc<dyn Analyzer>>,
    conflicts: Vec<AnalysisWarning>,
    discovered: bool,
}

pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in analyzer discovered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.discover();
        registry
    }

    /// Registers `analyzer` for each extension, replacing earlier registrations.
    pub fn register<S: AsRef<str>>(&mut self, extensions: &[S], analyzer: Arc<dyn Analyzer>) {
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if ext.is_empty() {
                continue;
            }
            let previous = self.by_extension.insert(ext.clone(), Arc::clone(&analyzer));
            if let Some(previous) = previous.filter(|p| !Arc::ptr_eq(p, &analyzer)) {
                tracing::warn!(
                    extension = %ext,
                    previous = previous.language_name(),
                    current = analyzer.language_name(),
                    "Overwriting analyzer registration"
                );
                self.conflicts.push(AnalysisWarning::RegistryConflict {
                    extension: ext,
                    previous: previous.language_name().to_string(),
                    current: analyzer.language_name().to_string(),
                });
            }
        }
    }

    /// Registers `analyzer` under the extensions it declares.
    pub fn register_analyzer(&mut self, analyzer: Arc<dyn Analyzer>) {
        let extensions: Vec<String> = analyzer.extensions().iter().map(|e| e.to_string()).collect();
        self.register(&extensions, analyzer);
    }

    /// Registers the built-in analyzers, custom ones first. Extensions already
    /// claimed by a custom analyzer are left alone. Runs at most once.
    pub fn discover(&mut self) {
        if self.discovered {
            return;
        }
        self.discovered = true;

        for plugin in languages::discover_plugins() {
            let (claimed, free): (Vec<String>, Vec<String>) = plugin
                .extensions()
                .iter()
                .map(|e| normalize_extension(e))
                .partition(|ext| self.is_custom(ext));

            if !claimed.is_empty() {
                tracing::debug!(
                    language = plugin.language_name(),
                    skipped = ?claimed,
                    "Extensions already claimed by a custom analyzer"
                );
            }
            self.register(&free, plugin);
        }

        tracing::debug!(extensions = self.by_extension.len(), "Analyzer discovery complete");
    }

    fn is_custom(&self, ext: &str) -> bool {
        self.by_extension
            .get(ext)
            .is_some_and(|a| a.kind() == AnalyzerKind::Custom)
    }

    pub fn lookup(&self, filename: &str) -> Option<Arc<dyn Analyzer>> {
        let ext = Path::new(filename).extension()?.to_str()?;
        self.lookup_extension(ext)
    }

    pub fn lookup_extension(&self, ext: &str) -> Option<Arc<dyn Analyzer>> {
        self.by_extension.get(&normalize_extension(ext)).cloned()
    }

    pub fn lookup_language(&self, language: &str) -> Option<Arc<dyn Analyzer>> {
        self.by_extension
            .values()
            .find(|a| a.language_name() == language)
            .cloned()
    }

    /// Registered extensions with the language and kind serving each, sorted.
    pub fn extensions(&self) -> BTreeMap<&str, (&str, AnalyzerKind)> {
        self.by_extension
            .iter()
            .map(|(ext, a)| (ext.as_str(), (a.language_name(), a.kind())))
            .collect()
    }

    pub fn conflicts(&self) -> &[AnalysisWarning] {
        &self.conflicts
    }
}

static GLOBAL: OnceLock<AnalyzerRegistry> = OnceLock::new();

/// Builds the process-wide registry, letting `setup` register analyzers before
/// discovery runs. Returns `false` if the registry already existed.
pub fn initialize<F: FnOnce(&mut AnalyzerRegistry)>(setup: F) -> bool {
    let mut created = false;
    GLOBAL.get_or_init(|| {
        created = true;
        let mut registry = AnalyzerRegistry::new();
        setup(&mut registry);
        registry.discover();
        registry
    });
    created
}

/// The process-wide registry, discovered on first use.
pub fn global() -> &'static AnalyzerRegistry {
    GLOBAL.get_or_init(AnalyzerRegistry::with_builtins)
}
