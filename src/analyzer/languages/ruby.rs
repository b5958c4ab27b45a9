use super::DefaultAnalyzer;
use crate::analyzer::ElementType;
use crate::analyzer::classifier::{Pattern, PatternTable};

static PATTERNS: &[Pattern] = &[
    Pattern::new("method", ElementType::Function),
    Pattern::new("singleton_method", ElementType::Function),
    Pattern::new("class", ElementType::Class),
    Pattern::new("module", ElementType::Namespace),
];

static TABLE: PatternTable = PatternTable::new("ruby", PATTERNS, &[]);

/// Ruby gets structure only: no enrichment and no relationships.
pub fn analyzer() -> DefaultAnalyzer {
    DefaultAnalyzer::with_grammar("ruby", &["rb"], tree_sitter_ruby::LANGUAGE.into(), &TABLE)
}

#[cfg(test)]
mod tests {
    use crate::analyzer::test_support::analyze_source;
    use crate::analyzer::{AnalysisWarning, ElementType};

    #[test]
    fn test_structure_without_enrichment() {
        let source = "module Billing\n  class Invoice < Base\n    def total\n      sum(items)\n    end\n\n    def self.build\n    end\n  end\nend\n";
        let result = analyze_source("lib/billing.rb", source);

        assert_eq!(result.structure.len(), 1);
        let billing = &result.structure[0];
        assert_eq!(billing.element_type, ElementType::Namespace);
        assert_eq!(billing.name, "Billing");

        let invoice = &billing.children[0];
        assert_eq!(invoice.element_type, ElementType::Class);
        assert_eq!(invoice.name, "Invoice");
        let methods: Vec<&str> = invoice.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(methods, vec!["total", "build"]);

        assert!(invoice.metadata.is_empty());
        assert!(result.calls.is_empty());
        assert!(result.imports.is_empty());
        assert_eq!(result.metadata["analyzer"], "default");
        assert!(!result
            .warnings
            .iter()
            .any(|w| matches!(w, AnalysisWarning::ParseFailure { .. })));
    }
}
