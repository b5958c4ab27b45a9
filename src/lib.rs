pub mod analyzer;
pub mod config;
pub mod output;

pub use analyzer::{
    AnalysisResult, AnalysisWarning, CallRelationship, Chunk, ElementType, ImportKind,
    ImportRelationship, StructuralElement, analyze, analyze_tree, analyze_with,
    analyze_with_registry,
};
