//! Auxiliary context for review requests:
//! - Call-site detection on added lines.
//! - Definition lookup in the checked-out tree (per-run cache).
//! - Developer manual / example files under a shared token budget.

pub mod assemble;
pub mod cache;
pub mod reference;
pub mod source;
pub mod symbols;

pub use assemble::{AuxiliaryContext, ContextAssembler, IncludedDefinition, SkipReason, SkippedSymbol};
pub use cache::DefinitionCache;
pub use reference::{ReferenceDocs, RenderedReferences};
pub use source::{Definition, DefinitionSource, SourceTree, extract_definition};
pub use symbols::{added_line_body, called_symbols, is_numbered_document};
