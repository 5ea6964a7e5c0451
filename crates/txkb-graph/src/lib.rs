//! txkb Graph - Knowledge base of canonical entities and typed relations
//!
//! Relations extracted from overlapping windows and from many documents
//! are deduplicated by (head, type, tail); what accumulates is provenance:
//! which sources mention a relation and at which token spans.

pub mod export;
pub mod kb;
pub mod known;

pub use export::{GraphExport, GraphLink, GraphNode};
pub use kb::{
    AddOutcome, EntityRecord, KbSnapshot, KnowledgeBase, MergeReport, Provenance, Relation,
    SourceRecord,
};
pub use known::KnownEntityResolver;
