//! txkb Extractor - Relation extraction building blocks
//!
//! Splits long token sequences into overlapping windows that fit a
//! bounded-context model, and decodes the model's tagged output into
//! (head, type, tail) triples.

use txkb_core::RawTriple;

/// Trait for parsers that turn one model output string into triples
pub trait TripletParser: Send + Sync {
    fn parse(&self, output: &str) -> Vec<RawTriple>;
}

pub mod decoder;
pub mod window;

pub use decoder::{decode_triples, RebelDecoder};
pub use window::{clipped_span_windows, num_windows, overlap, span_windows};
