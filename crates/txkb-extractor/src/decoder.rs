//! Triplet decoding
//!
//! Parses the linearized output of a REBEL-style seq2seq model:
//!
//! ```text
//! <s><triplet> Paris <subj> France <obj> capital of <subj> Seine <obj> located next to</s>
//! ```
//!
//! One left-to-right scan over whitespace-separated tokens with four
//! states. Malformed output never fails; incomplete triples are dropped.

use txkb_core::RawTriple;

use crate::TripletParser;

/// Starts a new triple and opens the head field
pub const TRIPLET_MARKER: &str = "<triplet>";

/// Opens the tail field.
///
/// The model vocabulary calls this the subject tag, but in its output the
/// text that follows is the tail entity. Kept as observed.
pub const SUBJECT_MARKER: &str = "<subj>";

/// Opens the relation-type field (named the object tag by the model).
pub const OBJECT_MARKER: &str = "<obj>";

/// Sequence and padding tokens stripped before scanning
const SPECIAL_TOKENS: [&str; 3] = ["<s>", "</s>", "<pad>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Head,
    Tail,
    Relation,
}

#[derive(Debug, Default)]
struct Buffers {
    head: String,
    relation: String,
    tail: String,
}

impl Buffers {
    fn push(field: &mut String, token: &str) {
        field.push(' ');
        field.push_str(token);
    }

    /// Emit the current buffers if every field is non-empty
    fn flush(&self, out: &mut Vec<RawTriple>) {
        let head = self.head.trim();
        let relation = self.relation.trim();
        let tail = self.tail.trim();
        if !head.is_empty() && !relation.is_empty() && !tail.is_empty() {
            out.push(RawTriple::new(head, relation, tail));
        }
    }
}

/// Decode every complete triple in one model output string
pub fn decode_triples(output: &str) -> Vec<RawTriple> {
    let mut text = output.trim().to_string();
    for special in SPECIAL_TOKENS {
        text = text.replace(special, "");
    }

    let mut triples = Vec::new();
    let mut buffers = Buffers::default();
    let mut field = Field::None;

    for token in text.split_whitespace() {
        match token {
            TRIPLET_MARKER => {
                field = Field::Head;
                if !buffers.relation.is_empty() {
                    buffers.flush(&mut triples);
                    buffers.relation.clear();
                }
                buffers.head.clear();
            }
            SUBJECT_MARKER => {
                field = Field::Tail;
                if !buffers.relation.is_empty() {
                    buffers.flush(&mut triples);
                }
                buffers.tail.clear();
            }
            OBJECT_MARKER => {
                field = Field::Relation;
                buffers.relation.clear();
            }
            _ => match field {
                Field::Head => Buffers::push(&mut buffers.head, token),
                Field::Tail => Buffers::push(&mut buffers.tail, token),
                Field::Relation => Buffers::push(&mut buffers.relation, token),
                Field::None => {}
            },
        }
    }

    buffers.flush(&mut triples);
    triples
}

/// Decoder for the REBEL triplet linearization
#[derive(Debug, Clone, Copy, Default)]
pub struct RebelDecoder;

impl TripletParser for RebelDecoder {
    fn parse(&self, output: &str) -> Vec<RawTriple> {
        decode_triples(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_triple() {
        let triples = decode_triples("<triplet> A <subj> B <obj> rel");
        assert_eq!(triples, vec![RawTriple::new("A", "rel", "B")]);
    }

    #[test]
    fn test_special_tokens_stripped() {
        let triples =
            decode_triples("<s><triplet> Punta Cana <subj> Dominican Republic <obj> country</s><pad><pad>");
        assert_eq!(
            triples,
            vec![RawTriple::new("Punta Cana", "country", "Dominican Republic")]
        );
    }

    #[test]
    fn test_shared_head_multiple_tails() {
        let output = "<s><triplet> Paris <subj> France <obj> capital of <subj> Seine <obj> located next to body of water</s>";
        let triples = decode_triples(output);
        assert_eq!(
            triples,
            vec![
                RawTriple::new("Paris", "capital of", "France"),
                RawTriple::new("Paris", "located next to body of water", "Seine"),
            ]
        );
    }

    #[test]
    fn test_multiple_triplets() {
        let output = "<triplet> Google <subj> Alphabet Inc. <obj> parent organization <triplet> Sundar Pichai <subj> Google <obj> employer";
        let triples = decode_triples(output);
        assert_eq!(triples.len(), 2);
        assert_eq!(
            triples[0],
            RawTriple::new("Google", "parent organization", "Alphabet Inc.")
        );
        assert_eq!(triples[1], RawTriple::new("Sundar Pichai", "employer", "Google"));
    }

    #[test]
    fn test_tail_reused_after_subj_flush() {
        // The relation buffer survives a tail marker, so the final flush
        // pairs the new tail with the previous relation type.
        let triples = decode_triples("<triplet> A <subj> B <obj> r1 <subj> C");
        assert_eq!(
            triples,
            vec![RawTriple::new("A", "r1", "B"), RawTriple::new("A", "r1", "C")]
        );
    }

    #[test]
    fn test_no_markers_yields_nothing() {
        assert!(decode_triples("just some generated text").is_empty());
        assert!(decode_triples("").is_empty());
        assert!(decode_triples("<s></s><pad>").is_empty());
    }

    #[test]
    fn test_incomplete_triples_dropped() {
        assert!(decode_triples("<triplet> A <subj> B").is_empty());
        assert!(decode_triples("<triplet> A <obj> rel").is_empty());
        assert!(decode_triples("<subj> B <obj> rel").is_empty());
        // empty head at the flush point is skipped, the next triple survives
        let triples = decode_triples("<subj> B <obj> r <triplet> X <subj> Y <obj> s");
        assert_eq!(triples, vec![RawTriple::new("X", "s", "Y")]);
    }

    #[test]
    fn test_markers_out_of_order() {
        let triples = decode_triples("<obj> rel <subj> tail <triplet> head");
        assert!(triples.is_empty());
    }

    #[test]
    fn test_decoding_is_idempotent() {
        let output = "<s><triplet> Rust <subj> Mozilla <obj> developer <triplet> Cargo <subj> Rust <obj> part of</s>";
        assert_eq!(decode_triples(output), decode_triples(output));
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let triples = decode_triples("  <triplet>   New   York <subj> United\tStates  <obj>  country ");
        assert_eq!(
            triples,
            vec![RawTriple::new("New York", "country", "United States")]
        );
    }

    #[test]
    fn test_rebel_decoder_parser_trait() {
        let parser: &dyn TripletParser = &RebelDecoder;
        assert_eq!(parser.parse("<triplet> A <subj> B <obj> rel").len(), 1);
    }
}
