//! Knowledge base
//!
//! Owns three record maps: canonical entities, relations with their
//! provenance, and the sources relations were seen in. Every relation
//! endpoint is canonicalized through an [`EntityResolver`] before
//! anything is stored; a triple whose head or tail cannot be resolved is
//! dropped without touching any record.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use txkb_core::{EntityRef, EntityResolver, KbError, RawTriple, Result, SourceInfo, Span};

// ============================================================================
// Records
// ============================================================================

/// Descriptive metadata for a canonical entity.
///
/// Fields are written once: later sightings only fill fields still empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub url: String,
    pub summary: String,
    pub first_seen_source_id: Option<String>,
    pub first_seen_date: Option<String>,
    pub first_seen_origin: Option<String>,
    pub first_seen_article_id: Option<String>,
}

impl EntityRecord {
    fn new(entity: &EntityRef, source: &SourceInfo) -> Self {
        Self {
            url: entity.url.clone(),
            summary: entity.summary.clone(),
            first_seen_source_id: Some(source.id.clone()),
            first_seen_date: source.publish_date.clone(),
            first_seen_origin: source.origin.clone(),
            first_seen_article_id: source.article_id.clone(),
        }
    }

    fn fill_missing(&mut self, entity: &EntityRef, source: &SourceInfo) {
        if self.url.is_empty() {
            self.url = entity.url.clone();
        }
        if self.summary.is_empty() {
            self.summary = entity.summary.clone();
        }
        fill(&mut self.first_seen_source_id, Some(&source.id));
        fill(&mut self.first_seen_date, source.publish_date.as_ref());
        fill(&mut self.first_seen_origin, source.origin.as_ref());
        fill(&mut self.first_seen_article_id, source.article_id.as_ref());
    }

    /// Canonical identity of the entity titled `title`
    pub fn to_entity_ref(&self, title: &str) -> EntityRef {
        EntityRef::new(title, self.url.clone(), self.summary.clone())
    }
}

fn fill(slot: &mut Option<String>, value: Option<&String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            *slot = Some(value.clone());
        }
    }
}

/// Metadata for a source document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub publish_date: Option<String>,
    pub origin: Option<String>,
    pub article_id: Option<String>,
}

impl SourceRecord {
    fn from_info(source: &SourceInfo) -> Self {
        Self {
            title: source.title.clone(),
            publish_date: source.publish_date.clone(),
            origin: source.origin.clone(),
            article_id: source.article_id.clone(),
        }
    }

    /// Rebuild the provenance context for source `id`
    pub fn to_source_info(&self, id: &str) -> SourceInfo {
        SourceInfo {
            id: id.to_string(),
            title: self.title.clone(),
            publish_date: self.publish_date.clone(),
            origin: self.origin.clone(),
            article_id: self.article_id.clone(),
        }
    }
}

/// Token spans a relation was extracted from, within one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub spans: Vec<Span>,
}

impl Provenance {
    /// Append spans not already recorded, keeping first-seen order
    fn extend(&mut self, spans: &[Span]) {
        for span in spans {
            if !self.spans.contains(span) {
                self.spans.push(*span);
            }
        }
    }
}

/// A typed, directed relation between two canonical entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub head: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub tail: String,
    /// source_id -> spans
    pub provenance: IndexMap<String, Provenance>,
}

impl Relation {
    fn key(&self) -> RelationKey {
        RelationKey::new(&self.head, &self.relation_type, &self.tail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RelationKey {
    head: String,
    relation_type: String,
    tail: String,
}

impl RelationKey {
    fn new(head: &str, relation_type: &str, tail: &str) -> Self {
        Self {
            head: head.to_string(),
            relation_type: relation_type.to_string(),
            tail: tail.to_string(),
        }
    }
}

/// What `add_relation` did with a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new relation record was created
    Inserted,
    /// Provenance was merged into an existing relation
    Merged,
    /// An endpoint could not be canonicalized; nothing was stored
    Discarded,
}

/// Counts from replaying another knowledge base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub merged: usize,
    pub discarded: usize,
}

impl MergeReport {
    fn record(&mut self, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Inserted => self.inserted += 1,
            AddOutcome::Merged => self.merged += 1,
            AddOutcome::Discarded => self.discarded += 1,
        }
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// Deduplicated, provenance-tracked store of entities and relations
pub struct KnowledgeBase {
    resolver: Arc<dyn EntityResolver>,
    entities: IndexMap<String, EntityRecord>,
    relations: Vec<Relation>,
    sources: IndexMap<String, SourceRecord>,
    /// (head, type, tail) -> position in `relations`
    index: HashMap<RelationKey, usize>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base canonicalizing through `resolver`
    pub fn new(resolver: Arc<dyn EntityResolver>) -> Self {
        Self {
            resolver,
            entities: IndexMap::new(),
            relations: Vec::new(),
            sources: IndexMap::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a knowledge base from a snapshot
    pub fn from_snapshot(snapshot: KbSnapshot, resolver: Arc<dyn EntityResolver>) -> Result<Self> {
        let mut index = HashMap::with_capacity(snapshot.relations.len());
        for (position, relation) in snapshot.relations.iter().enumerate() {
            if index.insert(relation.key(), position).is_some() {
                return Err(KbError::InvalidInput(format!(
                    "duplicate relation ({}, {}, {}) in snapshot",
                    relation.head, relation.relation_type, relation.tail
                )));
            }
        }

        Ok(Self {
            resolver,
            entities: snapshot.entities,
            relations: snapshot.relations,
            sources: snapshot.sources,
            index,
        })
    }

    /// Canonicalize and store one decoded triple.
    ///
    /// Resolver errors are treated as "not found".
    pub async fn add_relation(
        &mut self,
        raw: &RawTriple,
        spans: &[Span],
        source: &SourceInfo,
    ) -> AddOutcome {
        let (head, tail) = futures::join!(
            self.canonicalize(&raw.head),
            self.canonicalize(&raw.tail)
        );
        let (Some(head), Some(tail)) = (head, tail) else {
            debug!(
                head = %raw.head,
                relation = %raw.relation_type,
                tail = %raw.tail,
                "Dropping triple with unresolved endpoint"
            );
            return AddOutcome::Discarded;
        };

        self.upsert_entity(&head, source);
        self.upsert_entity(&tail, source);

        if !self.sources.contains_key(&source.id) {
            self.sources
                .insert(source.id.clone(), SourceRecord::from_info(source));
        }

        let key = RelationKey::new(&head.title, &raw.relation_type, &tail.title);
        match self.index.get(&key) {
            Some(&position) => {
                self.relations[position]
                    .provenance
                    .entry(source.id.clone())
                    .or_default()
                    .extend(spans);
                AddOutcome::Merged
            }
            None => {
                let mut provenance = Provenance::default();
                provenance.extend(spans);

                let mut relation = Relation {
                    head: head.title,
                    relation_type: raw.relation_type.clone(),
                    tail: tail.title,
                    provenance: IndexMap::new(),
                };
                relation.provenance.insert(source.id.clone(), provenance);

                self.index.insert(key, self.relations.len());
                self.relations.push(relation);
                AddOutcome::Inserted
            }
        }
    }

    /// Replay every relation of `other` into this knowledge base.
    ///
    /// Endpoints are re-resolved through this knowledge base's resolver,
    /// and each provenance entry is replayed with its source record from
    /// `other`, so merging the same knowledge base twice changes nothing.
    pub async fn merge_with(&mut self, other: &KnowledgeBase) -> MergeReport {
        let mut report = MergeReport::default();

        for relation in &other.relations {
            let raw = RawTriple::new(
                relation.head.clone(),
                relation.relation_type.clone(),
                relation.tail.clone(),
            );
            for (source_id, provenance) in &relation.provenance {
                let source = other
                    .sources
                    .get(source_id)
                    .map(|record| record.to_source_info(source_id))
                    .unwrap_or_else(|| SourceInfo::new(source_id.clone()));

                let outcome = self.add_relation(&raw, &provenance.spans, &source).await;
                report.record(outcome);
            }
        }

        debug!(
            inserted = report.inserted,
            merged = report.merged,
            discarded = report.discarded,
            "Merged knowledge base"
        );
        report
    }

    async fn canonicalize(&self, name: &str) -> Option<EntityRef> {
        match self.resolver.resolve(name).await {
            Ok(entity) => entity,
            Err(e) => {
                warn!(
                    resolver = self.resolver.name(),
                    name,
                    error = %e,
                    "Entity lookup failed, treating as not found"
                );
                None
            }
        }
    }

    fn upsert_entity(&mut self, entity: &EntityRef, source: &SourceInfo) {
        match self.entities.entry(entity.title.clone()) {
            Entry::Occupied(mut occupied) => occupied.get_mut().fill_missing(entity, source),
            Entry::Vacant(vacant) => {
                vacant.insert(EntityRecord::new(entity, source));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------------

    /// Entities in first-seen order
    pub fn entities(&self) -> impl Iterator<Item = (&str, &EntityRecord)> {
        self.entities.iter().map(|(title, record)| (title.as_str(), record))
    }

    /// Relations in first-seen order
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Sources in first-seen order
    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourceRecord)> {
        self.sources.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn entity(&self, title: &str) -> Option<&EntityRecord> {
        self.entities.get(title)
    }

    pub fn source(&self, id: &str) -> Option<&SourceRecord> {
        self.sources.get(id)
    }

    /// Look up a relation by its identity
    pub fn relation(&self, head: &str, relation_type: &str, tail: &str) -> Option<&Relation> {
        self.index
            .get(&RelationKey::new(head, relation_type, tail))
            .map(|&position| &self.relations[position])
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.entities.is_empty()
    }

    /// Copy the records out for serialization
    pub fn snapshot(&self) -> KbSnapshot {
        KbSnapshot {
            entities: self.entities.clone(),
            relations: self.relations.clone(),
            sources: self.sources.clone(),
        }
    }
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("resolver", &self.resolver.name())
            .field("entities", &self.entities.len())
            .field("relations", &self.relations.len())
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entities:")?;
        for (title, record) in &self.entities {
            writeln!(f, "  {title} ({})", record.url)?;
        }
        writeln!(f, "Relations:")?;
        for relation in &self.relations {
            let sources: Vec<String> = relation
                .provenance
                .iter()
                .map(|(id, p)| {
                    let spans: Vec<String> = p.spans.iter().map(Span::to_string).collect();
                    format!("{id} {}", spans.join(" "))
                })
                .collect();
            writeln!(
                f,
                "  {} --[{}]--> {}  <{}>",
                relation.head,
                relation.relation_type,
                relation.tail,
                sources.join("; ")
            )?;
        }
        writeln!(f, "Sources:")?;
        for (id, record) in &self.sources {
            writeln!(
                f,
                "  {id}: {} ({})",
                record.title.as_deref().unwrap_or("untitled"),
                record.publish_date.as_deref().unwrap_or("undated")
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Serializable copy of a knowledge base's records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbSnapshot {
    pub entities: IndexMap<String, EntityRecord>,
    pub relations: Vec<Relation>,
    pub sources: IndexMap<String, SourceRecord>,
}

impl KbSnapshot {
    /// Read a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KbError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading knowledge base {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing knowledge base {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnownEntityResolver;

    struct FailingResolver;

    #[async_trait::async_trait]
    impl EntityResolver for FailingResolver {
        async fn resolve(&self, _name: &str) -> Result<Option<EntityRef>> {
            Err(KbError::Resolver("connection reset".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn resolver() -> Arc<dyn EntityResolver> {
        Arc::new(
            KnownEntityResolver::new([
                EntityRef::new(
                    "Google",
                    "https://en.wikipedia.org/wiki/Google",
                    "American technology company",
                ),
                EntityRef::new(
                    "Alphabet Inc.",
                    "https://en.wikipedia.org/wiki/Alphabet_Inc.",
                    "Holding company",
                ),
                EntityRef::new(
                    "Sundar Pichai",
                    "https://en.wikipedia.org/wiki/Sundar_Pichai",
                    "CEO of Alphabet",
                ),
            ])
            .with_alias("Alphabet", "Alphabet Inc."),
        )
    }

    fn source(id: &str) -> SourceInfo {
        SourceInfo::new(id)
            .with_title(format!("Article {id}"))
            .with_publish_date("2024-03-01")
            .with_origin("Example News")
    }

    fn parent_triple() -> RawTriple {
        RawTriple::new("Google", "parent organization", "Alphabet")
    }

    #[tokio::test]
    async fn test_add_relation_canonicalizes_endpoints() {
        let mut kb = KnowledgeBase::new(resolver());

        let outcome = kb
            .add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;

        assert_eq!(outcome, AddOutcome::Inserted);
        assert_eq!(kb.relation_count(), 1);
        assert_eq!(kb.entity_count(), 2);
        assert_eq!(kb.source_count(), 1);

        let relation = &kb.relations()[0];
        assert_eq!(relation.head, "Google");
        assert_eq!(relation.tail, "Alphabet Inc.");
        assert!(kb.entity("Alphabet Inc.").is_some());
        assert!(kb.entity("Alphabet").is_none());
    }

    #[tokio::test]
    async fn test_same_source_spans_are_unioned() {
        let mut kb = KnowledgeBase::new(resolver());
        let a = source("a");

        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &a)
            .await;
        let outcome = kb
            .add_relation(
                &parent_triple(),
                &[Span::new(86, 214), Span::new(0, 128)],
                &a,
            )
            .await;
        kb.add_relation(&parent_triple(), &[Span::new(86, 214)], &a)
            .await;

        assert_eq!(outcome, AddOutcome::Merged);
        assert_eq!(kb.relation_count(), 1);
        let relation = kb
            .relation("Google", "parent organization", "Alphabet Inc.")
            .unwrap();
        assert_eq!(relation.provenance.len(), 1);
        assert_eq!(
            relation.provenance["a"].spans,
            vec![Span::new(0, 128), Span::new(86, 214)]
        );
    }

    #[tokio::test]
    async fn test_different_sources_add_provenance_entries() {
        let mut kb = KnowledgeBase::new(resolver());

        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;
        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("b"))
            .await;

        assert_eq!(kb.relation_count(), 1);
        assert_eq!(kb.source_count(), 2);
        let relation = &kb.relations()[0];
        assert_eq!(
            relation.provenance.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_distinct_types_are_distinct_relations() {
        let mut kb = KnowledgeBase::new(resolver());
        let a = source("a");

        kb.add_relation(&parent_triple(), &[], &a).await;
        kb.add_relation(&RawTriple::new("Google", "owned by", "Alphabet"), &[], &a)
            .await;
        kb.add_relation(&RawTriple::new("Alphabet", "subsidiary", "Google"), &[], &a)
            .await;

        assert_eq!(kb.relation_count(), 3);
        assert_eq!(kb.entity_count(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_endpoint_leaves_kb_unchanged() {
        let mut kb = KnowledgeBase::new(resolver());
        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;

        let outcome = kb
            .add_relation(
                &RawTriple::new("Google", "founded by", "Larry Page"),
                &[Span::new(0, 128)],
                &source("b"),
            )
            .await;

        assert_eq!(outcome, AddOutcome::Discarded);
        assert_eq!(kb.relation_count(), 1);
        assert_eq!(kb.entity_count(), 2);
        assert_eq!(kb.source_count(), 1);
        assert!(kb.source("b").is_none());
    }

    #[tokio::test]
    async fn test_resolver_errors_are_not_found() {
        let mut kb = KnowledgeBase::new(Arc::new(FailingResolver));

        let outcome = kb
            .add_relation(&parent_triple(), &[Span::new(0, 10)], &source("a"))
            .await;

        assert_eq!(outcome, AddOutcome::Discarded);
        assert!(kb.is_empty());
        assert_eq!(kb.source_count(), 0);
    }

    #[tokio::test]
    async fn test_entity_metadata_first_write_wins() {
        let mut kb = KnowledgeBase::new(resolver());

        let undated = SourceInfo::new("a");
        kb.add_relation(&parent_triple(), &[], &undated).await;
        kb.add_relation(&parent_triple(), &[], &source("b")).await;

        let google = kb.entity("Google").unwrap();
        assert_eq!(google.first_seen_source_id.as_deref(), Some("a"));
        // absent fields are filled by later sightings
        assert_eq!(google.first_seen_date.as_deref(), Some("2024-03-01"));
        assert_eq!(google.first_seen_origin.as_deref(), Some("Example News"));

        let mut kb2 = KnowledgeBase::new(resolver());
        kb2.add_relation(&parent_triple(), &[], &source("b")).await;
        kb2.add_relation(
            &parent_triple(),
            &[],
            &SourceInfo::new("c").with_publish_date("2025-01-01"),
        )
        .await;
        let google = kb2.entity("Google").unwrap();
        assert_eq!(google.first_seen_source_id.as_deref(), Some("b"));
        assert_eq!(google.first_seen_date.as_deref(), Some("2024-03-01"));
    }

    #[tokio::test]
    async fn test_source_record_created_once() {
        let mut kb = KnowledgeBase::new(resolver());

        kb.add_relation(&parent_triple(), &[], &source("a")).await;
        kb.add_relation(
            &RawTriple::new("Sundar Pichai", "employer", "Google"),
            &[],
            &SourceInfo::new("a").with_title("Different title"),
        )
        .await;

        assert_eq!(kb.source_count(), 1);
        assert_eq!(kb.source("a").unwrap().title.as_deref(), Some("Article a"));
    }

    #[tokio::test]
    async fn test_merge_with_is_idempotent() {
        let mut kb_a = KnowledgeBase::new(resolver());
        kb_a.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;

        let mut kb_b = KnowledgeBase::new(resolver());
        kb_b.add_relation(&parent_triple(), &[Span::new(86, 214)], &source("b"))
            .await;
        kb_b.add_relation(
            &RawTriple::new("Sundar Pichai", "employer", "Google"),
            &[Span::new(0, 128)],
            &source("b"),
        )
        .await;

        let first = kb_a.merge_with(&kb_b).await;
        assert_eq!(first.inserted, 1);
        assert_eq!(first.merged, 1);

        let relations = kb_a.relation_count();
        let entities = kb_a.entity_count();
        let sources = kb_a.source_count();

        let second = kb_a.merge_with(&kb_b).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(kb_a.relation_count(), relations);
        assert_eq!(kb_a.entity_count(), entities);
        assert_eq!(kb_a.source_count(), sources);
        assert_eq!(relations, 2);
        assert_eq!(entities, 3);

        let merged = kb_a
            .relation("Google", "parent organization", "Alphabet Inc.")
            .unwrap();
        assert_eq!(merged.provenance["b"].spans, vec![Span::new(86, 214)]);
        assert_eq!(
            kb_a.source("b").unwrap().publish_date.as_deref(),
            Some("2024-03-01")
        );
    }

    #[tokio::test]
    async fn test_merge_replays_every_source() {
        let mut aggregate = KnowledgeBase::new(resolver());
        aggregate
            .add_relation(&parent_triple(), &[Span::new(0, 1)], &source("a"))
            .await;
        aggregate
            .add_relation(&parent_triple(), &[Span::new(2, 3)], &source("b"))
            .await;

        let mut target = KnowledgeBase::new(resolver());
        let report = target.merge_with(&aggregate).await;

        assert_eq!(report.inserted, 1);
        assert_eq!(report.merged, 1);
        assert_eq!(target.source_count(), 2);
        assert_eq!(target.relations()[0].provenance.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_rebuilds_index() {
        let mut kb = KnowledgeBase::new(resolver());
        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        kb.snapshot().save(&path).unwrap();

        let snapshot = KbSnapshot::load(&path).unwrap();
        assert_eq!(snapshot, kb.snapshot());

        let mut restored = KnowledgeBase::from_snapshot(snapshot, resolver()).unwrap();
        let outcome = restored
            .add_relation(&parent_triple(), &[Span::new(86, 214)], &source("a"))
            .await;
        assert_eq!(outcome, AddOutcome::Merged);
        assert_eq!(restored.relation_count(), 1);
    }

    #[test]
    fn test_load_missing_snapshot() {
        assert!(matches!(
            KbSnapshot::load("/nonexistent/kb.json"),
            Err(KbError::NotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_duplicate_relations() {
        let relation = Relation {
            head: "Google".to_string(),
            relation_type: "parent organization".to_string(),
            tail: "Alphabet Inc.".to_string(),
            provenance: IndexMap::new(),
        };
        let snapshot = KbSnapshot {
            relations: vec![relation.clone(), relation],
            ..Default::default()
        };

        assert!(matches!(
            KnowledgeBase::from_snapshot(snapshot, resolver()),
            Err(KbError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_relation_json_shape() {
        let mut provenance = IndexMap::new();
        provenance.insert(
            "https://example.com/a".to_string(),
            Provenance {
                spans: vec![Span::new(0, 128)],
            },
        );
        let relation = Relation {
            head: "Google".to_string(),
            relation_type: "parent organization".to_string(),
            tail: "Alphabet Inc.".to_string(),
            provenance,
        };

        let json = serde_json::to_value(&relation).unwrap();
        assert_eq!(json["type"], "parent organization");
        assert_eq!(
            json["provenance"]["https://example.com/a"]["spans"],
            serde_json::json!([[0, 128]])
        );
    }

    #[tokio::test]
    async fn test_display_lists_sections() {
        let mut kb = KnowledgeBase::new(resolver());
        kb.add_relation(&parent_triple(), &[Span::new(0, 128)], &source("a"))
            .await;

        let printed = kb.to_string();
        assert!(printed.starts_with("Entities:"));
        assert!(printed.contains("Google --[parent organization]--> Alphabet Inc."));
        assert!(printed.contains("Sources:\n  a: Article a (2024-03-01)"));
    }
}
