//! Offline entity resolver over a fixed set of canonical entities
//!
//! Used when combining saved knowledge bases: their entities are already
//! canonical, so replaying them needs no network lookups.

use std::collections::HashMap;

use txkb_core::{EntityRef, EntityResolver, Result};

use crate::KbSnapshot;

/// Resolves names against an in-memory table of canonical entities
#[derive(Debug, Clone, Default)]
pub struct KnownEntityResolver {
    entities: HashMap<String, EntityRef>,
    /// alias -> canonical title
    aliases: HashMap<String, String>,
}

impl KnownEntityResolver {
    pub fn new(entities: impl IntoIterator<Item = EntityRef>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|entity| (entity.title.clone(), entity))
                .collect(),
            aliases: HashMap::new(),
        }
    }

    /// Collect every entity of the given snapshots; the first record of a
    /// title wins
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a KbSnapshot>) -> Self {
        let mut entities = HashMap::new();
        for snapshot in snapshots {
            for (title, record) in &snapshot.entities {
                entities
                    .entry(title.clone())
                    .or_insert_with(|| record.to_entity_ref(title));
            }
        }
        Self {
            entities,
            aliases: HashMap::new(),
        }
    }

    /// Map an alternative name onto a known canonical title
    pub fn with_alias(mut self, alias: impl Into<String>, title: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), title.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&EntityRef> {
        let name = name.trim();
        if let Some(entity) = self.entities.get(name) {
            return Some(entity);
        }
        self.aliases
            .get(name)
            .and_then(|title| self.entities.get(title))
    }
}

#[async_trait::async_trait]
impl EntityResolver for KnownEntityResolver {
    async fn resolve(&self, name: &str) -> Result<Option<EntityRef>> {
        Ok(self.lookup(name).cloned())
    }

    fn name(&self) -> &str {
        "known"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityRecord;

    fn paris() -> EntityRef {
        EntityRef::new("Paris", "https://en.wikipedia.org/wiki/Paris", "Capital of France")
    }

    #[test]
    fn test_resolves_titles_and_aliases() {
        let resolver = KnownEntityResolver::new([paris()]).with_alias("City of Light", "Paris");

        let direct = tokio_test::block_on(resolver.resolve("Paris")).unwrap();
        assert_eq!(direct, Some(paris()));

        let alias = tokio_test::block_on(resolver.resolve(" City of Light ")).unwrap();
        assert_eq!(alias.map(|e| e.title), Some("Paris".to_string()));

        let missing = tokio_test::block_on(resolver.resolve("Lyon")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_alias_to_unknown_title_is_not_found() {
        let resolver = KnownEntityResolver::default().with_alias("NYC", "New York City");
        assert!(tokio_test::block_on(resolver.resolve("NYC"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_from_snapshots_first_record_wins() {
        let mut first = KbSnapshot::default();
        first.entities.insert(
            "Paris".to_string(),
            EntityRecord {
                url: "https://en.wikipedia.org/wiki/Paris".to_string(),
                summary: "first".to_string(),
                ..Default::default()
            },
        );
        let mut second = KbSnapshot::default();
        second.entities.insert(
            "Paris".to_string(),
            EntityRecord {
                summary: "second".to_string(),
                ..Default::default()
            },
        );
        second
            .entities
            .insert("France".to_string(), EntityRecord::default());

        let resolver = KnownEntityResolver::from_snapshots([&first, &second]);
        assert_eq!(resolver.len(), 2);

        let paris = tokio_test::block_on(resolver.resolve("Paris"))
            .unwrap()
            .unwrap();
        assert_eq!(paris.summary, "first");
    }
}
