// 🏷️ Attribute Provider - registry columns for resolved entities
//
// Reads the most recent registry record. Standard columns map to their
// fields; anything else is looked up in the free-form attribute map.

use crate::resolver::{EntityResolver, ResolvedEntity};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRecord {
    pub canonical_name: String,
    pub own_code: String,
    pub values: BTreeMap<String, Option<String>>,
}

pub struct AttributeProvider<'a> {
    resolver: &'a EntityResolver,
}

impl<'a> AttributeProvider<'a> {
    pub fn new(resolver: &'a EntityResolver) -> Self {
        AttributeProvider { resolver }
    }

    /// One attribute of an already-resolved entity
    pub fn attribute_for(&self, entity: &ResolvedEntity, name: &str) -> Option<String> {
        self.resolver
            .latest_registry_row(&entity.own_code)
            .and_then(|row| row.column(name))
    }

    /// Attributes for many identifiers.
    ///
    /// Unresolvable identifiers and entities absent from the registry are
    /// skipped, with a warning for the former.
    pub fn attributes<I, N>(&self, identifiers: &[I], names: &[N]) -> Vec<AttributeRecord>
    where
        I: AsRef<str>,
        N: AsRef<str>,
    {
        let mut records = Vec::new();

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let entity = match self.resolver.resolve(identifier) {
                Ok(entity) => entity,
                Err(e) => {
                    tracing::warn!(identifier, error = %e, "skipping identifier in attribute lookup");
                    continue;
                }
            };

            let row = match self.resolver.latest_registry_row(&entity.own_code) {
                Some(row) => row,
                None => continue,
            };

            let values = names
                .iter()
                .map(|n| (n.as_ref().to_string(), row.column(n.as_ref())))
                .collect();

            records.push(AttributeRecord {
                canonical_name: entity.display_name().to_string(),
                own_code: entity.own_code,
                values,
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::sample_store;
    use std::sync::Arc;

    #[test]
    fn test_attributes_skip_unknown_and_unregistered() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let provider = AttributeProvider::new(&resolver);

        let records = provider.attributes(
            &["BANK A", "NoSuchBank", "ORPHAN BANK", "Bank X"],
            &["segment", "financial_group_code"],
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].own_code, "00000208");
        assert_eq!(records[0].values["segment"].as_deref(), Some("S1"));
        assert_eq!(records[0].values["financial_group_code"].as_deref(), Some("F001"));
        assert_eq!(records[1].values["segment"].as_deref(), Some("S3"));
        assert_eq!(records[1].values["financial_group_code"], None);
    }

    #[test]
    fn test_attribute_for_reads_latest_row() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let provider = AttributeProvider::new(&resolver);
        let a = resolver.resolve("00000208").unwrap();

        assert_eq!(provider.attribute_for(&a, "institution_name").as_deref(), Some("BANK A"));
        assert_eq!(provider.attribute_for(&a, "period").as_deref(), Some("202501"));
        assert_eq!(provider.attribute_for(&a, "missing"), None);
    }
}
