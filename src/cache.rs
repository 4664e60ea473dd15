use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Bookkeeping collections the page reads and may need while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Sales,
    Expenses,
    Customers,
    Vendors,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Sales => "sales",
            Collection::Expenses => "expenses",
            Collection::Customers => "customers",
            Collection::Vendors => "vendors",
        }
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(Collection::Sales),
            "expenses" => Ok(Collection::Expenses),
            "customers" => Ok(Collection::Customers),
            "vendors" => Ok(Collection::Vendors),
            other => Err(format!("Unknown collection: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResource {
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// Last known copy of each collection, owned by the foreground proxy.
pub struct ResourceCache {
    entries: DashMap<Collection, CachedResource>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, collection: Collection) -> Option<CachedResource> {
        self.entries.get(&collection).map(|entry| entry.value().clone())
    }

    pub fn put(&self, collection: Collection, data: serde_json::Value) -> CachedResource {
        let resource = CachedResource {
            data,
            fetched_at: Utc::now(),
        };
        self.entries.insert(collection, resource.clone());
        resource
    }

    pub fn invalidate(&self, collection: Collection) {
        self.entries.remove(&collection);
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn put_replaces_and_invalidate_clears() {
        let cache = ResourceCache::new();
        assert!(cache.get(Collection::Sales).is_none());

        cache.put(Collection::Sales, json!([{ "id": 1 }]));
        cache.put(Collection::Sales, json!([{ "id": 1 }, { "id": 2 }]));
        assert_eq!(cache.get(Collection::Sales).unwrap().data.as_array().unwrap().len(), 2);
        assert!(cache.get(Collection::Vendors).is_none());

        cache.invalidate(Collection::Sales);
        assert!(cache.get(Collection::Sales).is_none());
    }

    #[test]
    fn parses_known_collections_only() {
        assert_eq!("expenses".parse::<Collection>(), Ok(Collection::Expenses));
        assert_eq!(Collection::Customers.as_str(), "customers");
        assert!("payroll".parse::<Collection>().is_err());
    }
}
