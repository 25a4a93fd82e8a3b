use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// A schema-qualified entity (table) in a data store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl EntityRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Arc::from(namespace.into()),
            name: Arc::from(name.into()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Identity of a batch in the ledger: unique per entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchKey {
    pub entity: EntityRef,
    pub batch_id: i64,
}

impl BatchKey {
    pub fn new(entity: EntityRef, batch_id: i64) -> Self {
        Self { entity, batch_id }
    }

    pub fn namespace(&self) -> &str {
        self.entity.namespace()
    }

    pub fn entity_name(&self) -> &str {
        self.entity.name()
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.batch_id)
    }
}
