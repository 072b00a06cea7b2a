use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::signal::RelationName;
use crate::Result;

pub type DataBag = BTreeMap<String, String>;

/// One peer unit on a relation and the bag it owns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Participant {
    pub unit: String,
    pub data: DataBag,
}

impl Participant {
    /// A value the participant actually supplied; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// The remote side of a relation, participants in a stable order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pub participants: Vec<Participant>,
}

impl Relation {
    /// A relation without participants is absent, even if it was established.
    pub fn is_absent(&self) -> bool {
        self.participants.is_empty()
    }
}

#[async_trait]
pub trait RelationView: Send + Sync {
    /// The remote participants of `name`.
    async fn relation(&self, name: RelationName) -> Result<Relation>;

    /// What this unit has published into `name` so far.
    async fn local_data(&self, name: RelationName) -> Result<DataBag>;

    /// Writes `data` into this unit's own bag on `name`.
    async fn publish(&self, name: RelationName, data: &DataBag) -> Result<()>;
}

/// The state of every relation this unit uses, read once per reconcile pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationSnapshot {
    relations: BTreeMap<RelationName, Relation>,
}

impl RelationSnapshot {
    pub async fn read(view: &dyn RelationView) -> Result<Self> {
        let mut relations = BTreeMap::new();
        for name in RelationName::ALL {
            relations.insert(name, view.relation(name).await?);
        }

        Ok(Self { relations })
    }

    pub fn with(mut self, name: RelationName, relation: Relation) -> Self {
        self.relations.insert(name, relation);
        self
    }

    pub fn participants(&self, name: RelationName) -> &[Participant] {
        self.relations
            .get(&name)
            .map(|relation| relation.participants.as_slice())
            .unwrap_or_default()
    }

    pub fn is_absent(&self, name: RelationName) -> bool {
        self.relations.get(&name).map_or(true, Relation::is_absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_absent() {
        let participant = Participant {
            unit: "keystone/0".into(),
            data: DataBag::from([
                ("credentials_host".into(), "".into()),
                ("credentials_port".into(), "5000".into()),
            ]),
        };

        assert_eq!(participant.get("credentials_host"), None);
        assert_eq!(participant.get("credentials_port"), Some("5000"));
        assert_eq!(participant.get("api_version"), None);
    }

    #[test]
    fn snapshot_distinguishes_absent_from_empty() {
        let snapshot = RelationSnapshot::default().with(
            RelationName::KeystoneCredentials,
            Relation {
                participants: vec![Participant {
                    unit: "keystone/0".into(),
                    data: DataBag::new(),
                }],
            },
        );

        assert!(!snapshot.is_absent(RelationName::KeystoneCredentials));
        assert!(snapshot.is_absent(RelationName::TlsCertificates));
    }
}
