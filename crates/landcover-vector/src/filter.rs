use tracing::{debug, instrument};

use crate::feature::{AdminFeature, Attribute};

/// A single attribute test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Attribute equals the value exactly.
    Eq { attribute: Attribute, value: String },
    /// Attribute equals one of the values.
    In { attribute: Attribute, values: Vec<String> },
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, feature: &AdminFeature) -> bool {
        match self {
            Predicate::Eq { attribute, value } => feature.attributes().get(*attribute) == value,
            Predicate::In { attribute, values } => {
                let actual = feature.attributes().get(*attribute);
                values.iter().any(|v| v == actual)
            }
        }
    }
}

/// Conjunction of attribute predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryFilter {
    predicates: Vec<Predicate>,
}

impl BoundaryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `attribute == value`.
    #[must_use]
    pub fn eq(mut self, attribute: Attribute, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Eq {
            attribute,
            value: value.into(),
        });
        self
    }

    /// Require `attribute` to be one of `values`.
    #[must_use]
    pub fn in_list<I, S>(mut self, attribute: Attribute, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.push(Predicate::In {
            attribute,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn matches(&self, feature: &AdminFeature) -> bool {
        self.predicates.iter().all(|p| p.matches(feature))
    }

    /// Features satisfying every predicate, in input order. Empty when nothing matches.
    #[instrument(skip_all, fields(n_features = features.len(), n_predicates = self.predicates.len()))]
    pub fn select(&self, features: &[AdminFeature]) -> Vec<AdminFeature> {
        let selected: Vec<AdminFeature> = features.iter().filter(|f| self.matches(f)).cloned().collect();
        debug!(n_selected = selected.len(), "boundary filter applied");
        selected
    }
}
