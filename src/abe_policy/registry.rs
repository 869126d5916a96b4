use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AccessPolicy, Namespace};
use crate::Error;

/// A named access policy, as declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPolicy {
    pub id: String,
    pub expression: String,
}

impl NamedPolicy {
    #[must_use]
    pub fn new(id: &str, expression: &str) -> Self {
        Self {
            id: id.to_string(),
            expression: expression.to_string(),
        }
    }
}

/// The closed set of access policies data may be encrypted under.
///
/// Clients only ever name a policy by its identifier; policy text is never
/// taken from them. Every entry is parsed and checked against the namespace
/// when the registry is built, so a typo in a policy fails at startup rather
/// than producing ciphertexts nobody can decrypt.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, AccessPolicy>,
}

impl PolicyRegistry {
    /// Builds and validates the registry.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if an expression is not a valid policy;
    /// - `Error::Setup` on an empty or duplicate identifier, an attribute
    ///   outside the namespace, or a policy no attribute set satisfies.
    pub fn new(
        namespace: &Namespace,
        entries: impl IntoIterator<Item = NamedPolicy>,
    ) -> Result<Self, Error> {
        let coordinates = namespace.coordinates();
        let mut policies = BTreeMap::new();
        for NamedPolicy { id, expression } in entries {
            if id.trim().is_empty() {
                return Err(Error::Setup("policy identifiers cannot be empty".to_string()));
            }
            if policies.contains_key(&id) {
                return Err(Error::Setup(format!("policy {id} already exists")));
            }
            let ap = AccessPolicy::parse(&expression)
                .map_err(|e| Error::Parse(format!("policy {id}: {e}")))?;
            namespace.check_policy(&ap).map_err(|attribute| {
                Error::Setup(format!(
                    "policy {id} references the undeclared attribute {attribute}"
                ))
            })?;
            if !coordinates.iter().any(|c| ap.evaluate(c)) {
                return Err(Error::Setup(format!(
                    "policy {id} cannot be satisfied by any attribute set"
                )));
            }
            policies.insert(id, ap);
        }
        Ok(Self { policies })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AccessPolicy> {
        self.policies.get(id)
    }

    /// Iterates over the registered policies in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AccessPolicy)> {
        self.policies.iter().map(|(id, ap)| (id.as_str(), ap))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
