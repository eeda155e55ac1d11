use crate::{base::SentinelRule, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum AuthorityStrategy {
    /// only the listed origins may access the resource
    White,
    /// the listed origins may not access the resource
    Black,
}

impl Default for AuthorityStrategy {
    fn default() -> AuthorityStrategy {
        AuthorityStrategy::White
    }
}

/// `Rule` restricts the callers (origins) of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: String,
    /// `resource` represents the target resource definition
    pub resource: String,
    pub strategy: AuthorityStrategy,
    /// the origins the rule lists, an empty list makes the rule pass everything
    pub limit_origins: Vec<String>,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: AuthorityStrategy::default(),
            limit_origins: Vec::new(),
        }
    }
}

impl Rule {
    /// whether the call from `origin` may pass,
    /// calls without an origin are never restricted
    pub fn passes(&self, origin: &str) -> bool {
        if origin.is_empty() || self.limit_origins.is_empty() {
            return true;
        }
        let listed = self.limit_origins.iter().any(|o| o == origin);
        match self.strategy {
            AuthorityStrategy::White => listed,
            AuthorityStrategy::Black => !listed,
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.limit_origins == other.limit_origins
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.limit_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(Error::msg("blank origin in limit_origins"));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", fmtted)
    }
}
