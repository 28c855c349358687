use serde::{Deserialize, Serialize};

/// Exchange identifier as submitted by the client (e.g. "gdax", "gemini").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exchange(String);

impl Exchange {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Exchange {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for Exchange {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
