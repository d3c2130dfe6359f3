//! Enrolled reference faces, stored as parallel embedding/name sequences.

use crate::types::Embedding;

/// Set of known identities built once at startup.
///
/// Index `i` of [`embeddings`](Self::embeddings) and [`names`](Self::names)
/// always refers to the same identity.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    embeddings: Vec<Embedding>,
    names: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(name, embedding)` pairs, preserving their order.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Embedding)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (name, embedding) in entries {
            registry.insert(name, embedding);
        }
        registry
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, embedding: Embedding) {
        self.names.push(name.into());
        self.embeddings.push(embedding);
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(name, embedding)` pairs in enrollment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.embeddings.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_sequences_stay_aligned() {
        let registry = Registry::from_entries([
            ("alice", Embedding::new(vec![1.0, 0.0])),
            ("bob", Embedding::new(vec![0.0, 1.0])),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.embeddings().len(), registry.names().len());
        assert_eq!(registry.names()[1], "bob");
        assert_eq!(registry.embeddings()[1].values, vec![0.0, 1.0]);

        let pairs: Vec<_> = registry.iter().map(|(n, e)| (n, e.values[0])).collect();
        assert_eq!(pairs, vec![("alice", 1.0), ("bob", 0.0)]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.embeddings().is_empty());
        assert!(registry.names().is_empty());
    }
}
