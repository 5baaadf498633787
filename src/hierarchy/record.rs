use itertools::Itertools;
use std::fmt;
use std::ops::Deref;

use crate::StructureId;

/// One row of an atlas structure table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureRecord {
    pub id: StructureId,
    pub parent_id: Option<StructureId>,
    pub name: String,
    pub acronym: Option<String>,
}

impl StructureRecord {
    pub fn new<S: Into<String>>(id: StructureId, parent_id: Option<StructureId>, name: S) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            acronym: None,
        }
    }

    pub fn with_acronym<S: Into<String>>(mut self, acronym: S) -> Self {
        self.acronym = Some(acronym.into());
        self
    }
}

/// Ancestors of a structure ordered from the root (inclusive) down to the
/// structure's immediate parent. The root's own path is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HierarchyPath(Vec<StructureId>);

impl HierarchyPath {
    pub fn as_slice(&self) -> &[StructureId] {
        &self.0
    }

    /// Whether `id` is a strict ancestor of the structure owning this path
    pub fn has_ancestor(&self, id: StructureId) -> bool {
        self.0.contains(&id)
    }
}

impl From<Vec<StructureId>> for HierarchyPath {
    fn from(ids: Vec<StructureId>) -> Self {
        Self(ids)
    }
}

impl Deref for HierarchyPath {
    type Target = [StructureId];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for HierarchyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("/"))
    }
}

/// A structure record together with its serialized `structure_id_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedRecord {
    pub record: StructureRecord,
    pub structure_id_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![], "")]
    #[case(vec![997], "997")]
    #[case(vec![997, 8, 567], "997/8/567")]
    fn test_path_display(#[case] ids: Vec<StructureId>, #[case] expected: &str) {
        assert_eq!(HierarchyPath::from(ids).to_string(), expected);
    }

    #[test]
    fn test_has_ancestor() {
        let path = HierarchyPath::from(vec![997, 8, 567]);
        assert!(path.has_ancestor(8));
        assert!(!path.has_ancestor(343));
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), Some(&997));
    }
}
