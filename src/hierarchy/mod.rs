//! # Atlas structure hierarchy
//!
//! Atlas ontologies are distributed as flat tables where each structure names its
//! parent. [`StructureHierarchy`] validates such a table once and precomputes
//!
//! - the [`HierarchyPath`] of every structure (root first, structure excluded), and
//! - a children index used to enumerate descendants in a single traversal.
//!
//! The hierarchy is immutable after [`StructureHierarchy::load`]; rebuilding it from a
//! different table produces a new value.

use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

use crate::errors::HierarchyError;
use crate::StructureId;

pub mod record;
pub use record::*;

#[derive(Debug, Clone)]
pub struct StructureHierarchy {
    root_id: StructureId,
    records: Vec<StructureRecord>,
    index: HashMap<StructureId, usize>,
    paths: HashMap<StructureId, HierarchyPath>,
    children: HashMap<StructureId, Vec<StructureId>>,
}

impl StructureHierarchy {
    /// Validate a structure table and build the hierarchy rooted at `root_id`.
    ///
    /// The root may be present in the table (with no parent, or itself as parent) or
    /// only referenced as a parent. A root that names any other parent is rejected. Any other record without a parent, any dangling
    /// parent reference, duplicated id or parent cycle makes the whole table invalid.
    pub fn load<I>(records: I, root_id: StructureId) -> Result<Self, HierarchyError>
    where
        I: IntoIterator<Item = StructureRecord>,
    {
        let records = records.into_iter().collect::<Vec<_>>();

        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.id == 0 {
                return Err(HierarchyError::ZeroId {
                    name: record.name.clone(),
                });
            }
            if index.insert(record.id, position).is_some() {
                return Err(HierarchyError::DuplicateId { id: record.id });
            }
        }

        if let Some(parent_id) = index
            .get(&root_id)
            .and_then(|&position| records[position].parent_id)
            .filter(|&parent_id| parent_id != root_id)
        {
            return Err(HierarchyError::RootHasParent { root_id, parent_id });
        }

        // Parent of every non-root record, validated to exist
        let mut parents = HashMap::with_capacity(records.len());
        let mut children: HashMap<StructureId, Vec<StructureId>> = HashMap::new();
        for record in records.iter().filter(|r| r.id != root_id) {
            let parent_id = record.parent_id.ok_or(HierarchyError::MissingParent {
                id: record.id,
                root_id,
            })?;
            if parent_id != root_id && !index.contains_key(&parent_id) {
                return Err(HierarchyError::UnknownParent {
                    id: record.id,
                    parent_id,
                });
            }
            parents.insert(record.id, parent_id);
            children.entry(parent_id).or_default().push(record.id);
        }

        let paths = build_paths(&records, &parents, root_id)?;
        debug!(
            structures = records.len(),
            root_id, "loaded structure hierarchy"
        );

        Ok(Self {
            root_id,
            records,
            index,
            paths,
            children,
        })
    }

    pub fn root_id(&self) -> StructureId {
        self.root_id
    }

    /// Number of records in the backing table
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `id` can be queried. The root is always known, even when the table
    /// only references it as a parent.
    pub fn contains(&self, id: StructureId) -> bool {
        self.paths.contains_key(&id)
    }

    /// Structure ids in table order
    pub fn ids(&self) -> impl Iterator<Item = StructureId> + '_ {
        self.records.iter().map(|r| r.id)
    }

    pub fn records(&self) -> &[StructureRecord] {
        &self.records
    }

    pub fn record(&self, id: StructureId) -> Result<&StructureRecord, HierarchyError> {
        self.index
            .get(&id)
            .map(|&position| &self.records[position])
            .ok_or(HierarchyError::UnknownId { id })
    }

    pub fn name_of(&self, id: StructureId) -> Result<&str, HierarchyError> {
        self.record(id).map(|r| r.name.as_str())
    }

    pub fn acronym_of(&self, id: StructureId) -> Result<Option<&str>, HierarchyError> {
        self.record(id).map(|r| r.acronym.as_deref())
    }

    pub fn hierarchy_path(&self, id: StructureId) -> Result<&HierarchyPath, HierarchyError> {
        self.paths.get(&id).ok_or(HierarchyError::UnknownId { id })
    }

    /// Ancestors of `id`, root first. The root is included, `id` itself is not.
    pub fn ancestor_path(&self, id: StructureId) -> Result<&[StructureId], HierarchyError> {
        self.hierarchy_path(id).map(HierarchyPath::as_slice)
    }

    /// The `/`-joined ancestor path, e.g. `"997/8/567"`
    pub fn path_string(&self, id: StructureId) -> Result<String, HierarchyError> {
        self.hierarchy_path(id).map(|p| p.to_string())
    }

    /// Direct children of `id` in table order
    pub fn children_of(&self, id: StructureId) -> Result<&[StructureId], HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::UnknownId { id });
        }
        Ok(self.children.get(&id).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Every structure whose ancestor path contains `id`, found by a breadth-first walk
    /// of the children index. With `include_self` the result always contains `id`, so a
    /// leaf yields exactly `{id}`.
    pub fn descendants_of(
        &self,
        id: StructureId,
        include_self: bool,
    ) -> Result<BTreeSet<StructureId>, HierarchyError> {
        let mut descendants = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for &child in self.children_of(current)? {
                if descendants.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        if include_self {
            descendants.insert(id);
        }
        Ok(descendants)
    }

    /// Same result as [`descendants_of`](Self::descendants_of), computed by scanning
    /// every stored path for `id`.
    pub fn descendants_by_path(
        &self,
        id: StructureId,
        include_self: bool,
    ) -> Result<BTreeSet<StructureId>, HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::UnknownId { id });
        }
        let mut descendants = self
            .paths
            .iter()
            .filter(|(_, path)| path.has_ancestor(id))
            .map(|(&other, _)| other)
            .collect::<BTreeSet<_>>();
        if include_self {
            descendants.insert(id);
        }
        Ok(descendants)
    }

    /// Annotate each record with its serialized hierarchy path.
    pub fn add_paths_to_table(
        &self,
        records: &[StructureRecord],
    ) -> Result<Vec<AnnotatedRecord>, HierarchyError> {
        records
            .iter()
            .map(|record| {
                Ok(AnnotatedRecord {
                    structure_id_path: self.path_string(record.id)?,
                    record: record.clone(),
                })
            })
            .collect()
    }
}

/// Walk parent pointers for every record, reusing paths that are already known. The
/// root is seeded with an empty path so every walk has an anchor to stop at.
fn build_paths(
    records: &[StructureRecord],
    parents: &HashMap<StructureId, StructureId>,
    root_id: StructureId,
) -> Result<HashMap<StructureId, HierarchyPath>, HierarchyError> {
    let max_hops = records.len();
    let mut paths: HashMap<StructureId, Vec<StructureId>> =
        HashMap::with_capacity(records.len() + 1);
    paths.insert(root_id, Vec::new());

    for record in records {
        if paths.contains_key(&record.id) {
            continue;
        }

        // Structures whose paths are still unknown, nearest to `record` first
        let mut trail = vec![record.id];
        let mut current = record.id;
        let (anchor, mut prefix) = loop {
            let parent = parents
                .get(&current)
                .copied()
                .ok_or(HierarchyError::UnknownId { id: current })?;
            if let Some(known) = paths.get(&parent) {
                break (parent, known.clone());
            }
            if trail.len() >= max_hops {
                return Err(HierarchyError::Cycle {
                    id: record.id,
                    max_hops,
                });
            }
            trail.push(parent);
            current = parent;
        };

        prefix.push(anchor);
        for &node in trail.iter().rev() {
            paths.insert(node, prefix.clone());
            prefix.push(node);
        }
    }

    Ok(paths
        .into_iter()
        .map(|(id, path)| (id, HierarchyPath::from(path)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn small_table() -> Vec<StructureRecord> {
        vec![
            StructureRecord::new(1, None, "root"),
            StructureRecord::new(2, Some(1), "A"),
            StructureRecord::new(3, Some(2), "A1"),
            StructureRecord::new(4, Some(2), "A2"),
        ]
    }

    fn allen_like_table() -> Vec<StructureRecord> {
        vec![
            StructureRecord::new(997, None, "root").with_acronym("root"),
            StructureRecord::new(8, Some(997), "Basic cell groups and regions")
                .with_acronym("grey"),
            StructureRecord::new(567, Some(8), "Cerebrum").with_acronym("CH"),
            StructureRecord::new(688, Some(567), "Cerebral cortex").with_acronym("CTX"),
            StructureRecord::new(623, Some(567), "Cerebral nuclei").with_acronym("CNU"),
            StructureRecord::new(343, Some(8), "Brain stem").with_acronym("BS"),
            StructureRecord::new(1009, Some(997), "fiber tracts").with_acronym("fiber tracts"),
        ]
    }

    /// A tree on ids `1..=n` rooted at 1, with records in shuffled order
    fn random_table(rng: &mut StdRng, n: StructureId) -> Vec<StructureRecord> {
        let mut records = vec![StructureRecord::new(1, None, "root")];
        for id in 2..=n {
            let parent = rng.gen_range(1..id);
            records.push(StructureRecord::new(id, Some(parent), format!("s{id}")));
        }
        records.shuffle(rng);
        records
    }

    #[test]
    fn test_small_table_queries() {
        let hierarchy = StructureHierarchy::load(small_table(), 1).unwrap();
        assert_eq!(
            hierarchy.descendants_of(2, true).unwrap(),
            BTreeSet::from([2, 3, 4])
        );
        assert_eq!(hierarchy.descendants_of(3, true).unwrap(), BTreeSet::from([3]));
        assert_eq!(hierarchy.ancestor_path(3).unwrap(), &[1, 2]);
        assert_eq!(hierarchy.ancestor_path(1).unwrap(), &[] as &[StructureId]);
        assert_eq!(hierarchy.name_of(4).unwrap(), "A2");
    }

    #[rstest]
    #[case(997, "")]
    #[case(8, "997")]
    #[case(567, "997/8")]
    #[case(688, "997/8/567")]
    #[case(1009, "997")]
    fn test_path_string(#[case] id: StructureId, #[case] expected: &str) {
        let hierarchy = StructureHierarchy::load(allen_like_table(), 997).unwrap();
        assert_eq!(hierarchy.path_string(id).unwrap(), expected);
    }

    #[rstest]
    #[case(8, true, vec![8, 567, 688, 623, 343])]
    #[case(8, false, vec![567, 688, 623, 343])]
    #[case(567, false, vec![688, 623])]
    #[case(688, true, vec![688])]
    #[case(688, false, vec![])]
    #[case(997, false, vec![8, 567, 688, 623, 343, 1009])]
    fn test_descendants(
        #[case] id: StructureId,
        #[case] include_self: bool,
        #[case] expected: Vec<StructureId>,
    ) {
        let hierarchy = StructureHierarchy::load(allen_like_table(), 997).unwrap();
        let expected = expected.into_iter().collect::<BTreeSet<_>>();
        assert_eq!(hierarchy.descendants_of(id, include_self).unwrap(), expected);
        assert_eq!(
            hierarchy.descendants_by_path(id, include_self).unwrap(),
            expected
        );
    }

    #[test]
    fn test_children_of() {
        let hierarchy = StructureHierarchy::load(allen_like_table(), 997).unwrap();
        assert_eq!(hierarchy.children_of(8).unwrap(), &[567, 343]);
        assert_eq!(hierarchy.children_of(997).unwrap(), &[8, 1009]);
        assert!(hierarchy.children_of(688).unwrap().is_empty());
    }

    #[test]
    fn test_root_only_referenced() {
        // Root 997 is a sentinel, not a record
        let records = allen_like_table().into_iter().skip(1).collect::<Vec<_>>();
        let hierarchy = StructureHierarchy::load(records, 997).unwrap();
        assert_eq!(hierarchy.len(), 6);
        assert!(hierarchy.contains(997));
        assert_eq!(hierarchy.ancestor_path(623).unwrap(), &[997, 8, 567]);
        assert_eq!(
            hierarchy.name_of(997),
            Err(HierarchyError::UnknownId { id: 997 })
        );
        assert_eq!(hierarchy.descendants_of(997, false).unwrap().len(), 6);
    }

    #[test]
    fn test_root_pointing_to_itself() {
        let mut records = small_table();
        records[0].parent_id = Some(1);
        let hierarchy = StructureHierarchy::load(records, 1).unwrap();
        assert!(hierarchy.ancestor_path(1).unwrap().is_empty());
        assert_eq!(hierarchy.ancestor_path(4).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_unknown_id() {
        let hierarchy = StructureHierarchy::load(small_table(), 1).unwrap();
        let err = HierarchyError::UnknownId { id: 42 };
        assert_eq!(hierarchy.ancestor_path(42), Err(err.clone()));
        assert_eq!(hierarchy.name_of(42), Err(err.clone()));
        assert_eq!(hierarchy.descendants_of(42, true), Err(err.clone()));
        assert_eq!(hierarchy.descendants_by_path(42, true), Err(err.clone()));
        assert!(!err.is_malformed());
    }

    #[rstest]
    #[case::duplicate(
        vec![(1, None), (2, Some(1)), (2, Some(1))],
        HierarchyError::DuplicateId { id: 2 }
    )]
    #[case::dangling_parent(
        vec![(1, None), (2, Some(1)), (3, Some(9))],
        HierarchyError::UnknownParent { id: 3, parent_id: 9 }
    )]
    #[case::second_root(
        vec![(1, None), (2, Some(1)), (3, None)],
        HierarchyError::MissingParent { id: 3, root_id: 1 }
    )]
    #[case::two_cycle(
        vec![(1, None), (2, Some(3)), (3, Some(2))],
        HierarchyError::Cycle { id: 2, max_hops: 3 }
    )]
    #[case::self_parent(
        vec![(1, None), (2, Some(2))],
        HierarchyError::Cycle { id: 2, max_hops: 2 }
    )]
    #[case::root_with_parent(
        vec![(1, Some(2)), (2, Some(1))],
        HierarchyError::RootHasParent { root_id: 1, parent_id: 2 }
    )]
    #[case::root_with_unknown_parent(
        vec![(1, Some(7)), (2, Some(1))],
        HierarchyError::RootHasParent { root_id: 1, parent_id: 7 }
    )]
    fn test_malformed_tables(
        #[case] rows: Vec<(StructureId, Option<StructureId>)>,
        #[case] expected: HierarchyError,
    ) {
        let records = rows
            .into_iter()
            .map(|(id, parent)| StructureRecord::new(id, parent, format!("s{id}")));
        let err = StructureHierarchy::load(records, 1).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err, expected);
    }

    #[test]
    fn test_zero_id_rejected() {
        let records = vec![
            StructureRecord::new(1, None, "root"),
            StructureRecord::new(0, Some(1), "background"),
        ];
        let err = StructureHierarchy::load(records, 1).unwrap_err();
        assert!(matches!(err, HierarchyError::ZeroId { .. }));
    }

    #[test]
    fn test_deep_chain_is_not_a_cycle() {
        // 1 <- 2 <- ... <- 50, listed leaf first so no path is known in advance
        let records = (1..=50)
            .rev()
            .map(|id| StructureRecord::new(id, (id > 1).then(|| id - 1), format!("s{id}")));
        let hierarchy = StructureHierarchy::load(records, 1).unwrap();
        let path = hierarchy.ancestor_path(50).unwrap();
        assert_eq!(path, (1..50).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_chain_below_sentinel_root() {
        // Every record is on the path, root is never a record
        let records = (2..=20)
            .rev()
            .map(|id| StructureRecord::new(id, Some(id - 1), format!("s{id}")));
        let hierarchy = StructureHierarchy::load(records, 1).unwrap();
        assert_eq!(hierarchy.ancestor_path(20).unwrap().len(), 19);
    }

    #[rstest]
    fn test_random_tree_invariants(#[values(1, 7, 42, 1234)] seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let hierarchy = StructureHierarchy::load(random_table(&mut rng, 300), 1).unwrap();

        for id in hierarchy.ids() {
            let path = hierarchy.ancestor_path(id).unwrap();
            if id != 1 {
                assert_eq!(path.first(), Some(&1));
            }
            assert!(!path.contains(&id));

            let descendants = hierarchy.descendants_of(id, false).unwrap();
            assert_eq!(descendants, hierarchy.descendants_by_path(id, false).unwrap());
            for d in &descendants {
                assert!(hierarchy.ancestor_path(*d).unwrap().contains(&id));
            }

            let with_self = hierarchy.descendants_of(id, true).unwrap();
            assert_eq!(with_self.len(), descendants.len() + 1);
            assert!(with_self.contains(&id));
        }
    }

    #[test]
    fn test_add_paths_to_table() {
        let records = allen_like_table();
        let hierarchy = StructureHierarchy::load(records.clone(), 997).unwrap();
        let annotated = hierarchy.add_paths_to_table(&records).unwrap();
        assert_eq!(annotated.len(), records.len());
        assert_eq!(annotated[0].structure_id_path, "");
        assert_eq!(annotated[3].record.id, 688);
        assert_eq!(annotated[3].structure_id_path, "997/8/567");

        let unknown = vec![StructureRecord::new(5, Some(997), "missing")];
        assert_eq!(
            hierarchy.add_paths_to_table(&unknown),
            Err(HierarchyError::UnknownId { id: 5 })
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let hierarchy = StructureHierarchy::load(allen_like_table(), 997).unwrap();
        let hierarchy = &hierarchy;
        std::thread::scope(|s| {
            let handles = [8, 567, 997]
                .map(|id| s.spawn(move || hierarchy.descendants_of(id, true).unwrap().len()));
            let counts = handles.map(|h| h.join().unwrap());
            assert_eq!(counts, [5, 3, 7]);
        });
    }
}
