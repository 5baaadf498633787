use crate::StructureId;
pub use snafu::Snafu;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
/// Errors raised while building or querying a structure hierarchy
pub enum HierarchyError {
    #[snafu(display("structure id {} appears more than once in the table", id))]
    DuplicateId { id: StructureId },

    #[snafu(display("structure id 0 is reserved for background (record '{}')", name))]
    ZeroId { name: String },

    #[snafu(display("structure {} has no parent but is not the root {}", id, root_id))]
    MissingParent {
        id: StructureId,
        root_id: StructureId,
    },

    #[snafu(display("structure {} points to parent {}, which is not in the table", id, parent_id))]
    UnknownParent {
        id: StructureId,
        parent_id: StructureId,
    },

    #[snafu(display("root structure {} names {} as its parent", root_id, parent_id))]
    RootHasParent {
        root_id: StructureId,
        parent_id: StructureId,
    },

    #[snafu(display(
        "parent chain of structure {} does not reach the root within {} hops",
        id,
        max_hops
    ))]
    Cycle { id: StructureId, max_hops: usize },

    #[snafu(display("value {} is not in the atlas structure table", id))]
    UnknownId { id: StructureId },
}

impl HierarchyError {
    /// Whether the error describes a malformed table rather than a failed lookup.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, HierarchyError::UnknownId { .. })
    }
}
