use std::fmt;

/// The role a node plays in a [CutElemMesh](super::CutElemMesh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeCategory {
    /// A node of the underlying mesh, or a node created to replace a temporary node
    Permanent,
    /// A placeholder for a node a child element does not physically contain; replaced before the topology update finishes
    Temp,
    /// A node at an intersection of a cut with an edge, or on the interior of an element
    Embedded,
    /// The local index of a node in a saved element
    LocalIndex,
}

/// A handle to a node: its category and its id within that category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub category: NodeCategory,
    pub id: usize,
}

impl NodeKey {
    pub fn permanent(id: usize) -> Self {
        Self {
            category: NodeCategory::Permanent,
            id,
        }
    }

    pub fn temp(id: usize) -> Self {
        Self {
            category: NodeCategory::Temp,
            id,
        }
    }

    pub fn embedded(id: usize) -> Self {
        Self {
            category: NodeCategory::Embedded,
            id,
        }
    }

    pub fn local(id: usize) -> Self {
        Self {
            category: NodeCategory::LocalIndex,
            id,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.category == NodeCategory::Permanent
    }

    pub fn is_temp(&self) -> bool {
        self.category == NodeCategory::Temp
    }

    pub fn is_embedded(&self) -> bool {
        self.category == NodeCategory::Embedded
    }

    /// Permanent and temporary nodes refer to mesh nodes
    pub fn is_global(&self) -> bool {
        self.is_permanent() || self.is_temp()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.category {
            NodeCategory::Permanent => 'p',
            NodeCategory::Temp => 't',
            NodeCategory::Embedded => 'e',
            NodeCategory::LocalIndex => 'l',
        };
        write!(f, "{}{}", prefix, self.id)
    }
}

/// A node stored in a [CutElemMesh](super::CutElemMesh)
///
/// Nodes created while splitting an element remember the node of the parent element they were copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutNode {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
}

impl CutNode {
    pub fn new(key: NodeKey) -> Self {
        Self { key, parent: None }
    }

    pub fn with_parent(key: NodeKey, parent: NodeKey) -> Self {
        Self {
            key,
            parent: Some(parent),
        }
    }
}
