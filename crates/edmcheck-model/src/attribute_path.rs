//! Attribute paths
//!
//! An attribute path names an attribute by the chain of elements leading
//! to it: `Schema/EntityType/Property` then the attribute `Nullable`.
//! Content validators resolve the simple type of an attribute from its path.

use std::collections::VecDeque;

/// Namespace-qualified node name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub name: String,
    pub namespace: String,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathNodeType {
    Element,
    Attribute,
}

/// One step of an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathNode {
    pub qname: QualifiedName,
    pub node_type: PathNodeType,
}

impl PathNode {
    pub fn is_element(&self) -> bool {
        self.node_type == PathNodeType::Element
    }
}

/// Outermost element first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath {
    nodes: VecDeque<PathNode>,
}

impl AttributePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a node; building happens innermost first
    pub fn push_front(&mut self, name: impl Into<String>, namespace: impl Into<String>, is_element: bool) {
        self.nodes.push_front(PathNode {
            qname: QualifiedName::new(name, namespace),
            node_type: if is_element {
                PathNodeType::Element
            } else {
                PathNodeType::Attribute
            },
        });
    }

    /// Remove and return the outermost node
    pub fn pop_front(&mut self) -> Option<PathNode> {
        self.nodes.pop_front()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter()
    }

    /// Trailing attribute, when the path ends in one
    pub fn attribute(&self) -> Option<&PathNode> {
        self.nodes.back().filter(|node| !node.is_element())
    }

    /// Element local names joined with `/`, for table lookups
    pub fn element_chain(&self) -> String {
        self.nodes
            .iter()
            .filter(|node| node.is_element())
            .map(|node| node.qname.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .nodes
            .iter()
            .map(|node| match node.node_type {
                PathNodeType::Element => node.qname.name.clone(),
                PathNodeType::Attribute => format!("@{}", node.qname.name),
            })
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Build a path from `a/b/c`
///
/// Every segment but the last is an element in `namespace`; the last
/// segment is an attribute with no namespace.
pub fn make_attribute_path_from_string(namespace: &str, path: &str) -> AttributePath {
    let mut attribute_path = AttributePath::new();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for (index, segment) in segments.iter().enumerate().rev() {
        if index == segments.len() - 1 {
            attribute_path.push_front(*segment, "", false);
        } else {
            attribute_path.push_front(*segment, namespace, true);
        }
    }

    attribute_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn path_from_string_nests_elements_then_attribute() {
        let mut path = make_attribute_path_from_string("ns", "a/b/c");
        assert_eq!(path.len(), 3);

        let a = path.pop_front().unwrap();
        assert_eq!(a.qname, QualifiedName::new("a", "ns"));
        assert!(a.is_element());

        let b = path.pop_front().unwrap();
        assert_eq!(b.qname, QualifiedName::new("b", "ns"));
        assert!(b.is_element());

        let c = path.pop_front().unwrap();
        assert_eq!(c.qname, QualifiedName::new("c", ""));
        assert_eq!(c.node_type, PathNodeType::Attribute);

        assert!(path.pop_front().is_none());
    }

    #[test]
    fn clone_is_independent() {
        let path = make_attribute_path_from_string("ns", "Schema/EntityType/Name");
        let mut copy = path.clone();
        copy.pop_front();

        assert_eq!(path.len(), 3);
        assert_eq!(copy.len(), 2);
        assert_eq!(path.element_chain(), "Schema/EntityType");
        assert_eq!(path.to_string(), "Schema/EntityType/@Name");
    }

    #[test]
    fn single_segment_is_an_attribute() {
        let path = make_attribute_path_from_string("ns", "Name");
        assert_eq!(path.len(), 1);
        assert_eq!(path.attribute().map(|n| n.qname.name.as_str()), Some("Name"));
        assert_eq!(path.element_chain(), "");
    }
}
