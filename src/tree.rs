//! Phylogenetic tree representation.
//!
//! A [`Tree`] stores its nodes in an arena (`Vec<TreeNode>`) addressed by
//! [`NodeId`]. Each node keeps its ordered children and an optional parent
//! index, so there are no owning references between nodes.
//!
//! Node identifiers are assigned in pre-order while parsing: the root is `0`
//! and children are numbered left to right. They stay valid for the whole
//! lifetime of the tree.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::formats::newick::{self, NewickError};

/// Index of a node in a tree (arena).
pub type NodeId = usize;

/// A node of a [`Tree`].
///
/// A node without children is a tip; its label is the tip name. Labels of
/// internal nodes are kept verbatim (typically support values).
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    id: NodeId,
    label: Option<String>,
    branch_length: Option<f64>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl TreeNode {
    fn new(id: NodeId, parent: Option<NodeId>) -> Self {
        Self {
            id,
            label: None,
            branch_length: None,
            children: Vec::new(),
            parent,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn branch_length(&self) -> Option<f64> {
        self.branch_length
    }

    /// Children in input order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

// =#========================================================================#=
// TREE
// =#========================================================================#=
/// A rooted phylogenetic tree with arbitrary arity.
///
/// # Structure
/// - All nodes are stored in the arena, the root at index `0`
/// - Child order is input order and is preserved by every query
/// - Tip names are unique; a name-to-node index is kept for lookups
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    tip_index: HashMap<String, NodeId>,
}

// ============================================================================
// Construction (pub(crate), used by the Newick parser)
// ============================================================================
impl Tree {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            tip_index: HashMap::new(),
        }
    }

    /// Appends a node as last child of `parent` and returns its id.
    pub(crate) fn push_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::new(id, parent));
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    pub(crate) fn set_label(&mut self, id: NodeId, label: Option<String>) {
        self.nodes[id].label = label;
    }

    pub(crate) fn set_branch_length(&mut self, id: NodeId, branch_length: Option<f64>) {
        self.nodes[id].branch_length = branch_length;
    }

    /// Builds the tip index once all nodes are in place.
    ///
    /// Fails on a tip without label or on a repeated tip name.
    pub(crate) fn index_tips(mut self) -> std::result::Result<Self, NewickError> {
        let mut tip_index = HashMap::new();
        for node in self.nodes.iter().filter(|n| n.is_tip()) {
            let name = node.label.clone().ok_or(NewickError::MissingTipLabel(node.id))?;
            if tip_index.insert(name.clone(), node.id).is_some() {
                return Err(NewickError::DuplicateTip(name));
            }
        }
        self.tip_index = tip_index;
        Ok(self)
    }
}

// ============================================================================
// Accessors and queries (pub)
// ============================================================================
impl Tree {
    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_tips(&self) -> usize {
        self.tip_index.len()
    }

    /// Returns the node with the given id, if any.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    fn checked_node(&self, id: NodeId) -> Result<&TreeNode> {
        self.node(id).ok_or(Error::UnknownNode(id))
    }

    /// Returns the id of the tip with the given name, if any.
    pub fn find_tip(&self, name: &str) -> Option<NodeId> {
        self.tip_index.get(name).copied()
    }

    pub fn contains_tip(&self, name: &str) -> bool {
        self.tip_index.contains_key(name)
    }

    /// All tip names in left-to-right (input) order.
    pub fn tips_of(&self) -> Vec<&str> {
        self.tip_names_below(self.root())
    }

    /// Tip names of the subtree rooted at `id`, left to right.
    ///
    /// A tip yields a single-element list.
    pub fn subtree_tips(&self, id: NodeId) -> Result<Vec<&str>> {
        self.checked_node(id)?;
        Ok(self.tip_names_below(id))
    }

    /// Node ids of the subtree rooted at `id`, in pre-order.
    pub fn preorder(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.checked_node(id)?;
        Ok(self.preorder_unchecked(id))
    }

    fn preorder_unchecked(&self, id: NodeId) -> Vec<NodeId> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        order
    }

    fn tip_names_below(&self, id: NodeId) -> Vec<&str> {
        self.preorder_unchecked(id)
            .into_iter()
            .filter_map(|n| {
                let node = &self.nodes[n];
                if node.is_tip() { node.label() } else { None }
            })
            .collect()
    }

    /// Serializes the subtree rooted at `id` as a Newick string.
    ///
    /// Labels and branch lengths are written as stored. Each name in
    /// `extra_tips` that is not already part of the subtree is attached, in
    /// order, as an additional child of a new unlabeled root whose first
    /// child is the subtree itself. Repeated extra names are written once.
    ///
    /// # Errors
    /// [`Error::UnknownNode`] for an unknown id, [`Error::UnknownTip`] for an
    /// extra name that is not a tip of this tree.
    pub fn induced_subtree_newick<S: AsRef<str>>(&self, id: NodeId, extra_tips: &[S]) -> Result<String> {
        self.checked_node(id)?;

        let in_subtree: HashSet<&str> = self.tip_names_below(id).into_iter().collect();
        let mut seen = HashSet::new();
        let mut extra_ids = Vec::new();
        for name in extra_tips {
            let name = name.as_ref();
            let tip = self.find_tip(name).ok_or_else(|| Error::UnknownTip(name.to_string()))?;
            if !in_subtree.contains(name) && seen.insert(tip) {
                extra_ids.push(tip);
            }
        }

        Ok(newick::to_newick(self, id, &extra_ids))
    }

    /// Nested view of the subtree rooted at `id`, for serialization.
    ///
    /// `species_of` attaches a species identifier to tips. The view is built
    /// bottom-up from the reversed pre-order, so depth is not limited by the
    /// call stack.
    pub fn view<F>(&self, id: NodeId, species_of: &F) -> Result<TreeView<'_>>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.checked_node(id)?;

        // Finished subtrees; the first child of a node is always on top
        let mut done: Vec<TreeView<'_>> = Vec::new();
        for current in self.preorder_unchecked(id).into_iter().rev() {
            let node = &self.nodes[current];
            let species = if node.is_tip() {
                node.label().and_then(species_of)
            } else {
                None
            };
            let children = (0..node.children.len()).filter_map(|_| done.pop()).collect();
            done.push(TreeView {
                id: current,
                label: node.label(),
                branch_length: node.branch_length,
                species,
                children,
            });
        }
        done.pop().ok_or(Error::UnknownNode(id))
    }
}

impl std::ops::Index<NodeId> for Tree {
    type Output = TreeNode;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

/// Serializable nested representation of a (sub)tree.
#[derive(Debug, PartialEq, Serialize)]
pub struct TreeView<'a> {
    pub id: NodeId,
    pub label: Option<&'a str>,
    pub branch_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub children: Vec<TreeView<'a>>,
}

impl Drop for TreeView<'_> {
    fn drop(&mut self) {
        // Flatten before dropping so deep views do not recurse
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::newick::parse_newick;

    const SMALL_TREE: &str = "((tipA:0.1,tipB:0.2)90:0.3,tipC:0.4);";

    #[test]
    fn test_preorder_ids() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        assert_eq!(tree.num_nodes(), 5);
        assert_eq!(tree.root(), 0);

        let root = &tree[0];
        assert_eq!(root.children(), &[1, 4]);
        assert_eq!(tree[1].label(), Some("90"));
        assert_eq!(tree[1].children(), &[2, 3]);
        assert_eq!(tree[2].label(), Some("tipA"));
        assert_eq!(tree[2].parent(), Some(1));
        assert_eq!(tree[4].branch_length(), Some(0.4));
        assert!(tree[4].is_tip());
    }

    #[test]
    fn test_tips_of() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        assert_eq!(tree.tips_of(), vec!["tipA", "tipB", "tipC"]);
        assert_eq!(tree.num_tips(), 3);
    }

    #[test]
    fn test_subtree_tips() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        assert_eq!(tree.subtree_tips(tree.root()).unwrap(), tree.tips_of());
        assert_eq!(tree.subtree_tips(1).unwrap(), vec!["tipA", "tipB"]);
        assert_eq!(tree.subtree_tips(4).unwrap(), vec!["tipC"]);
        assert!(matches!(tree.subtree_tips(99), Err(Error::UnknownNode(99))));
    }

    #[test]
    fn test_child_order_preserved() {
        let tree = parse_newick("(z,(y,x),w);").unwrap();
        assert_eq!(tree.tips_of(), vec!["z", "y", "x", "w"]);
    }

    #[test]
    fn test_find_tip() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        assert_eq!(tree.find_tip("tipB"), Some(3));
        assert_eq!(tree.find_tip("90"), None);
    }

    #[test]
    fn test_induced_subtree_newick_plain() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let newick = tree.induced_subtree_newick::<&str>(1, &[]).unwrap();
        assert_eq!(newick, "(tipA:0.1,tipB:0.2)90:0.3;");

        let full = tree.induced_subtree_newick::<&str>(0, &[]).unwrap();
        assert_eq!(full, SMALL_TREE);
    }

    #[test]
    fn test_induced_subtree_round_trip() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let newick = tree.induced_subtree_newick::<&str>(1, &[]).unwrap();
        let reparsed = parse_newick(&newick).unwrap();

        assert_eq!(reparsed.tips_of(), tree.subtree_tips(1).unwrap());
        for name in reparsed.tips_of() {
            let original = &tree[tree.find_tip(name).unwrap()];
            let copy = &reparsed[reparsed.find_tip(name).unwrap()];
            assert_eq!(original.branch_length(), copy.branch_length());
            assert_eq!(original.label(), copy.label());
        }
    }

    #[test]
    fn test_induced_subtree_with_extra_tips() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let newick = tree.induced_subtree_newick(1, &["tipC", "tipA", "tipC"]).unwrap();
        assert_eq!(newick, "((tipA:0.1,tipB:0.2)90:0.3,tipC:0.4);");

        let reparsed = parse_newick(&newick).unwrap();
        assert_eq!(reparsed.tips_of(), vec!["tipA", "tipB", "tipC"]);
    }

    #[test]
    fn test_induced_subtree_of_tip_with_extra() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let newick = tree.induced_subtree_newick(2, &["tipB"]).unwrap();
        assert_eq!(newick, "(tipA:0.1,tipB:0.2);");
    }

    #[test]
    fn test_induced_subtree_unknown_extra() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let result = tree.induced_subtree_newick(1, &["nope"]);
        assert!(matches!(result, Err(Error::UnknownTip(name)) if name == "nope"));
    }

    #[test]
    fn test_view() {
        let tree = parse_newick(SMALL_TREE).unwrap();
        let view = tree
            .view(tree.root(), &|name: &str| (name == "tipC").then(|| "speciesB".to_string()))
            .unwrap();
        assert_eq!(view.id, 0);
        assert_eq!(view.children.len(), 2);
        assert_eq!(view.children[0].label, Some("90"));
        assert_eq!(view.children[0].species, None);
        assert_eq!(view.children[1].species.as_deref(), Some("speciesB"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["children"][0]["children"][1]["label"], "tipB");
        assert_eq!(json["children"][0]["branch_length"], 0.3);
    }

    fn caterpillar(depth: usize) -> String {
        let mut newick = "(".repeat(depth);
        newick.push_str("t0");
        for i in 1..=depth {
            newick.push_str(&format!(",t{})", i));
        }
        newick.push(';');
        newick
    }

    #[test]
    fn test_deep_tree_queries() {
        let depth = 20_000;
        let input = caterpillar(depth);
        let tree = parse_newick(&input).unwrap();

        assert_eq!(tree.induced_subtree_newick::<&str>(tree.root(), &[]).unwrap(), input);
        assert_eq!(tree.subtree_tips(tree.root()).unwrap().len(), depth + 1);

        let view = tree.view(tree.root(), &|_: &str| None).unwrap();
        let mut levels = 0;
        let mut current = &view;
        while let Some(first) = current.children.first() {
            assert_eq!(current.children.len(), 2);
            current = first;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(current.label, Some("t0"));
    }
}
