//! The in-memory project tree.
//!
//! Nodes live in an arena owned by [`Tree`] and refer to each other by
//! [`NodeId`]. Children are owned strictly (each node has one parent,
//! never reparented); parent and owner links are plain ids used for
//! navigation only.
//!
//! A project parse task builds a private `Tree` rooted at a Project node;
//! the importer then [`graft`](Tree::graft)s it under the Solution root.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::ConfigurationSet;
use crate::error::TreeError;

// ═══════════════════════════════════════════════════════════════════════════════
//  Node types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Flavour of a build-output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Executable,
    Library,
    Generic,
}

/// Root-level data of a solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionData {
    /// Solution-level configuration names (`"Debug|Win32"`), manifest order.
    pub configurations: Vec<String>,
    /// solution configuration → project identifier → project configuration.
    pub bindings: HashMap<String, HashMap<String, String>>,
    pub current_configuration: Option<String>,
}

impl SolutionData {
    pub fn add_configuration(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.configurations.contains(&name) {
            self.configurations.push(name);
        }
    }

    /// Bind `project`'s configuration `project_cfg` to solution
    /// configuration `solution_cfg`.
    pub fn add_project_config(
        &mut self,
        solution_cfg: impl Into<String>,
        project: &str,
        project_cfg: impl Into<String>,
    ) {
        self.bindings
            .entry(solution_cfg.into())
            .or_default()
            .insert(normalize_uuid(project), project_cfg.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectData {
    /// Opaque identifier (`{GUID}`), `None` when unknown.
    pub uuid: Option<String>,
    pub configurations: ConfigurationSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Solution(SolutionData),
    Project(ProjectData),
    Filter,
    File,
    Target(TargetKind),
}

impl NodeKind {
    /// Whether this node defines a macro context (Solution or Project).
    fn is_context(&self) -> bool {
        matches!(self, Self::Solution(_) | Self::Project(_))
    }

    /// Default sibling rank: folders first, then targets, then files.
    fn rank(&self) -> u8 {
        match self {
            Self::Solution(_) | Self::Project(_) | Self::Filter => 0,
            Self::Target(_) => 1,
            Self::File => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Absent for synthetic nodes such as filters and targets.
    pub path: Option<PathBuf>,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    /// Nearest enclosing Solution/Project, `None` for the root.
    owner: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.kind, NodeKind::Filter)
    }

    pub fn as_project(&self) -> Option<&ProjectData> {
        match &self.kind {
            NodeKind::Project(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_solution(&self) -> Option<&SolutionData> {
        match &self.kind {
            NodeKind::Solution(s) => Some(s),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tree
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// A tree whose root is a Solution for the manifest at `path`.
    pub fn solution(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::with_root(file_stem(&path), Some(path), NodeKind::Solution(SolutionData::default()))
    }

    /// A tree whose root is a Project for the project file at `path`.
    /// The display name starts as the file stem.
    pub fn project(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::with_root(file_stem(&path), Some(path), NodeKind::Project(ProjectData::default()))
    }

    fn with_root(name: String, path: Option<PathBuf>, kind: NodeKind) -> Self {
        Self {
            nodes: vec![Node { name, path, kind, parent: None, owner: None, children: Vec::new() }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    // ─── Construction ────────────────────────────────────────────────────

    /// Append a child under `parent`, preserving discovery order.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        path: Option<PathBuf>,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let owner = Some(self.context_of(parent));
        self.nodes.push(Node {
            name: name.into(),
            path,
            kind,
            parent: Some(parent),
            owner,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_filter(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.add_child(parent, name, None, NodeKind::Filter)
    }

    /// Add a File node named after the last component of `path`.
    pub fn add_file(&mut self, parent: NodeId, path: impl Into<PathBuf>) -> NodeId {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.add_child(parent, name, Some(path), NodeKind::File)
    }

    pub fn add_target(&mut self, parent: NodeId, name: impl Into<String>, kind: TargetKind) -> NodeId {
        self.add_child(parent, name, None, NodeKind::Target(kind))
    }

    /// Move every node of `other` into this tree below `parent`.
    ///
    /// Ids of `other` are remapped; the grafted root keeps its order among
    /// `parent`'s existing children (appended last). Returns the new id of
    /// `other`'s root.
    pub fn graft(&mut self, parent: NodeId, other: Tree) -> NodeId {
        let offset = self.nodes.len();
        let shift = |id: NodeId| NodeId(id.0 + offset);
        let parent_context = self.context_of(parent);

        for mut node in other.nodes {
            node.children = node.children.into_iter().map(shift).collect();
            node.owner = Some(node.owner.map_or(parent_context, shift));
            node.parent = Some(node.parent.map_or(parent, shift));
            self.nodes.push(node);
        }

        let root = NodeId(offset);
        self.nodes[parent.0].children.push(root);
        debug!(node = self.nodes[offset].name.as_str(); "Attached subtree");
        root
    }

    /// Id of the Solution/Project that `id` resolves macros against when
    /// it is used as a parent.
    fn context_of(&self, id: NodeId) -> NodeId {
        let node = &self.nodes[id.0];
        if node.kind.is_context() {
            id
        } else {
            node.owner.unwrap_or(id)
        }
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Rename a node. Filters are immutable once created and always refuse.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), TreeError> {
        let node = &mut self.nodes[id.0];
        if node.is_filter() {
            return Err(TreeError::RenameRefused);
        }
        node.name = name.into();
        Ok(())
    }

    pub fn project_data(&self, id: NodeId) -> Option<&ProjectData> {
        self.nodes.get(id.0).and_then(Node::as_project)
    }

    pub fn project_data_mut(&mut self, id: NodeId) -> Option<&mut ProjectData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Project(p)) => Some(p),
            _ => None,
        }
    }

    pub fn solution_data(&self) -> Option<&SolutionData> {
        self.nodes.first().and_then(Node::as_solution)
    }

    pub fn solution_data_mut(&mut self) -> Option<&mut SolutionData> {
        match self.nodes.first_mut().map(|n| &mut n.kind) {
            Some(NodeKind::Solution(s)) => Some(s),
            _ => None,
        }
    }

    /// Select `key` as the current configuration of project `id`.
    pub fn set_current_configuration(&mut self, id: NodeId, key: &str) -> Result<bool, TreeError> {
        let project = self.project_data_mut(id).ok_or(TreeError::NotAProject)?;
        Ok(project.configurations.set_current(key))
    }

    /// Apply the solution's binding table for `name` to its projects.
    ///
    /// Returns `false` when `name` is not a known solution configuration.
    pub fn set_solution_configuration(&mut self, name: &str) -> bool {
        let Some(solution) = self.solution_data() else {
            return false;
        };
        if !solution.configurations.iter().any(|c| c == name) && !solution.bindings.contains_key(name) {
            return false;
        }

        let bindings: Vec<(String, String)> = solution
            .bindings
            .get(name)
            .map(|b| b.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        for (uuid, project_cfg) in bindings {
            let Some(project) = self.find_project_by_uuid(&uuid) else {
                continue;
            };
            if let Ok(false) = self.set_current_configuration(project, &project_cfg) {
                debug!(project = uuid.as_str(), config = project_cfg.as_str(); "Bound configuration not found");
            }
        }

        if let Some(solution) = self.solution_data_mut() {
            solution.current_configuration = Some(name.to_string());
        }
        true
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// First node below `from` matching `pred`.
    ///
    /// At every level the direct children are checked before descending
    /// into them, in child order. `from` itself is not tested.
    pub fn find(&self, from: NodeId, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.find_with(from, &pred)
    }

    fn find_with(&self, from: NodeId, pred: &dyn Fn(&Node) -> bool) -> Option<NodeId> {
        let children = &self.nodes[from.0].children;
        if let Some(hit) = children.iter().copied().find(|c| pred(&self.nodes[c.0])) {
            return Some(hit);
        }
        children.iter().find_map(|&c| self.find_with(c, pred))
    }

    /// `id` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |&n| self.nodes[n.0].parent)
    }

    /// The nearest Project at or above `id`.
    pub fn nearest_project(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&n| matches!(self.nodes[n.0].kind, NodeKind::Project(_)))
    }

    /// Direct Project children of the root.
    pub fn projects(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children(self.root())
            .iter()
            .copied()
            .filter(|&c| matches!(self.nodes[c.0].kind, NodeKind::Project(_)))
    }

    /// Project among the root's children whose identifier matches `uuid`.
    /// Braces and letter case are ignored.
    pub fn find_project_by_uuid(&self, uuid: &str) -> Option<NodeId> {
        let wanted = normalize_uuid(uuid);
        self.projects().find(|&p| {
            self.nodes[p.0]
                .as_project()
                .and_then(|d| d.uuid.as_deref())
                .is_some_and(|u| normalize_uuid(u) == wanted)
        })
    }

    // ─── Ordering ────────────────────────────────────────────────────────

    /// Ordering of two siblings as presented to a consumer.
    ///
    /// Filters (and Projects under a Solution) sort among themselves by
    /// name; any other pair uses the default node ordering: rank
    /// (folders, targets, files) then name.
    pub fn compare_siblings(&self, a: NodeId, b: NodeId) -> Ordering {
        let (na, nb) = (&self.nodes[a.0], &self.nodes[b.0]);
        match (&na.kind, &nb.kind) {
            (NodeKind::Filter, NodeKind::Filter) | (NodeKind::Project(_), NodeKind::Project(_)) => {
                na.name.cmp(&nb.name)
            }
            _ => na
                .kind
                .rank()
                .cmp(&nb.kind.rank())
                .then_with(|| na.name.cmp(&nb.name)),
        }
    }

    /// Children of `id` in presentation order. Storage order is untouched.
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = self.children(id).to_vec();
        children.sort_by(|&a, &b| self.compare_siblings(a, b));
        children
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical form of a project identifier: no braces, upper case.
pub(crate) fn normalize_uuid(uuid: &str) -> String {
    uuid.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_ascii_uppercase()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    fn sample_project() -> Tree {
        let mut tree = Tree::project("/src/app/app.vcproj");
        let root = tree.root();
        let sources = tree.add_filter(root, "Source Files");
        tree.add_file(sources, "/src/app/main.cpp");
        let nested = tree.add_filter(sources, "Detail");
        tree.add_file(nested, "/src/app/detail/impl.cpp");
        let headers = tree.add_filter(root, "Header Files");
        tree.add_file(headers, "/src/app/main.h");
        tree.add_target(root, "app", TargetKind::Executable);
        tree
    }

    #[test]
    fn root_name_is_file_stem() {
        let tree = Tree::project("/src/app/app.vcproj");
        assert_eq!(tree.node(tree.root()).name, "app");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn children_keep_discovery_order() {
        let tree = sample_project();
        let names: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|&c| tree.node(c).name.as_str())
            .collect();
        assert_eq!(names, ["Source Files", "Header Files", "app"]);
    }

    #[test]
    fn find_checks_children_before_descending() {
        let tree = sample_project();
        // "main.h" is a grandchild via the second filter, "impl.cpp" is a
        // great-grandchild via the first one; both are files.
        let first_file = tree.find(tree.root(), |n| matches!(n.kind, NodeKind::File)).unwrap();
        assert_eq!(tree.node(first_file).name, "main.cpp");

        let detail = tree.find(tree.root(), |n| n.name == "Detail").unwrap();
        assert!(tree.node(detail).is_filter());

        assert!(tree.find(tree.root(), |n| n.name == "missing").is_none());
    }

    #[test]
    fn find_prefers_shallow_match_in_first_subtree() {
        let mut tree = Tree::project("/p/p.vcxproj");
        let root = tree.root();
        let a = tree.add_filter(root, "A");
        let deep = tree.add_filter(a, "X");
        let b = tree.add_filter(root, "B");
        tree.add_filter(b, "X");
        assert_eq!(tree.find(root, |n| n.name == "X"), Some(deep));
    }

    #[test]
    fn filters_refuse_rename() {
        let mut tree = sample_project();
        let filter = tree.find(tree.root(), |n| n.is_filter()).unwrap();
        assert_eq!(tree.rename(filter, "Other"), Err(TreeError::RenameRefused));
        assert_eq!(tree.node(filter).name, "Source Files");

        let root = tree.root();
        assert!(tree.rename(root, "Renamed").is_ok());
        assert_eq!(tree.node(root).name, "Renamed");
    }

    #[test]
    fn owner_points_at_nearest_context() {
        let tree = sample_project();
        let file = tree.find(tree.root(), |n| n.name == "impl.cpp").unwrap();
        assert_eq!(tree.node(file).owner(), Some(tree.root()));
        assert_eq!(tree.nearest_project(file), Some(tree.root()));
        assert_eq!(tree.ancestors(file).count(), 4);
    }

    #[test]
    fn graft_remaps_ids_and_links() {
        let mut solution = Tree::solution("/src/all.sln");
        let sol_root = solution.root();
        let project = sample_project();
        let project_len = project.len();

        let grafted = solution.graft(sol_root, project);
        assert_eq!(solution.len(), 1 + project_len);
        assert_eq!(solution.children(sol_root), [grafted]);
        assert_eq!(solution.parent(grafted), Some(sol_root));
        assert_eq!(solution.node(grafted).owner(), Some(sol_root));

        let file = solution.find(sol_root, |n| n.name == "impl.cpp").unwrap();
        assert_eq!(solution.nearest_project(file), Some(grafted));
        assert_eq!(solution.node(file).owner(), Some(grafted));
        assert_eq!(solution.ancestors(file).last(), Some(sol_root));
    }

    #[test]
    fn sibling_order_sorts_filters_by_name_before_files() {
        let mut tree = Tree::project("/p/p.vcproj");
        let root = tree.root();
        tree.add_file(root, "/p/a.cpp");
        tree.add_filter(root, "Zeta");
        tree.add_target(root, "p", TargetKind::Library);
        tree.add_filter(root, "Alpha");

        let names: Vec<_> = tree
            .sorted_children(root)
            .into_iter()
            .map(|c| tree.node(c).name.clone())
            .collect();
        assert_eq!(names, ["Alpha", "Zeta", "p", "a.cpp"]);
    }

    #[test]
    fn solution_configuration_applies_bindings() {
        let mut solution = Tree::solution("/s/s.sln");
        let root = solution.root();

        let mut project = Tree::project("/s/core.vcproj");
        let project_root = project.root();
        {
            let data = project.project_data_mut(project_root).unwrap();
            data.uuid = Some("{ab12-cd}".into());
            data.configurations.add(Configuration::new("Debug", "Win32"));
            data.configurations.add(Configuration::new("Release", "Win32"));
        }
        let core = solution.graft(root, project);

        {
            let data = solution.solution_data_mut().unwrap();
            data.add_configuration("Ship|Win32");
            data.add_project_config("Ship|Win32", "{AB12-CD}", "Release|Win32");
        }

        assert_eq!(solution.find_project_by_uuid("ab12-cd"), Some(core));
        assert!(!solution.set_solution_configuration("Nope|Win32"));
        assert!(solution.set_solution_configuration("Ship|Win32"));
        assert_eq!(
            solution.project_data(core).unwrap().configurations.current_key(),
            Some("Release|Win32")
        );
        assert_eq!(
            solution.solution_data().unwrap().current_configuration.as_deref(),
            Some("Ship|Win32")
        );
    }

    #[test]
    fn unknown_bound_configuration_keeps_current() {
        let mut solution = Tree::solution("/s/s.sln");
        let root = solution.root();

        let mut project = Tree::project("/s/core.vcxproj");
        let project_root = project.root();
        {
            let data = project.project_data_mut(project_root).unwrap();
            data.uuid = Some("{0001}".into());
            data.configurations.add(Configuration::new("Debug", "Win32"));
        }
        let core = solution.graft(root, project);
        {
            let data = solution.solution_data_mut().unwrap();
            data.add_configuration("Release|Win32");
            data.add_project_config("Release|Win32", "{0001}", "Release|ARM");
            data.add_project_config("Release|Win32", "{FFFF}", "Release|Win32");
        }

        assert!(solution.set_solution_configuration("Release|Win32"));
        assert_eq!(
            solution.project_data(core).unwrap().configurations.current_key(),
            Some("Debug|Win32")
        );
    }

    #[test]
    fn set_current_configuration_requires_project() {
        let mut tree = sample_project();
        let filter = tree.find(tree.root(), |n| n.is_filter()).unwrap();
        assert_eq!(tree.set_current_configuration(filter, "Debug|Win32"), Err(TreeError::NotAProject));
        assert_eq!(tree.set_current_configuration(tree.root(), "Debug|Win32"), Ok(false));
    }
}
