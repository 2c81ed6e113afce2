//! `$(Name)` macro expansion against the project tree.
//!
//! Lookup dispatches on the kind of the context node:
//!
//! - any node: `InputDir`, `InputPath`, `InputName`, `InputFileName`,
//!   `InputExt`, `ParentName`
//! - Project: `ProjectDir`, `ProjectPath`, `ProjectName`, `ProjectFileName`,
//!   `ProjectExt`, `ConfigurationName` (`Configuration`), `PlatformName`
//!   (`Platform`), `OutDir`,
//!   `TargetDir`, `TargetPath`, `TargetName`, `TargetFileName`, `TargetExt`
//! - Solution: `SolutionDir`, `SolutionPath`, `SolutionName`,
//!   `SolutionFileName`, `SolutionExt`, `ProjectFileName`
//!
//! Anything else is delegated to the parent node, up to the root, where it
//! expands to the empty string.
//!
//! # Example
//! ```
//! use vcproj_rs::tree::Tree;
//! use vcproj_rs::variables::resolve;
//!
//! let tree = Tree::solution("/work/all.sln");
//! assert_eq!(resolve(&tree, "$(SolutionName).log", tree.root()), "all.log");
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;

use crate::config::Configuration;
use crate::tree::{NodeId, NodeKind, ProjectData, Tree};

/// Separator appended to directory macros.
const DIR_SEPARATOR: char = '\\';

/// Expand every `$(Name)` token of `template` against `node`.
pub fn resolve(tree: &Tree, template: &str, node: NodeId) -> String {
    Resolver::new(tree).expand(template, node)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Token scanning
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace each `$(Identifier)` token in a single left-to-right pass.
///
/// Replacement text is not rescanned. A `$(` that does not open a
/// well-formed alphanumeric token is copied through unchanged.
pub(crate) fn expand_tokens(template: &str, mut lookup: impl FnMut(&str) -> String) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("$(") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());

        if len > 0 && after[len..].starts_with(')') {
            result.push_str(&lookup(&after[..len]));
            rest = &after[len + 1..];
        } else {
            result.push_str("$(");
            rest = after;
        }
    }

    result.push_str(rest);
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Properties whose evaluation can loop back onto themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Guarded {
    OutDir,
    TargetDir,
    TargetPath,
    TargetName,
    TargetFileName,
    TargetExt,
}

/// Macro resolver bound to one tree.
///
/// Keeps the set of `(node, property)` pairs currently being evaluated; a
/// nested request for a pair already in the set yields `""`.
pub struct Resolver<'t> {
    tree: &'t Tree,
    active: RefCell<HashSet<(NodeId, Guarded)>>,
}

/// Removes its entry from the active set when dropped.
struct ActiveGuard<'a> {
    active: &'a RefCell<HashSet<(NodeId, Guarded)>>,
    key: (NodeId, Guarded),
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.borrow_mut().remove(&self.key);
    }
}

impl<'t> Resolver<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self { tree, active: RefCell::new(HashSet::new()) }
    }

    /// Expand all tokens of `template` in one pass.
    pub fn expand(&self, template: &str, node: NodeId) -> String {
        expand_tokens(template, |key| self.lookup(key, Some(node)))
    }

    /// Expand each string of a list.
    pub fn expand_all<S: AsRef<str>>(&self, templates: &[S], node: NodeId) -> Vec<String> {
        templates
            .iter()
            .map(|t| self.expand(t.as_ref(), node))
            .collect()
    }

    /// Value of a single macro in the context of `node`.
    pub fn lookup(&self, key: &str, node: Option<NodeId>) -> String {
        let Some(id) = node else {
            return String::new();
        };
        match &self.tree.node(id).kind {
            NodeKind::Project(project) => self.visit_project(key, id, project),
            NodeKind::Solution(_) => self.visit_solution(key, id),
            _ => self.visit_generic(key, id),
        }
    }

    fn guarded(&self, id: NodeId, property: Guarded, f: impl FnOnce() -> String) -> String {
        let key = (id, property);
        if !self.active.borrow_mut().insert(key) {
            return String::new();
        }
        let _guard = ActiveGuard { active: &self.active, key };
        f()
    }

    // ─── Generic ─────────────────────────────────────────────────────────

    fn visit_generic(&self, key: &str, id: NodeId) -> String {
        let node = self.tree.node(id);
        let path = node.path.as_deref();

        match key {
            "InputDir" => path
                .and_then(Path::parent)
                .map(|dir| format!("{}{DIR_SEPARATOR}", dir.display()))
                .unwrap_or_default(),
            "InputPath" => path.map(|p| p.display().to_string()).unwrap_or_default(),
            "InputName" => path
                .and_then(Path::file_stem)
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| node.name.clone()),
            "InputFileName" => path
                .and_then(Path::file_name)
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "InputExt" => path
                .and_then(Path::extension)
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            "ParentName" => node
                .parent()
                .map(|p| self.tree.node(p).name.clone())
                .unwrap_or_default(),
            _ => self.lookup(key, node.parent()),
        }
    }

    // ─── Project ─────────────────────────────────────────────────────────

    fn visit_project(&self, key: &str, id: NodeId, project: &ProjectData) -> String {
        let config = project.configurations.current();

        match key {
            "ProjectDir" => self.visit_generic("InputDir", id),
            "ProjectPath" => self.visit_generic("InputPath", id),
            "ProjectName" => self.tree.node(id).name.clone(),
            "ProjectFileName" => self.visit_generic("InputFileName", id),
            "ProjectExt" => self.visit_generic("InputExt", id),
            "ConfigurationName" | "Configuration" => config.name.clone(),
            "PlatformName" | "Platform" => config.architecture.clone(),
            "OutDir" => self.guarded(id, Guarded::OutDir, || self.expand(&config.output_directory, id)),
            "TargetDir" => self.guarded(id, Guarded::TargetDir, || self.target_dir(id, &config)),
            "TargetPath" => self.guarded(id, Guarded::TargetPath, || {
                let file = self.output_file(id, &config);
                if file.contains(['\\', '/']) {
                    file
                } else {
                    self.target_dir(id, &config) + &file
                }
            }),
            "TargetFileName" => self.guarded(id, Guarded::TargetFileName, || {
                file_name(&self.output_file(id, &config)).to_string()
            }),
            "TargetName" => self.guarded(id, Guarded::TargetName, || match &config.target_name {
                Some(name) => self.expand(name, id),
                None => split_extension(file_name(&self.output_file(id, &config))).0.to_string(),
            }),
            "TargetExt" => self.guarded(id, Guarded::TargetExt, || match &config.target_ext {
                Some(ext) => self.expand(ext, id),
                None => split_extension(file_name(&self.output_file(id, &config))).1.to_string(),
            }),
            _ => self.visit_generic(key, id),
        }
    }

    /// Expanded output directory with a trailing separator, `""` when the
    /// directory is empty.
    fn target_dir(&self, id: NodeId, config: &Configuration) -> String {
        let mut dir = self.expand(&config.output_directory, id);
        if !dir.is_empty() && !dir.ends_with(['\\', '/']) {
            dir.push(DIR_SEPARATOR);
        }
        dir
    }

    fn output_file(&self, id: NodeId, config: &Configuration) -> String {
        self.expand(&config.output_file_template(), id)
    }

    // ─── Solution ────────────────────────────────────────────────────────

    fn visit_solution(&self, key: &str, id: NodeId) -> String {
        match key {
            "SolutionDir" => self.visit_generic("InputDir", id),
            "SolutionPath" => self.visit_generic("InputPath", id),
            "SolutionName" => self.visit_generic("InputName", id),
            "SolutionFileName" | "ProjectFileName" => self.visit_generic("InputFileName", id),
            "SolutionExt" => self.visit_generic("InputExt", id),
            _ => self.visit_generic(key, id),
        }
    }
}

/// Last path component, accepting both separators.
fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// `("name", ".ext")`; a leading dot alone is not an extension.
fn split_extension(file: &str) -> (&str, &str) {
    match file.rfind('.') {
        Some(dot) if dot > 0 => (&file[..dot], &file[dot..]),
        _ => (file, ""),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ConfigurationType};
    use crate::tree::TargetKind;

    /// Solution `/work/all.sln` with project `Foo` at `/work/foo/Foo.vcproj`.
    fn solution_with(config: Configuration) -> (Tree, NodeId) {
        let mut project = Tree::project("/work/foo/Foo.vcproj");
        let root = project.root();
        project
            .project_data_mut(root)
            .unwrap()
            .configurations
            .add(config);
        let filter = project.add_filter(root, "Sources");
        project.add_file(filter, "/work/foo/src/main.cpp");

        let mut tree = Tree::solution("/work/all.sln");
        let sol = tree.root();
        let foo = tree.graft(sol, project);
        (tree, foo)
    }

    fn dll_config(output_directory: &str) -> Configuration {
        let mut config = Configuration::new("Debug", "Win32");
        config.configuration_type = ConfigurationType::DynamicLibrary;
        config.output_directory = output_directory.into();
        config
    }

    #[test]
    fn scanner_replaces_tokens_in_one_pass() {
        let out = expand_tokens("a$(X)b$(Y)c", |k| format!("<{k}>"));
        assert_eq!(out, "a<X>b<Y>c");

        // Replacement text is not rescanned.
        let out = expand_tokens("$(X)", |_| "$(X)".into());
        assert_eq!(out, "$(X)");
    }

    #[test]
    fn scanner_keeps_malformed_tokens() {
        let out = expand_tokens("$(not closed $() $(a-b) $$(Z)", |_| "!".into());
        assert_eq!(out, "$(not closed $() $(a-b) $!");
    }

    #[test]
    fn default_dll_target_properties() {
        let (tree, foo) = solution_with(dll_config("bin"));
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(TargetFileName)", foo), "Foo.dll");
        assert_eq!(r.expand("$(TargetPath)", foo), "bin\\Foo.dll");
        assert_eq!(r.expand("$(TargetDir)", foo), "bin\\");
        assert_eq!(r.expand("$(TargetName)", foo), "Foo");
        assert_eq!(r.expand("$(TargetExt)", foo), ".dll");
        assert_eq!(r.expand("$(OutDir)", foo), "bin");
    }

    #[test]
    fn bare_file_name_template_is_joined_with_target_dir() {
        let mut config = dll_config("out\\$(ConfigurationName)");
        config.output_file = Some("$(ProjectName)_d.dll".into());
        let (tree, foo) = solution_with(config);

        assert_eq!(resolve(&tree, "$(TargetPath)", foo), "out\\Debug\\Foo_d.dll");
        assert_eq!(resolve(&tree, "$(TargetName)", foo), "Foo_d");
    }

    #[test]
    fn self_referential_target_path_terminates_empty() {
        let mut config = dll_config("");
        config.output_file = Some("$(TargetPath)".into());
        let (tree, foo) = solution_with(config);

        assert_eq!(resolve(&tree, "$(TargetPath)", foo), "");
        assert_eq!(resolve(&tree, "$(TargetFileName)", foo), "");
    }

    #[test]
    fn mutually_recursive_directories_terminate() {
        let config = dll_config("$(TargetDir)x");
        let (tree, foo) = solution_with(config);
        assert_eq!(resolve(&tree, "$(TargetDir)", foo), "x\\");

        let config = dll_config("$(OutDir)");
        let (tree, foo) = solution_with(config);
        assert_eq!(resolve(&tree, "$(TargetPath)", foo), "\\Foo.dll");
    }

    #[test]
    fn guards_are_released_between_lookups() {
        let (tree, foo) = solution_with(dll_config("bin"));
        let r = Resolver::new(&tree);
        assert_eq!(r.expand("$(TargetPath);$(TargetPath)", foo), "bin\\Foo.dll;bin\\Foo.dll");
        assert!(r.active.borrow().is_empty());
    }

    #[test]
    fn project_lookups_fall_back_to_solution() {
        let (tree, foo) = solution_with(dll_config("$(SolutionDir)bin"));
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(SolutionDir)", foo), "/work\\");
        assert_eq!(r.expand("$(TargetDir)", foo), "/work\\bin\\");
        assert_eq!(r.expand("$(SolutionName)", foo), "all");
        assert_eq!(r.expand("$(Unknown)", foo), "");
    }

    #[test]
    fn project_aliases_generic_properties() {
        let (tree, foo) = solution_with(dll_config("bin"));
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(ProjectDir)", foo), "/work/foo\\");
        assert_eq!(r.expand("$(ProjectPath)", foo), "/work/foo/Foo.vcproj");
        assert_eq!(r.expand("$(ProjectName)", foo), "Foo");
        assert_eq!(r.expand("$(ProjectFileName)", foo), "Foo.vcproj");
        assert_eq!(r.expand("$(ProjectExt)", foo), ".vcproj");
        assert_eq!(r.expand("$(ConfigurationName)|$(PlatformName)", foo), "Debug|Win32");
        assert_eq!(r.expand("$(Configuration)|$(Platform)", foo), "Debug|Win32");
    }

    #[test]
    fn out_dir_keeps_trailing_separator() {
        let (tree, foo) = solution_with(dll_config("$(SolutionDir)$(Configuration)\\"));
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(OutDir)", foo), "/work\\Debug\\");
        assert_eq!(r.expand("$(TargetDir)", foo), "/work\\Debug\\");
    }

    #[test]
    fn explicit_target_name_and_ext_feed_the_output_file() {
        let mut config = Configuration::new("Release", "x64");
        config.configuration_type = ConfigurationType::Application;
        config.output_directory = "$(SolutionDir)$(Platform)\\$(Configuration)\\".into();
        config.target_name = Some("$(ProjectName)64".into());
        config.target_ext = Some(".exe".into());
        let (tree, foo) = solution_with(config);
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(TargetPath)", foo), "/work\\x64\\Release\\Foo64.exe");
        assert_eq!(r.expand("$(TargetFileName)", foo), "Foo64.exe");
        assert_eq!(r.expand("$(TargetName)$(TargetExt)", foo), "Foo64.exe");
    }

    #[test]
    fn solution_properties() {
        let (tree, _) = solution_with(dll_config("bin"));
        let r = Resolver::new(&tree);
        let sol = tree.root();

        assert_eq!(r.expand("$(SolutionPath)", sol), "/work/all.sln");
        assert_eq!(r.expand("$(SolutionExt)", sol), ".sln");
        assert_eq!(r.expand("$(SolutionFileName)", sol), "all.sln");
        assert_eq!(r.expand("$(ProjectFileName)", sol), "all.sln");
        assert_eq!(r.expand("$(TargetPath)", sol), "");
    }

    #[test]
    fn file_context_walks_up_to_project() {
        let (tree, foo) = solution_with(dll_config("bin"));
        let file = tree.find(foo, |n| n.name == "main.cpp").unwrap();
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("$(InputName)$(InputExt)", file), "main.cpp");
        assert_eq!(r.expand("$(InputDir)", file), "/work/foo/src\\");
        assert_eq!(r.expand("$(ParentName)", file), "Sources");
        assert_eq!(r.expand("$(ProjectName) -> $(TargetFileName)", file), "Foo -> Foo.dll");
    }

    #[test]
    fn pathless_nodes_expand_input_macros_to_empty() {
        let mut tree = Tree::project("/p/p.vcproj");
        let root = tree.root();
        let target = tree.add_target(root, "p", TargetKind::Generic);
        let r = Resolver::new(&tree);

        assert_eq!(r.expand("[$(InputDir)$(InputPath)$(InputExt)]", target), "[]");
        assert_eq!(r.expand("$(InputName)", target), "p");
    }
}
