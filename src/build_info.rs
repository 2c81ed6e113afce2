//! Build information read off an imported tree: include paths, defines and
//! the location of built artifacts.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::project::resolve_relative;
use crate::services::{MSVC_INCLUDE_PATH, SettingsStore, WINSDK_INCLUDE_PATH};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::variables::Resolver;

/// Include directories in effect for `node`.
///
/// The toolchain and SDK include paths stored in `settings` (scoped by the
/// tree's root name) come first, then the nearest project's current include
/// directories, macro-expanded and resolved against the project directory.
pub fn include_directories(tree: &Tree, node: NodeId, settings: &dyn SettingsStore) -> Vec<PathBuf> {
    let scope = &tree.node(tree.root()).name;
    let mut result: Vec<PathBuf> = [MSVC_INCLUDE_PATH, WINSDK_INCLUDE_PATH]
        .into_iter()
        .filter_map(|key| settings.get(scope, key))
        .filter(|path| !path.trim().is_empty())
        .map(|path| PathBuf::from(path.trim().replace('\\', "/")))
        .collect();

    let Some(project) = tree.nearest_project(node) else {
        return result;
    };
    let Some(data) = tree.project_data(project) else {
        return result;
    };
    let dir = project_dir(tree, project);
    let resolver = Resolver::new(tree);

    for raw in &data.configurations.current().include_directories {
        let expanded = resolver.expand(raw, project);
        if expanded.trim().is_empty() {
            continue;
        }
        result.push(to_path(dir, &expanded));
    }
    result
}

/// Preprocessor definitions of the nearest project's current configuration.
pub fn preprocessor_defines(tree: &Tree, node: NodeId) -> IndexMap<String, String> {
    tree.nearest_project(node)
        .and_then(|p| tree.project_data(p))
        .map(|data| data.configurations.current().preprocessor_defines.clone())
        .unwrap_or_default()
}

impl Tree {
    /// Where the Target `target` is written by its project's current
    /// configuration. `None` for non-target nodes or an empty `TargetPath`.
    pub fn built_artifact(&self, target: NodeId) -> Option<PathBuf> {
        if !matches!(self.node(target).kind, NodeKind::Target(_)) {
            return None;
        }
        let project = self.nearest_project(target)?;
        let path = Resolver::new(self).lookup("TargetPath", Some(project));
        if path.is_empty() {
            return None;
        }
        Some(to_path(project_dir(self, project), &path))
    }
}

fn project_dir(tree: &Tree, project: NodeId) -> &Path {
    tree.node(project)
        .path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new(""))
}

/// Normalize separators; relative paths are anchored at `dir`.
fn to_path(dir: &Path, value: &str) -> PathBuf {
    let normalized = value.trim().replace('\\', "/");
    if is_absolute(&normalized) {
        PathBuf::from(normalized)
    } else {
        resolve_relative(dir, &normalized)
    }
}

/// Rooted, or starting with a drive letter.
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/') || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ConfigurationType};
    use crate::services::MemorySettings;
    use crate::tree::TargetKind;

    /// Solution `/work/all.sln` > project `/work/core/core.vcproj` with a
    /// filter, a file and a target.
    fn sample(config: Configuration) -> (Tree, NodeId, NodeId, NodeId) {
        let mut project = Tree::project("/work/core/core.vcproj");
        let root = project.root();
        project.project_data_mut(root).unwrap().configurations.add(config);
        let filter = project.add_filter(root, "Source Files");
        project.add_file(filter, "/work/core/src/core.cpp");
        project.add_target(root, "core", TargetKind::Library);

        let mut tree = Tree::solution("/work/all.sln");
        let sol = tree.root();
        let core = tree.graft(sol, project);
        let file = tree.find(core, |n| n.name == "core.cpp").unwrap();
        let target = tree.find(core, |n| matches!(n.kind, NodeKind::Target(_))).unwrap();
        (tree, core, file, target)
    }

    fn core_config() -> Configuration {
        let mut config = Configuration::new("Release", "Win32");
        config.configuration_type = ConfigurationType::DynamicLibrary;
        config.output_directory = "$(SolutionDir)bin\\$(ConfigurationName)".into();
        config.add_include_directories("include;..\\shared;$(SolutionDir)third_party\\zlib;C:\\sdk\\inc;$(Nothing)");
        config.add_defines("NDEBUG;CORE_EXPORTS;VERSION=2");
        config
    }

    #[test]
    fn include_directories_walk_up_to_project() {
        let (tree, _, file, _) = sample(core_config());
        let settings = MemorySettings::new();
        settings.set("all", MSVC_INCLUDE_PATH, "C:\\VC\\include");
        settings.set("all", WINSDK_INCLUDE_PATH, "  ");

        let dirs = include_directories(&tree, file, &settings);
        assert_eq!(
            dirs,
            [
                PathBuf::from("C:/VC/include"),
                PathBuf::from("/work/core/include"),
                PathBuf::from("/work/shared"),
                PathBuf::from("/work/third_party/zlib"),
                PathBuf::from("C:/sdk/inc"),
            ]
        );
    }

    #[test]
    fn include_directories_without_project() {
        let tree = Tree::solution("/work/all.sln");
        let settings = MemorySettings::new();
        settings.set("all", WINSDK_INCLUDE_PATH, "/sdk/include");
        assert_eq!(
            include_directories(&tree, tree.root(), &settings),
            [PathBuf::from("/sdk/include")]
        );
    }

    #[test]
    fn defines_come_from_current_configuration() {
        let (tree, core, file, _) = sample(core_config());
        let defines = preprocessor_defines(&tree, file);
        assert_eq!(defines.keys().collect::<Vec<_>>(), ["NDEBUG", "CORE_EXPORTS", "VERSION"]);
        assert_eq!(defines["VERSION"], "2");
        assert_eq!(preprocessor_defines(&tree, core), defines);
        assert!(preprocessor_defines(&tree, tree.root()).is_empty());
    }

    #[test]
    fn built_artifact_uses_target_path() {
        let (tree, core, file, target) = sample(core_config());
        assert_eq!(
            tree.built_artifact(target),
            Some(PathBuf::from("/work/bin/Release/core.dll"))
        );
        assert_eq!(tree.built_artifact(file), None);
        assert_eq!(tree.built_artifact(core), None);
    }

    #[test]
    fn built_artifact_relative_to_project() {
        let mut config = Configuration::new("Debug", "Win32");
        config.configuration_type = ConfigurationType::Application;
        config.output_directory = "Debug".into();
        let (tree, _, _, target) = sample(config);
        assert_eq!(
            tree.built_artifact(target),
            Some(PathBuf::from("/work/core/Debug/core.exe"))
        );
    }

    #[test]
    fn empty_target_path_has_no_artifact() {
        let mut config = Configuration::new("Debug", "Win32");
        config.output_file = Some("$(TargetPath)".into());
        let (tree, _, _, target) = sample(config);
        assert_eq!(tree.built_artifact(target), None);
    }
}
