//! Modern project dialect (`.vcxproj`) plus its `.vcxproj.filters` layout.
//!
//! The primary file supplies the project identity and per-configuration
//! build settings. The source tree comes from the companion filters file;
//! when that file is missing the project simply has no children.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::condition;
use crate::config::Configuration;
use crate::error::{TreeError, VcprojError};
use crate::project::resolve_relative;
use crate::tree::{NodeId, Tree};

const ROOT_ELEMENT: &str = "Project";

/// Item elements of the filters file that become File nodes.
const FILE_ITEMS: [&str; 4] = ["ClInclude", "ClCompile", "ResourceCompile", "Text"];

/// `<path>.filters`
pub fn filters_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".filters");
    PathBuf::from(name)
}

/// Parse a `.vcxproj` and its companion filters file.
///
/// An unreadable project file is an I/O error, as for the legacy dialect.
/// Malformed settings or a bad filters file are logged and skipped.
pub fn parse_file(path: &Path, cancel: &CancellationToken) -> Result<Tree, VcprojError> {
    let source = std::fs::read_to_string(path).map_err(|e| VcprojError::io(path, e))?;
    let mut tree = Tree::project(path);
    let project = tree.root();

    if let Err(err) = read_settings(&mut tree, project, &source) {
        warn!(path = path.display().to_string(), err:err; "Skipping project settings");
    }

    cancel.check()?;

    let filters = filters_path(path);
    match std::fs::read_to_string(&filters) {
        Ok(source) => {
            let dir = path.parent().unwrap_or(Path::new(""));
            match read_filters(&mut tree, project, &source, dir, cancel) {
                Err(VcprojError::Canceled) => return Err(VcprojError::Canceled),
                Err(err) => {
                    warn!(path = filters.display().to_string(), err:err; "Skipping filters file");
                }
                Ok(()) => {}
            }
        }
        Err(err) => {
            debug!(path = filters.display().to_string(), err:err; "No filters file");
        }
    }

    debug!(project = tree.node(project).name.as_str(), nodes = tree.len(); "Parsed modern project");
    Ok(tree)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Primary file
// ═══════════════════════════════════════════════════════════════════════════════

fn is_element<'a>(name: &'a str) -> impl Fn(&roxmltree::Node) -> bool + 'a {
    move |n| n.is_element() && n.tag_name().name() == name
}

fn element_text<'a>(node: &roxmltree::Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("")
}

/// Read identity and configurations from the primary project XML.
pub fn read_settings(tree: &mut Tree, project: NodeId, source: &str) -> Result<(), VcprojError> {
    let doc = roxmltree::Document::parse(source)?;
    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(VcprojError::UnexpectedRoot {
            expected: ROOT_ELEMENT,
            found: root.tag_name().name().to_string(),
        });
    }

    let mut uuid = None;
    let mut name = None;
    for group in root
        .children()
        .filter(is_element("PropertyGroup"))
        .filter(|g| g.attribute("Condition").is_none())
    {
        for prop in group.children().filter(|n| n.is_element()) {
            match prop.tag_name().name() {
                "ProjectGuid" => uuid = Some(element_text(&prop).trim().to_string()),
                "ProjectName" => name = Some(element_text(&prop).trim().to_string()),
                _ => {}
            }
        }
    }

    let declared: Vec<Configuration> = root
        .children()
        .filter(is_element("ItemGroup"))
        .flat_map(|g| g.children().filter(is_element("ProjectConfiguration")))
        .filter_map(|n| n.attribute("Include"))
        .map(|include| {
            let mut config = Configuration::default();
            config.set_full_name(include);
            config
        })
        .collect();

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        tree.rename(project, name)?;
    }
    let data = tree.project_data_mut(project).ok_or(TreeError::NotAProject)?;
    data.uuid = uuid.filter(|u| !u.is_empty());
    for mut config in declared {
        apply_groups(&mut config, root);
        data.configurations.add(config);
    }
    Ok(())
}

/// Evaluate every conditional group against one configuration, in document
/// order; later groups override earlier ones.
fn apply_groups(config: &mut Configuration, root: roxmltree::Node) {
    let vars = HashMap::from([
        ("Configuration".to_string(), config.name.clone()),
        ("Platform".to_string(), config.architecture.clone()),
    ]);
    let mut target_name = None;
    let mut target_ext = None;

    for group in root.children().filter(|n| n.is_element()) {
        let tag = group.tag_name().name();
        if tag != "PropertyGroup" && tag != "ItemDefinitionGroup" {
            continue;
        }
        match condition::holds(group.attribute("Condition"), &vars) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(err:err; "Ignoring group with unreadable condition");
                continue;
            }
        }

        for child in group.children().filter(|n| n.is_element()) {
            let child_tag = child.tag_name().name();
            if tag == "PropertyGroup" {
                match child_tag {
                    "TargetName" => target_name = Some(element_text(&child).trim().to_string()),
                    "TargetExt" => target_ext = Some(element_text(&child).trim().to_string()),
                    _ => {
                        config.read_property(child_tag, element_text(&child));
                    }
                }
            } else {
                for setting in child.children().filter(|n| n.is_element()) {
                    config.read_tool_setting(child_tag, setting.tag_name().name(), element_text(&setting));
                }
            }
        }
    }

    config.target_name = Some(target_name.unwrap_or_else(|| "$(ProjectName)".to_string()));
    config.target_ext =
        Some(target_ext.unwrap_or_else(|| config.configuration_type.default_extension().to_string()));
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Filters file
// ═══════════════════════════════════════════════════════════════════════════════

/// Build Filter and File nodes from a `.filters` document.
///
/// Files whose `<Filter>` names no known filter are attached to the
/// project directly.
pub fn read_filters(
    tree: &mut Tree,
    project: NodeId,
    source: &str,
    dir: &Path,
    cancel: &CancellationToken,
) -> Result<(), VcprojError> {
    let doc = roxmltree::Document::parse(source)?;

    for group in doc.root_element().children().filter(is_element("ItemGroup")) {
        for item in group.children().filter(|n| n.is_element()) {
            cancel.check()?;

            let Some(include) = item.attribute("Include") else {
                continue;
            };
            let tag = item.tag_name().name();

            if tag == "Filter" {
                tree.add_filter(project, include);
            } else if FILE_ITEMS.contains(&tag) {
                let parent = item
                    .children()
                    .find(is_element("Filter"))
                    .map(|f| element_text(&f).trim())
                    .and_then(|name| tree.find(project, |n| n.is_filter() && n.name == name))
                    .unwrap_or(project);
                tree.add_file(parent, resolve_relative(dir, &include.replace('\\', "/")));
            }
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
