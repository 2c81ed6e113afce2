//! Legacy project dialect (`.vcproj`): a single attribute-heavy XML file.
//!
//! ```xml
//! <VisualStudioProject Name="app" ProjectGUID="{...}">
//!   <Configurations>
//!     <Configuration Name="Debug|Win32" ConfigurationType="1">...</Configuration>
//!   </Configurations>
//!   <Files>
//!     <Filter Name="Source Files">
//!       <File RelativePath=".\main.cpp"/>
//!     </Filter>
//!   </Files>
//! </VisualStudioProject>
//! ```

use std::path::Path;

use log::debug;

use crate::cancel::CancellationToken;
use crate::config::{Configuration, ConfigurationType};
use crate::error::{TreeError, VcprojError};
use crate::project::resolve_relative;
use crate::tree::{NodeId, TargetKind, Tree};

const ROOT_ELEMENT: &str = "VisualStudioProject";

/// Read and parse a `.vcproj` file.
pub fn parse_file(path: &Path, cancel: &CancellationToken) -> Result<Tree, VcprojError> {
    let source = std::fs::read_to_string(path).map_err(|e| VcprojError::io(path, e))?;
    parse_str(path, &source, cancel)
}

/// Parse `.vcproj` source that lives at `path`.
///
/// `path` names the Project node and anchors every `RelativePath`.
pub fn parse_str(path: &Path, source: &str, cancel: &CancellationToken) -> Result<Tree, VcprojError> {
    let doc = roxmltree::Document::parse(source)?;
    let root = doc.root_element();
    if !root.tag_name().name().eq_ignore_ascii_case(ROOT_ELEMENT) {
        return Err(VcprojError::UnexpectedRoot {
            expected: ROOT_ELEMENT,
            found: root.tag_name().name().to_string(),
        });
    }

    let mut tree = Tree::project(path);
    let project = tree.root();
    let dir = path.parent().unwrap_or(Path::new(""));

    if let Some(name) = root.attribute("Name") {
        tree.rename(project, name)?;
    }

    let mut configurations = Vec::new();

    for section in root.children().filter(|n| n.is_element()) {
        let tag = section.tag_name().name();
        if tag.eq_ignore_ascii_case("Files") {
            read_files(&mut tree, project, section, dir, &mut || cancel.check())?;
        } else if tag.eq_ignore_ascii_case("Configurations") {
            configurations.extend(
                section
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("Configuration"))
                    .map(|n| Configuration::from_vcproj(&n)),
            );
        }
    }

    let data = tree
        .project_data_mut(project)
        .ok_or(TreeError::NotAProject)?;
    data.uuid = root.attribute("ProjectGUID").map(String::from);
    for config in configurations {
        data.configurations.add(config);
    }
    let kind = target_kind(data.configurations.current().configuration_type);

    let name = tree.node(project).name.clone();
    tree.add_target(project, name.as_str(), kind);

    debug!(project = name.as_str(), nodes = tree.len(); "Parsed legacy project");
    Ok(tree)
}

/// Target kind for the current configuration's type.
pub(crate) fn target_kind(configuration_type: ConfigurationType) -> TargetKind {
    match configuration_type {
        ConfigurationType::Application => TargetKind::Executable,
        ConfigurationType::DynamicLibrary | ConfigurationType::StaticLibrary => TargetKind::Library,
        ConfigurationType::Unknown | ConfigurationType::Generic => TargetKind::Generic,
    }
}

/// Build `<File>` and `<Filter>` children of `node` under `parent`.
///
/// `check` runs before every entry; an error stops the walk.
fn read_files<F>(
    tree: &mut Tree,
    parent: NodeId,
    node: roxmltree::Node,
    dir: &Path,
    check: &mut F,
) -> Result<(), VcprojError>
where
    F: FnMut() -> Result<(), VcprojError>,
{
    for child in node.children().filter(|n| n.is_element()) {
        check()?;

        let tag = child.tag_name().name();
        if tag.eq_ignore_ascii_case("File") {
            let Some(relative) = child.attribute("RelativePath") else {
                continue;
            };
            tree.add_file(parent, resolve_relative(dir, &relative.replace('\\', "/")));
        } else if tag.eq_ignore_ascii_case("Filter") {
            let filter = tree.add_filter(parent, child.attribute("Name").unwrap_or(""));
            read_files(tree, filter, child, dir, check)?;
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
