//! Solution manifest (`.sln`) grammar.
//!
//! The manifest is line oriented. Only three shapes are interpreted:
//!
//! ```text
//! Project("{8BC9CEB8-...}") = "App", "app\app.vcproj", "{B1A2C3D4-...}"
//! EndProject
//! Global
//!     GlobalSection(SolutionConfigurationPlatforms) = preSolution
//!         Debug|Win32 = Debug|Win32
//!     EndGlobalSection
//!     GlobalSection(ProjectConfigurationPlatforms) = postSolution
//!         {B1A2C3D4-...}.Debug|Win32.ActiveCfg = Debug|Win32
//!     EndGlobalSection
//! EndGlobal
//! ```
//!
//! Everything else is skipped. Scanning is a single streaming pass; a read
//! error ends the pass as if the file had ended.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use chumsky::prelude::*;
use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::VcprojError;
use crate::tree::normalize_uuid;

/// Project type used for solution folders, which have no project file.
pub const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

// ═══════════════════════════════════════════════════════════════════════════════
//  Entries
// ═══════════════════════════════════════════════════════════════════════════════

/// A `Project(...) = ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReference {
    pub type_id: String,
    pub name: String,
    /// Relative to the solution directory, `/`-separated.
    pub path: String,
    pub uuid: String,
}

impl ProjectReference {
    pub fn is_solution_folder(&self) -> bool {
        normalize_uuid(&self.type_id) == SOLUTION_FOLDER_TYPE
    }
}

/// Something the scanner recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolutionEntry {
    Project(ProjectReference),
    /// A solution-level `config|platform` name.
    Configuration(String),
    /// Solution configuration → project configuration binding.
    Binding {
        project: String,
        solution_configuration: String,
        project_configuration: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Line grammars
// ═══════════════════════════════════════════════════════════════════════════════

type Extra<'a> = extra::Err<Simple<'a, char>>;

fn quoted<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> + Clone {
    none_of('"').repeated().to_slice().delimited_by(just('"'), just('"'))
}

/// `Project("{type}") = "name", "path", "{uuid}"`
fn project_line<'a>() -> impl Parser<'a, &'a str, ProjectReference, Extra<'a>> {
    let comma = just(',').padded();

    just("Project")
        .ignore_then(quoted().padded().delimited_by(just('('), just(')')))
        .then_ignore(just('=').padded())
        .then(quoted())
        .then_ignore(comma.clone())
        .then(quoted())
        .then_ignore(comma)
        .then(quoted())
        .then_ignore(any().repeated())
        .map(|(((type_id, name), path), uuid)| ProjectReference {
            type_id: type_id.to_string(),
            name: name.to_string(),
            path: path.replace('\\', "/"),
            uuid: uuid.to_string(),
        })
}

/// `GlobalSection(name) = phase`
fn section_header<'a>() -> impl Parser<'a, &'a str, (&'a str, &'a str), Extra<'a>> {
    let phase = any()
        .filter(|c: &char| c.is_ascii_alphanumeric())
        .repeated()
        .at_least(1)
        .to_slice();

    just("GlobalSection")
        .ignore_then(none_of(')').repeated().to_slice().delimited_by(just('('), just(')')))
        .then_ignore(just('=').padded())
        .then(phase)
}

/// `cfg|platform = cfg|platform`, yielding the left-hand name.
fn configuration_pair<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    let part = none_of("|=").repeated().at_least(1).to_slice();
    let pair = part
        .clone()
        .then_ignore(just('|'))
        .then(part)
        .map(|(config, platform): (&str, &str)| format!("{}|{}", config.trim(), platform.trim()));

    pair.clone().then_ignore(just('=')).then_ignore(pair)
}

/// `{uuid}.cfg|platform.ActiveCfg = cfg|platform`
fn binding_line<'a>() -> impl Parser<'a, &'a str, SolutionEntry, Extra<'a>> {
    let uuid = none_of('}')
        .repeated()
        .to_slice()
        .delimited_by(just('{'), just('}'));

    let solution_configuration = none_of('=')
        .repeated()
        .to_slice()
        .map(str::trim_end)
        .filter(|s: &&str| s.ends_with(".ActiveCfg"))
        .map(|s| s.trim_end_matches(".ActiveCfg"));

    uuid.then_ignore(just('.'))
        .then(solution_configuration)
        .then_ignore(just('='))
        .then(any().repeated().to_slice())
        .map(|((project, solution), target): ((&str, &str), &str)| SolutionEntry::Binding {
            project: normalize_uuid(project),
            solution_configuration: solution.to_string(),
            project_configuration: target.trim().to_string(),
        })
}

fn parse_line<'a, T>(parser: impl Parser<'a, &'a str, T, Extra<'a>>, line: &'a str) -> Option<T> {
    parser.parse(line).into_result().ok()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Scanner
// ═══════════════════════════════════════════════════════════════════════════════

fn clean(line: &str) -> &str {
    line.trim_start_matches('\u{feff}').trim()
}

/// `line` begins with the whole word `keyword`.
fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric()))
}

/// Consume lines up to and including one starting with the word `end`.
fn skip_through(lines: &mut impl Iterator<Item = String>, end: &str) {
    for line in lines.by_ref() {
        if starts_with_keyword(clean(&line), end) {
            break;
        }
    }
}

/// Stream `reader`, reporting every recognized entry to `on_entry`.
///
/// Solution folders are not reported. Cancellation is checked before every
/// top-level line.
pub fn scan<R: BufRead>(
    reader: R,
    cancel: &CancellationToken,
    mut on_entry: impl FnMut(SolutionEntry),
) -> Result<(), VcprojError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map_while(|(index, line)| match line {
            Ok(line) => Some(line),
            Err(err) => {
                warn!(line = index + 1, err:err; "Stopping solution scan at unreadable line");
                None
            }
        });

    while let Some(raw) = lines.next() {
        cancel.check()?;
        let line = clean(&raw);

        if starts_with_keyword(line, "Project") {
            let Some(reference) = parse_line(project_line(), line) else {
                continue;
            };
            skip_through(&mut lines, "EndProject");
            if reference.is_solution_folder() {
                debug!(name = reference.name.as_str(); "Skipping solution folder");
            } else {
                on_entry(SolutionEntry::Project(reference));
            }
        } else if starts_with_keyword(line, "Global") {
            scan_global(&mut lines, &mut on_entry);
        }
    }
    Ok(())
}

/// Body of a `Global` block, through its `EndGlobal`.
fn scan_global(lines: &mut impl Iterator<Item = String>, on_entry: &mut impl FnMut(SolutionEntry)) {
    while let Some(raw) = lines.next() {
        let line = clean(&raw);

        if let Some((name, phase)) = parse_line(section_header(), line) {
            match (name.trim(), phase) {
                ("SolutionConfigurationPlatforms", "preSolution") => {
                    for_each_in_section(lines, |line| {
                        if let Some(name) = parse_line(configuration_pair(), line) {
                            on_entry(SolutionEntry::Configuration(name));
                        }
                    });
                }
                ("ProjectConfigurationPlatforms", "postSolution") => {
                    for_each_in_section(lines, |line| {
                        if let Some(binding) = parse_line(binding_line(), line) {
                            on_entry(binding);
                        }
                    });
                }
                _ => skip_through(lines, "EndGlobalSection"),
            }
        } else if starts_with_keyword(line, "EndGlobal") {
            return;
        }
    }
}

fn for_each_in_section(lines: &mut impl Iterator<Item = String>, mut f: impl FnMut(&str)) {
    for raw in lines.by_ref() {
        let line = clean(&raw);
        if starts_with_keyword(line, "EndGlobalSection") {
            break;
        }
        f(line);
    }
}

/// The solution to open for `path`.
///
/// A `.sln` path is returned as is. Otherwise the alphabetically first
/// `.sln` in the directory (or the parent directory of a file) is chosen.
pub fn find_solution_file(path: &Path) -> Option<PathBuf> {
    if is_solution(path) {
        return Some(path.to_path_buf());
    }

    let dir = if path.is_dir() { path } else { path.parent()? };
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_solution(p))
        .collect();
    found.sort();

    debug!(dir = dir.display().to_string(), count = found.len(); "Found solution files");
    found.into_iter().next()
}

fn is_solution(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sln"))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
