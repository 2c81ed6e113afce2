//! Interfaces of the host services the importer talks to.
//!
//! Locating toolchains, running the external builder and persisting
//! settings belong to the embedding application. This module only fixes
//! their shape, plus the builder command line derived from the settings.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::RwLock;

use log::warn;

// ─── Settings keys ──────────────────────────────────────────────────────────

/// Path of the `devenv` executable.
pub const DEVENV_EXECUTABLE: &str = "DevenvExecutable";
pub const MSVC_INCLUDE_PATH: &str = "MsvcIncludePath";
pub const WINSDK_INCLUDE_PATH: &str = "WinSdkIncludePath";
/// Active build configuration passed to the builder.
pub const ACTIVE_CONFIGURATION: &str = "Config";
/// Platform appended to a configuration that names none.
pub const ACTIVE_ARCHITECTURE: &str = "Arch";

const DEFAULT_CONFIGURATION: &str = "Debug";

// ═══════════════════════════════════════════════════════════════════════════════
//  Collaborators
// ═══════════════════════════════════════════════════════════════════════════════

/// An installed compiler toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub version: u32,
    pub path: PathBuf,
    pub display_name: String,
}

pub trait ToolchainLocator {
    fn locate(&self) -> Vec<Toolchain>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCommand {
    Build,
    Clean,
}

impl BuildCommand {
    pub fn as_switch(self) -> &'static str {
        match self {
            Self::Build => "/Build",
            Self::Clean => "/Clean",
        }
    }
}

/// Exit status and captured output of one builder run.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub status: ExitStatus,
    pub output: String,
}

pub trait ExternalBuilder {
    fn build(&self, target: &Path, command: BuildCommand) -> io::Result<BuildOutput>;
}

/// String key/value settings, scoped per workspace.
pub trait SettingsStore {
    fn get(&self, scope: &str, key: &str) -> Option<String>;
    fn set(&self, scope: &str, key: &str, value: &str);
}

/// [`SettingsStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, scope: &str, key: &str) -> Option<String> {
        let values = self.values.read().ok()?;
        values.get(&(scope.to_string(), key.to_string())).cloned()
    }

    fn set(&self, scope: &str, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert((scope.to_string(), key.to_string()), value.to_string());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Builder command line
// ═══════════════════════════════════════════════════════════════════════════════

/// `[<devenv>, <target>, /Build|/Clean, <configuration>]`
///
/// `None` when no builder is configured for `scope` or the configured path
/// is not a file. The configuration defaults to `Debug` and gets the active
/// architecture as `|platform` unless it already carries one.
pub fn devenv_arguments(
    settings: &dyn SettingsStore,
    scope: &str,
    target: &Path,
    command: BuildCommand,
) -> Option<Vec<String>> {
    let devenv = settings.get(scope, DEVENV_EXECUTABLE)?;
    if !Path::new(&devenv).is_file() {
        warn!(path = devenv.as_str(); "Configured builder is not a file");
        return None;
    }

    let mut configuration = settings
        .get(scope, ACTIVE_CONFIGURATION)
        .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string());
    if !configuration.contains('|') {
        if let Some(arch) = settings.get(scope, ACTIVE_ARCHITECTURE).filter(|a| !a.trim().is_empty()) {
            configuration = format!("{configuration}|{}", arch.trim());
        }
    }

    Some(vec![
        devenv,
        target.display().to_string(),
        command.as_switch().to_string(),
        configuration,
    ])
}
