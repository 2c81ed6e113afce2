//! Per-configuration build settings and the per-project configuration store.
//!
//! A [`Configuration`] is a plain value record. Projects keep them in a
//! [`ConfigurationSet`] keyed by `"{name}|{architecture}"` together with a
//! current-selection pointer.

use std::borrow::Cow;

use indexmap::IndexMap;

// ═══════════════════════════════════════════════════════════════════════════════
//  Enumerations
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of artifact a configuration produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConfigurationType {
    #[default]
    Unknown,
    Application,
    DynamicLibrary,
    StaticLibrary,
    Generic,
}

impl ConfigurationType {
    /// Map the numeric `ConfigurationType` attribute (valid range 1–4).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Application,
            2 => Self::DynamicLibrary,
            3 => Self::StaticLibrary,
            4 => Self::Generic,
            _ => Self::Unknown,
        }
    }

    /// Map the `<ConfigurationType>` element text of the modern dialect.
    pub fn from_msbuild(value: &str) -> Self {
        match value.trim() {
            "Application" => Self::Application,
            "DynamicLibrary" => Self::DynamicLibrary,
            "StaticLibrary" => Self::StaticLibrary,
            "Utility" | "Makefile" => Self::Generic,
            _ => Self::Unknown,
        }
    }

    /// Extension of the default output file, including the leading dot.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Application => ".exe",
            Self::DynamicLibrary => ".dll",
            Self::StaticLibrary => ".lib",
            Self::Unknown | Self::Generic => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CharacterSet {
    #[default]
    NotSet,
    Unicode,
    Mbcs,
}

impl CharacterSet {
    /// Valid range 1–2.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Unicode,
            2 => Self::Mbcs,
            _ => Self::NotSet,
        }
    }

    pub fn from_msbuild(value: &str) -> Self {
        match value.trim() {
            "Unicode" => Self::Unicode,
            "MultiByte" => Self::Mbcs,
            _ => Self::NotSet,
        }
    }
}

/// C runtime linkage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RuntimeLibrary {
    #[default]
    MultiThreaded,
    MultiThreadedDebug,
    MultiThreadedDll,
    MultiThreadedDebugDll,
}

impl RuntimeLibrary {
    /// Valid range 0–3, anything else is `MultiThreaded`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::MultiThreadedDebug,
            2 => Self::MultiThreadedDll,
            3 => Self::MultiThreadedDebugDll,
            _ => Self::MultiThreaded,
        }
    }

    pub fn from_msbuild(value: &str) -> Self {
        match value.trim() {
            "MultiThreadedDebug" => Self::MultiThreadedDebug,
            "MultiThreadedDLL" => Self::MultiThreadedDll,
            "MultiThreadedDebugDLL" => Self::MultiThreadedDebugDll,
            _ => Self::MultiThreaded,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubSystem {
    #[default]
    NotSet,
    Console,
    Windows,
    Native,
}

impl SubSystem {
    /// Valid range 1–3.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Console,
            2 => Self::Windows,
            3 => Self::Native,
            _ => Self::NotSet,
        }
    }

    pub fn from_msbuild(value: &str) -> Self {
        match value.trim() {
            "Console" => Self::Console,
            "Windows" => Self::Windows,
            "Native" => Self::Native,
            _ => Self::NotSet,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Build settings of one `name|architecture` configuration.
///
/// Path-like fields hold raw, unexpanded strings; `$(Var)` tokens are
/// resolved on demand by [`crate::variables::Resolver`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    // ── General ──
    pub name: String,
    pub architecture: String,
    pub output_directory: String,
    pub configuration_type: ConfigurationType,
    pub character_set: CharacterSet,
    pub whole_program_optimization: bool,

    // ── Compiler ──
    pub optimization: i32,
    pub intrinsic_functions: bool,
    pub include_directories: Vec<String>,
    pub preprocessor_defines: IndexMap<String, String>,
    pub runtime_library: RuntimeLibrary,
    pub use_precompiled_header: bool,
    pub warning_level: i32,

    // ── Linker ──
    pub link_incremental: bool,
    pub subsystem: SubSystem,
    /// Explicit output-file template. `None` falls back to
    /// [`default_output_file`](Self::default_output_file).
    pub output_file: Option<String>,
    /// `$(TargetName)` / `$(TargetExt)` templates of the modern dialect.
    /// `None` derives them from the output file.
    pub target_name: Option<String>,
    pub target_ext: Option<String>,
}

impl Configuration {
    pub fn new(name: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self { name: name.into(), architecture: architecture.into(), ..Default::default() }
    }

    /// Store key, `"{name}|{architecture}"`.
    pub fn key(&self) -> String {
        format!("{}|{}", self.name, self.architecture)
    }

    /// `$(OutDir)\$(ProjectName)<ext>` with the extension derived from the
    /// configuration type, or `$(OutDir)$(TargetName)$(TargetExt)` once
    /// target name or extension are set.
    pub fn default_output_file(&self) -> String {
        if self.target_name.is_some() || self.target_ext.is_some() {
            return "$(OutDir)$(TargetName)$(TargetExt)".to_string();
        }
        format!(
            "$(OutDir)\\$(ProjectName){}",
            self.configuration_type.default_extension()
        )
    }

    /// The explicit output-file template, or the kind-derived default.
    pub fn output_file_template(&self) -> Cow<'_, str> {
        match &self.output_file {
            Some(file) => Cow::Borrowed(file.as_str()),
            None => Cow::Owned(self.default_output_file()),
        }
    }

    /// Split `"Debug|Win32"` once on `|` into name and architecture.
    pub(crate) fn set_full_name(&mut self, full_name: &str) {
        let (name, architecture) = full_name.split_once('|').unwrap_or((full_name, ""));
        self.name = name.to_string();
        self.architecture = architecture.to_string();
    }

    /// Add `NAME=VALUE;NAME2;…` definitions. A missing value is stored as
    /// the empty string.
    pub(crate) fn add_defines(&mut self, list: &str) {
        for entry in split_list(list) {
            let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
            self.preprocessor_defines.insert(name.to_string(), value.to_string());
        }
    }

    pub(crate) fn add_include_directories(&mut self, list: &str) {
        self.include_directories
            .extend(split_list(list).map(String::from));
    }
}

/// Split a semicolon-delimited list, dropping empty entries and MSBuild
/// `%(…)` inheritance tokens.
pub(crate) fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("%("))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ConfigurationSet
// ═══════════════════════════════════════════════════════════════════════════════

/// Named configurations of one project plus the current selection.
///
/// Invariant: `current`, when set, is always a key of `configurations`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationSet {
    configurations: IndexMap<String, Configuration>,
    current: Option<String>,
}

impl ConfigurationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `"{name}|{architecture}"`. The first configuration
    /// added becomes current.
    pub fn add(&mut self, config: Configuration) {
        let key = config.key();
        if self.current.is_none() {
            self.current = Some(key.clone());
        }
        self.configurations.insert(key, config);
    }

    /// Select `key` as current. Returns `false` and leaves the selection
    /// untouched when `key` is unknown.
    pub fn set_current(&mut self, key: &str) -> bool {
        if self.configurations.contains_key(key) {
            self.current = Some(key.to_string());
            true
        } else {
            false
        }
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current configuration, or a zero-valued record when nothing is
    /// selected.
    pub fn current(&self) -> Cow<'_, Configuration> {
        match self.current.as_deref().and_then(|k| self.configurations.get(k)) {
            Some(config) => Cow::Borrowed(config),
            None => Cow::Owned(Configuration::default()),
        }
    }

    /// Lookup by key. Absent keys yield a zero-valued record.
    pub fn get(&self, key: &str) -> Cow<'_, Configuration> {
        match self.configurations.get(key) {
            Some(config) => Cow::Borrowed(config),
            None => Cow::Owned(Configuration::default()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.configurations.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Configuration> {
        self.configurations.values_mut()
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parsing – legacy <Configuration> element
// ═══════════════════════════════════════════════════════════════════════════════

impl Configuration {
    /// Read a legacy-dialect `<Configuration>` element.
    ///
    /// Out-of-range or unparsable codes are coerced to their documented
    /// defaults. Unknown tools and attributes are ignored.
    pub fn from_vcproj(node: &roxmltree::Node) -> Self {
        let mut config = Self::default();
        config.set_full_name(node.attribute("Name").unwrap_or(""));
        config.configuration_type = ConfigurationType::from_code(int_attr(node, "ConfigurationType"));
        config.output_directory = node.attribute("OutputDirectory").unwrap_or("").to_string();
        config.character_set = CharacterSet::from_code(int_attr(node, "CharacterSet"));
        config.whole_program_optimization = int_attr(node, "WholeProgramOptimization") != 0;

        for tool in node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Tool")
        {
            match tool.attribute("Name").unwrap_or("") {
                "VCCLCompilerTool" => config.read_compiler_tool(&tool),
                "VCLinkerTool" => config.read_linker_tool(&tool),
                "VCLibrarianTool" => {
                    if let Some(file) = tool.attribute("OutputFile") {
                        config.output_file = Some(file.to_string());
                    }
                }
                _ => {}
            }
        }

        config
    }

    fn read_compiler_tool(&mut self, tool: &roxmltree::Node) {
        self.optimization = int_attr(tool, "Optimization");
        self.intrinsic_functions = tool
            .attribute("EnableIntrinsicFunctions")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if let Some(defines) = tool.attribute("PreprocessorDefinitions") {
            self.add_defines(defines);
        }
        if let Some(dirs) = tool.attribute("AdditionalIncludeDirectories") {
            self.add_include_directories(dirs);
        }
        self.runtime_library = RuntimeLibrary::from_code(int_attr(tool, "RuntimeLibrary"));
        self.use_precompiled_header = int_attr(tool, "UsePrecompiledHeader") != 0;
        self.warning_level = int_attr(tool, "WarningLevel");
    }

    fn read_linker_tool(&mut self, tool: &roxmltree::Node) {
        self.link_incremental = int_attr(tool, "LinkIncremental") != 0;
        self.subsystem = SubSystem::from_code(int_attr(tool, "SubSystem"));
        if let Some(file) = tool.attribute("OutputFile") {
            self.output_file = Some(file.to_string());
        }
    }
}

/// Integer attribute, `0` when missing or unparsable.
fn int_attr(node: &roxmltree::Node, name: &str) -> i32 {
    node.attribute(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parsing – modern property elements
// ═══════════════════════════════════════════════════════════════════════════════

impl Configuration {
    /// Apply one child element of a matching `<PropertyGroup>`.
    ///
    /// Returns `false` for elements this record does not model.
    pub(crate) fn read_property(&mut self, tag: &str, value: &str) -> bool {
        match tag {
            "ConfigurationType" => self.configuration_type = ConfigurationType::from_msbuild(value),
            "CharacterSet" => self.character_set = CharacterSet::from_msbuild(value),
            "WholeProgramOptimization" => self.whole_program_optimization = is_true(value),
            "OutDir" => self.output_directory = value.trim().to_string(),
            "LinkIncremental" => self.link_incremental = is_true(value),
            _ => return false,
        }
        true
    }

    /// Apply one setting of an `<ItemDefinitionGroup>` tool element
    /// (`ClCompile`, `Link` or `Lib`).
    pub(crate) fn read_tool_setting(&mut self, tool: &str, tag: &str, value: &str) {
        match (tool, tag) {
            ("ClCompile", "Optimization") => {
                self.optimization = match value.trim() {
                    "MinSpace" => 1,
                    "MaxSpeed" => 2,
                    "Full" => 3,
                    _ => 0,
                }
            }
            ("ClCompile", "IntrinsicFunctions") => self.intrinsic_functions = is_true(value),
            ("ClCompile", "PreprocessorDefinitions") => self.add_defines(value),
            ("ClCompile", "AdditionalIncludeDirectories") => self.add_include_directories(value),
            ("ClCompile", "RuntimeLibrary") => self.runtime_library = RuntimeLibrary::from_msbuild(value),
            ("ClCompile", "PrecompiledHeader") => {
                self.use_precompiled_header = matches!(value.trim(), "Use" | "Create")
            }
            ("ClCompile", "WarningLevel") => {
                self.warning_level = value
                    .trim()
                    .strip_prefix("Level")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0)
            }
            ("Link", "SubSystem") => self.subsystem = SubSystem::from_msbuild(value),
            ("Link" | "Lib", "OutputFile") => self.output_file = Some(value.trim().to_string()),
            _ => {}
        }
    }
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
