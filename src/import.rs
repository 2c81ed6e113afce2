//! Solution import: the manifest scan and the concurrent project parses.
//!
//! The manifest is scanned on a blocking task that streams
//! [`SolutionEntry`] values over a channel. Each project reference becomes
//! a task on a bounded pool; finished subtrees are grafted under the
//! Solution node by the importing task alone, in arrival order.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::cancel::CancellationToken;
use crate::error::VcprojError;
use crate::project::{ProjectOutcome, parse_project_file, resolve_relative};
use crate::sln::{self, SolutionEntry};
use crate::tree::Tree;

/// Result of a solution import.
#[derive(Debug)]
pub enum ImportOutcome {
    /// The Solution tree with every project that parsed successfully.
    Completed(Tree),
    /// Cancellation was requested; no tree is returned.
    Canceled,
}

impl ImportOutcome {
    pub fn into_tree(self) -> Option<Tree> {
        match self {
            Self::Completed(tree) => Some(tree),
            Self::Canceled => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  SolutionImporter
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for a solution import.
///
/// # Example
/// ```no_run
/// use vcproj_rs::{CancellationToken, ImportOutcome, SolutionImporter};
///
/// # async fn run() {
/// let cancel = CancellationToken::new();
/// let outcome = SolutionImporter::new()
///     .max_concurrency(4)
///     .cancellation(cancel.clone())
///     .solution_configuration("Release|Win32")
///     .import("all.sln")
///     .await;
///
/// if let ImportOutcome::Completed(tree) = outcome {
///     println!("{} projects", tree.projects().count());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SolutionImporter {
    max_concurrency: usize,
    cancel: CancellationToken,
    solution_configuration: Option<String>,
}

impl Default for SolutionImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SolutionImporter {
    /// Pool size defaults to the available parallelism.
    pub fn new() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism().map_or(4, usize::from),
            cancel: CancellationToken::new(),
            solution_configuration: None,
        }
    }

    /// Upper bound of project files parsed at the same time (at least 1).
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Share an external cancellation token with the import.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Apply this solution configuration's bindings once all projects are in.
    pub fn solution_configuration(mut self, name: impl Into<String>) -> Self {
        self.solution_configuration = Some(name.into());
        self
    }

    /// A handle that cancels this import.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Import the solution manifest at `path`.
    ///
    /// An unreadable manifest yields a Solution without children. The
    /// import is complete once the manifest scan has ended and every
    /// project task has finished.
    pub async fn import(self, path: impl AsRef<Path>) -> ImportOutcome {
        let solution_path = path.as_ref().to_path_buf();
        let dir = solution_path.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut tree = Tree::solution(&solution_path);
        let root = tree.root();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let scan = {
            let path = solution_path.clone();
            let cancel = self.cancel.clone();
            tokio::task::spawn_blocking(move || -> Result<(), VcprojError> {
                let file = std::fs::File::open(&path).map_err(|e| VcprojError::io(&path, e))?;
                sln::scan(BufReader::new(file), &cancel, |entry| {
                    // The receiver only goes away once the import is over.
                    let _ = tx.send(entry);
                })
            })
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(PathBuf, ProjectOutcome)> = JoinSet::new();
        let mut scanning = true;

        loop {
            tokio::select! {
                entry = rx.recv(), if scanning => match entry {
                    Some(SolutionEntry::Project(reference)) => {
                        let project_path = resolve_relative(&dir, &reference.path);
                        debug!(name = reference.name.as_str(), path = project_path.display().to_string(); "Dispatching project parse");
                        tasks.spawn(parse_task(project_path, semaphore.clone(), self.cancel.clone()));
                    }
                    Some(SolutionEntry::Configuration(name)) => {
                        if let Some(solution) = tree.solution_data_mut() {
                            solution.add_configuration(name);
                        }
                    }
                    Some(SolutionEntry::Binding { project, solution_configuration, project_configuration }) => {
                        if let Some(solution) = tree.solution_data_mut() {
                            solution.add_project_config(solution_configuration, &project, project_configuration);
                        }
                    }
                    None => scanning = false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((_, ProjectOutcome::Completed(subtree))) => {
                        tree.graft(root, subtree);
                    }
                    Ok((path, ProjectOutcome::Canceled)) => {
                        debug!(path = path.display().to_string(); "Project parse canceled");
                    }
                    Ok((_, ProjectOutcome::Empty)) => {}
                    Err(err) => {
                        warn!(err:err; "Project parse task failed");
                    }
                },
                else => break,
            }
        }

        match scan.await {
            Ok(Ok(())) | Ok(Err(VcprojError::Canceled)) => {}
            Ok(Err(err)) => warn!(err:err; "Unable to read solution"),
            Err(err) => warn!(err:err; "Solution scan task failed"),
        }

        if self.cancel.is_canceled() {
            info!(path = solution_path.display().to_string(); "Solution import canceled");
            return ImportOutcome::Canceled;
        }

        if let Some(name) = &self.solution_configuration {
            if !tree.set_solution_configuration(name) {
                warn!(config = name.as_str(); "Unknown solution configuration");
            }
        }

        info!(
            path = solution_path.display().to_string(),
            projects = tree.children(root).len();
            "Imported solution"
        );
        ImportOutcome::Completed(tree)
    }
}

/// One project parse, run on the blocking pool once a permit is free.
async fn parse_task(
    path: PathBuf,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> (PathBuf, ProjectOutcome) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return (path, ProjectOutcome::Canceled);
    };
    if cancel.is_canceled() {
        return (path, ProjectOutcome::Canceled);
    }

    let task_path = path.clone();
    let outcome = tokio::task::spawn_blocking(move || parse_project_file(&task_path, &cancel))
        .await
        .unwrap_or_else(|err| {
            warn!(err:err; "Project parser panicked");
            ProjectOutcome::Empty
        });
    (path, outcome)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use crate::variables::resolve;
    use std::collections::BTreeSet;

    fn project_names(tree: &Tree) -> BTreeSet<String> {
        tree.children(tree.root())
            .iter()
            .map(|&c| tree.node(c).name.clone())
            .collect()
    }

    #[tokio::test]
    async fn imports_fixture_solution() {
        let tree = SolutionImporter::new()
            .import("fixtures/all.sln")
            .await
            .into_tree()
            .unwrap();

        let root = tree.root();
        assert_eq!(tree.node(root).name, "all");
        assert_eq!(project_names(&tree), BTreeSet::from(["App".to_string(), "lib".to_string()]));
        assert!(tree.children(root).iter().all(|&c| matches!(tree.node(c).kind, NodeKind::Project(_))));

        let solution = tree.solution_data().unwrap();
        assert_eq!(solution.configurations, ["Debug|Win32", "Release|Win32"]);
        assert_eq!(solution.bindings["Release|Win32"].len(), 2);

        let app = tree.find_project_by_uuid("b1a2c3d4-0000-4000-8000-000000000001").unwrap();
        assert!(tree.find(app, |n| n.name == "main.cpp").is_some());
        let lib = tree.find_project_by_uuid("{C0FFEE00-0000-4000-8000-000000000002}").unwrap();
        assert!(tree.find(lib, |n| n.name == "lib.cpp").is_some());
        // Files are owned by their project, not by the solution.
        let main = tree.find(app, |n| n.name == "main.cpp").unwrap();
        assert_eq!(tree.node(main).owner(), Some(app));
    }

    #[tokio::test]
    async fn applies_requested_solution_configuration() {
        let tree = SolutionImporter::new()
            .solution_configuration("Release|Win32")
            .import("fixtures/all.sln")
            .await
            .into_tree()
            .unwrap();

        let app = tree.find_project_by_uuid("B1A2C3D4-0000-4000-8000-000000000001").unwrap();
        let lib = tree.find_project_by_uuid("C0FFEE00-0000-4000-8000-000000000002").unwrap();
        assert_eq!(tree.project_data(app).unwrap().configurations.current_key(), Some("Release|Win32"));
        assert_eq!(tree.project_data(lib).unwrap().configurations.current_key(), Some("Release|x64"));
        assert_eq!(resolve(&tree, "$(TargetPath)", lib), "fixtures\\Release\\lib.lib");
        assert_eq!(
            tree.solution_data().unwrap().current_configuration.as_deref(),
            Some("Release|Win32")
        );
    }

    #[tokio::test]
    async fn missing_manifest_yields_empty_solution() {
        let tree = SolutionImporter::new()
            .import("fixtures/missing.sln")
            .await
            .into_tree()
            .unwrap();
        assert!(tree.children(tree.root()).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bounded_pool_attaches_every_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = String::new();
        for i in 0..12 {
            let name = format!("p{i}");
            std::fs::create_dir(dir.path().join(&name)).unwrap();
            std::fs::write(
                dir.path().join(&name).join(format!("{name}.vcproj")),
                format!(
                    r#"<VisualStudioProject Name="{name}" ProjectGUID="{{00000000-0000-0000-0000-{i:012}}}">
                         <Files><File RelativePath="{name}.cpp"/></Files>
                       </VisualStudioProject>"#
                ),
            )
            .unwrap();
            manifest.push_str(&format!(
                "Project(\"{{8BC9CEB8-8B4A-11D0-8D11-00A0C91E3942}}\") = \"{name}\", \"{name}\\{name}.vcproj\", \"{{00000000-0000-0000-0000-{i:012}}}\"\r\nEndProject\r\n"
            ));
        }
        // Unsupported and missing references are skipped.
        manifest.push_str("Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Tool\", \"tool\\tool.csproj\", \"{X}\"\r\nEndProject\r\n");
        manifest.push_str("Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91E3942}\") = \"Gone\", \"gone\\gone.vcproj\", \"{Y}\"\r\nEndProject\r\n");
        manifest.push_str("Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91E3942}\") = \"Lost\", \"lost\\lost.vcxproj\", \"{Z}\"\r\nEndProject\r\n");
        let sln = dir.path().join("many.sln");
        std::fs::write(&sln, manifest).unwrap();

        let tree = SolutionImporter::new()
            .max_concurrency(2)
            .import(&sln)
            .await
            .into_tree()
            .unwrap();

        assert_eq!(tree.projects().count(), 12);
        assert!(tree.find_project_by_uuid("00000000-0000-0000-0000-000000000011").is_some());
    }

    #[tokio::test]
    async fn cancellation_discards_partial_tree() {
        let dir = tempfile::tempdir().unwrap();
        let files: String = (0..20_000)
            .map(|i| format!("<File RelativePath=\"src\\f{i}.cpp\"/>"))
            .collect();
        std::fs::create_dir(dir.path().join("big")).unwrap();
        std::fs::write(
            dir.path().join("big").join("big.vcproj"),
            format!("<VisualStudioProject Name=\"big\"><Files>{files}</Files></VisualStudioProject>"),
        )
        .unwrap();
        let sln = dir.path().join("big.sln");
        std::fs::write(
            &sln,
            "Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91E3942}\") = \"big\", \"big\\big.vcproj\", \"{B}\"\nEndProject\n",
        )
        .unwrap();

        let importer = SolutionImporter::new();
        let cancel = importer.token();
        let running = tokio::spawn(importer.import(sln));
        cancel.cancel();

        assert!(matches!(running.await.unwrap(), ImportOutcome::Canceled));
    }
}
