pub mod build_info;
pub mod cancel;
pub mod condition;
pub mod config;
pub mod error;
pub mod import;
pub mod project;
pub mod services;
pub mod sln;
pub mod tree;
pub mod variables;
pub mod vcproj;
pub mod vcxproj;

pub use build_info::{include_directories, preprocessor_defines};
pub use cancel::CancellationToken;
pub use config::{Configuration, ConfigurationSet};
pub use error::{TreeError, VcprojError};
pub use import::{ImportOutcome, SolutionImporter};
pub use project::{ProjectOutcome, parse_project_file};
pub use sln::find_solution_file;
pub use tree::{Node, NodeId, NodeKind, Tree};
pub use variables::{Resolver, resolve};
