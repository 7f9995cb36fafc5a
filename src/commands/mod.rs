//! CLI command implementations for stepline operations.
//!
//! Each submodule handles one command: its configuration, validation, and
//! execution logic.
//!
//! Available commands:
//! - **steps**: List every registered step type with its description
//! - **inspect**: Show a pipeline's resolved plan without executing it
//! - **run**: Build a pipeline from a config file and execute it
//! - **new**: Scaffold a starter pipeline app
//! - **cache**: Inspect or clear the step output cache

pub mod cache;
pub mod inspect;
pub mod list_steps;
pub mod new_app;
pub mod run;

pub use cache::{cache_clear, cache_stats};
pub use inspect::inspect_config;
pub use list_steps::list_steps;
pub use new_app::{scaffold_app, NewAppConfig};
pub use run::{run_pipeline, RunConfig};
