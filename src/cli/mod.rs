pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, OutputFormatArg, StartBuildArgs};
pub use handlers::handle_start_build;
