use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Start binary builds and stream their input
#[derive(Parser, Debug)]
#[command(
    name = "binbuild",
    about = "Start a binary build and stream its input into the build pod",
    version,
    author,
    long_about = "binbuild instantiates a build from a build config, waits for the build \
                  to start running, and streams a local file or stdin into the build pod. \
                  A build that cannot receive its input is cancelled."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Start a binary build",
        long_about = "Instantiates BUILDCONFIG and uploads the payload once the build runs.\n\n\
                      Examples:\n  \
                      binbuild start-build app --from-file app.jar --as-file app.jar\n  \
                      tar cz . | binbuild start-build app --commit 4f2a1c9 --message 'fix'\n  \
                      binbuild start-build app --from-file app.tgz --output json"
    )]
    StartBuild(StartBuildArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct StartBuildArgs {
    #[arg(value_name = "BUILDCONFIG", help = "Build config to instantiate")]
    pub build_config: String,

    #[arg(
        long,
        value_name = "FILE",
        help = "File to upload (reads stdin when omitted or '-')"
    )]
    pub from_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "",
        help = "File name the build sees the upload as (empty for an archive)"
    )]
    pub as_file: String,

    #[arg(long, value_name = "ID", default_value = "", help = "Commit the upload corresponds to")]
    pub commit: String,

    #[arg(long, default_value = "", help = "Commit message")]
    pub message: String,

    #[arg(long, default_value = "", help = "Commit author name")]
    pub author_name: String,

    #[arg(long, default_value = "", help = "Commit author email")]
    pub author_email: String,

    #[arg(long, default_value = "", help = "Committer name")]
    pub committer_name: String,

    #[arg(long, default_value = "", help = "Committer email")]
    pub committer_email: String,

    #[arg(
        short = 'n',
        long,
        help = "Namespace of the build config (defaults to BINBUILD_NAMESPACE)"
    )]
    pub namespace: Option<String>,

    #[arg(long, value_name = "URL", help = "API server URL (defaults to BINBUILD_SERVER)")]
    pub server: Option<String>,

    #[arg(long, help = "Bearer token (defaults to BINBUILD_TOKEN)")]
    pub token: Option<String>,

    #[arg(long, help = "Skip TLS certificate verification")]
    pub insecure: bool,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Budget for creating the build and waiting for it to run (defaults to BINBUILD_TIMEOUT)"
    )]
    pub timeout: Option<u64>,

    #[arg(short = 'o', long, value_enum, default_value = "human", help = "Output format")]
    pub output: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}
