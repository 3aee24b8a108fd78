use super::commands::{OutputFormatArg, StartBuildArgs};
use crate::build::{BinaryBuildRequestOptions, Build};
use crate::client::{PodAttachTransport, RestClient};
use crate::config::{ClusterConfig, UploadConfig};
use crate::instantiate::{respond, BinaryInstantiateHandler, CREATED};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{debug, error, info};

/// Runs `start-build` and returns the process exit code
pub async fn handle_start_build(args: &StartBuildArgs, quiet: bool) -> i32 {
    match start_build(args).await {
        Ok((code, body)) => {
            print_result(args.output, code, &body, quiet);
            if code == CREATED {
                0
            } else {
                1
            }
        }
        Err(e) => {
            error!("start-build failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    }
}

async fn start_build(args: &StartBuildArgs) -> Result<(u16, Value)> {
    let cluster = cluster_config(args);
    cluster.validate().context("Invalid cluster configuration")?;

    let mut upload = UploadConfig::default();
    if let Some(secs) = args.timeout {
        upload = upload.with_timeout(Duration::from_secs(secs));
    }
    upload.validate().context("Invalid upload configuration")?;
    debug!(?upload, server = %cluster.server, "Resolved configuration");

    let rest = Arc::new(RestClient::new(&cluster).context("Failed to create API client")?);
    let transport = Arc::new(
        PodAttachTransport::from_cluster(&cluster).context("Failed to create attach client")?,
    );
    let handler = BinaryInstantiateHandler::polling(rest.clone(), rest, transport, upload);

    let options = request_options(args, &cluster.namespace);
    let mut payload = open_payload(args.from_file.as_deref()).await?;

    info!(
        build_config = %options.name,
        namespace = %options.namespace,
        "Starting binary build"
    );
    let result = handler.handle(&options, payload.as_mut()).await;
    Ok(respond(&result))
}

fn cluster_config(args: &StartBuildArgs) -> ClusterConfig {
    let mut cluster = ClusterConfig::default();
    if let Some(server) = &args.server {
        cluster.server = server.clone();
    }
    if let Some(token) = &args.token {
        cluster.token = Some(token.clone());
    }
    if let Some(namespace) = &args.namespace {
        cluster.namespace = namespace.clone();
    }
    cluster.insecure |= args.insecure;
    cluster
}

/// Query options the command line maps to
pub fn request_options(args: &StartBuildArgs, namespace: &str) -> BinaryBuildRequestOptions {
    BinaryBuildRequestOptions {
        namespace: namespace.to_string(),
        name: args.build_config.clone(),
        as_file: args.as_file.clone(),
        commit: args.commit.clone(),
        message: args.message.clone(),
        author_name: args.author_name.clone(),
        author_email: args.author_email.clone(),
        committer_name: args.committer_name.clone(),
        committer_email: args.committer_email.clone(),
    }
}

async fn open_payload(path: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdin())),
    }
}

fn print_result(format: OutputFormatArg, code: u16, body: &Value, quiet: bool) {
    match format {
        OutputFormatArg::Json => match serde_json::to_string_pretty(body) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: failed to render response: {}", e),
        },
        OutputFormatArg::Human => {
            let text = format_human(code, body);
            if code == CREATED {
                if !quiet {
                    println!("{}", text);
                }
            } else {
                eprintln!("{}", text);
            }
        }
    }
}

/// One-line summary of a response body
pub fn format_human(code: u16, body: &Value) -> String {
    if code == CREATED {
        match serde_json::from_value::<Build>(body.clone()) {
            Ok(build) => format!("build \"{}\" started ({})", build.name(), build.phase()),
            Err(_) => "build started".to_string(),
        }
    } else {
        let message = body["message"].as_str().unwrap_or("unknown error");
        let reason = body["reason"].as_str().unwrap_or("");
        if reason.is_empty() {
            format!("Error ({}): {}", code, message)
        } else {
            format!("Error ({} {}): {}", code, reason, message)
        }
    }
}
