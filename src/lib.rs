//! binbuild - start binary builds and stream their input
//!
//! A binary build is a build whose source is uploaded by the caller instead
//! of being cloned. Starting one takes three steps against the cluster:
//! instantiate a build from its build config, wait until the build pod is
//! running, and stream the upload into the pod's standard input. If any step
//! after creation fails, the build is cancelled so it does not sit waiting for
//! input that will never arrive.
//!
//! # Example Usage
//!
//! ```ignore
//! use binbuild::{BinaryBuildRequestOptions, BinaryInstantiateHandler, UploadConfig};
//! use std::sync::Arc;
//!
//! async fn upload(
//!     handler: &BinaryInstantiateHandler,
//!     mut payload: tokio::fs::File,
//! ) -> Result<(), binbuild::InstantiateError> {
//!     let mut options = BinaryBuildRequestOptions::new("demo", "app");
//!     options.as_file = "app.jar".to_string();
//!
//!     let build = handler.handle(&options, &mut payload).await?;
//!     println!("Started {}", build.name());
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`build`]: build and build request documents, pod naming
//! - [`client`]: seams to the cluster, with REST, pod attach and in-memory implementations
//! - [`instantiate`]: the launch, wait, stream and cancel flow
//! - [`config`]: environment-driven settings
//! - [`cli`]: the `binbuild` command line

pub mod build;
pub mod cli;
pub mod client;
pub mod config;
pub mod instantiate;
pub mod util;

pub use build::{BinaryBuildRequestOptions, Build, BuildRequest, Phase};
pub use client::{AttachTransport, BuildGenerator, BuildsClient, ClientError, PhaseTracker};
pub use config::{ClusterConfig, ConfigError, UploadConfig};
pub use instantiate::{respond, BinaryInstantiateHandler, BuildInstantiator, InstantiateError};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
