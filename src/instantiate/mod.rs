//! Binary build instantiation
//!
//! Starting a build from an upload takes four cooperating parts:
//!
//! - [`launcher`]: create the build, absorbing missing image stream tags
//! - [`waiter`]: wait, within the remaining budget, for the build to run
//! - [`streamer`]: copy the upload into the build pod in one attach session
//! - [`guard`]: cancel the build on any exit that did not disarm it
//!
//! [`handler`] composes them per request.

pub mod budget;
pub mod error;
pub mod guard;
pub mod handler;
pub mod launcher;
pub mod streamer;
pub mod waiter;

pub use budget::TimeBudget;
pub use error::{InstantiateError, NO_BUILD_LOGS_MESSAGE};
pub use guard::{cancel_build, retry_on_conflict, CancelOutcome, CancellationGuard};
pub use handler::{respond, BinaryInstantiateHandler, BuildInstantiator, CREATED};
pub use launcher::{is_missing_image_stream_tag, BuildLauncher};
pub use streamer::UploadStreamer;
pub use waiter::PhaseWaiter;
