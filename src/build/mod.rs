//! Build resource model and naming rules

pub mod naming;
pub mod types;

pub use naming::{build_pod_name, upload_container, CUSTOM_BUILD_CONTAINER, GIT_CLONE_CONTAINER};
pub use types::{
    BinaryBuildRequestOptions, BinaryBuildSource, Build, BuildRequest, BuildSpec, BuildStatus,
    BuildStrategy, BuildTriggerCause, GitSourceRevision, ObjectMeta, Phase, SourceControlUser,
    SourceRevision, MANUAL_TRIGGER_MESSAGE,
};
