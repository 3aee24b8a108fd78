use super::types::Build;

/// Container that receives injected source in non-custom builds
pub const GIT_CLONE_CONTAINER: &str = "git-clone";

/// Main container of custom-strategy builds
pub const CUSTOM_BUILD_CONTAINER: &str = "custom-build";

const BUILD_POD_SUFFIX: &str = "build";

/// Longest name the API server accepts for a pod (DNS-1123 subdomain)
const MAX_POD_NAME_LENGTH: usize = 253;

/// Length of `-<hash8>-` inserted when a name has to be shortened
const HASH_SEGMENT_LENGTH: usize = 10;

/// Name of the pod that executes the given build
pub fn build_pod_name(build_name: &str) -> String {
    shortened_name(build_name, BUILD_POD_SUFFIX, MAX_POD_NAME_LENGTH)
}

/// Container the upload must be attached to.
///
/// Custom builds have no clone stage, so the source goes straight into
/// their main container.
pub fn upload_container(build: &Build) -> &'static str {
    if build.spec.strategy.is_custom() {
        CUSTOM_BUILD_CONTAINER
    } else {
        GIT_CLONE_CONTAINER
    }
}

fn shortened_name(base: &str, suffix: &str, max_length: usize) -> String {
    let name = format!("{}-{}", base, suffix);
    if name.len() <= max_length {
        return name;
    }

    let digest = short_hash(&name);
    match max_length.checked_sub(HASH_SEGMENT_LENGTH + suffix.len()) {
        Some(prefix_length) => {
            let prefix: String = base.chars().take(prefix_length).collect();
            format!("{}-{}-{}", prefix, digest, suffix)
        }
        None => {
            // suffix alone does not fit; drop it
            let prefix: String = base
                .chars()
                .take(max_length.saturating_sub(HASH_SEGMENT_LENGTH - 1))
                .collect();
            format!("{}-{}", prefix, digest).chars().take(max_length).collect()
        }
    }
}

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// FNV-1a (32 bit) of `value` as 8 hex digits. The build controller names
/// pods the same way, so both sides must agree bit for bit.
fn short_hash(value: &str) -> String {
    let hash = value.bytes().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    });
    format!("{:08x}", hash)
}
