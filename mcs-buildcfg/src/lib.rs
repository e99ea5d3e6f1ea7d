//! Path and directory constants shared by every `mcs` provider process.
//!
//! None of the core crates (`mcs-storage`, `mcs-block-device`,
//! `mcs-distributor`, `mcs-buffer-pool`) depend on a filesystem layout
//! themselves; this crate exists for the provider-endpoint-publication
//! convention so that a provider and a consumer agree on where to look
//! without either of them hardcoding strings.

pub const MCS_PKG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR"),
);
pub const MCS_PKG_REPOID: &str = env!("REPOID");

#[macro_export]
macro_rules! MCS_RUN_DIR_M {
    () => {
        "/run/mcs"
    };
}

#[macro_export]
macro_rules! MCS_STATE_DIR_M {
    () => {
        "/var/lib/mcs"
    };
}

/// namespaced directory for in-memory (tmpfs) run state
pub const MCS_RUN_DIR: &str = MCS_RUN_DIR_M!();

/// namespaced directory for persistent state
pub const MCS_STATE_DIR: &str = MCS_STATE_DIR_M!();

/// Name of the file a provider writes its dial-back endpoint descriptor to,
/// inside its publication prefix directory.
pub const PROVIDER_ENDPOINT_FN: &str = "PROVIDER";

/// Legacy / alternate name accepted for the same purpose.
pub const PROVIDER_ENDPOINT_FN_ALT: &str = "SERVER";

/// Name of the file a provider writes its pid to, next to
/// [`PROVIDER_ENDPOINT_FN`], inside its publication prefix directory.
pub const PROVIDER_PID_FN: &str = "PID";

/// Prepend the run directory to a file name.
#[macro_export]
macro_rules! rundir {
    ($subdir:expr) => {
        concat!($crate::MCS_RUN_DIR_M!(), $subdir)
    };
}
