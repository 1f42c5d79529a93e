//! User-Agent for requests that are not made on behalf of an emulated device.
//!
//! Catalog and station-topology fetches identify the tool itself; handshake
//! and playlist requests override this with the device fingerprint's agent.

/// Project URL included in the tool's User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/timeshift-recorder";

/// Default User-Agent for catalog requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("timeshift/{version} (+{PROJECT_UA_URL})")
}
