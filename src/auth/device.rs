//! Emulated mobile client identity.

use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use super::AuthError;
use super::headers;
use crate::catalog::{Coordinate, VersionPools};

/// App name every fingerprint reports.
pub const APP_NAME: &str = "aSmartPhone7a";

/// Connection type reported during authorization.
pub const CONNECTION: &str = "wifi";

/// Largest jitter, in degrees, applied to each axis of a location token.
pub const MAX_LOCATION_JITTER: f64 = 1.0 / 40.0;

/// A generated client identity, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint {
    pub app_name: String,
    pub app_version: String,
    /// Android version, e.g. `11.0.0`.
    pub android_version: String,
    /// SDK level matching `android_version`.
    pub sdk_id: String,
    pub build: String,
    pub model: String,
    /// `Dalvik/2.1.0 (Linux; U; Android <version>; <model>/<build>)`
    pub user_agent: String,
    /// `<sdk>.<model>`
    pub device_name: String,
    /// 16 random bytes, hex-encoded.
    pub user_id: String,
}

impl DeviceFingerprint {
    /// Headers identifying this device on every handshake request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeaderValue`] if a pool value isn't a
    /// legal header value.
    pub fn identity_headers(&self) -> Result<HeaderMap, AuthError> {
        let mut map = HeaderMap::new();
        map.insert(USER_AGENT, header_value("User-Agent", &self.user_agent)?);
        insert(&mut map, headers::APP, &self.app_name)?;
        insert(&mut map, headers::APP_VERSION, &self.app_version)?;
        insert(&mut map, headers::DEVICE, &self.device_name)?;
        insert(&mut map, headers::USER, &self.user_id)?;
        Ok(map)
    }
}

pub(super) fn insert(map: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), AuthError> {
    map.insert(HeaderName::from_static(name), header_value(name, value)?);
    Ok(())
}

pub(super) fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue { header: name })
}

/// Draws a fingerprint from `pools`, one uniform pick per pool.
///
/// # Errors
///
/// Returns [`AuthError::EmptyPool`] if any pool (or the chosen SDK's build
/// list) is empty.
pub fn choose_fingerprint<R: Rng + ?Sized>(
    pools: &VersionPools,
    rng: &mut R,
) -> Result<DeviceFingerprint, AuthError> {
    let app_version = pools
        .apps
        .choose(rng)
        .ok_or(AuthError::EmptyPool("app"))?
        .clone();

    let android_versions: Vec<&String> = pools.sdks.keys().collect();
    let android_version = *android_versions
        .choose(rng)
        .ok_or(AuthError::EmptyPool("sdk"))?;
    let sdk = &pools.sdks[android_version];
    let build = sdk
        .builds
        .choose(rng)
        .ok_or(AuthError::EmptyPool("build"))?
        .clone();

    let model = pools
        .models
        .choose(rng)
        .ok_or(AuthError::EmptyPool("model"))?
        .clone();

    let mut raw_id = [0u8; 16];
    rng.fill(&mut raw_id);

    Ok(DeviceFingerprint {
        app_name: APP_NAME.to_string(),
        user_agent: format!("Dalvik/2.1.0 (Linux; U; Android {android_version}; {model}/{build})"),
        device_name: format!("{}.{model}", sdk.id),
        app_version,
        android_version: android_version.clone(),
        sdk_id: sdk.id.clone(),
        build,
        model,
        user_id: hex::encode(raw_id),
    })
}

/// Formats a location token near `reference`, each axis moved by up to
/// [`MAX_LOCATION_JITTER`] degrees in either direction.
pub fn generate_location<R: Rng + ?Sized>(reference: Coordinate, rng: &mut R) -> String {
    let lat = reference.lat + jitter(rng);
    let lng = reference.lng + jitter(rng);
    format!("{lat:.6},{lng:.6},gps")
}

fn jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let magnitude = rng.gen_range(0.0..MAX_LOCATION_JITTER);
    if rng.gen_bool(0.5) { magnitude } else { -magnitude }
}
