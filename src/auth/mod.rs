//! Device emulation and the two-step authorization handshake.
//!
//! The service only serves timeshift playlists to sessions that look like a
//! known mobile client located inside the requested area. Authorizing an area
//! works like this:
//!
//! 1. Draw a [`DeviceFingerprint`] from the catalog's version pools.
//! 2. `auth1`: send the identity headers, receive a token plus an
//!    offset/length window into a shared secret key.
//! 3. Slice that window out of the locally held full key ([`partial_key`]).
//! 4. `auth2`: send the identity headers again together with the token, the
//!    partial key and a jittered location inside the area.
//!
//! Sessions are cached per area by [`Authenticator`]. A new authenticator is
//! built for every scheduler cycle, which is the only invalidation there is.

mod device;
mod error;
pub mod headers;

pub use device::{
    APP_NAME, CONNECTION, DeviceFingerprint, MAX_LOCATION_JITTER, choose_fingerprint,
    generate_location,
};
pub use error::AuthError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Response;
use reqwest::header::{HeaderMap, USER_AGENT};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::catalog::ReferenceCatalog;
use crate::download::HttpClient;
use crate::endpoints::Endpoints;

/// An authorized device bound to one area.
#[derive(Debug, Clone)]
pub struct Session {
    pub area_id: String,
    pub token: String,
    pub device: DeviceFingerprint,
}

impl Session {
    /// Headers for playlist requests made under this session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeaderValue`] if a value can't be encoded.
    pub fn request_headers(&self) -> Result<HeaderMap, AuthError> {
        let mut map = HeaderMap::new();
        map.insert(
            USER_AGENT,
            device::header_value("User-Agent", &self.device.user_agent)?,
        );
        device::insert(&mut map, headers::AREA_ID, &self.area_id)?;
        device::insert(&mut map, headers::AUTH_TOKEN, &self.token)?;
        Ok(map)
    }
}

/// Derives the partial key: the `offset`/`length` byte window of the
/// base64-encoded full key, re-encoded as base64.
///
/// # Errors
///
/// Returns [`AuthError::KeyDecode`] if the full key isn't base64 and
/// [`AuthError::KeyWindow`] if the window runs past its end.
///
/// # Example
///
/// ```
/// use timeshift_core::auth::partial_key;
///
/// // "AAECAwQF" is bytes 0..6; bytes 2..4 are [2, 3].
/// assert_eq!(partial_key("AAECAwQF", 2, 2).unwrap(), "AgM=");
/// ```
pub fn partial_key(full_key_b64: &str, offset: usize, length: usize) -> Result<String, AuthError> {
    let full_key = STANDARD.decode(full_key_b64.trim())?;
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= full_key.len())
        .ok_or(AuthError::KeyWindow {
            offset,
            length,
            key_len: full_key.len(),
        })?;
    Ok(STANDARD.encode(&full_key[offset..end]))
}

/// Performs the handshake and caches one session per area.
#[derive(Debug)]
pub struct Authenticator {
    client: HttpClient,
    endpoints: Endpoints,
    catalog: Arc<ReferenceCatalog>,
    full_key: String,
    sessions: Mutex<HashMap<String, Arc<OnceCell<Arc<Session>>>>>,
}

impl Authenticator {
    /// Creates an authenticator over the catalog of the current cycle.
    pub fn new(
        client: HttpClient,
        endpoints: Endpoints,
        catalog: Arc<ReferenceCatalog>,
        full_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoints,
            catalog,
            full_key: full_key.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached session for `area_id`, authorizing one if needed.
    ///
    /// Concurrent callers for the same area wait for a single handshake;
    /// other areas authorize independently.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of a failed handshake. Failures are not
    /// cached.
    pub async fn session(&self, area_id: &str) -> Result<Arc<Session>, AuthError> {
        let cell = Arc::clone(
            self.lock_sessions()
                .entry(area_id.to_string())
                .or_default(),
        );
        let session = cell
            .get_or_try_init(|| async { self.authorize(area_id).await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(session))
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn cached_sessions(&self) -> usize {
        self.lock_sessions()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    fn lock_sessions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Arc<Session>>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the full handshake for `area_id` with a fresh device.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on any failed step. Nothing is retried.
    #[instrument(skip(self))]
    pub async fn authorize(&self, area_id: &str) -> Result<Session, AuthError> {
        let coordinate = self
            .catalog
            .coordinate(area_id)
            .ok_or_else(|| AuthError::UnknownArea(area_id.to_string()))?;
        let (device, location) = {
            let mut rng = rand::thread_rng();
            let device = choose_fingerprint(self.catalog.version_pools(), &mut rng)?;
            (device, generate_location(coordinate, &mut rng))
        };
        debug!(
            app_version = %device.app_version,
            device = %device.device_name,
            "generated device fingerprint"
        );

        let response = self
            .client
            .get(&self.endpoints.auth1(), device.identity_headers()?)
            .await
            .map_err(|e| AuthError::handshake("auth1", e))?;
        let token = required_header(&response, headers::AUTH_TOKEN)?.to_string();
        let offset = numeric_header(&response, headers::KEY_OFFSET)?;
        let length = numeric_header(&response, headers::KEY_LENGTH)?;
        let partial = partial_key(&self.full_key, offset, length)?;
        debug!(offset, length, "auth1 accepted");

        let mut auth2_headers = device.identity_headers()?;
        device::insert(&mut auth2_headers, headers::AUTH_TOKEN, &token)?;
        device::insert(&mut auth2_headers, headers::PARTIAL_KEY, &partial)?;
        device::insert(&mut auth2_headers, headers::LOCATION, &location)?;
        device::insert(&mut auth2_headers, headers::CONNECTION, CONNECTION)?;
        device::insert(&mut auth2_headers, headers::AREA_ID, area_id)?;

        self.client
            .get(&self.endpoints.auth2(), auth2_headers)
            .await
            .map_err(|e| AuthError::handshake("auth2", e))?;

        info!(area = area_id, "session authorized");
        Ok(Session {
            area_id: area_id.to_string(),
            token,
            device,
        })
    }
}

fn required_header<'a>(response: &'a Response, name: &'static str) -> Result<&'a str, AuthError> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingHeader {
            step: "auth1",
            header: name,
        })
}

fn numeric_header(response: &Response, name: &'static str) -> Result<usize, AuthError> {
    let raw = required_header(response, name)?;
    raw.trim()
        .parse()
        .map_err(|_| AuthError::malformed_header(name, raw))
}
