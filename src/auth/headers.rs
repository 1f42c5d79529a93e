//! Header names of the service's API family.

pub const APP: &str = "x-radiko-app";
pub const APP_VERSION: &str = "x-radiko-app-version";
pub const DEVICE: &str = "x-radiko-device";
pub const USER: &str = "x-radiko-user";
pub const AUTH_TOKEN: &str = "x-radiko-authtoken";
pub const KEY_OFFSET: &str = "x-radiko-keyoffset";
pub const KEY_LENGTH: &str = "x-radiko-keylength";
pub const LOCATION: &str = "x-radiko-location";
pub const CONNECTION: &str = "x-radiko-connection";
pub const PARTIAL_KEY: &str = "x-radiko-partialkey";
pub const AREA_ID: &str = "x-radiko-areaid";
