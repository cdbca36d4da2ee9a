//! Storage key constants.

/// Keys used for the persisted session layout
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer token (session scope)
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Long-lived refresh token (durable scope)
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Cached user profile as JSON (durable scope)
    pub const USER: &'static str = "user";
}
