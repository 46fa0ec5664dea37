//! Backend API configuration parsed from environment variables.

pub const DEFAULT_API_BASE_URL: &str = "https://alpha-vision-squad-api.vercel.app/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without a trailing slash, e.g. `http://localhost:5000/api`.
    pub base_url: String,
    pub timeouts: ApiTimeouts,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_BASE_URL.to_owned(), timeouts: ApiTimeouts::default() }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with default timeouts.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self { base_url: normalize_base_url(base_url), timeouts: ApiTimeouts::default() }
    }

    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `KRISHI_API_URL`: backend base URL (default [`DEFAULT_API_BASE_URL`])
    /// - `KRISHI_REQUEST_TIMEOUT_SECS`: default 30
    /// - `KRISHI_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("KRISHI_API_URL")
            .filter(|raw| !raw.trim().is_empty())
            .map_or_else(|| DEFAULT_API_BASE_URL.to_owned(), |raw| normalize_base_url(&raw));
        let timeouts = ApiTimeouts {
            request_secs: parse_u64(&lookup, "KRISHI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(&lookup, "KRISHI_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self { base_url, timeouts }
    }

    /// Point at a different backend, keeping the timeouts.
    pub fn set_base_url(&mut self, raw: &str) {
        self.base_url = normalize_base_url(raw);
    }

    /// Absolute URL for an API path such as `/auth/login`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
