use std::time::Duration;

use bon::bon;
use url::Url;

use crate::{BLOCKED_PAGE, BridgeError, BridgeResult, HOST_NAME, MAX_FRAME_SIZE};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_EXTENSION_BASE_URL: &str = "chrome-extension://focussentinel/";
pub const DEFAULT_INTERNAL_URL_PREFIXES: &[&str] = &["chrome://", "chrome-extension://"];

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(600);

fn invalid(reason: impl Into<String>) -> BridgeError {
    BridgeError::InvalidConfig {
        reason: reason.into(),
    }
}

fn validate_reconnect_delay(delay: Duration) -> BridgeResult<Duration> {
    if delay.is_zero() {
        return Err(invalid("reconnect delay cannot be zero"));
    }
    if delay > MAX_RECONNECT_DELAY {
        return Err(invalid("reconnect delay cannot be greater than 10 minutes"));
    }
    Ok(delay)
}

fn blocked_page_url(base: &str) -> BridgeResult<Url> {
    let base = Url::parse(base).map_err(|e| invalid(format!("extension base url: {e}")))?;
    if base.cannot_be_a_base() {
        return Err(invalid(format!("extension base url {base} cannot be a base")));
    }
    base.join(BLOCKED_PAGE)
        .map_err(|e| invalid(format!("blocked page url: {e}")))
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host_name: String,
    pub reconnect_delay: Duration,
    pub blocked_page_url: Url,
    pub max_frame_size: usize,
    pub internal_url_prefixes: Vec<String>,
}

#[bon]
impl BridgeConfig {
    /// Creates a bridge configuration using the builder pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use sentinel_bridge::BridgeConfig;
    /// use std::time::Duration;
    ///
    /// let config = BridgeConfig::builder()
    ///     .reconnect_delay(Duration::from_secs(1))
    ///     .unwrap()
    ///     .extension_base_url("chrome-extension://abcdef/")
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     config.blocked_page_url.as_str(),
    ///     "chrome-extension://abcdef/blocked.html"
    /// );
    /// ```
    #[builder]
    pub fn new(
        #[builder(default = HOST_NAME.to_string(), into)] host_name: String,
        #[builder(
            default = DEFAULT_RECONNECT_DELAY,
            with = |delay: Duration| -> Result<_, BridgeError> {
                validate_reconnect_delay(delay)
            },
        )]
        reconnect_delay: Duration,
        #[builder(default = DEFAULT_EXTENSION_BASE_URL.to_string(), into)]
        extension_base_url: String,
        #[builder(default = MAX_FRAME_SIZE)] max_frame_size: usize,
        #[builder(default = DEFAULT_INTERNAL_URL_PREFIXES.iter().map(|p| p.to_string()).collect())]
        internal_url_prefixes: Vec<String>,
    ) -> BridgeResult<Self> {
        if host_name.trim().is_empty() {
            return Err(invalid("host name cannot be empty"));
        }
        if max_frame_size == 0 {
            return Err(invalid("max frame size cannot be zero"));
        }

        Ok(Self {
            host_name,
            reconnect_delay,
            blocked_page_url: blocked_page_url(&extension_base_url)?,
            max_frame_size,
            internal_url_prefixes,
        })
    }
}

impl BridgeConfig {
    /// Browser-internal and extension pages are never sent to the host.
    pub fn is_internal_url(&self, url: &str) -> bool {
        self.internal_url_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }
}
