//! Messages exchanged with the policy host and the browser-side events that
//! produce them.

use sentinel_settings::FocusConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BLOCK_ACTION;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    CheckUrl { url: String },
    UpdateConfig { payload: FocusConfig },
}

/// The host's answer to a navigation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Block,
    Allow,
}

impl Verdict {
    /// Only an exact `"BLOCK"` action blocks; anything else lets the
    /// navigation through.
    pub fn from_response(response: &Value) -> Self {
        match response.get("action").and_then(Value::as_str) {
            Some(BLOCK_ACTION) => Verdict::Block,
            _ => Verdict::Allow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TabId(i64);

impl TabId {
    /// Browser tab ids are positive; `-1` marks navigations outside a tab.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// "About to navigate" notification from the navigation observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    #[serde(default)]
    pub tab_id: Option<i64>,
    pub url: String,
    #[serde(default = "top_level_default")]
    pub is_top_level_frame: bool,
}

fn top_level_default() -> bool {
    true
}

impl NavigationEvent {
    /// Builds an event from the browser's raw `(tabId, url, frameId)` triple.
    /// Frame `0` is the top-level frame.
    pub fn from_web_navigation(tab_id: i64, url: impl Into<String>, frame_id: i64) -> Self {
        Self {
            tab_id: Some(tab_id),
            url: url.into(),
            is_top_level_frame: frame_id == 0,
        }
    }

    pub fn tab(&self) -> Option<TabId> {
        self.tab_id.and_then(TabId::new)
    }
}
