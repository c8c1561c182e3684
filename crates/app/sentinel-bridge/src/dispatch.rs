use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::{
    ledger::PendingRequest,
    protocol::{TabId, Verdict},
};

/// Tab-control side of the browser.
///
/// Called from the bridge's event loop, so implementations should hand the
/// work off rather than block.
pub trait TabController: Send + Sync {
    fn redirect(&self, tab: TabId, url: &Url) -> anyhow::Result<()>;
}

impl<T: TabController + ?Sized> TabController for Arc<T> {
    fn redirect(&self, tab: TabId, url: &Url) -> anyhow::Result<()> {
        (**self).redirect(tab, url)
    }
}

/// Applies the side effect of a matched `(request, response)` pair.
pub struct Dispatcher<T> {
    tabs: T,
    blocked_page_url: Url,
}

impl<T: TabController> Dispatcher<T> {
    pub fn new(tabs: T, blocked_page_url: Url) -> Self {
        Self {
            tabs,
            blocked_page_url,
        }
    }

    /// Fire-and-forget: failures are logged and dropped.
    pub fn dispatch(&self, request: PendingRequest, response: Value) {
        match request {
            PendingRequest::NavigationCheck { tab, url } => {
                if Verdict::from_response(&response) != Verdict::Block {
                    return;
                }
                let Some(tab) = tab else {
                    debug!("Host blocked {} but the request had no usable tab id", url);
                    return;
                };
                info!(%tab, %url, "Blocking navigation");
                if let Err(e) = self.tabs.redirect(tab, &self.blocked_page_url) {
                    debug!("Failed to redirect tab {} to blocked page: {:#}", tab, e);
                }
            }
            PendingRequest::ConfigUpdate { responder } => {
                let Some(responder) = responder else {
                    return;
                };
                if responder.send(response).is_err() {
                    debug!("Config update caller went away before the host replied");
                }
            }
        }
    }
}
