//! Recovery from expired session cookies.

use reqwest::StatusCode;
use revisor_core::{merge_set_cookie_headers, CookieMap, SessionState};
use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::platform::PlatformClient;

/// Asks the platform for fresh cookies and persists them.
pub struct SessionRefresher {
    client: PlatformClient,
    store: Option<ConfigStore>,
}

impl SessionRefresher {
    /// `store` receives refreshed cookies; without one they only live in memory.
    pub fn new(client: PlatformClient, store: Option<ConfigStore>) -> Self {
        Self { client, store }
    }

    /// Request the site root with the current cookies and return whatever
    /// cookies the server set, merged in header order.
    ///
    /// Returns `None` when the request fails, the status is not 200, or no
    /// cookies were set. The caller applies the result to its session.
    pub async fn refresh(&self, current: &SessionState) -> Option<CookieMap> {
        info!("Refreshing session cookies from {}", self.client.base_url());

        let probe = match self.client.probe_root(current).await {
            Ok(probe) => probe,
            Err(e) => {
                error!("Cookie refresh request failed: {}", e);
                return None;
            }
        };

        if probe.status != StatusCode::OK {
            error!("Cookie refresh failed with status {}", probe.status);
            return None;
        }

        if probe.set_cookies.is_empty() {
            warn!("Cookie refresh response carried no Set-Cookie headers");
            return None;
        }

        let refreshed = merge_set_cookie_headers(probe.set_cookies.iter().map(String::as_str));
        if refreshed.is_empty() {
            warn!("Cookie refresh response carried no usable cookies");
            return None;
        }

        for name in refreshed.keys() {
            info!("Refreshed cookie {}", name);
        }

        self.persist(&refreshed);
        Some(refreshed)
    }

    fn persist(&self, cookies: &CookieMap) {
        let Some(store) = &self.store else {
            return;
        };

        match store.save_cookies(cookies) {
            Ok(()) => info!("Saved refreshed cookies to {}", store.path().display()),
            Err(e) => error!(
                "Failed to save refreshed cookies to {}: {:#}",
                store.path().display(),
                e
            ),
        }
    }
}
