//! Execution environment: local origin, single-activation guard, discovery marker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

use crate::identity::SecurityToken;

/// Query parameter carrying the security token.
pub const DISCOVERY_PARAM: &str = "gateway";

/// Where the gateway runs. Cloning shares the activation flag, so every clone
/// describes the same context and at most one gateway can be active in it.
#[derive(Debug, Clone)]
pub struct Environment {
    origin: String,
    active: Arc<AtomicBool>,
}

impl Environment {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the context active. Returns `None` if a gateway already holds it.
    pub fn claim(&self) -> Option<ActivationClaim> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActivationClaim {
                flag: self.active.clone(),
                released: false,
            })
    }
}

/// Held by the active gateway; releases the context on `release` or drop.
#[derive(Debug)]
pub struct ActivationClaim {
    flag: Arc<AtomicBool>,
    released: bool,
}

impl ActivationClaim {
    pub fn release(&mut self) {
        if !self.released {
            self.flag.store(false, Ordering::Release);
            self.released = true;
        }
    }
}

impl Drop for ActivationClaim {
    fn drop(&mut self) {
        self.release();
    }
}

/// The context's address, as the host exposes it.
pub trait AddressBar {
    fn current(&self) -> String;
    /// Replace the address without navigating.
    fn replace(&mut self, address: &str);
}

/// Address carrying the discovery marker: origin + path + `?gateway=<token>`.
/// `None` if the address already mentions a gateway or cannot be parsed.
pub fn discovery_address(address: &str, token: &SecurityToken) -> Option<String> {
    if address.contains(DISCOVERY_PARAM) {
        return None;
    }
    let mut url = Url::parse(address).ok()?;
    url.set_fragment(None);
    url.set_query(Some(&format!("{DISCOVERY_PARAM}={token}")));
    Some(url.into())
}
