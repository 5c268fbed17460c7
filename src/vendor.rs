use std::sync::OnceLock;

use mac_oui::Oui;
use tracing::warn;

/// Maps a hardware address to the manufacturer registered for its prefix.
pub trait VendorLookup: Send + Sync {
    fn lookup(&self, mac: &str) -> Option<String>;
}

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("OUI database unavailable: {e:?}");
                None
            }
        })
        .as_ref()
}

/// Lookup backed by the IEEE OUI registry bundled with `mac_oui`.
pub struct OuiVendors;

impl VendorLookup for OuiVendors {
    fn lookup(&self, mac: &str) -> Option<String> {
        if mac.is_empty() {
            return None;
        }
        match oui_db()?.lookup_by_mac(mac) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Lookup that never knows any vendor.
pub struct NoVendors;

impl VendorLookup for NoVendors {
    fn lookup(&self, _mac: &str) -> Option<String> {
        None
    }
}
