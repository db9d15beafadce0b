use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, AssetId};

/// Listing entry for an asset in the eligibility registry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetListing {
    pub enabled: bool,
    pub decimals: u8,
    pub units_per_reference: Amount,
    /// Cumulative sponsorship cap in units; zero means uncapped.
    pub cap_units: Amount,
}

impl AssetListing {
    /// Cap as an explicit option, resolving the zero-means-uncapped
    /// sentinel once at the boundary.
    pub fn cap(&self) -> Option<Amount> {
        if self.cap_units == 0 {
            None
        } else {
            Some(self.cap_units)
        }
    }
}

/// Read-only view of asset eligibility, consulted before crediting.
pub trait AssetRegistry {
    /// Returns the listing for `asset`, or `None` if the asset is unlisted.
    fn lookup(&self, asset: &AssetId) -> Option<AssetListing>;
}

/// Registry backed by an in-memory map, used by the CLI and in tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InMemoryRegistry {
    listings: BTreeMap<AssetId, AssetListing>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `asset`, replacing any previous listing.
    pub fn list(&mut self, asset: AssetId, listing: AssetListing) {
        self.listings.insert(asset, listing);
    }

    /// Flips the enabled flag of a listed asset; returns `false` when the
    /// asset is not listed.
    pub fn set_enabled(&mut self, asset: &AssetId, enabled: bool) -> bool {
        match self.listings.get_mut(asset) {
            Some(listing) => {
                listing.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Updates the cumulative cap of a listed asset; returns `false` when
    /// the asset is not listed.
    pub fn set_cap(&mut self, asset: &AssetId, cap_units: Amount) -> bool {
        match self.listings.get_mut(asset) {
            Some(listing) => {
                listing.cap_units = cap_units;
                true
            }
            None => false,
        }
    }
}

impl AssetRegistry for InMemoryRegistry {
    fn lookup(&self, asset: &AssetId) -> Option<AssetListing> {
        self.listings.get(asset).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(cap_units: Amount) -> AssetListing {
        AssetListing {
            enabled: true,
            decimals: 8,
            units_per_reference: 100,
            cap_units,
        }
    }

    #[test]
    fn zero_cap_reads_as_uncapped() {
        assert_eq!(listing(0).cap(), None);
        assert_eq!(listing(5_000).cap(), Some(5_000));
    }

    #[test]
    fn lookup_returns_none_for_unlisted_assets() {
        let registry = InMemoryRegistry::new();
        assert!(registry.lookup(&"asset-x".to_string()).is_none());
    }

    #[test]
    fn enable_and_cap_updates_apply_to_listed_assets_only() {
        let mut registry = InMemoryRegistry::new();
        let asset = "asset-a".to_string();
        registry.list(asset.clone(), listing(0));

        assert!(registry.set_enabled(&asset, false));
        assert!(!registry.lookup(&asset).unwrap().enabled);

        assert!(registry.set_cap(&asset, 1_000));
        assert_eq!(registry.lookup(&asset).unwrap().cap(), Some(1_000));

        assert!(!registry.set_enabled(&"ghost".to_string(), true));
        assert!(!registry.set_cap(&"ghost".to_string(), 1));
    }
}
