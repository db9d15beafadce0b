use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::admin::AdminControl;
use crate::bank::SinkTransfer;
use crate::error::LedgerError;
use crate::registry::AssetRegistry;

pub type Address = String;
pub type AssetId = String;
pub type Amount = u64;

/// Per-beneficiary account state.
///
/// The balance map only ever stores strictly positive amounts; an entry is
/// removed the moment it reaches zero. The active-asset count is therefore
/// the map's length.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BeneficiaryAccount {
    pub sponsor: Option<Address>,
    pub balances: BTreeMap<AssetId, Amount>,
    /// Lifetime units allocated to this beneficiary; never decremented.
    pub lifetime_allocated: Amount,
}

impl BeneficiaryAccount {
    pub fn active_assets(&self) -> u32 {
        self.balances.len() as u32
    }
}

/// Append-only audit records emitted by the ledger operations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    EngineConfigured {
        engine: Address,
    },
    Sponsored {
        sponsor: Address,
        beneficiary: Address,
        asset: AssetId,
        requested: Amount,
        new_balance: Amount,
    },
    SponsoredReceived {
        sponsor: Address,
        beneficiary: Address,
        asset: AssetId,
        requested: Amount,
        received: Amount,
    },
    Consumed {
        beneficiary: Address,
        asset: AssetId,
        amount: Amount,
        remaining: Amount,
    },
    Forfeited {
        beneficiary: Address,
        asset: AssetId,
        amount: Amount,
    },
    SponsorCleared {
        beneficiary: Address,
        sponsor: Address,
    },
    ForfeitSummary {
        beneficiary: Address,
        assets_cleared: u32,
        total_forfeited: Amount,
        sponsor_cleared: bool,
    },
}

/// Result of a forfeiture call, mirrored by the summary audit record.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForfeitOutcome {
    pub assets_cleared: u32,
    pub total_forfeited: Amount,
    pub sponsor_cleared: bool,
}

/// Serializable copy of the ledger state with a SHA-256 commitment digest.
///
/// The digest covers accounts and cumulative totals only; the event log is
/// carried along for export but is not part of the commitment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub accounts: BTreeMap<Address, BeneficiaryAccount>,
    pub asset_totals: BTreeMap<AssetId, Amount>,
    pub events: Vec<LedgerEvent>,
    pub digest: [u8; 32],
}

impl LedgerSnapshot {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// The accounting core: sponsor assignment, unit balances, caps, and the
/// consume/forfeit paths.
///
/// `LedgerCore` owns every piece of mutable accounting state. Eligibility
/// lookups and asset movement are injected per call, so the core stays plain
/// serializable data: constructible, resettable, and testable without a host
/// environment. Each operation checks every precondition before its first
/// mutation; a returned error always means unchanged ledger state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerCore {
    admin: AdminControl,
    engine: Option<Address>,
    accounts: BTreeMap<Address, BeneficiaryAccount>,
    asset_totals: BTreeMap<AssetId, Amount>,
    events: Vec<LedgerEvent>,
}

impl LedgerCore {
    pub fn new(owner: Address) -> Self {
        Self {
            admin: AdminControl::new(owner),
            engine: None,
            accounts: BTreeMap::new(),
            asset_totals: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    // ---- configuration ----

    /// Assigns the consuming engine. Owner-gated; rejects a null address.
    pub fn set_engine(&mut self, caller: &Address, engine: &Address) -> Result<(), LedgerError> {
        self.admin.require_owner(caller)?;
        if engine.is_empty() {
            return Err(LedgerError::InvalidAddress("engine"));
        }
        self.engine = Some(engine.clone());
        self.events.push(LedgerEvent::EngineConfigured {
            engine: engine.clone(),
        });
        info!(%engine, "consuming engine configured");
        Ok(())
    }

    pub fn propose_owner(&mut self, caller: &Address, next: &Address) -> Result<(), LedgerError> {
        self.admin.propose_owner(caller, next)
    }

    pub fn accept_owner(&mut self, caller: &Address) -> Result<(), LedgerError> {
        self.admin.accept_owner(caller)
    }

    // ---- read surface ----

    pub fn owner(&self) -> &Address {
        self.admin.owner()
    }

    pub fn engine(&self) -> Option<&Address> {
        self.engine.as_ref()
    }

    pub fn account(&self, beneficiary: &Address) -> Option<&BeneficiaryAccount> {
        self.accounts.get(beneficiary)
    }

    pub fn sponsor_of(&self, beneficiary: &Address) -> Option<&Address> {
        self.accounts
            .get(beneficiary)
            .and_then(|account| account.sponsor.as_ref())
    }

    pub fn balance_of(&self, beneficiary: &Address, asset: &AssetId) -> Amount {
        self.accounts
            .get(beneficiary)
            .and_then(|account| account.balances.get(asset))
            .copied()
            .unwrap_or(0)
    }

    pub fn active_asset_count(&self, beneficiary: &Address) -> u32 {
        self.accounts
            .get(beneficiary)
            .map(|account| account.active_assets())
            .unwrap_or(0)
    }

    /// Lifetime sponsored units per asset; unaffected by consumption and
    /// forfeiture.
    pub fn cumulative_sponsored(&self, asset: &AssetId) -> Amount {
        self.asset_totals.get(asset).copied().unwrap_or(0)
    }

    pub fn lifetime_allocated(&self, beneficiary: &Address) -> Amount {
        self.accounts
            .get(beneficiary)
            .map(|account| account.lifetime_allocated)
            .unwrap_or(0)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    // ---- sponsor (credit) ----

    /// Sweeps `amount` of `asset` from the caller into the sink and credits
    /// the beneficiary with the units the sink actually received.
    ///
    /// The caller becomes the beneficiary's sponsor on first credit; an
    /// assigned sponsor only changes once the beneficiary holds no balance
    /// at all. Crediting uses the measured receipt, so fee-on-transfer
    /// assets credit less than requested. Returns the received amount.
    pub fn sponsor(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        asset: &AssetId,
        amount: Amount,
        registry: &impl AssetRegistry,
        bank: &mut impl SinkTransfer,
    ) -> Result<Amount, LedgerError> {
        if beneficiary.is_empty() {
            return Err(LedgerError::InvalidAddress("beneficiary"));
        }
        if asset.is_empty() {
            return Err(LedgerError::InvalidAddress("asset"));
        }
        if beneficiary == caller {
            return Err(LedgerError::SelfSponsorship(caller.clone()));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let listing = registry
            .lookup(asset)
            .filter(|listing| listing.enabled)
            .ok_or_else(|| LedgerError::AssetNotEligible {
                asset: asset.clone(),
            })?;

        if let Some(account) = self.accounts.get(beneficiary) {
            if let Some(sponsor) = &account.sponsor {
                if sponsor != caller && account.active_assets() > 0 {
                    return Err(LedgerError::SponsorLocked {
                        beneficiary: beneficiary.clone(),
                        sponsor: sponsor.clone(),
                    });
                }
            }
        }

        // The sweep runs before any ledger mutation; everything below is a
        // pure function of (requested, received), so a nested call through
        // the transfer mechanism can never observe half-applied state.
        let received = bank.transfer_to_sink(caller, asset, amount)?;
        if received == 0 {
            return Err(LedgerError::ZeroReceived {
                asset: asset.clone(),
            });
        }
        let cumulative = self.cumulative_sponsored(asset);
        if let Some(cap) = listing.cap() {
            if cumulative + received > cap {
                return Err(LedgerError::CapExceeded {
                    asset: asset.clone(),
                    cap,
                    cumulative,
                    received,
                });
            }
        }

        self.asset_totals.insert(asset.clone(), cumulative + received);
        let account = self.accounts.entry(beneficiary.clone()).or_default();
        account.sponsor = Some(caller.clone());
        let balance = account.balances.entry(asset.clone()).or_insert(0);
        *balance += received;
        let new_balance = *balance;
        account.lifetime_allocated += received;

        self.events.push(LedgerEvent::Sponsored {
            sponsor: caller.clone(),
            beneficiary: beneficiary.clone(),
            asset: asset.clone(),
            requested: amount,
            new_balance,
        });
        self.events.push(LedgerEvent::SponsoredReceived {
            sponsor: caller.clone(),
            beneficiary: beneficiary.clone(),
            asset: asset.clone(),
            requested: amount,
            received,
        });
        info!(
            sponsor = %caller,
            %beneficiary,
            %asset,
            requested = amount,
            received,
            new_balance,
            "sponsorship credited"
        );
        Ok(received)
    }

    // ---- consume (debit) ----

    /// Debits a beneficiary's balance. Only the configured consuming engine
    /// may call this. Returns the remaining balance.
    pub fn consume(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        match &self.engine {
            Some(engine) if engine == caller => {}
            _ => {
                return Err(LedgerError::UnauthorizedCaller {
                    caller: caller.clone(),
                })
            }
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let account =
            self.accounts
                .get_mut(beneficiary)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    asset: asset.clone(),
                    balance: 0,
                    requested: amount,
                })?;
        let balance =
            account
                .balances
                .get_mut(asset)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    asset: asset.clone(),
                    balance: 0,
                    requested: amount,
                })?;
        if *balance < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: asset.clone(),
                balance: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        let remaining = *balance;
        if remaining == 0 {
            account.balances.remove(asset);
        }
        self.events.push(LedgerEvent::Consumed {
            beneficiary: beneficiary.clone(),
            asset: asset.clone(),
            amount,
            remaining,
        });
        debug!(%beneficiary, %asset, amount, remaining, "units consumed");
        Ok(remaining)
    }

    // ---- clear / forfeit ----

    /// Clears the caller's sponsor once every balance has been drained.
    /// This is the ordinary path for a beneficiary that has fully consumed
    /// its balances and wishes to accept a new sponsor.
    pub fn clear_sponsor_if_empty(&mut self, caller: &Address) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(caller)
            .ok_or(LedgerError::NothingToForfeit)?;
        let sponsor = account
            .sponsor
            .clone()
            .ok_or(LedgerError::NothingToForfeit)?;
        let active = account.active_assets();
        if active > 0 {
            return Err(LedgerError::NotEmpty { active });
        }
        account.sponsor = None;
        self.events.push(LedgerEvent::SponsorCleared {
            beneficiary: caller.clone(),
            sponsor,
        });
        debug!(beneficiary = %caller, "sponsor cleared");
        Ok(())
    }

    /// Zeroes the caller's balance for each listed asset and clears the
    /// sponsor once no balance remains.
    ///
    /// Assets with zero balance are silently skipped; listing only a subset
    /// of held assets forfeits just that subset and leaves the sponsor
    /// assigned. Callers wanting a full reset must enumerate every asset
    /// they hold.
    pub fn clear_sponsor_and_forfeit(
        &mut self,
        caller: &Address,
        assets: &[AssetId],
    ) -> Result<ForfeitOutcome, LedgerError> {
        let account = self
            .accounts
            .get_mut(caller)
            .ok_or(LedgerError::NothingToForfeit)?;

        // Only positive balances are stored, so removal both zeroes the
        // balance and decrements the active-asset count; a duplicate list
        // entry finds the balance already drained and is skipped.
        let mut forfeited: Vec<(AssetId, Amount)> = Vec::new();
        let mut total_forfeited: Amount = 0;
        for asset in assets {
            if let Some(amount) = account.balances.remove(asset) {
                total_forfeited += amount;
                forfeited.push((asset.clone(), amount));
            }
        }
        if total_forfeited == 0 {
            return Err(LedgerError::NothingToForfeit);
        }
        for (asset, amount) in &forfeited {
            self.events.push(LedgerEvent::Forfeited {
                beneficiary: caller.clone(),
                asset: asset.clone(),
                amount: *amount,
            });
        }
        let sponsor_cleared = if account.active_assets() == 0 {
            match account.sponsor.take() {
                Some(sponsor) => {
                    self.events.push(LedgerEvent::SponsorCleared {
                        beneficiary: caller.clone(),
                        sponsor,
                    });
                    true
                }
                None => false,
            }
        } else {
            false
        };
        let outcome = ForfeitOutcome {
            assets_cleared: forfeited.len() as u32,
            total_forfeited,
            sponsor_cleared,
        };
        self.events.push(LedgerEvent::ForfeitSummary {
            beneficiary: caller.clone(),
            assets_cleared: outcome.assets_cleared,
            total_forfeited,
            sponsor_cleared,
        });
        info!(
            beneficiary = %caller,
            assets_cleared = outcome.assets_cleared,
            total_forfeited,
            sponsor_cleared,
            "balances forfeited"
        );
        Ok(outcome)
    }

    // ---- snapshot ----

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            accounts: self.accounts.clone(),
            asset_totals: self.asset_totals.clone(),
            events: self.events.clone(),
            digest: self.state_digest(),
        }
    }

    /// SHA-256 commitment over accounts and cumulative totals.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (beneficiary, account) in &self.accounts {
            let mut hasher = Sha256::new();
            hasher.update(b"account");
            hasher.update(beneficiary.as_bytes());
            match &account.sponsor {
                Some(sponsor) => {
                    hasher.update([1u8]);
                    hasher.update(sponsor.as_bytes());
                }
                None => hasher.update([0u8]),
            }
            hasher.update(account.lifetime_allocated.to_le_bytes());
            for (asset, amount) in &account.balances {
                hasher.update(asset.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
            leaves.push(hasher.finalize().into());
        }
        for (asset, total) in &self.asset_totals {
            let mut hasher = Sha256::new();
            hasher.update(b"asset");
            hasher.update(asset.as_bytes());
            hasher.update(total.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        fold_digest(leaves)
    }
}

fn fold_digest(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"cinder-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(&chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
