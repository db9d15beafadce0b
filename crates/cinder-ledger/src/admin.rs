use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::Address;

/// Two-step ownership handoff gating ledger configuration.
///
/// The current owner proposes a successor; authority moves only once the
/// successor accepts. A pending proposal can be replaced by proposing again.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminControl {
    owner: Address,
    pending: Option<Address>,
}

impl AdminControl {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pending: None,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn pending(&self) -> Option<&Address> {
        self.pending.as_ref()
    }

    /// Fails with `UnauthorizedCaller` unless `caller` is the current owner.
    pub fn require_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if caller != &self.owner {
            return Err(LedgerError::UnauthorizedCaller {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Proposes `next` as the successor. Owner-only; rejects a null address.
    pub fn propose_owner(&mut self, caller: &Address, next: &Address) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        if next.is_empty() {
            return Err(LedgerError::InvalidAddress("owner"));
        }
        self.pending = Some(next.clone());
        Ok(())
    }

    /// Completes the handoff; only the proposed successor may accept.
    pub fn accept_owner(&mut self, caller: &Address) -> Result<(), LedgerError> {
        match self.pending.as_ref() {
            Some(pending) if pending == caller => {
                self.owner = caller.clone();
                self.pending = None;
                info!(owner = %self.owner, "ownership transferred");
                Ok(())
            }
            _ => Err(LedgerError::UnauthorizedCaller {
                caller: caller.clone(),
            }),
        }
    }
}
