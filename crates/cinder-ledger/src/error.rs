use thiserror::Error;

use crate::bank::TransferError;
use crate::ledger::{Address, Amount, AssetId};

/// Canonical error type exposed by the ledger operations.
///
/// Every variant is a distinct failure condition. Operations fail
/// atomically, so a returned error means the ledger state is unchanged.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A required address argument was null (empty).
    #[error("invalid address: {0} must not be null")]
    InvalidAddress(&'static str),

    /// A caller attempted to sponsor itself.
    #[error("self-sponsorship is forbidden for {0}")]
    SelfSponsorship(Address),

    /// The asset is unlisted or disabled in the eligibility registry.
    #[error("asset {asset} is not eligible for sponsorship")]
    AssetNotEligible { asset: AssetId },

    /// Sponsor switch attempted while the beneficiary still holds balance.
    #[error("beneficiary {beneficiary} is locked to sponsor {sponsor}")]
    SponsorLocked {
        beneficiary: Address,
        sponsor: Address,
    },

    /// The caller is not authorized for the operation.
    #[error("caller {caller} is not authorized")]
    UnauthorizedCaller { caller: Address },

    /// A zero amount where a positive one is required.
    #[error("amount must be nonzero")]
    InvalidAmount,

    /// Debit larger than the current balance.
    #[error("insufficient balance of {asset}: have {balance}, requested {requested}")]
    InsufficientBalance {
        asset: AssetId,
        balance: Amount,
        requested: Amount,
    },

    /// Crediting would push the asset's cumulative sponsored total past its cap.
    #[error("cap exceeded for {asset}: cap {cap}, cumulative {cumulative}, received {received}")]
    CapExceeded {
        asset: AssetId,
        cap: Amount,
        cumulative: Amount,
        received: Amount,
    },

    /// Forfeiture found no positive balance among the supplied assets, or a
    /// clear was requested with no sponsor assigned.
    #[error("nothing to forfeit or clear")]
    NothingToForfeit,

    /// Clear-if-empty while assets with positive balance remain.
    #[error("{active} assets still hold balance")]
    NotEmpty { active: u32 },

    /// The sink measured a zero receipt despite a nonzero request.
    #[error("sink received zero units of {asset}")]
    ZeroReceived { asset: AssetId },

    /// Failure inside the asset transfer collaborator.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
}
