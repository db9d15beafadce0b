use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ledger::{Address, Amount, AssetId};

/// Failure inside the asset transfer mechanism.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{holder} holds insufficient {asset} for the transfer")]
    InsufficientFunds { holder: Address, asset: AssetId },
}

/// One-way transfer of assets into the irreversible sink.
///
/// Implementations move `amount` of `asset` from `from` into the sink and
/// report how much the sink actually received, determined by reading the
/// sink's balance before and after the transfer. Assets that deduct a fee
/// in transit therefore report less than `amount`; crediting always uses
/// the reported figure, never the requested one. Assets in the sink are
/// never transferred back out.
pub trait SinkTransfer {
    /// The address assets are swept into.
    fn sink(&self) -> &Address;

    /// Current sink holdings of `asset`.
    fn sink_balance(&self, asset: &AssetId) -> Amount;

    /// Moves `amount` of `asset` from `from` into the sink and returns the
    /// measured receipt.
    fn transfer_to_sink(
        &mut self,
        from: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<Amount, TransferError>;
}

/// In-memory asset bank with optional flat per-asset transfer fees.
///
/// Backs the CLI and the test suite. The fee models fee-on-transfer assets:
/// it is burned in transit, so the sink receives `amount - fee` and the
/// measured receipt reflects that.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InMemoryBank {
    sink: Address,
    balances: BTreeMap<Address, BTreeMap<AssetId, Amount>>,
    fees: BTreeMap<AssetId, Amount>,
}

impl InMemoryBank {
    pub fn new(sink: Address) -> Self {
        Self {
            sink,
            balances: BTreeMap::new(),
            fees: BTreeMap::new(),
        }
    }

    /// Faucet for fixtures and demos: mints `amount` of `asset` to `holder`.
    pub fn deposit(&mut self, holder: &Address, asset: &AssetId, amount: Amount) {
        let entry = self
            .balances
            .entry(holder.clone())
            .or_default()
            .entry(asset.clone())
            .or_insert(0);
        *entry += amount;
    }

    /// Configures a flat fee deducted from every transfer of `asset`.
    pub fn set_fee(&mut self, asset: AssetId, fee: Amount) {
        self.fees.insert(asset, fee);
    }

    pub fn balance_of(&self, holder: &Address, asset: &AssetId) -> Amount {
        self.balances
            .get(holder)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(0)
    }
}

impl SinkTransfer for InMemoryBank {
    fn sink(&self) -> &Address {
        &self.sink
    }

    fn sink_balance(&self, asset: &AssetId) -> Amount {
        self.balance_of(&self.sink, asset)
    }

    fn transfer_to_sink(
        &mut self,
        from: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<Amount, TransferError> {
        let held = self.balance_of(from, asset);
        if held < amount {
            return Err(TransferError::InsufficientFunds {
                holder: from.clone(),
                asset: asset.clone(),
            });
        }
        let before = self.sink_balance(asset);

        // Debit the full amount; the fee portion is burned in transit.
        let fee = self.fees.get(asset).copied().unwrap_or(0);
        let delivered = amount.saturating_sub(fee);
        let holder_assets = self
            .balances
            .entry(from.clone())
            .or_default();
        let held_entry = holder_assets.entry(asset.clone()).or_insert(0);
        *held_entry -= amount;
        if *held_entry == 0 {
            holder_assets.remove(asset);
        }
        let sink = self.sink.clone();
        *self
            .balances
            .entry(sink)
            .or_default()
            .entry(asset.clone())
            .or_insert(0) += delivered;

        let after = self.sink_balance(asset);
        let received = after - before;
        debug!(%from, %asset, amount, received, "swept to sink");
        Ok(received)
    }
}
