// =============================================================================
// Position State Account
// =============================================================================
// One Position PDA per (pool, user). Each entry is keyed by a non-stable
// asset and a position class; the stable unit is the shared leg between the
// two classes. Every share delta the ledger produces is persisted here 1:1.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::MAX_POSITION_ENTRIES;
use crate::error::LedgerError;

/// The two position classes.
///
/// AssetToStable: collateral in the asset, debt in the stable unit.
/// StableToAsset: collateral in the stable unit, debt in the asset.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace)]
pub enum PositionClass {
    AssetToStable,
    StableToAsset,
}

/// Per-asset, per-class share holdings.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, InitSpace)]
pub struct PositionEntry {
    /// The non-stable asset keying this entry
    pub mint: Pubkey,
    pub class: PositionClass,
    /// Shares of the collateral asset's normal-deposit bucket
    pub deposited_share: u128,
    /// Shares of the collateral asset's collateral-only bucket
    pub collateral_only_share: u128,
    /// Shares of the debt asset's borrowed bucket
    pub borrowed_share: u128,
    /// A protected entry is exempt from rebalancing and liquidation
    pub protected: bool,
}

impl PositionEntry {
    pub fn is_empty(&self) -> bool {
        self.deposited_share == 0 && self.collateral_only_share == 0 && self.borrowed_share == 0
    }
}

/// Tracks one user's entries in one pool.
/// PDA: ["position", pool, owner]
#[account]
#[derive(InitSpace)]
pub struct Position {
    pub pool: Pubkey,
    pub owner: Pubkey,
    pub bump: u8,
    #[max_len(MAX_POSITION_ENTRIES)]
    pub entries: Vec<PositionEntry>,
}

impl Position {
    pub fn entry_index(&self, mint: &Pubkey, class: PositionClass) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.mint == *mint && e.class == class)
    }

    pub fn entry(&self, mint: &Pubkey, class: PositionClass) -> Option<&PositionEntry> {
        self.entry_index(mint, class).map(|i| &self.entries[i])
    }

    /// Find or create the entry for (mint, class).
    pub fn entry_mut(&mut self, mint: &Pubkey, class: PositionClass) -> Result<&mut PositionEntry> {
        if let Some(idx) = self.entry_index(mint, class) {
            return Ok(&mut self.entries[idx]);
        }
        require!(
            self.entries.len() < MAX_POSITION_ENTRIES,
            LedgerError::TooManyPositionEntries
        );
        self.entries.push(PositionEntry {
            mint: *mint,
            class,
            deposited_share: 0,
            collateral_only_share: 0,
            borrowed_share: 0,
            protected: false,
        });
        let idx = self.entries.len() - 1;
        Ok(&mut self.entries[idx])
    }

    pub fn record_deposit(
        &mut self,
        mint: &Pubkey,
        class: PositionClass,
        share: u128,
        collateral_only: bool,
    ) -> Result<()> {
        let entry = self.entry_mut(mint, class)?;
        let slot = if collateral_only {
            &mut entry.collateral_only_share
        } else {
            &mut entry.deposited_share
        };
        *slot = slot.checked_add(share).ok_or(LedgerError::MathOverflow)?;
        Ok(())
    }

    pub fn record_withdrawal(
        &mut self,
        mint: &Pubkey,
        class: PositionClass,
        share: u128,
        collateral_only: bool,
    ) -> Result<()> {
        let entry = self
            .entry_index(mint, class)
            .map(|i| &mut self.entries[i])
            .ok_or(LedgerError::InsufficientBalance)?;
        let slot = if collateral_only {
            &mut entry.collateral_only_share
        } else {
            &mut entry.deposited_share
        };
        *slot = slot
            .checked_sub(share)
            .ok_or(LedgerError::InsufficientBalance)?;
        Ok(())
    }

    pub fn record_borrow(&mut self, mint: &Pubkey, class: PositionClass, share: u128) -> Result<()> {
        let entry = self.entry_mut(mint, class)?;
        entry.borrowed_share = entry
            .borrowed_share
            .checked_add(share)
            .ok_or(LedgerError::MathOverflow)?;
        Ok(())
    }

    pub fn record_repay(&mut self, mint: &Pubkey, class: PositionClass, share: u128) -> Result<()> {
        let entry = self
            .entry_index(mint, class)
            .map(|i| &mut self.entries[i])
            .ok_or(LedgerError::InsufficientBalance)?;
        entry.borrowed_share = entry
            .borrowed_share
            .checked_sub(share)
            .ok_or(LedgerError::InsufficientBalance)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position {
            pool: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            bump: 255,
            entries: Vec::new(),
        }
    }

    #[test]
    fn entries_are_keyed_by_mint_and_class() {
        let mint = Pubkey::new_unique();
        let mut pos = position();
        pos.record_deposit(&mint, PositionClass::AssetToStable, 100, false)
            .unwrap();
        pos.record_deposit(&mint, PositionClass::StableToAsset, 50, false)
            .unwrap();
        assert_eq!(pos.entries.len(), 2);
        assert_eq!(
            pos.entry(&mint, PositionClass::AssetToStable)
                .unwrap()
                .deposited_share,
            100
        );
        assert_eq!(
            pos.entry(&mint, PositionClass::StableToAsset)
                .unwrap()
                .deposited_share,
            50
        );
    }

    #[test]
    fn withdrawal_over_holding_fails() {
        let mint = Pubkey::new_unique();
        let mut pos = position();
        pos.record_deposit(&mint, PositionClass::AssetToStable, 100, false)
            .unwrap();
        let err = pos
            .record_withdrawal(&mint, PositionClass::AssetToStable, 101, false)
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance.into());
    }

    #[test]
    fn repay_without_borrow_fails() {
        let mint = Pubkey::new_unique();
        let mut pos = position();
        let err = pos
            .record_repay(&mint, PositionClass::StableToAsset, 1)
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance.into());
    }
}
