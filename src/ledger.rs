// 3.0 ledger.rs: append-only journal of every balance change.
// each entry carries balance before/after so the sequence of balance_after values
// is the account's balance history. no lock of its own: the engine serializes writers.

use crate::types::{AccountId, LedgerEntryId, Money, Timestamp, TradeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Deposit,
    Withdrawal,
    Adjustment,
    Bonus,
    Commission,
    RealizedPnl,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerEntryType::Deposit => "DEPOSIT",
            LedgerEntryType::Withdrawal => "WITHDRAWAL",
            LedgerEntryType::Adjustment => "ADJUSTMENT",
            LedgerEntryType::Bonus => "BONUS",
            LedgerEntryType::Commission => "COMMISSION",
            LedgerEntryType::RealizedPnl => "REALIZED_PNL",
        };
        f.pad(name)
    }
}

// what the entry points back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryReference {
    Trade(TradeId),
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: AccountId,
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub currency: String,
    pub description: String,
    pub reference: EntryReference,
    pub admin_id: Option<String>,
    pub payment_method: Option<String>,
    pub payment_ref: Option<String>,
    pub created_at: Timestamp,
}

/// Optional metadata for admin postings.
#[derive(Debug, Clone, Default)]
pub struct PostingInfo {
    pub method: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    pub admin_id: Option<String>,
}

impl PostingInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn admin(mut self, admin_id: impl Into<String>) -> Self {
        self.admin_id = Some(admin_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("{entry_type} amount must be positive, got {amount}")]
    NonPositiveAmount {
        entry_type: LedgerEntryType,
        amount: Money,
    },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Money, available: Money },

    #[error("Adjustment of {adjustment} would leave balance {balance} negative")]
    NegativeBalance { adjustment: Money, balance: Money },

    #[error("Posting {amount} to balance {balance} overflows")]
    Overflow { amount: Money, balance: Money },
}

#[derive(Debug, Clone)]
pub struct Ledger {
    entries: HashMap<AccountId, Vec<LedgerEntry>>,
    next_id: u64,
    currency: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl Ledger {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
            currency: currency.into(),
        }
    }

    /// Last known balance: the newest entry's balance_after, zero if none.
    pub fn balance(&self, account_id: AccountId) -> Money {
        self.entries
            .get(&account_id)
            .and_then(|entries| entries.last())
            .map(|entry| entry.balance_after)
            .unwrap_or_default()
    }

    pub fn deposit(
        &mut self,
        account_id: AccountId,
        amount: Money,
        info: PostingInfo,
    ) -> Result<LedgerEntry, LedgerError> {
        ensure_positive(LedgerEntryType::Deposit, amount)?;
        let entry = self.append(account_id, LedgerEntryType::Deposit, amount, EntryReference::Admin, info)?;
        tracing::info!(account = %account_id, amount = %amount, balance = %entry.balance_after, "ledger deposit");
        Ok(entry)
    }

    pub fn withdraw(
        &mut self,
        account_id: AccountId,
        amount: Money,
        info: PostingInfo,
    ) -> Result<LedgerEntry, LedgerError> {
        ensure_positive(LedgerEntryType::Withdrawal, amount)?;
        let available = self.balance(account_id);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let entry = self.append(
            account_id,
            LedgerEntryType::Withdrawal,
            amount.negate(),
            EntryReference::Admin,
            info,
        )?;
        tracing::info!(account = %account_id, amount = %amount, balance = %entry.balance_after, "ledger withdrawal");
        Ok(entry)
    }

    /// Signed manual correction. Refused if it would take the balance below zero.
    pub fn adjust(
        &mut self,
        account_id: AccountId,
        amount: Money,
        mut info: PostingInfo,
    ) -> Result<LedgerEntry, LedgerError> {
        let before = self.balance(account_id);
        let balance = before
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount, balance: before })?;
        if balance.is_negative() {
            return Err(LedgerError::NegativeBalance {
                adjustment: amount,
                balance,
            });
        }
        info.method.get_or_insert_with(|| "MANUAL".to_string());
        let entry = self.append(account_id, LedgerEntryType::Adjustment, amount, EntryReference::Admin, info)?;
        tracing::info!(account = %account_id, amount = %amount, balance = %entry.balance_after, "ledger adjustment");
        Ok(entry)
    }

    pub fn add_bonus(
        &mut self,
        account_id: AccountId,
        amount: Money,
        mut info: PostingInfo,
    ) -> Result<LedgerEntry, LedgerError> {
        ensure_positive(LedgerEntryType::Bonus, amount)?;
        info.method.get_or_insert_with(|| "BONUS".to_string());
        let entry = self.append(account_id, LedgerEntryType::Bonus, amount, EntryReference::Admin, info)?;
        tracing::info!(account = %account_id, amount = %amount, balance = %entry.balance_after, "ledger bonus");
        Ok(entry)
    }

    /// Commission is posted as a signed amount, negative for a charge.
    pub fn record_commission(
        &mut self,
        account_id: AccountId,
        amount: Money,
        trade_id: TradeId,
    ) -> Result<LedgerEntry, LedgerError> {
        self.append(
            account_id,
            LedgerEntryType::Commission,
            amount,
            EntryReference::Trade(trade_id),
            PostingInfo::new("Trading Commission"),
        )
    }

    pub fn record_realized_pnl(
        &mut self,
        account_id: AccountId,
        amount: Money,
        trade_id: TradeId,
    ) -> Result<LedgerEntry, LedgerError> {
        let description = if amount.is_negative() {
            "Trading Loss"
        } else {
            "Trading Profit"
        };
        self.append(
            account_id,
            LedgerEntryType::RealizedPnl,
            amount,
            EntryReference::Trade(trade_id),
            PostingInfo::new(description),
        )
    }

    /// Newest first. `limit == 0` returns everything.
    pub fn history(&self, account_id: AccountId, limit: usize) -> Vec<LedgerEntry> {
        let entries = self.entries.get(&account_id).map(Vec::as_slice).unwrap_or(&[]);
        take_newest(entries.iter().rev().cloned(), limit)
    }

    /// Chronological slice for one account.
    pub fn entries_for(&self, account_id: AccountId) -> &[LedgerEntry] {
        self.entries.get(&account_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.collect_newest(|_| true, limit)
    }

    pub fn entries_by_type(&self, entry_type: LedgerEntryType, limit: usize) -> Vec<LedgerEntry> {
        self.collect_newest(|entry| entry.entry_type == entry_type, limit)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ids are allocated monotonically, so id order is posting order
    fn collect_newest(&self, filter: impl Fn(&LedgerEntry) -> bool, limit: usize) -> Vec<LedgerEntry> {
        let mut all: Vec<&LedgerEntry> = self.entries.values().flatten().filter(|e| filter(e)).collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        take_newest(all.into_iter().cloned(), limit)
    }

    fn append(
        &mut self,
        account_id: AccountId,
        entry_type: LedgerEntryType,
        amount: Money,
        reference: EntryReference,
        info: PostingInfo,
    ) -> Result<LedgerEntry, LedgerError> {
        let balance_before = self.balance(account_id);
        let balance_after = balance_before.checked_add(amount).ok_or(LedgerError::Overflow {
            amount,
            balance: balance_before,
        })?;
        let entry = LedgerEntry {
            id: LedgerEntryId(self.next_id),
            account_id,
            entry_type,
            amount,
            balance_before,
            balance_after,
            currency: self.currency.clone(),
            description: info.description,
            reference,
            admin_id: info.admin_id,
            payment_method: info.method,
            payment_ref: info.reference,
            created_at: Timestamp::now(),
        };
        self.next_id += 1;
        self.entries.entry(account_id).or_default().push(entry.clone());
        Ok(entry)
    }
}

fn ensure_positive(entry_type: LedgerEntryType, amount: Money) -> Result<(), LedgerError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::NonPositiveAmount { entry_type, amount })
    }
}

fn take_newest(entries: impl Iterator<Item = LedgerEntry>, limit: usize) -> Vec<LedgerEntry> {
    if limit == 0 {
        entries.collect()
    } else {
        entries.take(limit).collect()
    }
}
