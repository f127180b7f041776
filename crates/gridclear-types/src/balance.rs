//! Double-entry postings and per-participant balance tracking.
//!
//! Every priced event produces matched debit/credit postings across two
//! participants. Balances accumulate credits and debits separately; the
//! signed net follows the fixed convention:
//!
//! **`net = debit − credit`: positive ⇒ the participant owes money,
//! negative ⇒ the participant is owed money.**
//!
//! The same convention applies to settlement line amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EventId, ParticipantId};

/// A single double-entry posting: `debtor` owes `amount` to `creditor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Participant being debited.
    pub debtor: ParticipantId,
    /// Participant being credited.
    pub creditor: ParticipantId,
    /// Always positive; direction is carried by debtor/creditor.
    pub amount_eur: Decimal,
    /// Short human-readable reason ("local consumption", "community fee", ...).
    pub memo: String,
    /// The event that produced this posting.
    pub event_id: EventId,
}

/// Accumulated credit/debit totals for one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Money owed *to* the participant.
    pub credit: Decimal,
    /// Money owed *by* the participant.
    pub debit: Decimal,
}

impl BalanceEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_credit(&mut self, amount: Decimal) {
        self.credit += amount;
    }

    pub fn add_debit(&mut self, amount: Decimal) {
        self.debit += amount;
    }

    /// Signed net: positive ⇒ owes, negative ⇒ is owed.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Gross exposure before netting.
    #[must_use]
    pub fn gross(&self) -> Decimal {
        self.debit + self.credit
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.credit.is_zero() && self.debit.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_sign_convention() {
        let mut entry = BalanceEntry::new();
        entry.add_debit(Decimal::new(500, 2)); // owes 5.00
        entry.add_credit(Decimal::new(200, 2)); // is owed 2.00
        assert_eq!(entry.net(), Decimal::new(300, 2)); // owes 3.00 net
        assert_eq!(entry.gross(), Decimal::new(700, 2));
    }

    #[test]
    fn creditor_nets_negative() {
        let mut entry = BalanceEntry::new();
        entry.add_credit(Decimal::new(280, 2));
        assert_eq!(entry.net(), Decimal::new(-280, 2));
    }

    #[test]
    fn default_is_zero() {
        assert!(BalanceEntry::default().is_zero());
        assert_eq!(BalanceEntry::default().net(), Decimal::ZERO);
    }
}
