//! Requests, audit records and receipts for wallet operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_common::{now, CommandId, Currency, Deadline, RecordId, Timestamp, UserId};
use wallet_ledger::Balance;

/// Exchange `amount` of `from` into `to` for one user.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub user: UserId,
    pub from: Currency,
    pub to: Currency,
    pub amount: Decimal,
    /// Falls back to the configured operation timeout.
    pub deadline: Option<Deadline>,
}

impl ExchangeRequest {
    pub fn new(user: UserId, from: Currency, to: Currency, amount: Decimal) -> Self {
        Self {
            user,
            from,
            to,
            amount,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Audit record of one committed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: RecordId,
    pub command_id: CommandId,
    pub user: UserId,
    pub from: Currency,
    pub to: Currency,
    /// Amount debited, in `from`.
    pub source_amount: Decimal,
    /// Units of `to` per unit of `from`.
    pub rate: Decimal,
    /// Amount credited, in `to`, rounded toward zero.
    pub result_amount: Decimal,
    pub snapshot_version: Option<u64>,
    /// The rate came from quotes past the freshness window.
    pub stale_rate: bool,
    pub timestamp: Timestamp,
}

/// Result of a committed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub record: ExchangeRecord,
    pub balance: Balance,
}

/// Move `amount` of `currency` from one user to another.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: UserId,
    pub to: UserId,
    pub currency: Currency,
    pub amount: Decimal,
    pub deadline: Option<Deadline>,
}

impl TransferRequest {
    pub fn new(from: UserId, to: UserId, currency: Currency, amount: Decimal) -> Self {
        Self {
            from,
            to,
            currency,
            amount,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Audit record of one committed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: RecordId,
    pub command_id: CommandId,
    pub from: UserId,
    pub to: UserId,
    pub currency: Currency,
    pub amount: Decimal,
    pub timestamp: Timestamp,
}

impl TransferRecord {
    pub(crate) fn new(command_id: CommandId, request: &TransferRequest) -> Self {
        Self {
            id: RecordId::new(),
            command_id,
            from: request.from,
            to: request.to,
            currency: request.currency,
            amount: request.amount,
            timestamp: now(),
        }
    }
}

/// Result of a committed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub record: TransferRecord,
    pub from_balance: Balance,
    pub to_balance: Balance,
}
