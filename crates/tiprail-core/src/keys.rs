//! # Idempotency Key Derivation
//!
//! Deterministic replay guards for every posting path.
//!
//! ## Two Levels of Replay Safety
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Level 1: the whole pipeline                                            │
//! │    tip_transactions UNIQUE(order_id, payment_id)                        │
//! │    Re-running allocation for a payment returns the original result.     │
//! │                                                                         │
//! │  Level 2: each entry                                                    │
//! │    tip_ledger_entries UNIQUE(idempotency_key)                           │
//! │    Every entry's key is derived from what the entry IS, so a partial    │
//! │    retry can never double-post a single credit either.                  │
//! │                                                                         │
//! │  Both levels converge retried invocations onto one set of entries.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are plain `:`-joined strings. The inputs (UUIDs, ids) never contain
//! `:` ambiguity in practice, and a readable key is worth a lot when staring
//! at a ledger dump.

/// Top-level key for one payment's allocation.
pub fn allocation(order_id: &str, payment_id: &str) -> String {
    format!("alloc:{order_id}:{payment_id}")
}

/// Per-entry key for a tip credit posted by the allocation pipeline.
/// Includes the group id when the credit came through a group split, so a
/// member who is also an owner gets distinct keys for distinct credits.
pub fn tip_entry(
    order_id: &str,
    payment_id: &str,
    employee_id: &str,
    group_id: Option<&str>,
) -> String {
    match group_id {
        Some(group_id) => format!("tip:{order_id}:{payment_id}:{group_id}:{employee_id}"),
        None => format!("tip:{order_id}:{payment_id}:{employee_id}"),
    }
}

/// Key for the chargeback debit offsetting one original credit entry.
/// Keyed on the credit's entry id: an employee can hold several credits
/// under one payment (owner share + group share) and each reversal must be
/// independently replay-safe.
pub fn chargeback(order_id: &str, payment_id: &str, credit_entry_id: &str) -> String {
    format!("cb:{order_id}:{payment_id}:{credit_entry_id}")
}

/// Key for a debt-reclaim debit carved out of a credit. Derived from the
/// credit's own key so replaying the credit replays (skips) the reclaim too.
pub fn debt_reclaim(credit_key: &str, debt_id: &str) -> String {
    format!("{credit_key}:reclaim:{debt_id}")
}

/// Keys for the two legs of a transfer. One transfer id, two entries.
pub fn transfer_out(transfer_id: &str) -> String {
    format!("xfer:{transfer_id}:out")
}

pub fn transfer_in(transfer_id: &str) -> String {
    format!("xfer:{transfer_id}:in")
}

/// Keys for the two legs of a role tip-out. Same pairing discipline as
/// transfers, distinct namespace.
pub fn tip_out_out(tip_out_id: &str) -> String {
    format!("tipout:{tip_out_id}:out")
}

pub fn tip_out_in(tip_out_id: &str) -> String {
    format!("tipout:{tip_out_id}:in")
}

/// Key for one employee's debit within a payroll batch.
pub fn payroll(batch_id: &str, employee_id: &str) -> String {
    format!("payroll:{batch_id}:{employee_id}")
}

/// Key for a cash-out request, from the caller's request id.
pub fn cash_out(request_id: &str) -> String {
    format!("cashout:{request_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tip_entry_distinguishes_group_credits() {
        let direct = tip_entry("o1", "p1", "alice", None);
        let grouped = tip_entry("o1", "p1", "alice", Some("g1"));
        assert_ne!(direct, grouped);
        assert_eq!(direct, "tip:o1:p1:alice");
        assert_eq!(grouped, "tip:o1:p1:g1:alice");
    }

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(allocation("o1", "p1"), allocation("o1", "p1"));
        assert_eq!(chargeback("o1", "p1", "e9"), "cb:o1:p1:e9");
        assert_eq!(debt_reclaim("tip:o1:p1:alice", "d1"), "tip:o1:p1:alice:reclaim:d1");
        assert_eq!(transfer_out("t1"), "xfer:t1:out");
        assert_eq!(transfer_in("t1"), "xfer:t1:in");
        assert_eq!(payroll("b1", "alice"), "payroll:b1:alice");
        assert_eq!(tip_out_out("t1"), "tipout:t1:out");
        assert_eq!(tip_out_in("t1"), "tipout:t1:in");
    }
}
