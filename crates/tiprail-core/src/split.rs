//! # Split Module
//!
//! Deterministic division of tip amounts among owners and group members.
//!
//! ## The Determinism Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EVERY SPLIT IS A PURE FUNCTION                                         │
//! │                                                                         │
//! │  1. Sort members by employee_id ascending                               │
//! │  2. Floor-divide every share (never round up)                           │
//! │  3. Hand leftover cents out one-by-one, starting from the LAST          │
//! │     member in sorted order and walking backwards                        │
//! │                                                                         │
//! │  $10.01 / 3 across [A, B, C]:                                           │
//! │    base 333 each, 2 cents left over                                     │
//! │    → A: 333, B: 334, C: 334   (C first, then B)                         │
//! │                                                                         │
//! │  Identical input ⇒ byte-identical output, no matter what collection    │
//! │  the members came out of. This is the load-bearing correctness         │
//! │  property for tip groups: replays and audits must reproduce the        │
//! │  exact cents distribution.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conservation
//! The shares returned by every function in this module sum to exactly the
//! input total. No cent is ever created or lost.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::FULL_SHARE_BPS;
use crate::types::GroupMember;

// =============================================================================
// Share Line
// =============================================================================

/// One employee's computed slice of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SplitShare {
    pub employee_id: String,
    pub cents: i64,
}

impl SplitShare {
    pub fn new(employee_id: impl Into<String>, cents: i64) -> Self {
        SplitShare {
            employee_id: employee_id.into(),
            cents,
        }
    }
}

// =============================================================================
// Equal Split
// =============================================================================

/// Splits `total_cents` equally among `members`.
///
/// Members are sorted by `employee_id` ascending; each gets the floor of
/// `total / n`; leftover cents go one-by-one to members starting from the
/// **last** in sorted order.
///
/// An empty member list returns no shares (the caller decides whether that
/// is an error).
///
/// ## Example
/// ```rust
/// use tiprail_core::split::split_equal;
/// use tiprail_core::types::GroupMember;
///
/// let members = vec![
///     GroupMember::new("carol", 1),
///     GroupMember::new("alice", 1),
///     GroupMember::new("bob", 1),
/// ];
/// let shares = split_equal(1001, &members);
/// assert_eq!(shares[0].cents, 333); // alice
/// assert_eq!(shares[1].cents, 334); // bob
/// assert_eq!(shares[2].cents, 334); // carol (last gets the first odd cent)
/// ```
pub fn split_equal(total_cents: i64, members: &[GroupMember]) -> Vec<SplitShare> {
    let ordered = sorted_member_ids(members);
    if ordered.is_empty() {
        return Vec::new();
    }

    let n = ordered.len() as i64;
    let base = total_cents / n;
    let remainder = total_cents % n;

    distribute(ordered, |_| base, remainder)
}

// =============================================================================
// Weighted Split
// =============================================================================

/// Splits `total_cents` proportionally to each member's `tip_weight`.
///
/// Same deterministic ordering as [`split_equal`]: sorted by employee_id,
/// each share is `floor(total * weight / total_weight)`, leftover cents
/// assigned by the same last-member-first rule.
///
/// A total weight of zero falls back to the equal rule rather than
/// dividing by zero or dropping money.
pub fn split_weighted(total_cents: i64, members: &[GroupMember]) -> Vec<SplitShare> {
    let total_weight: i64 = members.iter().map(|m| m.tip_weight.max(0)).sum();
    if total_weight == 0 {
        return split_equal(total_cents, members);
    }

    let mut ordered: Vec<&GroupMember> = members.iter().collect();
    ordered.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

    let mut shares: Vec<SplitShare> = ordered
        .iter()
        .map(|m| {
            let weight = m.tip_weight.max(0);
            let cents =
                ((total_cents as i128 * weight as i128) / total_weight as i128) as i64;
            SplitShare::new(m.employee_id.clone(), cents)
        })
        .collect();

    let allocated: i64 = shares.iter().map(|s| s.cents).sum();
    assign_remainder(&mut shares, total_cents - allocated);
    shares
}

// =============================================================================
// Ownership Split
// =============================================================================

/// Splits a payment's tip across its owners' percentage shares.
///
/// `owners` are `(employee_id, share_bps)` pairs summing to 10000 bps.
/// Each owner gets `floor(total * bps / 10000)`; the whole rounding
/// remainder goes to the **last** owner in sorted order.
///
/// Note the remainder rule differs from the group splits on purpose: an
/// ownership remainder is at most a few cents and the original system
/// routed all of it to one owner rather than spreading it.
pub fn split_by_ownership(total_cents: i64, owners: &[(String, u32)]) -> Vec<SplitShare> {
    let mut ordered: Vec<&(String, u32)> = owners.iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    if ordered.is_empty() {
        return Vec::new();
    }

    let mut shares: Vec<SplitShare> = ordered
        .iter()
        .map(|(employee_id, bps)| {
            let cents =
                ((total_cents as i128 * *bps as i128) / FULL_SHARE_BPS as i128) as i64;
            SplitShare::new(employee_id.clone(), cents)
        })
        .collect();

    let allocated: i64 = shares.iter().map(|s| s.cents).sum();
    if let Some(last) = shares.last_mut() {
        last.cents += total_cents - allocated;
    }
    shares
}

// =============================================================================
// Internals
// =============================================================================

/// Sorted, owned member ids. Sorting happens here, once, so no split path
/// can accidentally depend on input order.
fn sorted_member_ids(members: &[GroupMember]) -> Vec<String> {
    let mut ids: Vec<String> = members.iter().map(|m| m.employee_id.clone()).collect();
    ids.sort();
    ids
}

fn distribute(
    ordered_ids: Vec<String>,
    base: impl Fn(usize) -> i64,
    remainder: i64,
) -> Vec<SplitShare> {
    let mut shares: Vec<SplitShare> = ordered_ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| SplitShare::new(id, base(i)))
        .collect();
    assign_remainder(&mut shares, remainder);
    shares
}

/// Hands out `remainder` cents one at a time, starting from the last share
/// and walking backwards. `remainder` is always `< shares.len()` for floor
/// division, so a single backwards pass suffices.
fn assign_remainder(shares: &mut [SplitShare], remainder: i64) {
    let n = shares.len();
    for k in 0..remainder.max(0) as usize {
        shares[n - 1 - k].cents += 1;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
