//! Settlement planning: who pays whom to zero out the ledger.

use serde::{Deserialize, Serialize};

use crate::{Balance, EngineError, MoneyCents, ResultEngine};

/// A suggested repayment. `from_member_id` owes, `to_member_id` receives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_member_id: String,
    pub to_member_id: String,
    pub cents: MoneyCents,
}

/// Plans transfers that settle `balances` to zero.
///
/// Greedy two-pointer matching: creditors and debtors are each sorted by
/// member id ascending, then the head of each list is matched for the
/// smaller of the two remainders until both sides are exhausted. The plan is
/// deterministic and every transfer is strictly positive; it does not try to
/// minimize the number of transfers.
///
/// A nonzero balance sum means the inputs were not produced by the balance
/// aggregator and fails with [`EngineError::UnbalancedLedger`].
pub fn compute_settlements(balances: &[Balance]) -> ResultEngine<Vec<Transfer>> {
    let mut total: i64 = 0;
    for balance in balances {
        let cents = MoneyCents::from_cents(balance.balance_cents.cents())?.cents();
        total = total.checked_add(cents).ok_or_else(|| {
            EngineError::InvalidAmount("balance outside the safe cents range".to_string())
        })?;
    }
    if total != 0 {
        return Err(EngineError::UnbalancedLedger(format!(
            "balances sum to {total} cents, expected 0"
        )));
    }

    struct Party<'a> {
        member_id: &'a str,
        remaining: i64,
    }

    let mut creditors: Vec<Party<'_>> = balances
        .iter()
        .filter(|b| b.balance_cents.is_positive())
        .map(|b| Party {
            member_id: b.member_id.as_str(),
            remaining: b.balance_cents.cents(),
        })
        .collect();
    let mut debtors: Vec<Party<'_>> = balances
        .iter()
        .filter(|b| b.balance_cents.is_negative())
        .map(|b| Party {
            member_id: b.member_id.as_str(),
            remaining: -b.balance_cents.cents(),
        })
        .collect();
    creditors.sort_by(|a, b| a.member_id.cmp(b.member_id));
    debtors.sort_by(|a, b| a.member_id.cmp(b.member_id));

    let mut transfers = Vec::new();
    let mut ci = 0;
    let mut di = 0;
    while ci < creditors.len() && di < debtors.len() {
        let amount = creditors[ci].remaining.min(debtors[di].remaining);
        transfers.push(Transfer {
            from_member_id: debtors[di].member_id.to_string(),
            to_member_id: creditors[ci].member_id.to_string(),
            cents: MoneyCents::new(amount),
        });
        creditors[ci].remaining -= amount;
        debtors[di].remaining -= amount;
        if creditors[ci].remaining == 0 {
            ci += 1;
        }
        if debtors[di].remaining == 0 {
            di += 1;
        }
    }

    Ok(transfers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balances(entries: &[(&str, i64)]) -> Vec<Balance> {
        entries
            .iter()
            .map(|(member_id, cents)| Balance {
                member_id: (*member_id).to_string(),
                balance_cents: MoneyCents::new(*cents),
            })
            .collect()
    }

    fn as_triples(transfers: &[Transfer]) -> Vec<(String, String, i64)> {
        transfers
            .iter()
            .map(|t| {
                (
                    t.from_member_id.clone(),
                    t.to_member_id.clone(),
                    t.cents.cents(),
                )
            })
            .collect()
    }

    #[test]
    fn one_debtor_pays_creditors_in_id_order() {
        let got = compute_settlements(&balances(&[
            ("alice", 450),
            ("bob", 450),
            ("cara", -900),
        ]))
        .unwrap();
        assert_eq!(
            as_triples(&got),
            vec![
                ("cara".to_string(), "alice".to_string(), 450),
                ("cara".to_string(), "bob".to_string(), 450)
            ]
        );
    }

    #[test]
    fn one_creditor_collects_from_debtors_in_id_order() {
        let got = compute_settlements(&balances(&[
            ("alice", -100),
            ("bob", 250),
            ("cara", -150),
        ]))
        .unwrap();
        assert_eq!(
            as_triples(&got),
            vec![
                ("alice".to_string(), "bob".to_string(), 100),
                ("cara".to_string(), "bob".to_string(), 150)
            ]
        );
    }

    #[test]
    fn transfers_settle_every_balance_to_zero() {
        let start = balances(&[
            ("alice", 3719),
            ("bob", -1250),
            ("cara", -901),
            ("dana", -1568),
        ]);
        let transfers = compute_settlements(&start).unwrap();
        assert!(transfers.iter().all(|t| t.cents.is_positive()));

        let mut after: std::collections::BTreeMap<&str, i64> = start
            .iter()
            .map(|b| (b.member_id.as_str(), b.balance_cents.cents()))
            .collect();
        for transfer in &transfers {
            *after.get_mut(transfer.from_member_id.as_str()).unwrap() += transfer.cents.cents();
            *after.get_mut(transfer.to_member_id.as_str()).unwrap() -= transfer.cents.cents();
        }
        assert!(after.values().all(|cents| *cents == 0), "{after:?}");
    }

    #[test]
    fn settled_ledger_needs_no_transfers() {
        assert!(compute_settlements(&balances(&[("alice", 0), ("bob", 0)]))
            .unwrap()
            .is_empty());
        assert!(compute_settlements(&[]).unwrap().is_empty());
    }

    #[test]
    fn nonzero_sum_is_an_integrity_error() {
        let err = compute_settlements(&balances(&[("alice", 100)])).unwrap_err();
        assert!(matches!(err, EngineError::UnbalancedLedger(_)));
    }
}
