//! Deterministic expense splitting.
//!
//! Both allocators return one [`Allocation`] per member, summing exactly to
//! the total, ordered by member id ascending. Leftover cents from integer
//! division are handed out one at a time by a fixed rule, so replaying the
//! same split always produces bit-identical output.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine};

/// 100% expressed in basis points (hundredths of a percent).
pub const FULL_PERCENT_BASIS_POINTS: i64 = 10_000;

const PERCENT_SCALE: f64 = 100.0;

/// One member's share of a split expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub member_id: String,
    pub cents: MoneyCents,
}

/// Requested percent weight for one member of a percent split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentShare {
    pub member_id: String,
    pub percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Equal,
    Percent,
}

impl SplitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Percent => "percent",
        }
    }
}

impl TryFrom<&str> for SplitMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "percent" => Ok(Self::Percent),
            other => Err(EngineError::InvalidInput(format!(
                "invalid split method: {other}"
            ))),
        }
    }
}

/// How an expense is divided among members.
///
/// Percent weights only exist on the `Percent` variant, so an equal split
/// cannot carry stray percents and a percent split cannot lose them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SplitSpec {
    Equal { participant_ids: Vec<String> },
    Percent { shares: Vec<PercentShare> },
}

impl SplitSpec {
    pub fn method(&self) -> SplitMethod {
        match self {
            Self::Equal { .. } => SplitMethod::Equal,
            Self::Percent { .. } => SplitMethod::Percent,
        }
    }

    /// Member ids referenced by this spec, in stored order.
    pub fn participant_ids(&self) -> Vec<&str> {
        match self {
            Self::Equal { participant_ids } => {
                participant_ids.iter().map(String::as_str).collect()
            }
            Self::Percent { shares } => {
                shares.iter().map(|share| share.member_id.as_str()).collect()
            }
        }
    }

    /// Validates the spec and brings it into canonical form (participants
    /// sorted by member id, equal-split duplicates collapsed).
    pub fn validated(self) -> ResultEngine<Self> {
        match self {
            Self::Equal { participant_ids } => {
                if participant_ids.is_empty() {
                    return Err(EngineError::InvalidInput(
                        "at least one participant is required".to_string(),
                    ));
                }
                let mut participant_ids = participant_ids;
                participant_ids.sort_unstable();
                participant_ids.dedup();
                Ok(Self::Equal { participant_ids })
            }
            Self::Percent { shares } => {
                if shares.is_empty() {
                    return Err(EngineError::InvalidInput(
                        "at least one participant is required".to_string(),
                    ));
                }
                let mut seen = BTreeSet::new();
                let mut total_bp: i64 = 0;
                for share in &shares {
                    if !seen.insert(share.member_id.as_str()) {
                        return Err(EngineError::InvalidPercent(format!(
                            "duplicate percent share for \"{}\"",
                            share.member_id
                        )));
                    }
                    total_bp += to_basis_points(share)?;
                }
                if total_bp != FULL_PERCENT_BASIS_POINTS {
                    return Err(EngineError::InvalidPercent(
                        "percents must sum to exactly 100".to_string(),
                    ));
                }
                let mut shares = shares;
                shares.sort_by(|a, b| a.member_id.cmp(&b.member_id));
                Ok(Self::Percent { shares })
            }
        }
    }

    /// Allocates `total` according to this spec.
    pub fn allocate(&self, total: MoneyCents) -> ResultEngine<Vec<Allocation>> {
        match self {
            Self::Equal { participant_ids } => split_equal(total, participant_ids),
            Self::Percent { shares } => split_by_percent(total, shares),
        }
    }

    /// Basis points per member, `None` for equal splits. Storage form of the
    /// percent weights.
    pub(crate) fn basis_points(&self) -> ResultEngine<Vec<(String, Option<i64>)>> {
        match self {
            Self::Equal { participant_ids } => Ok(participant_ids
                .iter()
                .map(|member_id| (member_id.clone(), None))
                .collect()),
            Self::Percent { shares } => shares
                .iter()
                .map(|share| Ok((share.member_id.clone(), Some(to_basis_points(share)?))))
                .collect(),
        }
    }
}

/// Splits `total` evenly across `member_ids`.
///
/// Members are sorted by id; each gets `total / n` cents and the first
/// `total % n` members (in sorted order) absorb one extra cent. Duplicate
/// ids are collapsed.
pub fn split_equal(total: MoneyCents, member_ids: &[String]) -> ResultEngine<Vec<Allocation>> {
    let total = validated_total(total)?;
    if member_ids.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one member is required to split an expense".to_string(),
        ));
    }

    let mut sorted: Vec<&str> = member_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let n = sorted.len() as i64;
    let base = total / n;
    let remainder = total - base * n;

    Ok(sorted
        .iter()
        .enumerate()
        .map(|(index, member_id)| Allocation {
            member_id: (*member_id).to_string(),
            cents: MoneyCents::new(if (index as i64) < remainder { base + 1 } else { base }),
        })
        .collect())
}

/// Splits `total` by percent weights.
///
/// Percents are converted to integer basis points and must be exact to two
/// decimal places, each within `[0, 100]`, summing to exactly 100. Every
/// share gets the floor of its exact fraction; the shortfall is distributed
/// one cent at a time by descending truncated remainder, ties broken by
/// ascending member id.
pub fn split_by_percent(
    total: MoneyCents,
    shares: &[PercentShare],
) -> ResultEngine<Vec<Allocation>> {
    let total = validated_total(total)?;
    if shares.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one percent share is required".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    let mut with_bp = Vec::with_capacity(shares.len());
    for share in shares {
        if !seen.insert(share.member_id.as_str()) {
            return Err(EngineError::InvalidPercent(format!(
                "duplicate percent share for \"{}\"",
                share.member_id
            )));
        }
        with_bp.push((share.member_id.as_str(), to_basis_points(share)?));
    }

    let total_bp: i64 = with_bp.iter().map(|(_, bp)| bp).sum();
    if total_bp != FULL_PERCENT_BASIS_POINTS {
        return Err(EngineError::InvalidPercent(
            "percents must sum to exactly 100".to_string(),
        ));
    }

    struct ExactShare<'a> {
        member_id: &'a str,
        cents: i64,
        remainder_weight: i64,
    }

    // total * bp can exceed i64 near the safe-cents bound, so widen.
    let mut exact: Vec<ExactShare<'_>> = with_bp
        .iter()
        .map(|(member_id, bp)| {
            let product = i128::from(total) * i128::from(*bp);
            ExactShare {
                member_id,
                cents: (product / i128::from(FULL_PERCENT_BASIS_POINTS)) as i64,
                remainder_weight: (product % i128::from(FULL_PERCENT_BASIS_POINTS)) as i64,
            }
        })
        .collect();

    let allocated: i64 = exact.iter().map(|share| share.cents).sum();
    let mut shortfall = total - allocated;

    exact.sort_by(|a, b| {
        b.remainder_weight
            .cmp(&a.remainder_weight)
            .then_with(|| a.member_id.cmp(b.member_id))
    });
    for share in &mut exact {
        if shortfall == 0 {
            break;
        }
        share.cents += 1;
        shortfall -= 1;
    }

    exact.sort_by(|a, b| a.member_id.cmp(b.member_id));
    Ok(exact
        .into_iter()
        .map(|share| Allocation {
            member_id: share.member_id.to_string(),
            cents: MoneyCents::new(share.cents),
        })
        .collect())
}

/// Allocations must stay non-negative, so totals must too.
fn validated_total(total: MoneyCents) -> ResultEngine<i64> {
    let cents = MoneyCents::from_cents(total.cents())?.cents();
    if cents < 0 {
        return Err(EngineError::InvalidAmount(
            "split total must not be negative".to_string(),
        ));
    }
    Ok(cents)
}

fn to_basis_points(share: &PercentShare) -> ResultEngine<i64> {
    let percent = share.percent;
    if !percent.is_finite() {
        return Err(EngineError::InvalidPercent(format!(
            "percent for \"{}\" must be a finite number",
            share.member_id
        )));
    }
    let basis_points = (percent * PERCENT_SCALE).round();
    if (basis_points / PERCENT_SCALE - percent).abs() > f64::EPSILON {
        return Err(EngineError::InvalidPercent(format!(
            "percent for \"{}\" must have at most 2 decimal places",
            share.member_id
        )));
    }
    if basis_points < 0.0 || basis_points > FULL_PERCENT_BASIS_POINTS as f64 {
        return Err(EngineError::InvalidPercent(format!(
            "percent for \"{}\" must be between 0 and 100",
            share.member_id
        )));
    }
    Ok(basis_points as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn shares(entries: &[(&str, f64)]) -> Vec<PercentShare> {
        entries
            .iter()
            .map(|(member_id, percent)| PercentShare {
                member_id: (*member_id).to_string(),
                percent: *percent,
            })
            .collect()
    }

    fn cents_of(allocations: &[Allocation]) -> Vec<(String, i64)> {
        allocations
            .iter()
            .map(|a| (a.member_id.clone(), a.cents.cents()))
            .collect()
    }

    #[test]
    fn equal_split_gives_extra_cents_to_first_sorted_members() {
        let got = split_equal(MoneyCents::new(1000), &ids(&["cara", "alice", "bob"])).unwrap();
        assert_eq!(
            cents_of(&got),
            vec![
                ("alice".to_string(), 334),
                ("bob".to_string(), 333),
                ("cara".to_string(), 333)
            ]
        );
    }

    #[test]
    fn equal_split_is_even_when_divisible() {
        let got = split_equal(MoneyCents::new(900), &ids(&["alice", "bob", "cara"])).unwrap();
        assert!(got.iter().all(|a| a.cents.cents() == 300));
    }

    #[test]
    fn equal_split_collapses_duplicate_members() {
        let got = split_equal(MoneyCents::new(100), &ids(&["bob", "alice", "alice"])).unwrap();
        assert_eq!(
            cents_of(&got),
            vec![("alice".to_string(), 50), ("bob".to_string(), 50)]
        );
    }

    #[test]
    fn equal_split_sums_to_total_within_one_cent_spread() {
        for total in [1i64, 7, 99, 1000, 12_345] {
            let got = split_equal(MoneyCents::new(total), &ids(&["a", "b", "c", "d"])).unwrap();
            let sum: i64 = got.iter().map(|a| a.cents.cents()).sum();
            assert_eq!(sum, total);
            let min = got.iter().map(|a| a.cents.cents()).min().unwrap();
            let max = got.iter().map(|a| a.cents.cents()).max().unwrap();
            assert!(max - min <= 1, "spread too wide for total {total}");
        }
    }

    #[test]
    fn equal_split_rejects_empty_members_and_negative_totals() {
        assert!(matches!(
            split_equal(MoneyCents::new(100), &[]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            split_equal(MoneyCents::new(-1), &ids(&["alice"])),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn percent_split_matches_hand_computed_remainders() {
        let got = split_by_percent(
            MoneyCents::new(100),
            &shares(&[("alice", 33.33), ("bob", 33.33), ("cara", 33.34)]),
        )
        .unwrap();
        assert_eq!(
            cents_of(&got),
            vec![
                ("alice".to_string(), 33),
                ("bob".to_string(), 33),
                ("cara".to_string(), 34)
            ]
        );
    }

    #[test]
    fn percent_split_breaks_remainder_ties_by_member_id() {
        let got = split_by_percent(MoneyCents::new(1001), &shares(&[("b", 50.0), ("a", 50.0)]))
            .unwrap();
        assert_eq!(
            cents_of(&got),
            vec![("a".to_string(), 501), ("b".to_string(), 500)]
        );
    }

    #[test]
    fn percent_split_is_input_order_independent() {
        let forward = split_by_percent(
            MoneyCents::new(777),
            &shares(&[("a", 20.0), ("b", 30.0), ("c", 50.0)]),
        )
        .unwrap();
        let backward = split_by_percent(
            MoneyCents::new(777),
            &shares(&[("c", 50.0), ("b", 30.0), ("a", 20.0)]),
        )
        .unwrap();
        assert_eq!(forward, backward);
        let sum: i64 = forward.iter().map(|a| a.cents.cents()).sum();
        assert_eq!(sum, 777);
    }

    #[test]
    fn spec_validation_canonicalizes_participants() {
        let spec = SplitSpec::Equal {
            participant_ids: ids(&["bob", "alice", "bob"]),
        }
        .validated()
        .unwrap();
        assert_eq!(spec.participant_ids(), vec!["alice", "bob"]);

        let spec = SplitSpec::Percent {
            shares: shares(&[("b", 60.0), ("a", 40.0)]),
        }
        .validated()
        .unwrap();
        assert_eq!(spec.participant_ids(), vec!["a", "b"]);

        assert!(matches!(
            SplitSpec::Percent {
                shares: shares(&[("a", 99.0)])
            }
            .validated(),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            SplitSpec::Equal {
                participant_ids: vec![]
            }
            .validated(),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn percent_split_rejects_bad_weights() {
        let total = MoneyCents::new(100);
        assert!(matches!(
            split_by_percent(total, &shares(&[("a", 50.0), ("b", 49.99)])),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(total, &shares(&[("a", 33.333), ("b", 66.667)])),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(total, &shares(&[("a", -10.0), ("b", 110.0)])),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(total, &shares(&[("a", 50.0), ("a", 50.0)])),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(total, &shares(&[("a", f64::NAN), ("b", 50.0)])),
            Err(EngineError::InvalidPercent(_))
        ));
        assert!(matches!(
            split_by_percent(total, &[]),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
