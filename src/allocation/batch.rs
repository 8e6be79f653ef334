use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

/// One-shot apportionment of a whole budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub budget: u64,
    pub portions: Vec<u64>,
}

impl Distribution {
    pub fn total(&self) -> u64 {
        self.portions.iter().sum()
    }

    pub fn stats(&self) -> DistributionStats {
        DistributionStats::from_portions(&self.portions)
    }
}

/// Splits `budget` across `total_slots` at once using independent random weights.
///
/// Every slot is seeded with one unit, the rest is apportioned by `floor(w_i / sum(w))` for all
/// but the last slot, and the last slot takes the exact remainder. Intended for previews and
/// analysis; live claims go through [`super::compute_portion`] one slot at a time.
pub fn distribute_all<R: Rng + ?Sized>(
    rng: &mut R,
    budget: u64,
    total_slots: u32,
) -> PoolResult<Distribution> {
    if budget == 0 {
        return Err(PoolError::InvalidAllocationInput(
            "budget must be positive".to_string(),
        ));
    }
    if total_slots == 0 {
        return Err(PoolError::InvalidAllocationInput(
            "total slots must be at least 1".to_string(),
        ));
    }
    if budget < total_slots as u64 {
        return Err(PoolError::InvalidAllocationInput(format!(
            "budget {} cannot give {} slots at least one unit each",
            budget, total_slots
        )));
    }

    if total_slots == 1 {
        return Ok(Distribution {
            budget,
            portions: vec![budget],
        });
    }

    // Strictly positive weights keep the normalisation well defined
    let weights: Vec<f64> = (0..total_slots)
        .map(|_| rng.gen_range(f64::EPSILON..1.0))
        .collect();
    let total_weight: f64 = weights.iter().sum();

    let distributable = budget - total_slots as u64;
    let mut portions = Vec::with_capacity(total_slots as usize);
    let mut allocated = 0u64;

    for weight in &weights[..weights.len() - 1] {
        let share = ((weight / total_weight) * distributable as f64).floor() as u64;
        // Float rounding must never eat into the last slot's guaranteed unit
        let share = share.min(distributable - allocated);
        allocated += share;
        portions.push(share + 1);
    }
    portions.push(distributable - allocated + 1);

    Ok(Distribution { budget, portions })
}

/// True when the portions add up to exactly `budget`.
pub fn validate_distribution(budget: u64, portions: &[u64]) -> bool {
    portions
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_add(*p))
        .map_or(false, |total| total == budget)
}

/// Summary statistics over a set of granted portions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub total: u64,
    pub average: f64,
    pub variance: f64,
    pub standard_deviation: f64,
}

impl DistributionStats {
    pub fn from_portions(portions: &[u64]) -> Self {
        if portions.is_empty() {
            return DistributionStats {
                count: 0,
                min: 0,
                max: 0,
                total: 0,
                average: 0.0,
                variance: 0.0,
                standard_deviation: 0.0,
            };
        }

        let count = portions.len();
        let total: u64 = portions.iter().sum();
        let average = total as f64 / count as f64;
        let variance = portions
            .iter()
            .map(|p| {
                let diff = *p as f64 - average;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        DistributionStats {
            count,
            min: portions.iter().copied().min().unwrap_or(0),
            max: portions.iter().copied().max().unwrap_or(0),
            total,
            average: round_cents(average),
            variance: round_cents(variance),
            standard_deviation: round_cents(variance.sqrt()),
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
