pub mod batch;


use rand::Rng;

use crate::errors::{PoolError, PoolResult};

pub use batch::{distribute_all, validate_distribution, Distribution, DistributionStats};

// Basis points of the remaining budget
const BPS_DENOMINATOR: u128 = 10_000;

/// Precision scale thresholds, checked from the top down
const SCALE_THRESHOLDS: [(u64, u64); 3] = [(100_000, 1_000), (10_000, 100), (1_000, 10)];

/// Share of the remaining budget the next claimant may draw from, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FairnessBand {
    pub min_bps: u32,
    pub max_bps: u32,
}

impl FairnessBand {
    /// Band for the next claimant given how many slots are still open (including theirs).
    ///
    /// Fewer open slots widen and raise the band; many open slots keep it low so early
    /// claimants cannot drain the pool.
    pub fn for_remaining_slots(remaining_slots: u32) -> Self {
        if remaining_slots <= 2 {
            FairnessBand { min_bps: 1_500, max_bps: 5_000 }
        } else if remaining_slots <= 4 {
            FairnessBand { min_bps: 1_000, max_bps: 4_000 }
        } else {
            FairnessBand { min_bps: 500, max_bps: 2_500 }
        }
    }

    fn apply(bps: u32, amount: u64) -> u64 {
        (amount as u128 * bps as u128 / BPS_DENOMINATOR) as u64
    }
}

/// Unit the band arithmetic runs in, chosen by budget magnitude.
///
/// Non-final portions come out as multiples of this unit; the last claimant absorbs
/// whatever odd remainder is left.
pub fn precision_scale(budget: u64) -> u64 {
    SCALE_THRESHOLDS
        .iter()
        .find(|(threshold, _)| budget >= *threshold)
        .map(|(_, scale)| *scale)
        .unwrap_or(1)
}

/// Inclusive bounds a single draw is taken from, in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortionBounds {
    pub scale: u64,
    pub min: u64,
    pub max: u64,
}

/// Computes the draw bounds for the next claimant without drawing.
///
/// Separated from [`compute_portion`] so the band logic can be inspected deterministically.
pub fn portion_bounds(
    budget: u64,
    total_slots: u32,
    slots_filled: u32,
    amount_allocated: u64,
) -> PoolResult<PortionBounds> {
    check_inputs(budget, total_slots, slots_filled, amount_allocated)?;

    let remaining_budget = budget - amount_allocated;
    let remaining_slots = (total_slots - slots_filled) as u64;
    let reserve = remaining_slots - 1;

    if remaining_slots == 1 {
        return Ok(PortionBounds {
            scale: 1,
            min: remaining_budget,
            max: remaining_budget,
        });
    }

    // Each remaining claimant must be able to get at least one scaled unit
    let mut scale = precision_scale(budget);
    while scale > 1 && remaining_budget / scale < remaining_slots {
        scale /= 10;
    }

    let scaled_remaining = remaining_budget / scale;
    let band = FairnessBand::for_remaining_slots(remaining_slots as u32);
    let cap = scaled_remaining - reserve;

    let min = FairnessBand::apply(band.min_bps, scaled_remaining).max(1).min(cap);
    let max = FairnessBand::apply(band.max_bps, scaled_remaining).min(cap).max(min);

    Ok(PortionBounds {
        scale,
        min: min * scale,
        max: max * scale,
    })
}

/// Computes a fair random portion for the next claimant of a pool.
///
/// Feeding each result back into `slots_filled` / `amount_allocated` until every slot is taken
/// always sums to exactly `budget`, with every portion at least 1.
pub fn compute_portion<R: Rng + ?Sized>(
    rng: &mut R,
    budget: u64,
    total_slots: u32,
    slots_filled: u32,
    amount_allocated: u64,
) -> PoolResult<u64> {
    let bounds = portion_bounds(budget, total_slots, slots_filled, amount_allocated)?;
    let remaining_budget = budget - amount_allocated;
    let reserve = (total_slots - slots_filled - 1) as u64;

    if reserve == 0 {
        return Ok(remaining_budget);
    }

    let draw = rng.gen_range(bounds.min / bounds.scale..=bounds.max / bounds.scale);
    let portion = (draw * bounds.scale).min(remaining_budget - reserve);

    debug_assert!(portion >= 1);
    Ok(portion)
}

fn check_inputs(
    budget: u64,
    total_slots: u32,
    slots_filled: u32,
    amount_allocated: u64,
) -> PoolResult<()> {
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
    if slots_filled >= total_slots {
        return Err(PoolError::SlotsExhausted { total: total_slots });
    }
    if amount_allocated > budget {
        return Err(PoolError::InvalidAllocationInput(format!(
            "allocated amount {} exceeds budget {}",
            amount_allocated, budget
        )));
    }

    let remaining_slots = (total_slots - slots_filled) as u64;
    if budget - amount_allocated < remaining_slots {
        return Err(PoolError::InvalidAllocationInput(format!(
            "remaining budget {} cannot cover {} remaining slots",
            budget - amount_allocated,
            remaining_slots
        )));
    }

    Ok(())
}
