//! Weekly Ratio Balancer: proportional-feedback correction of ratio
//! routines against the week-to-date history.
//!
//! A label that has fallen behind its weekly target gets more time today,
//! proportional to how much of the week remains; an over-served label gets
//! less, but never below its minimum block or a 5% floor. This is a
//! discrete proportional controller, not a predictive one -- inputs are
//! noisy and low-frequency (daily).

use serde::{Deserialize, Serialize};

use crate::model::{RoutineDuration, RoutinePoolItem, WeekHistory};

/// Floor for an adjusted ratio, guaranteeing every routine a minimum presence.
pub const RATIO_FLOOR: f64 = 0.05;

/// Cap on the correction weight, to avoid overcorrection late in the week.
pub const MAX_CORRECTION_WEIGHT: f64 = 2.0;

/// Days in a week, for the correction schedule.
pub const DAYS_IN_WEEK: u32 = 7;

/// Per-label adjusted-ratio report entry; part of the engine output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioAllocation {
    pub label: String,
    /// Declared target share.
    pub target_ratio: f64,
    /// Week-to-date actual share; `None` on the first day / with no data.
    pub actual_ratio: Option<f64>,
    /// Normalized adjusted share used today.
    pub adjusted_ratio: f64,
    /// Minutes granted today.
    pub minutes: u16,
}

/// Compute today's minutes for each ratio-defined routine.
///
/// `pool_minutes` is the free time available for ratio routines (free
/// minutes minus time reserved by fixed-duration routines). Items must be
/// ratio-defined; fixed items are not balanced.
pub fn balance_ratios(
    items: &[&RoutinePoolItem],
    history: &WeekHistory,
    days_elapsed: u32,
    pool_minutes: u16,
) -> Vec<RatioAllocation> {
    let targets: Vec<f64> = items
        .iter()
        .map(|item| match item.duration() {
            RoutineDuration::Ratio(r) => r,
            RoutineDuration::Minutes(_) => 0.0,
        })
        .collect();

    let tracked: Vec<u32> = items
        .iter()
        .map(|item| history.minutes_for(&item.label))
        .collect();
    let tracked_total: u32 = tracked.iter().sum();

    // First day of the week, or no data yet: use declared ratios unchanged.
    if days_elapsed == 0 || tracked_total == 0 {
        return items
            .iter()
            .zip(&targets)
            .map(|(item, &target)| RatioAllocation {
                label: item.label.clone(),
                target_ratio: target,
                actual_ratio: None,
                adjusted_ratio: target,
                minutes: grant_minutes(pool_minutes, target, item.min_block),
            })
            .collect();
    }

    let days_remaining = DAYS_IN_WEEK.saturating_sub(days_elapsed);
    let weight = if days_remaining == 0 {
        MAX_CORRECTION_WEIGHT
    } else {
        (days_elapsed as f64 / days_remaining as f64).min(MAX_CORRECTION_WEIGHT)
    };

    let actuals: Vec<f64> = tracked
        .iter()
        .map(|&m| m as f64 / tracked_total as f64)
        .collect();

    let adjusted: Vec<f64> = targets
        .iter()
        .zip(&actuals)
        .map(|(&target, &actual)| (target + (target - actual) * weight).max(RATIO_FLOOR))
        .collect();
    let shares = normalize_with_floor(&adjusted);

    items
        .iter()
        .zip(&targets)
        .zip(&actuals)
        .zip(&shares)
        .map(|(((item, &target), &actual), &share)| RatioAllocation {
            label: item.label.clone(),
            target_ratio: target,
            actual_ratio: Some(actual),
            adjusted_ratio: share,
            minutes: grant_minutes(pool_minutes, share, item.min_block),
        })
        .collect()
}

/// Normalize raw adjusted ratios to sum 1.0, then clamp any share that
/// normalization pushed back below the floor up to it, rescaling the
/// unclamped shares so the sum stays 1.0.
fn normalize_with_floor(raw: &[f64]) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    let mut shares: Vec<f64> = raw.iter().map(|r| r / total).collect();
    // More labels than the floor can accommodate: plain normalization.
    if shares.len() as f64 * RATIO_FLOOR >= 1.0 {
        return shares;
    }

    let mut clamped = vec![false; shares.len()];
    loop {
        let mut changed = false;
        for (share, flag) in shares.iter_mut().zip(&mut clamped) {
            if !*flag && *share < RATIO_FLOOR {
                *share = RATIO_FLOOR;
                *flag = true;
                changed = true;
            }
        }
        if !changed {
            return shares;
        }
        let clamped_total: f64 = shares
            .iter()
            .zip(&clamped)
            .filter(|(_, c)| **c)
            .map(|(s, _)| *s)
            .sum();
        let rest_total: f64 = shares
            .iter()
            .zip(&clamped)
            .filter(|(_, c)| !**c)
            .map(|(s, _)| *s)
            .sum();
        if rest_total <= 0.0 {
            return shares;
        }
        let scale = (1.0 - clamped_total) / rest_total;
        for (share, flag) in shares.iter_mut().zip(&clamped) {
            if !*flag {
                *share *= scale;
            }
        }
    }
}

fn grant_minutes(pool_minutes: u16, ratio: f64, min_block: u16) -> u16 {
    let granted = (pool_minutes as f64 * ratio).floor() as u16;
    granted.max(min_block)
}
