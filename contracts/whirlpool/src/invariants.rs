// ============================================================================
// INVARIANTS
// ============================================================================
//
// Pure predicates over pool, tick and position state. Handlers check the
// cheap ones with debug_assert! (enabled in the release-with-logs profile);
// the scenario tests check all of them after every operation.
//
// 1. PRICE      - sqrt price within bounds, tick consistent with price
// 2. LIQUIDITY  - pool liquidity equals the net liquidity of crossed ticks
// 3. FEES       - fee growth never decreases, fees bounded by input
// 4. SWAP       - price moves in the swap direction and respects the limit
// 5. TICKS      - gross covers net, ticks on spacing
//
// ============================================================================

use crate::tick::InitializedTicks;
use soroban_sdk::Vec;
use whirlpool_types::{
    Tick, TickArray, Whirlpool, MAX_FEE_RATE, MAX_PROTOCOL_FEE_RATE, MAX_SQRT_PRICE_X64,
    MAX_TICK_INDEX, MIN_SQRT_PRICE_X64, MIN_TICK_INDEX,
};

// ============================================================================
// PRICE INVARIANTS
// ============================================================================

/// MIN_SQRT_PRICE_X64 <= sqrt_price <= MAX_SQRT_PRICE_X64
pub fn sqrt_price_in_bounds(sqrt_price: u128) -> bool {
    (MIN_SQRT_PRICE_X64..=MAX_SQRT_PRICE_X64).contains(&sqrt_price)
}

/// MIN_TICK_INDEX - 1 <= tick_current_index <= MAX_TICK_INDEX
///
/// A swap that crosses MIN_TICK_INDEX downward leaves the current tick one below it.
pub fn tick_in_bounds(tick_current_index: i32) -> bool {
    tick_current_index >= MIN_TICK_INDEX - 1 && tick_current_index <= MAX_TICK_INDEX
}

/// The current tick is the tick implied by the price, or the one just below
/// it when the price sits exactly on a tick crossed downward.
pub fn tick_consistent_with_price(tick_current_index: i32, tick_from_price: i32) -> bool {
    tick_current_index == tick_from_price || tick_current_index == tick_from_price - 1
}

// ============================================================================
// LIQUIDITY INVARIANTS
// ============================================================================

/// Removing liquidity never takes more than is held
pub fn liquidity_delta_valid(liquidity: u128, delta: i128) -> bool {
    if delta < 0 {
        liquidity >= delta.unsigned_abs()
    } else {
        liquidity.checked_add(delta as u128).is_some()
    }
}

/// Pool liquidity equals the sum of liquidity_net over initialized ticks at
/// or below the current tick.
///
/// Only meaningful when `tick_arrays` holds every initialized tick of the pool.
pub fn liquidity_matches_ticks(
    liquidity: u128,
    tick_current_index: i32,
    tick_arrays: &Vec<TickArray>,
    tick_spacing: u32,
) -> bool {
    let mut sum: i128 = 0;
    for array in tick_arrays.iter() {
        for (tick_index, tick) in InitializedTicks::new(&array, tick_spacing, false) {
            if tick_index > tick_current_index {
                break;
            }
            sum = match sum.checked_add(tick.liquidity_net) {
                Some(sum) => sum,
                None => return false,
            };
        }
    }
    sum >= 0 && sum as u128 == liquidity
}

// ============================================================================
// FEE INVARIANTS
// ============================================================================

/// Fee growth global never decreases
pub fn fee_growth_monotonic(old_fee_growth: u128, new_fee_growth: u128) -> bool {
    new_fee_growth >= old_fee_growth
}

pub fn fee_rates_valid(whirlpool: &Whirlpool) -> bool {
    whirlpool.fee_rate <= MAX_FEE_RATE && whirlpool.protocol_fee_rate <= MAX_PROTOCOL_FEE_RATE
}

/// fee_amount <= amount consumed
pub fn fee_bounded_by_input(fee_amount: u64, amount_in: u64) -> bool {
    fee_amount <= amount_in
}

// ============================================================================
// SWAP INVARIANTS
// ============================================================================

/// A to B lowers the price, B to A raises it
pub fn swap_direction_consistent(
    a_to_b: bool,
    sqrt_price_before: u128,
    sqrt_price_after: u128,
) -> bool {
    if a_to_b {
        sqrt_price_after <= sqrt_price_before
    } else {
        sqrt_price_after >= sqrt_price_before
    }
}

pub fn swap_respects_limit(a_to_b: bool, sqrt_price_after: u128, sqrt_price_limit: u128) -> bool {
    if a_to_b {
        sqrt_price_after >= sqrt_price_limit
    } else {
        sqrt_price_after <= sqrt_price_limit
    }
}

// ============================================================================
// TICK INVARIANTS
// ============================================================================

/// |liquidity_net| <= liquidity_gross, and only initialized ticks hold liquidity
pub fn tick_liquidity_consistent(tick: &Tick) -> bool {
    if !tick.initialized {
        return tick.liquidity_gross == 0 && tick.liquidity_net == 0;
    }
    tick.liquidity_gross > 0 && tick.liquidity_net.unsigned_abs() <= tick.liquidity_gross
}

pub fn tick_on_spacing(tick_index: i32, tick_spacing: u32) -> bool {
    tick_index % tick_spacing as i32 == 0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{initialized_tick, whirlpool};
    use soroban_sdk::Env;

    #[test]
    fn test_sqrt_price_in_bounds() {
        assert!(sqrt_price_in_bounds(MIN_SQRT_PRICE_X64));
        assert!(sqrt_price_in_bounds(MAX_SQRT_PRICE_X64));
        assert!(sqrt_price_in_bounds(1 << 64));
        assert!(!sqrt_price_in_bounds(MIN_SQRT_PRICE_X64 - 1));
        assert!(!sqrt_price_in_bounds(MAX_SQRT_PRICE_X64 + 1));
    }

    #[test]
    fn test_tick_in_bounds() {
        assert!(tick_in_bounds(0));
        assert!(tick_in_bounds(MIN_TICK_INDEX - 1));
        assert!(tick_in_bounds(MAX_TICK_INDEX));
        assert!(!tick_in_bounds(MIN_TICK_INDEX - 2));
        assert!(!tick_in_bounds(MAX_TICK_INDEX + 1));
    }

    #[test]
    fn test_tick_consistent_with_price() {
        assert!(tick_consistent_with_price(100, 100));
        assert!(tick_consistent_with_price(99, 100)); // Crossed downward onto 100
        assert!(!tick_consistent_with_price(101, 100));
        assert!(!tick_consistent_with_price(98, 100));
    }

    #[test]
    fn test_liquidity_delta_valid() {
        assert!(liquidity_delta_valid(1000, 500));
        assert!(liquidity_delta_valid(1000, -1000));
        assert!(!liquidity_delta_valid(1000, -1001));
        assert!(!liquidity_delta_valid(u128::MAX, 1));
    }

    #[test]
    fn test_liquidity_matches_ticks() {
        let env = Env::default();
        let mut arrays = Vec::new(&env);
        let mut lower = TickArray::new(&env, 0, -5632);
        lower.ticks.set(86, initialized_tick(&env, 500, 0, 0)); // -128
        let mut upper = TickArray::new(&env, 0, 0);
        upper.ticks.set(2, initialized_tick(&env, -500, 0, 0)); // 128
        arrays.push_back(lower);
        arrays.push_back(upper);

        assert!(liquidity_matches_ticks(0, -129, &arrays, 64));
        assert!(liquidity_matches_ticks(500, -128, &arrays, 64));
        assert!(liquidity_matches_ticks(500, 127, &arrays, 64));
        assert!(liquidity_matches_ticks(0, 128, &arrays, 64));
        assert!(!liquidity_matches_ticks(400, 0, &arrays, 64));
    }

    #[test]
    fn test_fee_growth_monotonic() {
        assert!(fee_growth_monotonic(100, 200));
        assert!(fee_growth_monotonic(100, 100));
        assert!(!fee_growth_monotonic(200, 100));
    }

    #[test]
    fn test_fee_rates_valid() {
        let env = Env::default();
        let mut pool = whirlpool(&env, 64, 0, 0);
        assert!(fee_rates_valid(&pool));
        pool.fee_rate = MAX_FEE_RATE + 1;
        assert!(!fee_rates_valid(&pool));
    }

    #[test]
    fn test_fee_bounded_by_input() {
        assert!(fee_bounded_by_input(3, 1000));
        assert!(!fee_bounded_by_input(1001, 1000));
    }

    #[test]
    fn test_swap_direction_consistent() {
        assert!(swap_direction_consistent(true, 1000, 900));
        assert!(swap_direction_consistent(true, 1000, 1000));
        assert!(!swap_direction_consistent(true, 1000, 1100));
        assert!(swap_direction_consistent(false, 1000, 1100));
        assert!(!swap_direction_consistent(false, 1000, 900));
    }

    #[test]
    fn test_swap_respects_limit() {
        assert!(swap_respects_limit(true, 500, 400));
        assert!(swap_respects_limit(true, 400, 400));
        assert!(!swap_respects_limit(true, 300, 400));
        assert!(swap_respects_limit(false, 600, 600));
        assert!(!swap_respects_limit(false, 700, 600));
    }

    #[test]
    fn test_tick_liquidity_consistent() {
        let env = Env::default();
        assert!(tick_liquidity_consistent(&Tick::new(&env)));
        assert!(tick_liquidity_consistent(&initialized_tick(&env, -500, 0, 0)));
        let mut tick = initialized_tick(&env, 500, 0, 0);
        tick.liquidity_gross = 400;
        assert!(!tick_liquidity_consistent(&tick));
    }

    #[test]
    fn test_tick_on_spacing() {
        assert!(tick_on_spacing(128, 64));
        assert!(tick_on_spacing(-128, 64));
        assert!(!tick_on_spacing(100, 64));
    }
}
