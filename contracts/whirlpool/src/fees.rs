use crate::liquidity::transfer_from_vault;
use crate::storage::{
    get_position, get_position_tick_arrays, get_whirlpool, set_position, set_whirlpool,
};
use crate::tick::get_tick;
use soroban_sdk::{log, Env, Symbol, Vec};
use whirlpool_math::{add_liquidity_delta, mul_div_floor, mul_shift_right, u128_to_u64};
use whirlpool_types::{
    Position, PositionUpdate, Tick, Whirlpool, WhirlpoolError, WhirlpoolRewardInfo, NUM_REWARDS,
    Q64_RESOLUTION,
};

// ============================================================================
// GROWTH INSIDE
// ============================================================================
// Growth inside [lower, upper) is derived from the global growth and the
// "outside" growth recorded at both boundary ticks. Which side of a tick
// "outside" refers to depends on where the current price sits, hence the
// three regions. All growth values wrap; only differences are meaningful.
// ============================================================================

/// Where the current tick lies relative to a position's range
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PriceRegion {
    /// current < lower
    Below,
    /// lower <= current < upper
    Inside,
    /// upper <= current
    Above,
}

impl PriceRegion {
    pub fn new(tick_current_index: i32, tick_lower_index: i32, tick_upper_index: i32) -> Self {
        if tick_current_index < tick_lower_index {
            PriceRegion::Below
        } else if tick_current_index < tick_upper_index {
            PriceRegion::Inside
        } else {
            PriceRegion::Above
        }
    }

    /// Growth inside the range given the outside growth of both boundaries
    pub fn growth_inside(self, global: u128, lower_outside: u128, upper_outside: u128) -> u128 {
        match self {
            PriceRegion::Below => lower_outside.wrapping_sub(upper_outside),
            PriceRegion::Inside => global
                .wrapping_sub(lower_outside)
                .wrapping_sub(upper_outside),
            PriceRegion::Above => upper_outside.wrapping_sub(lower_outside),
        }
    }
}

/// Outside growth of a tick. An uninitialized tick reads as if it had just
/// been initialized: all growth below it when the current tick is at or above it.
fn effective_outside(
    tick: &Tick,
    outside: u128,
    tick_index: i32,
    tick_current_index: i32,
    global: u128,
) -> u128 {
    if tick.initialized {
        outside
    } else if tick_current_index >= tick_index {
        global
    } else {
        0
    }
}

pub fn next_fee_growths_inside(
    tick_current_index: i32,
    tick_lower: &Tick,
    tick_lower_index: i32,
    tick_upper: &Tick,
    tick_upper_index: i32,
    fee_growth_global_a: u128,
    fee_growth_global_b: u128,
) -> (u128, u128) {
    let region = PriceRegion::new(tick_current_index, tick_lower_index, tick_upper_index);

    let inside = |global: u128, lower_outside: u128, upper_outside: u128| {
        region.growth_inside(
            global,
            effective_outside(
                tick_lower,
                lower_outside,
                tick_lower_index,
                tick_current_index,
                global,
            ),
            effective_outside(
                tick_upper,
                upper_outside,
                tick_upper_index,
                tick_current_index,
                global,
            ),
        )
    };

    (
        inside(
            fee_growth_global_a,
            tick_lower.fee_growth_outside_a,
            tick_upper.fee_growth_outside_a,
        ),
        inside(
            fee_growth_global_b,
            tick_lower.fee_growth_outside_b,
            tick_upper.fee_growth_outside_b,
        ),
    )
}

/// Reward growth inside the range per slot; uninitialized slots read as zero
pub fn next_reward_growths_inside(
    tick_current_index: i32,
    tick_lower: &Tick,
    tick_lower_index: i32,
    tick_upper: &Tick,
    tick_upper_index: i32,
    reward_infos: &Vec<WhirlpoolRewardInfo>,
) -> [u128; NUM_REWARDS] {
    let region = PriceRegion::new(tick_current_index, tick_lower_index, tick_upper_index);
    let lower_outside = tick_lower.reward_growths_outside();
    let upper_outside = tick_upper.reward_growths_outside();

    let mut growths = [0u128; NUM_REWARDS];
    for (i, growth) in growths.iter_mut().enumerate() {
        let info = match reward_infos.get(i as u32) {
            Some(info) if info.initialized() => info,
            _ => continue,
        };
        let global = info.growth_global_x64;
        *growth = region.growth_inside(
            global,
            effective_outside(
                tick_lower,
                lower_outside[i],
                tick_lower_index,
                tick_current_index,
                global,
            ),
            effective_outside(
                tick_upper,
                upper_outside[i],
                tick_upper_index,
                tick_current_index,
                global,
            ),
        );
    }
    growths
}

// ============================================================================
// ACCRUAL
// ============================================================================

/// Reward infos advanced to `next_timestamp`.
///
/// Emissions while no liquidity is in range are not attributed to anyone.
pub fn next_whirlpool_reward_infos(
    env: &Env,
    whirlpool: &Whirlpool,
    next_timestamp: u64,
) -> Result<Vec<WhirlpoolRewardInfo>, WhirlpoolError> {
    let last_timestamp = whirlpool.reward_last_updated_timestamp;
    if next_timestamp < last_timestamp {
        return Err(WhirlpoolError::InvalidTimestamp);
    }

    let mut reward_infos = whirlpool.reward_infos.clone();
    if whirlpool.liquidity == 0 || next_timestamp == last_timestamp {
        return Ok(reward_infos);
    }

    let elapsed = (next_timestamp - last_timestamp) as u128;
    for i in 0..reward_infos.len() {
        let mut info = match reward_infos.get(i) {
            Some(info) if info.initialized() => info,
            _ => continue,
        };
        let growth_delta =
            mul_div_floor(env, elapsed, info.emissions_per_second_x64, whirlpool.liquidity)?;
        info.growth_global_x64 = info
            .growth_global_x64
            .checked_add(growth_delta)
            .ok_or(WhirlpoolError::MathOverflow)?;
        reward_infos.set(i, info);
    }

    Ok(reward_infos)
}

/// Owed amount accrued on `liquidity` since `checkpoint`
fn accrued(
    env: &Env,
    liquidity: u128,
    inside: u128,
    checkpoint: u128,
) -> Result<u64, WhirlpoolError> {
    let growth_delta = inside.wrapping_sub(checkpoint);
    u128_to_u64(mul_shift_right(
        env,
        liquidity,
        growth_delta,
        Q64_RESOLUTION,
        false,
    )?)
}

/// Settle fees and rewards into a position with its current liquidity, then
/// apply `liquidity_delta`.
pub fn next_position_modify_liquidity_update(
    env: &Env,
    position: &Position,
    liquidity_delta: i128,
    fee_growth_inside_a: u128,
    fee_growth_inside_b: u128,
    reward_growths_inside: &[u128; NUM_REWARDS],
) -> Result<PositionUpdate, WhirlpoolError> {
    let mut update = PositionUpdate::from(position);

    let fee_delta_a = accrued(
        env,
        position.liquidity,
        fee_growth_inside_a,
        position.fee_growth_checkpoint_a,
    )?;
    let fee_delta_b = accrued(
        env,
        position.liquidity,
        fee_growth_inside_b,
        position.fee_growth_checkpoint_b,
    )?;

    update.fee_growth_checkpoint_a = fee_growth_inside_a;
    update.fee_growth_checkpoint_b = fee_growth_inside_b;
    update.fee_owed_a = position
        .fee_owed_a
        .checked_add(fee_delta_a)
        .ok_or(WhirlpoolError::MathOverflow)?;
    update.fee_owed_b = position
        .fee_owed_b
        .checked_add(fee_delta_b)
        .ok_or(WhirlpoolError::MathOverflow)?;

    for (i, info) in update.reward_infos.iter_mut().enumerate() {
        let reward_delta = accrued(
            env,
            position.liquidity,
            reward_growths_inside[i],
            info.growth_inside_checkpoint,
        )?;
        info.growth_inside_checkpoint = reward_growths_inside[i];
        info.amount_owed = info
            .amount_owed
            .checked_add(reward_delta)
            .ok_or(WhirlpoolError::MathOverflow)?;
    }

    update.liquidity = add_liquidity_delta(position.liquidity, liquidity_delta)?;

    Ok(update)
}

/// Fee and reward settlement for a position without changing its liquidity
pub fn calculate_fee_and_reward_growths(
    env: &Env,
    whirlpool: &Whirlpool,
    position: &Position,
    tick_lower: &Tick,
    tick_upper: &Tick,
    timestamp: u64,
) -> Result<(PositionUpdate, Vec<WhirlpoolRewardInfo>), WhirlpoolError> {
    let (fee_growth_inside_a, fee_growth_inside_b) = next_fee_growths_inside(
        whirlpool.tick_current_index,
        tick_lower,
        position.tick_lower_index,
        tick_upper,
        position.tick_upper_index,
        whirlpool.fee_growth_global_a,
        whirlpool.fee_growth_global_b,
    );

    let reward_infos = next_whirlpool_reward_infos(env, whirlpool, timestamp)?;
    let reward_growths_inside = next_reward_growths_inside(
        whirlpool.tick_current_index,
        tick_lower,
        position.tick_lower_index,
        tick_upper,
        position.tick_upper_index,
        &reward_infos,
    );

    let update = next_position_modify_liquidity_update(
        env,
        position,
        0,
        fee_growth_inside_a,
        fee_growth_inside_b,
        &reward_growths_inside,
    )?;

    Ok((update, reward_infos))
}

// ============================================================================
// INSTRUCTIONS
// ============================================================================

/// Bring a position's owed fees and rewards up to date. Anyone may call.
pub fn update_fees_and_rewards(env: &Env, position_mint: u32) -> Result<(), WhirlpoolError> {
    let mut position = get_position(env, position_mint)?;
    let mut whirlpool = get_whirlpool(env, position.whirlpool)?;

    if position.liquidity == 0 {
        log!(env, "position holds no liquidity", position_mint);
        return Err(WhirlpoolError::LiquidityZero);
    }

    let (lower_array, upper_array) = get_position_tick_arrays(env, &whirlpool, &position)?;
    let tick_lower = get_tick(&lower_array, position.tick_lower_index, whirlpool.tick_spacing)?;
    let tick_upper = get_tick(&upper_array, position.tick_upper_index, whirlpool.tick_spacing)?;

    let timestamp = env.ledger().timestamp();
    let (update, reward_infos) = calculate_fee_and_reward_growths(
        env,
        &whirlpool,
        &position,
        &tick_lower,
        &tick_upper,
        timestamp,
    )?;

    whirlpool.update_rewards(reward_infos, timestamp);
    position.update(&update);
    set_whirlpool(env, &whirlpool);
    set_position(env, &position);

    env.events().publish(
        (Symbol::new(env, "fees_updated"), position_mint),
        (position.fee_owed_a, position.fee_owed_b),
    );

    Ok(())
}

/// Pay out owed fees to the position owner
pub fn collect_fees(env: &Env, position_mint: u32) -> Result<(u64, u64), WhirlpoolError> {
    let mut position = get_position(env, position_mint)?;
    position.owner.require_auth();
    let whirlpool = get_whirlpool(env, position.whirlpool)?;

    let amount_a = position.fee_owed_a;
    let amount_b = position.fee_owed_b;

    position.reset_fees_owed();
    set_position(env, &position);

    transfer_from_vault(env, &whirlpool.token_mint_a, &position.owner, amount_a);
    transfer_from_vault(env, &whirlpool.token_mint_b, &position.owner, amount_b);

    env.events().publish(
        (Symbol::new(env, "collect_fees"), position_mint),
        (amount_a, amount_b),
    );

    Ok((amount_a, amount_b))
}

/// Pay out an owed reward, limited by the slot's funded reserve.
/// Whatever the reserve cannot cover stays owed.
pub fn collect_reward(
    env: &Env,
    position_mint: u32,
    reward_index: u32,
) -> Result<u64, WhirlpoolError> {
    let mut position = get_position(env, position_mint)?;
    position.owner.require_auth();
    let mut whirlpool = get_whirlpool(env, position.whirlpool)?;

    let reward_info = whirlpool.reward_info(reward_index)?;
    let mint = match reward_info.mint {
        Some(mint) => mint,
        None => {
            log!(env, "reward slot not initialized", reward_index);
            return Err(WhirlpoolError::RewardNotInitialized);
        }
    };

    let owed = position.reward_info(reward_index)?.amount_owed;
    let amount = whirlpool.pay_reward(reward_index, owed)?;

    position.update_reward_owed(reward_index, owed - amount)?;
    set_position(env, &position);
    set_whirlpool(env, &whirlpool);

    transfer_from_vault(env, &mint, &position.owner, amount);

    env.events().publish(
        (Symbol::new(env, "collect_reward"), position_mint, reward_index),
        amount,
    );

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{initialized_tick, whirlpool};
    use soroban_sdk::testutils::Address as _;
    use soroban_sdk::Address;

    const Q64: u128 = 1 << 64;

    // === PriceRegion tests ===

    #[test]
    fn test_price_region() {
        assert_eq!(PriceRegion::new(-200, -128, 128), PriceRegion::Below);
        assert_eq!(PriceRegion::new(-128, -128, 128), PriceRegion::Inside);
        assert_eq!(PriceRegion::new(127, -128, 128), PriceRegion::Inside);
        assert_eq!(PriceRegion::new(128, -128, 128), PriceRegion::Above);
    }

    #[test]
    fn test_growth_inside_per_region() {
        assert_eq!(PriceRegion::Below.growth_inside(100, 30, 10), 20);
        assert_eq!(PriceRegion::Inside.growth_inside(100, 30, 10), 60);
        assert_eq!(PriceRegion::Above.growth_inside(100, 10, 30), 20);
        // Wraps instead of failing
        assert_eq!(PriceRegion::Inside.growth_inside(5, 10, 0), u128::MAX - 4);
    }

    // === fee growth inside tests ===

    #[test]
    fn test_fee_growth_inside_fresh_ticks_in_range() {
        let env = Env::default();
        // Both ticks initialized while the price was inside: lower gets global, upper 0
        let lower = initialized_tick(&env, 100, 500, 700);
        let upper = initialized_tick(&env, -100, 0, 0);
        assert_eq!(
            next_fee_growths_inside(0, &lower, -128, &upper, 128, 500, 700),
            (0, 0)
        );
        // Fees accrued afterwards are all inside
        assert_eq!(
            next_fee_growths_inside(0, &lower, -128, &upper, 128, 800, 1000),
            (300, 300)
        );
    }

    #[test]
    fn test_fee_growth_inside_uninitialized_ticks() {
        let env = Env::default();
        let blank = Tick::new(&env);
        // Inside: lower reads as global, upper as zero
        assert_eq!(
            next_fee_growths_inside(0, &blank, -128, &blank, 128, 500, 700),
            (0, 0)
        );
        // Below and above: nothing inside
        assert_eq!(
            next_fee_growths_inside(-500, &blank, -128, &blank, 128, 500, 700),
            (0, 0)
        );
        assert_eq!(
            next_fee_growths_inside(500, &blank, -128, &blank, 128, 500, 700),
            (0, 0)
        );
    }

    #[test]
    fn test_fee_growth_inside_after_price_left_range() {
        let env = Env::default();
        // Price crossed the upper tick after 300 growth accrued inside
        let lower = initialized_tick(&env, 100, 500, 0);
        let upper = initialized_tick(&env, -100, 800, 0);
        assert_eq!(
            next_fee_growths_inside(200, &lower, -128, &upper, 128, 900, 0),
            (300, 0)
        );
    }

    // === reward accrual tests ===

    fn with_reward(env: &Env, pool: &mut Whirlpool, emissions: u128) {
        pool.initialize_reward(
            0,
            Address::generate(env),
            Address::generate(env),
            Address::generate(env),
        )
        .unwrap();
        let infos = pool.reward_infos.clone();
        pool.update_emissions(0, infos, 0, emissions).unwrap();
    }

    #[test]
    fn test_reward_infos_advance_with_time() {
        let env = Env::default();
        let mut pool = whirlpool(&env, 64, 0, 1000);
        with_reward(&env, &mut pool, 10 * Q64);

        let infos = next_whirlpool_reward_infos(&env, &pool, 100).unwrap();
        // 100s * 10/s / 1000 liquidity = 1 per unit of liquidity
        assert_eq!(infos.get(0).unwrap().growth_global_x64, Q64);
        assert_eq!(infos.get(1).unwrap().growth_global_x64, 0);
    }

    #[test]
    fn test_reward_infos_unchanged_without_liquidity_or_time() {
        let env = Env::default();
        let mut pool = whirlpool(&env, 64, 0, 0);
        with_reward(&env, &mut pool, 10 * Q64);
        assert_eq!(
            next_whirlpool_reward_infos(&env, &pool, 100).unwrap(),
            pool.reward_infos
        );

        pool.liquidity = 1000;
        pool.reward_last_updated_timestamp = 100;
        assert_eq!(
            next_whirlpool_reward_infos(&env, &pool, 100).unwrap(),
            pool.reward_infos
        );
    }

    #[test]
    fn test_reward_infos_reject_time_going_back() {
        let env = Env::default();
        let mut pool = whirlpool(&env, 64, 0, 1000);
        pool.reward_last_updated_timestamp = 100;
        assert_eq!(
            next_whirlpool_reward_infos(&env, &pool, 99),
            Err(WhirlpoolError::InvalidTimestamp)
        );
    }

    // === position settlement tests ===

    #[test]
    fn test_position_update_accrues_fees() {
        let env = Env::default();
        let mut position = Position::open(&env, 0, 0, Address::generate(&env), -128, 128);
        position.liquidity = 1000;

        // 3 tokens per unit of liquidity in A, half a token in B
        let update = next_position_modify_liquidity_update(
            &env,
            &position,
            0,
            3 * Q64,
            Q64 / 2,
            &[0; NUM_REWARDS],
        )
        .unwrap();
        assert_eq!(update.fee_owed_a, 3000);
        assert_eq!(update.fee_owed_b, 500);
        assert_eq!(update.fee_growth_checkpoint_a, 3 * Q64);
        assert_eq!(update.liquidity, 1000);

        // Settling again at the same growth adds nothing
        position.update(&update);
        let again = next_position_modify_liquidity_update(
            &env,
            &position,
            -400,
            3 * Q64,
            Q64 / 2,
            &[0; NUM_REWARDS],
        )
        .unwrap();
        assert_eq!(again.fee_owed_a, 3000);
        assert_eq!(again.liquidity, 600);
    }

    #[test]
    fn test_position_update_wrapped_growth() {
        let env = Env::default();
        let mut position = Position::open(&env, 0, 0, Address::generate(&env), -128, 128);
        position.liquidity = 1000;
        position.fee_growth_checkpoint_a = u128::MAX - Q64 + 1;

        // Growth wrapped past zero: delta is still one token per unit
        let update =
            next_position_modify_liquidity_update(&env, &position, 0, 0, 0, &[0; NUM_REWARDS])
                .unwrap();
        assert_eq!(update.fee_owed_a, 1000);
    }

    #[test]
    fn test_position_update_rewards_and_errors() {
        let env = Env::default();
        let mut position = Position::open(&env, 0, 0, Address::generate(&env), -128, 128);
        position.liquidity = 10;

        let update =
            next_position_modify_liquidity_update(&env, &position, 0, 0, 0, &[Q64, 0, 2 * Q64])
                .unwrap();
        assert_eq!(update.reward_infos[0].amount_owed, 10);
        assert_eq!(update.reward_infos[1].amount_owed, 0);
        assert_eq!(update.reward_infos[2].amount_owed, 20);
        assert_eq!(update.reward_infos[2].growth_inside_checkpoint, 2 * Q64);

        assert_eq!(
            next_position_modify_liquidity_update(&env, &position, -11, 0, 0, &[0; NUM_REWARDS]),
            Err(WhirlpoolError::LiquidityUnderflow)
        );

        position.fee_owed_a = u64::MAX;
        assert_eq!(
            next_position_modify_liquidity_update(&env, &position, 0, Q64, 0, &[0; NUM_REWARDS]),
            Err(WhirlpoolError::MathOverflow)
        );
    }

    #[test]
    fn test_reward_growths_inside_skips_uninitialized_slots() {
        let env = Env::default();
        let mut pool = whirlpool(&env, 64, 0, 1000);
        with_reward(&env, &mut pool, Q64);
        let mut info = pool.reward_info(0).unwrap();
        info.growth_global_x64 = 77;
        pool.reward_infos.set(0, info);

        let blank = Tick::new(&env);
        // Lower reads as global, upper as zero: nothing inside yet
        assert_eq!(
            next_reward_growths_inside(0, &blank, -128, &blank, 128, &pool.reward_infos),
            [0, 0, 0]
        );
        // Lower initialized before any reward accrued: all growth so far is inside
        let lower = initialized_tick(&env, 10, 0, 0);
        assert_eq!(
            next_reward_growths_inside(0, &lower, -128, &blank, 128, &pool.reward_infos),
            [77, 0, 0]
        );
    }
}
