use crate::fees::{
    next_fee_growths_inside, next_position_modify_liquidity_update, next_reward_growths_inside,
    next_whirlpool_reward_infos,
};
use crate::invariants;
use crate::storage::{
    get_position, get_position_tick_arrays, get_whirlpool, next_position_mint, remove_position,
    set_position, set_tick_array, set_whirlpool,
};
use crate::tick::{get_tick, next_tick_modify_liquidity_update, update_tick};
use soroban_sdk::{log, token, Address, Env, Symbol, Vec};
use whirlpool_math::{add_liquidity_delta, get_amounts_for_liquidity, is_tick_initializable};
use whirlpool_types::{
    is_tick_index_in_bounds, reward_growths, Position, PositionUpdate, Tick, TickUpdate, Whirlpool,
    WhirlpoolError, WhirlpoolRewardInfo,
};

// === Token movement ===

/// Move `amount` of `mint` from `from` into the program's vault
pub fn transfer_to_vault(env: &Env, mint: &Address, from: &Address, amount: u64) {
    if amount > 0 {
        token::Client::new(env, mint).transfer(
            from,
            &env.current_contract_address(),
            &(amount as i128),
        );
    }
}

/// Pay `amount` of `mint` out of the program's vault
pub fn transfer_from_vault(env: &Env, mint: &Address, to: &Address, amount: u64) {
    if amount > 0 {
        token::Client::new(env, mint).transfer(
            &env.current_contract_address(),
            to,
            &(amount as i128),
        );
    }
}

// === Pure accounting ===

/// lower < upper, both in bounds and multiples of the tick spacing
pub fn validate_tick_range(
    tick_lower_index: i32,
    tick_upper_index: i32,
    tick_spacing: u32,
) -> Result<(), WhirlpoolError> {
    if tick_lower_index >= tick_upper_index {
        return Err(WhirlpoolError::InvalidTickRange);
    }
    if !is_tick_index_in_bounds(tick_lower_index) || !is_tick_index_in_bounds(tick_upper_index) {
        return Err(WhirlpoolError::TickOutOfBounds);
    }
    if !is_tick_initializable(tick_lower_index, tick_spacing)
        || !is_tick_initializable(tick_upper_index, tick_spacing)
    {
        return Err(WhirlpoolError::InvalidTickIndex);
    }
    Ok(())
}

/// Pool liquidity after a position over [lower, upper) changes by `liquidity_delta`.
/// Only in-range positions contribute.
pub fn next_whirlpool_liquidity(
    whirlpool: &Whirlpool,
    tick_lower_index: i32,
    tick_upper_index: i32,
    liquidity_delta: i128,
) -> Result<u128, WhirlpoolError> {
    if whirlpool.tick_current_index >= tick_lower_index
        && whirlpool.tick_current_index < tick_upper_index
    {
        add_liquidity_delta(whirlpool.liquidity, liquidity_delta)
    } else {
        Ok(whirlpool.liquidity)
    }
}

/// Every account change caused by one liquidity modification
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModifyLiquidityUpdate {
    pub whirlpool_liquidity: u128,
    pub reward_infos: Vec<WhirlpoolRewardInfo>,
    pub position_update: PositionUpdate,
    pub tick_lower_update: TickUpdate,
    pub tick_upper_update: TickUpdate,
}

/// Settle the position at its current liquidity, then apply `liquidity_delta`
/// to the position, both boundary ticks and, when in range, the pool.
pub fn calculate_modify_liquidity(
    env: &Env,
    whirlpool: &Whirlpool,
    position: &Position,
    tick_lower: &Tick,
    tick_upper: &Tick,
    liquidity_delta: i128,
    timestamp: u64,
) -> Result<ModifyLiquidityUpdate, WhirlpoolError> {
    let reward_infos = next_whirlpool_reward_infos(env, whirlpool, timestamp)?;
    let reward_growths_global = reward_growths(&reward_infos);

    let whirlpool_liquidity = next_whirlpool_liquidity(
        whirlpool,
        position.tick_lower_index,
        position.tick_upper_index,
        liquidity_delta,
    )?;

    let tick_lower_update = next_tick_modify_liquidity_update(
        tick_lower,
        position.tick_lower_index,
        whirlpool.tick_current_index,
        whirlpool.fee_growth_global_a,
        whirlpool.fee_growth_global_b,
        &reward_growths_global,
        liquidity_delta,
        false,
    )?;
    let tick_upper_update = next_tick_modify_liquidity_update(
        tick_upper,
        position.tick_upper_index,
        whirlpool.tick_current_index,
        whirlpool.fee_growth_global_a,
        whirlpool.fee_growth_global_b,
        &reward_growths_global,
        liquidity_delta,
        true,
    )?;

    let (fee_growth_inside_a, fee_growth_inside_b) = next_fee_growths_inside(
        whirlpool.tick_current_index,
        tick_lower,
        position.tick_lower_index,
        tick_upper,
        position.tick_upper_index,
        whirlpool.fee_growth_global_a,
        whirlpool.fee_growth_global_b,
    );
    let reward_growths_inside = next_reward_growths_inside(
        whirlpool.tick_current_index,
        tick_lower,
        position.tick_lower_index,
        tick_upper,
        position.tick_upper_index,
        &reward_infos,
    );

    let position_update = next_position_modify_liquidity_update(
        env,
        position,
        liquidity_delta,
        fee_growth_inside_a,
        fee_growth_inside_b,
        &reward_growths_inside,
    )?;

    Ok(ModifyLiquidityUpdate {
        whirlpool_liquidity,
        reward_infos,
        position_update,
        tick_lower_update,
        tick_upper_update,
    })
}

fn to_liquidity_delta(liquidity_amount: u128, increase: bool) -> Result<i128, WhirlpoolError> {
    if liquidity_amount == 0 {
        return Err(WhirlpoolError::LiquidityZero);
    }
    let delta = i128::try_from(liquidity_amount).map_err(|_| WhirlpoolError::LiquidityOverflow)?;
    Ok(if increase { delta } else { -delta })
}

/// Load, compute and persist a liquidity change. `check_amounts` sees the
/// token amounts before anything is written.
fn modify_liquidity(
    env: &Env,
    whirlpool: &mut Whirlpool,
    position: &mut Position,
    liquidity_delta: i128,
    check_amounts: impl FnOnce(u64, u64) -> Result<(), WhirlpoolError>,
) -> Result<(u64, u64), WhirlpoolError> {
    let (mut lower_array, mut upper_array) = get_position_tick_arrays(env, whirlpool, position)?;
    let same_array = lower_array.start_tick_index == upper_array.start_tick_index;
    let tick_spacing = whirlpool.tick_spacing;

    let tick_lower = get_tick(&lower_array, position.tick_lower_index, tick_spacing)?;
    let tick_upper = get_tick(&upper_array, position.tick_upper_index, tick_spacing)?;

    let timestamp = env.ledger().timestamp();
    let update = calculate_modify_liquidity(
        env,
        whirlpool,
        position,
        &tick_lower,
        &tick_upper,
        liquidity_delta,
        timestamp,
    )?;

    let (amount_a, amount_b) = get_amounts_for_liquidity(
        env,
        whirlpool.tick_current_index,
        whirlpool.sqrt_price,
        position.tick_lower_index,
        position.tick_upper_index,
        liquidity_delta,
    )?;
    check_amounts(amount_a, amount_b)?;

    debug_assert!(invariants::liquidity_delta_valid(
        position.liquidity,
        liquidity_delta
    ));

    // Stage every change, then write
    update_tick(
        &mut lower_array,
        position.tick_lower_index,
        tick_spacing,
        &update.tick_lower_update,
    )?;
    if same_array {
        update_tick(
            &mut lower_array,
            position.tick_upper_index,
            tick_spacing,
            &update.tick_upper_update,
        )?;
    } else {
        update_tick(
            &mut upper_array,
            position.tick_upper_index,
            tick_spacing,
            &update.tick_upper_update,
        )?;
    }

    whirlpool.update_rewards_and_liquidity(
        update.reward_infos,
        update.whirlpool_liquidity,
        timestamp,
    );
    position.update(&update.position_update);

    set_tick_array(env, &lower_array);
    if !same_array {
        set_tick_array(env, &upper_array);
    }
    set_whirlpool(env, whirlpool);
    set_position(env, position);

    Ok((amount_a, amount_b))
}

// === Instructions ===

/// Open an empty position over [tick_lower_index, tick_upper_index)
pub fn open_position(
    env: &Env,
    owner: Address,
    whirlpool_id: u32,
    tick_lower_index: i32,
    tick_upper_index: i32,
) -> Result<u32, WhirlpoolError> {
    let whirlpool = get_whirlpool(env, whirlpool_id)?;

    let range = validate_tick_range(tick_lower_index, tick_upper_index, whirlpool.tick_spacing);
    if let Err(err) = range {
        log!(env, "invalid position range", tick_lower_index, tick_upper_index);
        return Err(err);
    }

    let position_mint = next_position_mint(env);
    let position = Position::open(
        env,
        whirlpool_id,
        position_mint,
        owner.clone(),
        tick_lower_index,
        tick_upper_index,
    );
    set_position(env, &position);

    env.events().publish(
        (Symbol::new(env, "open_position"), whirlpool_id, position_mint),
        (owner, tick_lower_index, tick_upper_index),
    );

    Ok(position_mint)
}

/// Add liquidity, pulling at most `token_max_a` / `token_max_b` from the owner
pub fn increase_liquidity(
    env: &Env,
    position_mint: u32,
    liquidity_amount: u128,
    token_max_a: u64,
    token_max_b: u64,
) -> Result<(u64, u64), WhirlpoolError> {
    let liquidity_delta = to_liquidity_delta(liquidity_amount, true)?;
    let mut position = get_position(env, position_mint)?;
    position.owner.require_auth();
    let mut whirlpool = get_whirlpool(env, position.whirlpool)?;

    let (amount_a, amount_b) = modify_liquidity(
        env,
        &mut whirlpool,
        &mut position,
        liquidity_delta,
        |amount_a, amount_b| {
            if amount_a > token_max_a || amount_b > token_max_b {
                log!(env, "deposit exceeds maximum", amount_a, amount_b);
                return Err(WhirlpoolError::TokenMaxExceeded);
            }
            Ok(())
        },
    )?;

    transfer_to_vault(env, &whirlpool.token_mint_a, &position.owner, amount_a);
    transfer_to_vault(env, &whirlpool.token_mint_b, &position.owner, amount_b);

    env.events().publish(
        (Symbol::new(env, "increase_liquidity"), position.whirlpool, position_mint),
        (liquidity_amount, amount_a, amount_b),
    );

    Ok((amount_a, amount_b))
}

/// Remove liquidity, paying at least `token_min_a` / `token_min_b` to the owner
pub fn decrease_liquidity(
    env: &Env,
    position_mint: u32,
    liquidity_amount: u128,
    token_min_a: u64,
    token_min_b: u64,
) -> Result<(u64, u64), WhirlpoolError> {
    let liquidity_delta = to_liquidity_delta(liquidity_amount, false)?;
    let mut position = get_position(env, position_mint)?;
    position.owner.require_auth();
    let mut whirlpool = get_whirlpool(env, position.whirlpool)?;

    if liquidity_amount > position.liquidity {
        log!(env, "position liquidity too low", position.liquidity);
        return Err(WhirlpoolError::LiquidityUnderflow);
    }

    let (amount_a, amount_b) = modify_liquidity(
        env,
        &mut whirlpool,
        &mut position,
        liquidity_delta,
        |amount_a, amount_b| {
            if amount_a < token_min_a || amount_b < token_min_b {
                log!(env, "withdrawal below minimum", amount_a, amount_b);
                return Err(WhirlpoolError::TokenMinNotMet);
            }
            Ok(())
        },
    )?;

    transfer_from_vault(env, &whirlpool.token_mint_a, &position.owner, amount_a);
    transfer_from_vault(env, &whirlpool.token_mint_b, &position.owner, amount_b);

    env.events().publish(
        (Symbol::new(env, "decrease_liquidity"), position.whirlpool, position_mint),
        (liquidity_amount, amount_a, amount_b),
    );

    Ok((amount_a, amount_b))
}

/// Close a fully drained position
pub fn close_position(env: &Env, position_mint: u32) -> Result<(), WhirlpoolError> {
    let position = get_position(env, position_mint)?;
    position.owner.require_auth();

    if !position.is_empty() {
        log!(
            env,
            "position not drained",
            position.liquidity,
            position.fee_owed_a,
            position.fee_owed_b
        );
        return Err(WhirlpoolError::PositionNotDrained);
    }

    remove_position(env, position_mint);

    env.events().publish(
        (Symbol::new(env, "close_position"), position.whirlpool, position_mint),
        position.owner,
    );

    Ok(())
}
