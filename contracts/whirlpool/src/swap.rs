use crate::fees::next_whirlpool_reward_infos;
use crate::invariants;
use crate::liquidity::{transfer_from_vault, transfer_to_vault};
use crate::storage::{get_config, get_tick_array, get_whirlpool, set_tick_array, set_whirlpool};
use crate::tick::{next_tick_cross_update, TickArraySequence};
use soroban_sdk::{contracttype, log, Address, Env, Symbol, Vec};
use whirlpool_math::{
    add_liquidity_delta, compute_swap, sqrt_price_to_tick_index, tick_index_to_sqrt_price,
};
use whirlpool_types::{
    reward_growths, Whirlpool, WhirlpoolError, WhirlpoolRewardInfo, ZeroLiquidityFeePolicy,
    MAX_SQRT_PRICE_X64, MAX_SWAP_TICK_ARRAYS, MIN_SQRT_PRICE_X64, PROTOCOL_FEE_RATE_MUL_VALUE,
    Q64_RESOLUTION,
};

/// Read-only result of a swap simulation
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwapQuote {
    pub amount_a: u64,
    pub amount_b: u64,
    /// Total fee charged on the input token, protocol share included
    pub fee_amount: u64,
    pub next_sqrt_price: u128,
    pub next_tick_index: i32,
    pub next_liquidity: u128,
}

/// Pool state after a swap, staged until the caller persists it
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PostSwapUpdate {
    pub amount_a: u64,
    pub amount_b: u64,
    pub fee_amount: u64,
    pub next_liquidity: u128,
    pub next_tick_index: i32,
    pub next_sqrt_price: u128,
    /// Fee growth global of the input token
    pub next_fee_growth_global: u128,
    pub next_reward_infos: Vec<WhirlpoolRewardInfo>,
    /// Protocol fee taken by this swap
    pub next_protocol_fee: u64,
}

/// Split a step's fee into protocol and LP shares and accrue the LP share
/// into the input token's fee growth.
///
/// Returns (protocol fee, fee growth global).
pub fn calculate_fees(
    fee_amount: u64,
    protocol_fee_rate: u32,
    liquidity: u128,
    current_protocol_fee: u64,
    current_fee_growth_global: u128,
    zero_liquidity_fee_policy: ZeroLiquidityFeePolicy,
) -> Result<(u64, u128), WhirlpoolError> {
    let protocol_fee_delta =
        (fee_amount as u128 * protocol_fee_rate as u128 / PROTOCOL_FEE_RATE_MUL_VALUE) as u64;
    let lp_fee = fee_amount - protocol_fee_delta;

    let next_protocol_fee = current_protocol_fee
        .checked_add(protocol_fee_delta)
        .ok_or(WhirlpoolError::MathOverflow)?;

    if liquidity == 0 {
        return match zero_liquidity_fee_policy {
            ZeroLiquidityFeePolicy::Reject if lp_fee > 0 => Err(WhirlpoolError::ZeroLiquidityFee),
            _ => Ok((next_protocol_fee, current_fee_growth_global)),
        };
    }

    let growth_delta = ((lp_fee as u128) << Q64_RESOLUTION) / liquidity;
    let next_fee_growth_global = current_fee_growth_global
        .checked_add(growth_delta)
        .ok_or(WhirlpoolError::MathOverflow)?;

    Ok((next_protocol_fee, next_fee_growth_global))
}

fn resolve_sqrt_price_limit(sqrt_price_limit: u128, a_to_b: bool) -> u128 {
    match (sqrt_price_limit, a_to_b) {
        (0, true) => MIN_SQRT_PRICE_X64,
        (0, false) => MAX_SQRT_PRICE_X64,
        (limit, _) => limit,
    }
}

/// Swap `amount` through the pool.
///
/// The price walks from the current tick toward `sqrt_price_limit` through
/// the ticks of `tick_sequence`, crossing every initialized tick on the way.
/// Crossed ticks are updated in place; nothing else is written.
#[allow(clippy::too_many_arguments)]
pub fn swap(
    env: &Env,
    whirlpool: &Whirlpool,
    tick_sequence: &mut TickArraySequence,
    amount: u64,
    sqrt_price_limit: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
    timestamp: u64,
    zero_liquidity_fee_policy: ZeroLiquidityFeePolicy,
) -> Result<PostSwapUpdate, WhirlpoolError> {
    let sqrt_price_limit = resolve_sqrt_price_limit(sqrt_price_limit, a_to_b);

    if !(MIN_SQRT_PRICE_X64..=MAX_SQRT_PRICE_X64).contains(&sqrt_price_limit) {
        return Err(WhirlpoolError::SqrtPriceOutOfBounds);
    }
    if (a_to_b && sqrt_price_limit > whirlpool.sqrt_price)
        || (!a_to_b && sqrt_price_limit < whirlpool.sqrt_price)
    {
        return Err(WhirlpoolError::InvalidSqrtPriceLimitDirection);
    }
    if amount == 0 {
        return Err(WhirlpoolError::ZeroTradableAmount);
    }

    let next_reward_infos = next_whirlpool_reward_infos(env, whirlpool, timestamp)?;
    let reward_growths_global = reward_growths(&next_reward_infos);
    let boundary_tick_index = tick_sequence.boundary_tick_index(a_to_b)?;

    let mut amount_remaining = amount;
    let mut amount_calculated: u64 = 0;
    let mut fee_sum: u64 = 0;
    let mut curr_sqrt_price = whirlpool.sqrt_price;
    let mut curr_tick_index = whirlpool.tick_current_index;
    let mut curr_liquidity = whirlpool.liquidity;
    let mut curr_protocol_fee: u64 = 0;
    let mut curr_array_index: u32 = 0;
    let mut curr_fee_growth_global_input = if a_to_b {
        whirlpool.fee_growth_global_a
    } else {
        whirlpool.fee_growth_global_b
    };
    let mut sequence_exhausted = false;

    while amount_remaining > 0 && curr_sqrt_price != sqrt_price_limit {
        if curr_liquidity == 0 && zero_liquidity_fee_policy == ZeroLiquidityFeePolicy::Reject {
            return Err(WhirlpoolError::ZeroLiquidityFee);
        }

        let (next_array_index, next_tick_index, next_tick_initialized) =
            match tick_sequence.next_initialized_tick(curr_tick_index, a_to_b, curr_array_index)? {
                Some((array_index, tick_index)) => (array_index, tick_index, true),
                None => (tick_sequence.len() - 1, boundary_tick_index, false),
            };

        let next_tick_sqrt_price = tick_index_to_sqrt_price(env, next_tick_index)?;
        let target_sqrt_price = if a_to_b {
            next_tick_sqrt_price.max(sqrt_price_limit)
        } else {
            next_tick_sqrt_price.min(sqrt_price_limit)
        };

        let step = compute_swap(
            env,
            amount_remaining,
            whirlpool.fee_rate,
            curr_liquidity,
            curr_sqrt_price,
            target_sqrt_price,
            amount_specified_is_input,
            a_to_b,
        )?;

        if amount_specified_is_input {
            amount_remaining = amount_remaining
                .checked_sub(step.amount_in)
                .and_then(|remaining| remaining.checked_sub(step.fee_amount))
                .ok_or(WhirlpoolError::MathOverflow)?;
            amount_calculated = amount_calculated
                .checked_add(step.amount_out)
                .ok_or(WhirlpoolError::MathOverflow)?;
        } else {
            amount_remaining = amount_remaining
                .checked_sub(step.amount_out)
                .ok_or(WhirlpoolError::MathOverflow)?;
            amount_calculated = amount_calculated
                .checked_add(step.amount_in)
                .and_then(|calculated| calculated.checked_add(step.fee_amount))
                .ok_or(WhirlpoolError::MathOverflow)?;
        }
        fee_sum = fee_sum
            .checked_add(step.fee_amount)
            .ok_or(WhirlpoolError::MathOverflow)?;

        let (next_protocol_fee, next_fee_growth_global_input) = calculate_fees(
            step.fee_amount,
            whirlpool.protocol_fee_rate,
            curr_liquidity,
            curr_protocol_fee,
            curr_fee_growth_global_input,
            zero_liquidity_fee_policy,
        )?;
        curr_protocol_fee = next_protocol_fee;
        curr_fee_growth_global_input = next_fee_growth_global_input;

        if step.next_sqrt_price == next_tick_sqrt_price {
            if next_tick_initialized {
                let tick = tick_sequence.get_tick(next_array_index, next_tick_index)?;

                let (fee_growth_global_a, fee_growth_global_b) = if a_to_b {
                    (curr_fee_growth_global_input, whirlpool.fee_growth_global_b)
                } else {
                    (whirlpool.fee_growth_global_a, curr_fee_growth_global_input)
                };
                let update = next_tick_cross_update(
                    &tick,
                    fee_growth_global_a,
                    fee_growth_global_b,
                    &reward_growths_global,
                );
                tick_sequence.update_tick(next_array_index, next_tick_index, &update)?;

                // liquidity_net applies when moving up; moving down it is subtracted
                let liquidity_delta = if a_to_b {
                    tick.liquidity_net
                        .checked_neg()
                        .ok_or(WhirlpoolError::LiquidityNetError)?
                } else {
                    tick.liquidity_net
                };
                curr_liquidity = add_liquidity_delta(curr_liquidity, liquidity_delta)?;
            }

            curr_tick_index = if a_to_b {
                next_tick_index - 1
            } else {
                next_tick_index
            };

            if !next_tick_initialized {
                sequence_exhausted = true;
            }
        } else if step.next_sqrt_price != curr_sqrt_price {
            curr_tick_index = sqrt_price_to_tick_index(env, step.next_sqrt_price)?;
        }

        curr_sqrt_price = step.next_sqrt_price;
        curr_array_index = next_array_index;

        if sequence_exhausted {
            break;
        }
    }

    if sequence_exhausted
        && amount_remaining > 0
        && curr_sqrt_price != sqrt_price_limit
        && amount_specified_is_input
    {
        return Err(WhirlpoolError::SwapAmountNotFullyConsumed);
    }

    let amount_specified_used = amount - amount_remaining;
    let (amount_a, amount_b) = if a_to_b == amount_specified_is_input {
        (amount_specified_used, amount_calculated)
    } else {
        (amount_calculated, amount_specified_used)
    };

    Ok(PostSwapUpdate {
        amount_a,
        amount_b,
        fee_amount: fee_sum,
        next_liquidity: curr_liquidity,
        next_tick_index: curr_tick_index,
        next_sqrt_price: curr_sqrt_price,
        next_fee_growth_global: curr_fee_growth_global_input,
        next_reward_infos,
        next_protocol_fee: curr_protocol_fee,
    })
}

/// Load the tick arrays a swap walks through, in walk order
fn load_tick_sequence(
    env: &Env,
    whirlpool: &Whirlpool,
    tick_array_start_indexes: &Vec<i32>,
    a_to_b: bool,
) -> Result<TickArraySequence, WhirlpoolError> {
    if tick_array_start_indexes.is_empty() || tick_array_start_indexes.len() > MAX_SWAP_TICK_ARRAYS
    {
        log!(env, "expected 1 to 3 tick arrays", tick_array_start_indexes.len());
        return Err(WhirlpoolError::TickArraySequenceInvalid);
    }

    let mut arrays = Vec::new(env);
    for start_tick_index in tick_array_start_indexes.iter() {
        arrays.push_back(get_tick_array(env, whirlpool.whirlpool_id, start_tick_index)?);
    }

    TickArraySequence::new(
        arrays,
        whirlpool.tick_spacing,
        whirlpool.tick_current_index,
        a_to_b,
    )
}

/// Execute a swap for `token_authority`.
///
/// `amount` is the input when `amount_specified_is_input`, else the output.
/// `other_amount_threshold` bounds the other side: minimum output for an
/// exact input, maximum input for an exact output.
#[allow(clippy::too_many_arguments)]
pub fn execute_swap(
    env: &Env,
    token_authority: Address,
    whirlpool_id: u32,
    amount: u64,
    other_amount_threshold: u64,
    sqrt_price_limit: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
    tick_array_start_indexes: Vec<i32>,
) -> Result<(u64, u64), WhirlpoolError> {
    token_authority.require_auth();

    let config = get_config(env)?;
    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    let mut tick_sequence =
        load_tick_sequence(env, &whirlpool, &tick_array_start_indexes, a_to_b)?;

    let timestamp = env.ledger().timestamp();
    let update = swap(
        env,
        &whirlpool,
        &mut tick_sequence,
        amount,
        sqrt_price_limit,
        amount_specified_is_input,
        a_to_b,
        timestamp,
        config.zero_liquidity_fee_policy,
    )?;

    let (amount_in, amount_out) = if a_to_b {
        (update.amount_a, update.amount_b)
    } else {
        (update.amount_b, update.amount_a)
    };
    if amount_specified_is_input && amount_out < other_amount_threshold {
        log!(env, "output below threshold", amount_out, other_amount_threshold);
        return Err(WhirlpoolError::TokenMinNotMet);
    }
    if !amount_specified_is_input && amount_in > other_amount_threshold {
        log!(env, "input above threshold", amount_in, other_amount_threshold);
        return Err(WhirlpoolError::TokenMaxExceeded);
    }

    debug_assert!(invariants::fee_growth_monotonic(
        if a_to_b {
            whirlpool.fee_growth_global_a
        } else {
            whirlpool.fee_growth_global_b
        },
        update.next_fee_growth_global
    ));
    debug_assert!(invariants::sqrt_price_in_bounds(update.next_sqrt_price));

    whirlpool.update_after_swap(
        update.next_liquidity,
        update.next_tick_index,
        update.next_sqrt_price,
        update.next_fee_growth_global,
        update.next_reward_infos,
        update.next_protocol_fee,
        a_to_b,
        timestamp,
    )?;

    for array in tick_sequence.into_arrays().iter() {
        set_tick_array(env, &array);
    }
    set_whirlpool(env, &whirlpool);

    transfer_to_vault(env, &whirlpool.input_token_mint(a_to_b), &token_authority, amount_in);
    transfer_from_vault(env, &whirlpool.output_token_mint(a_to_b), &token_authority, amount_out);

    env.events().publish(
        (Symbol::new(env, "swap"), whirlpool_id),
        (
            token_authority,
            a_to_b,
            update.amount_a,
            update.amount_b,
            update.fee_amount,
            whirlpool.sqrt_price,
            whirlpool.tick_current_index,
        ),
    );

    Ok((update.amount_a, update.amount_b))
}

/// Simulate a swap without moving tokens or writing state
#[allow(clippy::too_many_arguments)]
pub fn quote_swap(
    env: &Env,
    whirlpool_id: u32,
    amount: u64,
    sqrt_price_limit: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
    tick_array_start_indexes: Vec<i32>,
) -> Result<SwapQuote, WhirlpoolError> {
    let config = get_config(env)?;
    let whirlpool = get_whirlpool(env, whirlpool_id)?;
    let mut tick_sequence =
        load_tick_sequence(env, &whirlpool, &tick_array_start_indexes, a_to_b)?;

    let update = swap(
        env,
        &whirlpool,
        &mut tick_sequence,
        amount,
        sqrt_price_limit,
        amount_specified_is_input,
        a_to_b,
        env.ledger().timestamp(),
        config.zero_liquidity_fee_policy,
    )?;

    Ok(SwapQuote {
        amount_a: update.amount_a,
        amount_b: update.amount_b,
        fee_amount: update.fee_amount,
        next_sqrt_price: update.next_sqrt_price,
        next_tick_index: update.next_tick_index,
        next_liquidity: update.next_liquidity,
    })
}
