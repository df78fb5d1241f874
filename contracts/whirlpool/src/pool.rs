use crate::fees::next_whirlpool_reward_infos;
use crate::invariants;
use crate::liquidity::{transfer_from_vault, transfer_to_vault};
use crate::storage::{
    create_whirlpool, find_whirlpool, get_config, get_fee_tier, get_whirlpool, has_tick_array,
    next_whirlpool_id, set_tick_array, set_whirlpool,
};
use soroban_sdk::{log, Address, Env, Symbol};
use whirlpool_math::{is_valid_tick_array_start_index, mul_shift_right, sqrt_price_to_tick_index};
use whirlpool_types::{
    uninitialized_reward_infos, validate_fee_rate, validate_protocol_fee_rate, TickArray,
    Whirlpool, WhirlpoolError, DAY_IN_SECONDS, MAX_SQRT_PRICE_X64, MIN_SQRT_PRICE_X64,
    Q64_RESOLUTION,
};

/// Create the pool for (token_mint_a, token_mint_b) at `tick_spacing`.
///
/// The fee rate comes from the fee tier of `tick_spacing`, the protocol fee
/// rate from the config default. Both vaults are the program itself.
pub fn initialize_pool(
    env: &Env,
    token_mint_a: Address,
    token_mint_b: Address,
    tick_spacing: u32,
    initial_sqrt_price: u128,
) -> Result<u32, WhirlpoolError> {
    let config = get_config(env)?;

    if token_mint_a >= token_mint_b {
        log!(env, "token mint A must order before token mint B");
        return Err(WhirlpoolError::InvalidTokenMintOrder);
    }
    let fee_tier = get_fee_tier(env, tick_spacing)?;
    if !(MIN_SQRT_PRICE_X64..=MAX_SQRT_PRICE_X64).contains(&initial_sqrt_price) {
        return Err(WhirlpoolError::SqrtPriceOutOfBounds);
    }
    if find_whirlpool(env, &token_mint_a, &token_mint_b, tick_spacing).is_some() {
        return Err(WhirlpoolError::WhirlpoolAlreadyExists);
    }

    let tick_current_index = sqrt_price_to_tick_index(env, initial_sqrt_price)?;
    let whirlpool_id = next_whirlpool_id(env);
    let vault = env.current_contract_address();

    let whirlpool = Whirlpool {
        whirlpools_config: vault.clone(),
        whirlpool_id,
        tick_spacing,
        fee_rate: fee_tier.default_fee_rate,
        protocol_fee_rate: config.default_protocol_fee_rate,
        liquidity: 0,
        sqrt_price: initial_sqrt_price,
        tick_current_index,
        protocol_fee_owed_a: 0,
        protocol_fee_owed_b: 0,
        token_mint_a: token_mint_a.clone(),
        token_vault_a: vault.clone(),
        fee_growth_global_a: 0,
        token_mint_b: token_mint_b.clone(),
        token_vault_b: vault,
        fee_growth_global_b: 0,
        reward_last_updated_timestamp: env.ledger().timestamp(),
        reward_infos: uninitialized_reward_infos(env),
    };
    debug_assert!(invariants::fee_rates_valid(&whirlpool));
    create_whirlpool(env, &whirlpool);

    env.events().publish(
        (Symbol::new(env, "pool_initialized"), whirlpool_id),
        (
            token_mint_a,
            token_mint_b,
            tick_spacing,
            initial_sqrt_price,
            tick_current_index,
        ),
    );

    Ok(whirlpool_id)
}

/// Create the empty tick array starting at `start_tick_index`
pub fn initialize_tick_array(
    env: &Env,
    whirlpool_id: u32,
    start_tick_index: i32,
) -> Result<(), WhirlpoolError> {
    let whirlpool = get_whirlpool(env, whirlpool_id)?;

    if !is_valid_tick_array_start_index(start_tick_index, whirlpool.tick_spacing) {
        log!(env, "invalid tick array start", start_tick_index);
        return Err(WhirlpoolError::InvalidStartTick);
    }
    if has_tick_array(env, whirlpool_id, start_tick_index) {
        return Err(WhirlpoolError::AlreadyInitialized);
    }

    set_tick_array(env, &TickArray::new(env, whirlpool_id, start_tick_index));

    env.events().publish(
        (Symbol::new(env, "tick_array_initialized"), whirlpool_id),
        start_tick_index,
    );

    Ok(())
}

/// Enable reward slot `reward_index` for `reward_mint`. Slots are enabled in order.
pub fn initialize_reward(
    env: &Env,
    whirlpool_id: u32,
    reward_index: u32,
    reward_mint: Address,
    reward_authority: Address,
) -> Result<(), WhirlpoolError> {
    let config = get_config(env)?;
    config.reward_super_authority.require_auth();
    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;

    whirlpool.initialize_reward(
        reward_index,
        reward_mint.clone(),
        env.current_contract_address(),
        reward_authority.clone(),
    )?;
    set_whirlpool(env, &whirlpool);

    env.events().publish(
        (Symbol::new(env, "reward_initialized"), whirlpool_id, reward_index),
        (reward_mint, reward_authority),
    );

    Ok(())
}

/// Move `amount` of the slot's reward token from `funder` into its reserve
pub fn fund_reward(
    env: &Env,
    funder: Address,
    whirlpool_id: u32,
    reward_index: u32,
    amount: u64,
) -> Result<(), WhirlpoolError> {
    funder.require_auth();
    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    let mint = whirlpool
        .reward_info(reward_index)?
        .mint
        .ok_or(WhirlpoolError::RewardNotInitialized)?;

    whirlpool.fund_reward(reward_index, amount)?;
    set_whirlpool(env, &whirlpool);

    transfer_to_vault(env, &mint, &funder, amount);

    env.events().publish(
        (Symbol::new(env, "reward_funded"), whirlpool_id, reward_index),
        (funder, amount),
    );

    Ok(())
}

/// Change the emission rate of a reward slot.
///
/// Growth is settled at the old rate first. The slot's reserve must cover at
/// least one day of emissions at the new rate.
pub fn set_reward_emissions(
    env: &Env,
    whirlpool_id: u32,
    reward_index: u32,
    emissions_per_second_x64: u128,
) -> Result<(), WhirlpoolError> {
    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    let reward_info = whirlpool.reward_info(reward_index)?;
    let authority = reward_info
        .authority
        .ok_or(WhirlpoolError::RewardNotInitialized)?;
    authority.require_auth();

    let emissions_per_day = mul_shift_right(
        env,
        DAY_IN_SECONDS,
        emissions_per_second_x64,
        Q64_RESOLUTION,
        false,
    )?;
    if (reward_info.reserve as u128) < emissions_per_day {
        log!(env, "reward reserve below one day of emissions", reward_info.reserve);
        return Err(WhirlpoolError::RewardVaultAmountInsufficient);
    }

    let timestamp = env.ledger().timestamp();
    let reward_infos = next_whirlpool_reward_infos(env, &whirlpool, timestamp)?;
    whirlpool.update_emissions(reward_index, reward_infos, timestamp, emissions_per_second_x64)?;
    set_whirlpool(env, &whirlpool);

    env.events().publish(
        (Symbol::new(env, "reward_emissions_set"), whirlpool_id, reward_index),
        emissions_per_second_x64,
    );

    Ok(())
}

pub fn set_fee_rate(env: &Env, whirlpool_id: u32, fee_rate: u32) -> Result<(), WhirlpoolError> {
    let config = get_config(env)?;
    config.fee_authority.require_auth();
    validate_fee_rate(fee_rate)?;

    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    whirlpool.fee_rate = fee_rate;
    set_whirlpool(env, &whirlpool);

    env.events()
        .publish((Symbol::new(env, "fee_rate_set"), whirlpool_id), fee_rate);

    Ok(())
}

pub fn set_protocol_fee_rate(
    env: &Env,
    whirlpool_id: u32,
    protocol_fee_rate: u32,
) -> Result<(), WhirlpoolError> {
    let config = get_config(env)?;
    config.fee_authority.require_auth();
    validate_protocol_fee_rate(protocol_fee_rate)?;

    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    whirlpool.protocol_fee_rate = protocol_fee_rate;
    set_whirlpool(env, &whirlpool);

    env.events().publish(
        (Symbol::new(env, "protocol_fee_rate_set"), whirlpool_id),
        protocol_fee_rate,
    );

    Ok(())
}

/// Pay out the protocol's share of fees to the collect authority
pub fn collect_protocol_fees(env: &Env, whirlpool_id: u32) -> Result<(u64, u64), WhirlpoolError> {
    let config = get_config(env)?;
    let authority = config.protocol_fees_authority;
    authority.require_auth();

    let mut whirlpool = get_whirlpool(env, whirlpool_id)?;
    let amount_a = whirlpool.protocol_fee_owed_a;
    let amount_b = whirlpool.protocol_fee_owed_b;

    whirlpool.reset_protocol_fees_owed();
    set_whirlpool(env, &whirlpool);

    transfer_from_vault(env, &whirlpool.token_mint_a, &authority, amount_a);
    transfer_from_vault(env, &whirlpool.token_mint_b, &authority, amount_b);

    env.events().publish(
        (Symbol::new(env, "collect_protocol_fees"), whirlpool_id),
        (amount_a, amount_b),
    );

    Ok((amount_a, amount_b))
}
