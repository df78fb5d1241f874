#![no_std]

mod fees;
pub mod invariants;
mod liquidity;
mod pool;
mod storage;
mod swap;
mod tick;

#[cfg(test)]
mod testutils;

pub use swap::SwapQuote;

use soroban_sdk::{contract, contractimpl, Address, Env, Symbol, Vec};
use whirlpool_types::{
    validate_fee_rate, validate_protocol_fee_rate, validate_tick_spacing, FeeTier, Position,
    TickArray, Whirlpool, WhirlpoolError, WhirlpoolsConfig, ZeroLiquidityFeePolicy,
};

#[contract]
pub struct WhirlpoolProgram;

#[contractimpl]
impl WhirlpoolProgram {
    // === Configuration ===

    /// Create the program configuration. Can only be called once.
    pub fn initialize_config(
        env: Env,
        fee_authority: Address,
        protocol_fees_authority: Address,
        reward_super_authority: Address,
        default_protocol_fee_rate: u32,
        zero_liquidity_fee_policy: ZeroLiquidityFeePolicy,
    ) -> Result<(), WhirlpoolError> {
        fee_authority.require_auth();

        if storage::has_config(&env) {
            return Err(WhirlpoolError::AlreadyInitialized);
        }
        validate_protocol_fee_rate(default_protocol_fee_rate)?;

        let config = WhirlpoolsConfig {
            fee_authority,
            protocol_fees_authority,
            reward_super_authority,
            default_protocol_fee_rate,
            zero_liquidity_fee_policy,
        };
        storage::set_config(&env, &config);

        env.events().publish(
            (Symbol::new(&env, "config_initialized"),),
            (config.fee_authority, default_protocol_fee_rate),
        );

        Ok(())
    }

    /// Register the default fee rate for pools of `tick_spacing`
    pub fn initialize_fee_tier(
        env: Env,
        tick_spacing: u32,
        default_fee_rate: u32,
    ) -> Result<(), WhirlpoolError> {
        let config = storage::get_config(&env)?;
        config.fee_authority.require_auth();

        validate_tick_spacing(tick_spacing)?;
        validate_fee_rate(default_fee_rate)?;
        if storage::has_fee_tier(&env, tick_spacing) {
            return Err(WhirlpoolError::AlreadyInitialized);
        }

        storage::set_fee_tier(
            &env,
            &FeeTier {
                tick_spacing,
                default_fee_rate,
            },
        );

        env.events().publish(
            (Symbol::new(&env, "fee_tier_initialized"), tick_spacing),
            default_fee_rate,
        );

        Ok(())
    }

    // === Pools ===

    /// Create a pool; returns its id
    pub fn initialize_pool(
        env: Env,
        token_mint_a: Address,
        token_mint_b: Address,
        tick_spacing: u32,
        initial_sqrt_price: u128,
    ) -> Result<u32, WhirlpoolError> {
        pool::initialize_pool(&env, token_mint_a, token_mint_b, tick_spacing, initial_sqrt_price)
    }

    pub fn initialize_tick_array(
        env: Env,
        whirlpool_id: u32,
        start_tick_index: i32,
    ) -> Result<(), WhirlpoolError> {
        pool::initialize_tick_array(&env, whirlpool_id, start_tick_index)
    }

    pub fn initialize_reward(
        env: Env,
        whirlpool_id: u32,
        reward_index: u32,
        reward_mint: Address,
        reward_authority: Address,
    ) -> Result<(), WhirlpoolError> {
        pool::initialize_reward(&env, whirlpool_id, reward_index, reward_mint, reward_authority)
    }

    /// Deposit reward tokens into a slot's reserve. Payouts never exceed it.
    pub fn fund_reward(
        env: Env,
        funder: Address,
        whirlpool_id: u32,
        reward_index: u32,
        amount: u64,
    ) -> Result<(), WhirlpoolError> {
        pool::fund_reward(&env, funder, whirlpool_id, reward_index, amount)
    }

    pub fn set_reward_emissions(
        env: Env,
        whirlpool_id: u32,
        reward_index: u32,
        emissions_per_second_x64: u128,
    ) -> Result<(), WhirlpoolError> {
        pool::set_reward_emissions(&env, whirlpool_id, reward_index, emissions_per_second_x64)
    }

    pub fn set_fee_rate(env: Env, whirlpool_id: u32, fee_rate: u32) -> Result<(), WhirlpoolError> {
        pool::set_fee_rate(&env, whirlpool_id, fee_rate)
    }

    pub fn set_protocol_fee_rate(
        env: Env,
        whirlpool_id: u32,
        protocol_fee_rate: u32,
    ) -> Result<(), WhirlpoolError> {
        pool::set_protocol_fee_rate(&env, whirlpool_id, protocol_fee_rate)
    }

    /// # Returns
    /// (amount_a, amount_b) - Protocol fees paid out
    pub fn collect_protocol_fees(
        env: Env,
        whirlpool_id: u32,
    ) -> Result<(u64, u64), WhirlpoolError> {
        pool::collect_protocol_fees(&env, whirlpool_id)
    }

    // === Positions ===

    /// Open an empty position; returns its mint
    pub fn open_position(
        env: Env,
        owner: Address,
        whirlpool_id: u32,
        tick_lower_index: i32,
        tick_upper_index: i32,
    ) -> Result<u32, WhirlpoolError> {
        owner.require_auth();
        liquidity::open_position(&env, owner, whirlpool_id, tick_lower_index, tick_upper_index)
    }

    /// Add liquidity to a position
    ///
    /// # Returns
    /// (amount_a, amount_b) - Token amounts deposited
    pub fn increase_liquidity(
        env: Env,
        position_mint: u32,
        liquidity_amount: u128,
        token_max_a: u64,
        token_max_b: u64,
    ) -> Result<(u64, u64), WhirlpoolError> {
        liquidity::increase_liquidity(
            &env,
            position_mint,
            liquidity_amount,
            token_max_a,
            token_max_b,
        )
    }

    /// Remove liquidity from a position
    ///
    /// # Returns
    /// (amount_a, amount_b) - Token amounts withdrawn
    pub fn decrease_liquidity(
        env: Env,
        position_mint: u32,
        liquidity_amount: u128,
        token_min_a: u64,
        token_min_b: u64,
    ) -> Result<(u64, u64), WhirlpoolError> {
        liquidity::decrease_liquidity(
            &env,
            position_mint,
            liquidity_amount,
            token_min_a,
            token_min_b,
        )
    }

    /// Settle owed fees and rewards of a position. Anyone may call.
    pub fn update_fees_and_rewards(env: Env, position_mint: u32) -> Result<(), WhirlpoolError> {
        fees::update_fees_and_rewards(&env, position_mint)
    }

    /// # Returns
    /// (amount_a, amount_b) - Fees paid to the owner
    pub fn collect_fees(env: Env, position_mint: u32) -> Result<(u64, u64), WhirlpoolError> {
        fees::collect_fees(&env, position_mint)
    }

    pub fn collect_reward(
        env: Env,
        position_mint: u32,
        reward_index: u32,
    ) -> Result<u64, WhirlpoolError> {
        fees::collect_reward(&env, position_mint, reward_index)
    }

    pub fn close_position(env: Env, position_mint: u32) -> Result<(), WhirlpoolError> {
        liquidity::close_position(&env, position_mint)
    }

    // === Swaps ===

    /// Execute a swap
    ///
    /// # Arguments
    /// * `amount` - Input when `amount_specified_is_input`, otherwise output
    /// * `other_amount_threshold` - Minimum output (exact input) or maximum input (exact output)
    /// * `sqrt_price_limit` - Price the swap may not pass, 0 for no limit
    /// * `tick_array_start_indexes` - 1 to 3 tick arrays in swap direction, the first holding
    ///   the current tick
    ///
    /// # Returns
    /// (amount_a, amount_b) - Amounts of each token moved
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        env: Env,
        token_authority: Address,
        whirlpool_id: u32,
        amount: u64,
        other_amount_threshold: u64,
        sqrt_price_limit: u128,
        amount_specified_is_input: bool,
        a_to_b: bool,
        tick_array_start_indexes: Vec<i32>,
    ) -> Result<(u64, u64), WhirlpoolError> {
        swap::execute_swap(
            &env,
            token_authority,
            whirlpool_id,
            amount,
            other_amount_threshold,
            sqrt_price_limit,
            amount_specified_is_input,
            a_to_b,
            tick_array_start_indexes,
        )
    }

    /// Simulate a swap against current state
    pub fn quote_swap(
        env: Env,
        whirlpool_id: u32,
        amount: u64,
        sqrt_price_limit: u128,
        amount_specified_is_input: bool,
        a_to_b: bool,
        tick_array_start_indexes: Vec<i32>,
    ) -> Result<SwapQuote, WhirlpoolError> {
        swap::quote_swap(
            &env,
            whirlpool_id,
            amount,
            sqrt_price_limit,
            amount_specified_is_input,
            a_to_b,
            tick_array_start_indexes,
        )
    }

    // === View Functions ===

    pub fn get_config(env: Env) -> Result<WhirlpoolsConfig, WhirlpoolError> {
        storage::get_config(&env)
    }

    pub fn get_fee_tier(env: Env, tick_spacing: u32) -> Result<FeeTier, WhirlpoolError> {
        storage::get_fee_tier(&env, tick_spacing)
    }

    pub fn get_whirlpool(env: Env, whirlpool_id: u32) -> Result<Whirlpool, WhirlpoolError> {
        storage::get_whirlpool(&env, whirlpool_id)
    }

    /// Id of the pool for a mint pair and tick spacing
    pub fn find_whirlpool(
        env: Env,
        token_mint_a: Address,
        token_mint_b: Address,
        tick_spacing: u32,
    ) -> Result<u32, WhirlpoolError> {
        storage::find_whirlpool(&env, &token_mint_a, &token_mint_b, tick_spacing)
            .ok_or(WhirlpoolError::WhirlpoolNotFound)
    }

    pub fn get_tick_array(
        env: Env,
        whirlpool_id: u32,
        start_tick_index: i32,
    ) -> Result<TickArray, WhirlpoolError> {
        storage::get_tick_array(&env, whirlpool_id, start_tick_index)
    }

    pub fn get_position(env: Env, position_mint: u32) -> Result<Position, WhirlpoolError> {
        storage::get_position(&env, position_mint)
    }
}
