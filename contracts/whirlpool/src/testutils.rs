use soroban_sdk::testutils::Address as _;
use soroban_sdk::{Address, Env};
use whirlpool_math::tick_index_to_sqrt_price;
use whirlpool_types::{uninitialized_reward_infos, Tick, TickUpdate, Whirlpool};

/// A standalone pool at `tick_current_index` with 0.3% fee and no protocol fee
pub fn whirlpool(
    env: &Env,
    tick_spacing: u32,
    tick_current_index: i32,
    liquidity: u128,
) -> Whirlpool {
    Whirlpool {
        whirlpools_config: Address::generate(env),
        whirlpool_id: 0,
        tick_spacing,
        fee_rate: 3000,
        protocol_fee_rate: 0,
        liquidity,
        sqrt_price: tick_index_to_sqrt_price(env, tick_current_index).unwrap(),
        tick_current_index,
        protocol_fee_owed_a: 0,
        protocol_fee_owed_b: 0,
        token_mint_a: Address::generate(env),
        token_vault_a: Address::generate(env),
        fee_growth_global_a: 0,
        token_mint_b: Address::generate(env),
        token_vault_b: Address::generate(env),
        fee_growth_global_b: 0,
        reward_last_updated_timestamp: 0,
        reward_infos: uninitialized_reward_infos(env),
    }
}

/// An initialized tick with the given net liquidity and fee growth outside
pub fn initialized_tick(env: &Env, liquidity_net: i128, outside_a: u128, outside_b: u128) -> Tick {
    let mut tick = Tick::new(env);
    tick.apply(&TickUpdate {
        initialized: true,
        liquidity_net,
        liquidity_gross: liquidity_net.unsigned_abs(),
        fee_growth_outside_a: outside_a,
        fee_growth_outside_b: outside_b,
        reward_growths_outside: [0; 3],
    });
    tick
}
