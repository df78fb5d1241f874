use soroban_sdk::{contracttype, Address, Env};
use whirlpool_math::get_tick_array_start_tick_index;
use whirlpool_types::{FeeTier, Position, TickArray, Whirlpool, WhirlpoolError, WhirlpoolsConfig};

// ============================================================================
// STORAGE LAYOUT
// ============================================================================
// Instance storage (small, read on most calls):
// - WhirlpoolsConfig, fee tiers, id counters
//
// Persistent storage (one entry per account):
// - Whirlpool: ~1 KB
// - TickArray: 88 ticks, the largest entry by far (~25 KB)
// - Position: ~300 bytes
//
// A swap reads and writes at most MAX_SWAP_TICK_ARRAYS tick arrays, which
// keeps it well inside the per-transaction read/write byte limits.
// ============================================================================

/// Storage keys for the whirlpool program
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    /// Program configuration (Instance storage)
    Config,
    /// tick_spacing -> FeeTier (Instance storage)
    FeeTier(u32),
    /// Next whirlpool id (Instance storage)
    WhirlpoolCount,
    /// (mint_a, mint_b, tick_spacing) -> whirlpool id (Persistent storage)
    WhirlpoolByMints(Address, Address, u32),
    /// whirlpool id -> Whirlpool (Persistent storage)
    Whirlpool(u32),
    /// (whirlpool id, start tick index) -> TickArray (Persistent storage)
    TickArray(u32, i32),
    /// Next position mint (Instance storage)
    PositionCount,
    /// position mint -> Position (Persistent storage)
    Position(u32),
}

// TTL constants
const INSTANCE_TTL_THRESHOLD: u32 = 17280; // ~1 day
const INSTANCE_TTL_EXTEND: u32 = 518400; // ~30 days
const PERSISTENT_TTL_THRESHOLD: u32 = 17280;
const PERSISTENT_TTL_EXTEND: u32 = 518400;

/// Extend instance storage TTL
pub fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND);
}

/// Extend persistent storage TTL for a key
pub fn extend_persistent_ttl(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND);
}

// === Config ===

pub fn has_config(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Config)
}

pub fn get_config(env: &Env) -> Result<WhirlpoolsConfig, WhirlpoolError> {
    extend_instance_ttl(env);
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(WhirlpoolError::ConfigNotFound)
}

pub fn set_config(env: &Env, config: &WhirlpoolsConfig) {
    env.storage().instance().set(&DataKey::Config, config);
    extend_instance_ttl(env);
}

// === Fee tiers ===

pub fn has_fee_tier(env: &Env, tick_spacing: u32) -> bool {
    env.storage()
        .instance()
        .has(&DataKey::FeeTier(tick_spacing))
}

pub fn get_fee_tier(env: &Env, tick_spacing: u32) -> Result<FeeTier, WhirlpoolError> {
    env.storage()
        .instance()
        .get(&DataKey::FeeTier(tick_spacing))
        .ok_or(WhirlpoolError::FeeTierNotFound)
}

pub fn set_fee_tier(env: &Env, fee_tier: &FeeTier) {
    env.storage()
        .instance()
        .set(&DataKey::FeeTier(fee_tier.tick_spacing), fee_tier);
    extend_instance_ttl(env);
}

// === Whirlpools ===

/// Issue the next whirlpool id
pub fn next_whirlpool_id(env: &Env) -> u32 {
    let id: u32 = env
        .storage()
        .instance()
        .get(&DataKey::WhirlpoolCount)
        .unwrap_or(0);
    env.storage()
        .instance()
        .set(&DataKey::WhirlpoolCount, &(id + 1));
    id
}

pub fn find_whirlpool(
    env: &Env,
    token_mint_a: &Address,
    token_mint_b: &Address,
    tick_spacing: u32,
) -> Option<u32> {
    let key = DataKey::WhirlpoolByMints(token_mint_a.clone(), token_mint_b.clone(), tick_spacing);
    env.storage().persistent().get(&key)
}

pub fn get_whirlpool(env: &Env, whirlpool_id: u32) -> Result<Whirlpool, WhirlpoolError> {
    let key = DataKey::Whirlpool(whirlpool_id);
    let whirlpool = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(WhirlpoolError::WhirlpoolNotFound)?;
    extend_persistent_ttl(env, &key);
    Ok(whirlpool)
}

pub fn set_whirlpool(env: &Env, whirlpool: &Whirlpool) {
    let key = DataKey::Whirlpool(whirlpool.whirlpool_id);
    env.storage().persistent().set(&key, whirlpool);
    extend_persistent_ttl(env, &key);
}

/// Store a new whirlpool and index it by its mints and tick spacing
pub fn create_whirlpool(env: &Env, whirlpool: &Whirlpool) {
    let index_key = DataKey::WhirlpoolByMints(
        whirlpool.token_mint_a.clone(),
        whirlpool.token_mint_b.clone(),
        whirlpool.tick_spacing,
    );
    env.storage()
        .persistent()
        .set(&index_key, &whirlpool.whirlpool_id);
    extend_persistent_ttl(env, &index_key);
    set_whirlpool(env, whirlpool);
}

// === Tick arrays ===

pub fn has_tick_array(env: &Env, whirlpool_id: u32, start_tick_index: i32) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::TickArray(whirlpool_id, start_tick_index))
}

pub fn get_tick_array(
    env: &Env,
    whirlpool_id: u32,
    start_tick_index: i32,
) -> Result<TickArray, WhirlpoolError> {
    let key = DataKey::TickArray(whirlpool_id, start_tick_index);
    let tick_array = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(WhirlpoolError::TickArrayNotFound)?;
    extend_persistent_ttl(env, &key);
    Ok(tick_array)
}

pub fn set_tick_array(env: &Env, tick_array: &TickArray) {
    let key = DataKey::TickArray(tick_array.whirlpool, tick_array.start_tick_index);
    env.storage().persistent().set(&key, tick_array);
    extend_persistent_ttl(env, &key);
}

/// Tick arrays holding a position's lower and upper tick. Both may be the same array.
pub fn get_position_tick_arrays(
    env: &Env,
    whirlpool: &Whirlpool,
    position: &Position,
) -> Result<(TickArray, TickArray), WhirlpoolError> {
    let lower_start =
        get_tick_array_start_tick_index(position.tick_lower_index, whirlpool.tick_spacing);
    let upper_start =
        get_tick_array_start_tick_index(position.tick_upper_index, whirlpool.tick_spacing);

    let lower = get_tick_array(env, whirlpool.whirlpool_id, lower_start)?;
    let upper = if upper_start == lower_start {
        lower.clone()
    } else {
        get_tick_array(env, whirlpool.whirlpool_id, upper_start)?
    };
    Ok((lower, upper))
}

// === Positions ===

/// Issue the next position mint
pub fn next_position_mint(env: &Env) -> u32 {
    let mint: u32 = env
        .storage()
        .instance()
        .get(&DataKey::PositionCount)
        .unwrap_or(0);
    env.storage()
        .instance()
        .set(&DataKey::PositionCount, &(mint + 1));
    mint
}

pub fn get_position(env: &Env, position_mint: u32) -> Result<Position, WhirlpoolError> {
    let key = DataKey::Position(position_mint);
    let position = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(WhirlpoolError::PositionNotFound)?;
    extend_persistent_ttl(env, &key);
    Ok(position)
}

pub fn set_position(env: &Env, position: &Position) {
    let key = DataKey::Position(position.position_mint);
    env.storage().persistent().set(&key, position);
    extend_persistent_ttl(env, &key);
}

pub fn remove_position(env: &Env, position_mint: u32) {
    env.storage()
        .persistent()
        .remove(&DataKey::Position(position_mint));
}

#[cfg(test)]
mod tests {
    use super::*;
    use soroban_sdk::testutils::Address as _;
    use whirlpool_types::ZeroLiquidityFeePolicy;

    /// Helper to run test code within a contract context
    fn with_contract<F, R>(env: &Env, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let contract_id = env.register(crate::WhirlpoolProgram, ());
        env.as_contract(&contract_id, f)
    }

    #[test]
    fn test_missing_accounts() {
        let env = Env::default();
        with_contract(&env, || {
            assert!(!has_config(&env));
            assert_eq!(get_config(&env), Err(WhirlpoolError::ConfigNotFound));
            assert_eq!(get_fee_tier(&env, 64), Err(WhirlpoolError::FeeTierNotFound));
            assert_eq!(get_whirlpool(&env, 0), Err(WhirlpoolError::WhirlpoolNotFound));
            assert_eq!(
                get_tick_array(&env, 0, 0),
                Err(WhirlpoolError::TickArrayNotFound)
            );
            assert_eq!(get_position(&env, 0), Err(WhirlpoolError::PositionNotFound));
        });
    }

    #[test]
    fn test_config_round_trip() {
        let env = Env::default();
        with_contract(&env, || {
            let config = WhirlpoolsConfig {
                fee_authority: Address::generate(&env),
                protocol_fees_authority: Address::generate(&env),
                reward_super_authority: Address::generate(&env),
                default_protocol_fee_rate: 300,
                zero_liquidity_fee_policy: ZeroLiquidityFeePolicy::Reject,
            };
            set_config(&env, &config);
            assert!(has_config(&env));
            assert_eq!(get_config(&env), Ok(config));
        });
    }

    #[test]
    fn test_id_counters_increase() {
        let env = Env::default();
        with_contract(&env, || {
            assert_eq!(next_whirlpool_id(&env), 0);
            assert_eq!(next_whirlpool_id(&env), 1);
            assert_eq!(next_position_mint(&env), 0);
            assert_eq!(next_position_mint(&env), 1);
            assert_eq!(next_position_mint(&env), 2);
        });
    }

    #[test]
    fn test_tick_array_keyed_by_pool_and_start() {
        let env = Env::default();
        with_contract(&env, || {
            let array = TickArray::new(&env, 3, -5632);
            set_tick_array(&env, &array);
            assert!(has_tick_array(&env, 3, -5632));
            assert!(!has_tick_array(&env, 4, -5632));
            assert!(!has_tick_array(&env, 3, 0));
            assert_eq!(get_tick_array(&env, 3, -5632), Ok(array));
        });
    }
}
