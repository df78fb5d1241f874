use soroban_sdk::Vec;
use whirlpool_math::{add_liquidity_delta, is_tick_initializable};
use whirlpool_types::{
    ticks_in_array, Tick, TickArray, TickUpdate, WhirlpoolError, MAX_SWAP_TICK_ARRAYS,
    MAX_TICK_INDEX, MIN_TICK_INDEX, NUM_REWARDS, TICK_ARRAY_SIZE,
};

// === Single tick array ===

/// True when `tick_index` lies in the range searched from this array.
/// `shifted` moves the range down one spacing, used when the search moves up.
pub fn in_search_range(
    array: &TickArray,
    tick_index: i32,
    tick_spacing: u32,
    shifted: bool,
) -> bool {
    let mut lower = array.start_tick_index;
    let mut upper = array.start_tick_index + ticks_in_array(tick_spacing);
    if shifted {
        lower -= tick_spacing as i32;
        upper -= tick_spacing as i32;
    }
    tick_index >= lower && tick_index < upper
}

fn tick_offset(
    array: &TickArray,
    tick_index: i32,
    tick_spacing: u32,
) -> Result<u32, WhirlpoolError> {
    if !is_tick_initializable(tick_index, tick_spacing) {
        return Err(WhirlpoolError::InvalidTickIndex);
    }
    if !in_search_range(array, tick_index, tick_spacing, false) {
        return Err(WhirlpoolError::TickNotInArray);
    }
    Ok(((tick_index - array.start_tick_index) / tick_spacing as i32) as u32)
}

pub fn get_tick(
    array: &TickArray,
    tick_index: i32,
    tick_spacing: u32,
) -> Result<Tick, WhirlpoolError> {
    let offset = tick_offset(array, tick_index, tick_spacing)?;
    array.ticks.get(offset).ok_or(WhirlpoolError::TickNotInArray)
}

pub fn update_tick(
    array: &mut TickArray,
    tick_index: i32,
    tick_spacing: u32,
    update: &TickUpdate,
) -> Result<(), WhirlpoolError> {
    let offset = tick_offset(array, tick_index, tick_spacing)?;
    let mut tick = array.ticks.get(offset).ok_or(WhirlpoolError::TickNotInArray)?;
    tick.apply(update);
    array.ticks.set(offset, tick);
    Ok(())
}

/// Next initialized tick from `tick_index` in the direction of the swap.
///
/// Moving down, the tick at `tick_index` itself is a candidate. Moving up,
/// the search starts one spacing above it. `None` means this array holds no
/// further initialized tick in that direction.
pub fn next_initialized_tick(
    array: &TickArray,
    tick_index: i32,
    tick_spacing: u32,
    a_to_b: bool,
) -> Result<Option<i32>, WhirlpoolError> {
    if !in_search_range(array, tick_index, tick_spacing, !a_to_b) {
        return Err(WhirlpoolError::TickNotInArray);
    }

    let spacing = tick_spacing as i32;
    let mut offset = (tick_index - array.start_tick_index).div_euclid(spacing);
    if !a_to_b {
        offset += 1;
    }

    while (0..TICK_ARRAY_SIZE).contains(&offset) {
        if let Some(tick) = array.ticks.get(offset as u32) {
            if tick.initialized {
                return Ok(Some(array.start_tick_index + offset * spacing));
            }
        }
        offset = if a_to_b { offset - 1 } else { offset + 1 };
    }

    Ok(None)
}

/// Initialized ticks of one array, in swap order
pub struct InitializedTicks<'a> {
    array: &'a TickArray,
    tick_spacing: i32,
    offset: i32,
    a_to_b: bool,
}

impl<'a> InitializedTicks<'a> {
    pub fn new(array: &'a TickArray, tick_spacing: u32, a_to_b: bool) -> Self {
        Self {
            array,
            tick_spacing: tick_spacing as i32,
            offset: if a_to_b { TICK_ARRAY_SIZE - 1 } else { 0 },
            a_to_b,
        }
    }
}

impl Iterator for InitializedTicks<'_> {
    type Item = (i32, Tick);

    fn next(&mut self) -> Option<Self::Item> {
        while (0..TICK_ARRAY_SIZE).contains(&self.offset) {
            let offset = self.offset;
            self.offset = if self.a_to_b { offset - 1 } else { offset + 1 };
            if let Some(tick) = self.array.ticks.get(offset as u32) {
                if tick.initialized {
                    let tick_index = self.array.start_tick_index + offset * self.tick_spacing;
                    return Some((tick_index, tick));
                }
            }
        }
        None
    }
}

// === Tick accounting ===

/// New state of a boundary tick after a position adds or removes `liquidity_delta`
#[allow(clippy::too_many_arguments)]
pub fn next_tick_modify_liquidity_update(
    tick: &Tick,
    tick_index: i32,
    tick_current_index: i32,
    fee_growth_global_a: u128,
    fee_growth_global_b: u128,
    reward_growths_global: &[u128; NUM_REWARDS],
    liquidity_delta: i128,
    is_upper_tick: bool,
) -> Result<TickUpdate, WhirlpoolError> {
    if liquidity_delta == 0 {
        return Ok(TickUpdate::from(tick));
    }

    let liquidity_gross = add_liquidity_delta(tick.liquidity_gross, liquidity_delta)?;

    // Last reference removed: back to an uninitialized tick
    if liquidity_gross == 0 {
        return Ok(TickUpdate::default());
    }

    // On first initialization all prior growth is assumed to have happened below the tick
    let (fee_growth_outside_a, fee_growth_outside_b, reward_growths_outside) =
        if tick.liquidity_gross == 0 {
            if tick_current_index >= tick_index {
                (fee_growth_global_a, fee_growth_global_b, *reward_growths_global)
            } else {
                (0, 0, [0; NUM_REWARDS])
            }
        } else {
            (
                tick.fee_growth_outside_a,
                tick.fee_growth_outside_b,
                tick.reward_growths_outside(),
            )
        };

    let liquidity_net = if is_upper_tick {
        tick.liquidity_net.checked_sub(liquidity_delta)
    } else {
        tick.liquidity_net.checked_add(liquidity_delta)
    }
    .ok_or(WhirlpoolError::LiquidityNetError)?;

    Ok(TickUpdate {
        initialized: true,
        liquidity_net,
        liquidity_gross,
        fee_growth_outside_a,
        fee_growth_outside_b,
        reward_growths_outside,
    })
}

/// New state of a tick the price moves across: outside := global - outside
pub fn next_tick_cross_update(
    tick: &Tick,
    fee_growth_global_a: u128,
    fee_growth_global_b: u128,
    reward_growths_global: &[u128; NUM_REWARDS],
) -> TickUpdate {
    let mut update = TickUpdate::from(tick);

    update.fee_growth_outside_a = fee_growth_global_a.wrapping_sub(tick.fee_growth_outside_a);
    update.fee_growth_outside_b = fee_growth_global_b.wrapping_sub(tick.fee_growth_outside_b);

    for (i, outside) in update.reward_growths_outside.iter_mut().enumerate() {
        *outside = reward_growths_global[i].wrapping_sub(*outside);
    }

    update
}

// === Tick array sequence ===

/// Ordered, contiguous tick arrays a swap walks through
pub struct TickArraySequence {
    arrays: Vec<TickArray>,
    tick_spacing: u32,
}

impl TickArraySequence {
    /// Validate that the arrays are contiguous in the swap direction and
    /// that the first one covers the current tick.
    pub fn new(
        arrays: Vec<TickArray>,
        tick_spacing: u32,
        tick_current_index: i32,
        a_to_b: bool,
    ) -> Result<Self, WhirlpoolError> {
        if arrays.is_empty() || arrays.len() > MAX_SWAP_TICK_ARRAYS {
            return Err(WhirlpoolError::TickArraySequenceInvalid);
        }

        let first = arrays.get(0).ok_or(WhirlpoolError::TickArraySequenceInvalid)?;
        if !in_search_range(&first, tick_current_index, tick_spacing, false)
            && !in_search_range(&first, tick_current_index, tick_spacing, true)
        {
            return Err(WhirlpoolError::TickArraySequenceInvalid);
        }

        let step = if a_to_b {
            -ticks_in_array(tick_spacing)
        } else {
            ticks_in_array(tick_spacing)
        };
        let mut expected_start = first.start_tick_index;
        for array in arrays.iter() {
            if array.start_tick_index != expected_start || array.whirlpool != first.whirlpool {
                return Err(WhirlpoolError::TickArraySequenceInvalid);
            }
            expected_start += step;
        }

        Ok(Self {
            arrays,
            tick_spacing,
        })
    }

    pub fn len(&self) -> u32 {
        self.arrays.len()
    }

    pub fn into_arrays(self) -> Vec<TickArray> {
        self.arrays
    }

    pub fn get_tick(&self, array_index: u32, tick_index: i32) -> Result<Tick, WhirlpoolError> {
        let array = self
            .arrays
            .get(array_index)
            .ok_or(WhirlpoolError::TickArraySequenceInvalid)?;
        get_tick(&array, tick_index, self.tick_spacing)
    }

    pub fn update_tick(
        &mut self,
        array_index: u32,
        tick_index: i32,
        update: &TickUpdate,
    ) -> Result<(), WhirlpoolError> {
        let mut array = self
            .arrays
            .get(array_index)
            .ok_or(WhirlpoolError::TickArraySequenceInvalid)?;
        update_tick(&mut array, tick_index, self.tick_spacing, update)?;
        self.arrays.set(array_index, array);
        Ok(())
    }

    /// Next initialized tick across the sequence, starting in array `start_array_index`.
    ///
    /// Returns the array holding it and its index, or `None` once the last
    /// array has been searched.
    pub fn next_initialized_tick(
        &self,
        tick_index: i32,
        a_to_b: bool,
        start_array_index: u32,
    ) -> Result<Option<(u32, i32)>, WhirlpoolError> {
        let ticks_in_array = ticks_in_array(self.tick_spacing);
        let mut search_index = tick_index;
        let mut array_index = start_array_index;

        while let Some(array) = self.arrays.get(array_index) {
            if in_search_range(&array, search_index, self.tick_spacing, !a_to_b) {
                if let Some(next) =
                    next_initialized_tick(&array, search_index, self.tick_spacing, a_to_b)?
                {
                    return Ok(Some((array_index, next)));
                }
            }
            search_index = if a_to_b {
                array.start_tick_index - 1
            } else {
                array.start_tick_index + ticks_in_array - 1
            };
            array_index += 1;
        }

        Ok(None)
    }

    /// Furthest tick the price may reach without leaving the sequence
    pub fn boundary_tick_index(&self, a_to_b: bool) -> Result<i32, WhirlpoolError> {
        let last = self
            .arrays
            .last()
            .ok_or(WhirlpoolError::TickArraySequenceInvalid)?;
        if a_to_b {
            Ok(last.start_tick_index.max(MIN_TICK_INDEX))
        } else {
            Ok((last.start_tick_index + ticks_in_array(self.tick_spacing) - 1).min(MAX_TICK_INDEX))
        }
    }
}
