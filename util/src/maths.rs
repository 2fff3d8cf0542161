//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use std::ops::{Add, Neg, Sub};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Clamp a value into the inclusive range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: PartialOrd + Copy
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Move from `prev` towards `target` by no more than `max_step`.
///
/// `max_step` must be non-negative.
pub fn slew<T>(prev: T, target: T, max_step: T) -> T
where
    T: PartialOrd + Copy + Add<Output = T> + Sub<Output = T> + Neg<Output = T>
{
    prev + clamp(target - prev, -max_step, max_step)
}

/// Square root which treats (rounding induced) negative inputs as zero.
pub fn sqrt_pos<T>(value: T) -> T
where
    T: Float
{
    value.max(T::zero()).sqrt()
}
