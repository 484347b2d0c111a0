//! Fixed-point arithmetic helpers for accumulator math.
//!
//! Accumulator updates compute `amount * PRECISION / divisor`. Typical
//! operands fit the plain `u128` product; when they do not, the
//! multiplication widens to 256 bits (two `u128` halves) and the quotient
//! comes from restoring long division, so large allocations settle exactly
//! instead of panicking or wrapping.

/// Floor of `a * b / d` without intermediate overflow.
///
/// `d` must be non-zero. Saturates at `u128::MAX` if the quotient itself
/// exceeds 128 bits, which no ledger amount can reach.
pub fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    debug_assert!(d != 0);
    match a.checked_mul(b) {
        Some(product) => product / d,
        None => {
            let (hi, lo) = widening_mul(a, b);
            div_wide(hi, lo, d)
        }
    }
}

/// 128x128 -> 256 bit multiply, returned as `(hi, lo)` halves
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | ((mid & MASK) << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Restoring long division of the 256-bit value `hi * 2^128 + lo` by `d`.
/// Requires `hi < d` for an in-range quotient; saturates otherwise.
fn div_wide(hi: u128, lo: u128, d: u128) -> u128 {
    if hi == 0 {
        return lo / d;
    }
    if hi >= d {
        return u128::MAX;
    }
    let mut rem = hi;
    let mut quotient = 0u128;
    for bit in (0..128u32).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    quotient
}
