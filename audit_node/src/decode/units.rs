//! Numeric rendering helpers
//!
//! On-chain integers are fixed-point values; these defactor them into
//! human-scaled decimal strings with two decimal places. Division
//! truncates rather than rounds so a rendered amount never overstates.

use ethers::types::U256;

/// Divide an integer token amount by `10^decimals`, two decimal places.
pub fn defactor(amount: U256, decimals: u32) -> String {
    let scale = U256::exp10(decimals as usize);
    let whole = amount / scale;
    let frac = amount % scale;
    let hundredths = frac
        .checked_mul(U256::from(100u64))
        .map(|v| v / scale)
        .unwrap_or_default();
    format!("{whole}.{:02}", hundredths.as_u64())
}

/// Render a ratio scaled by 1e18 as a percentage: `(value / 1e18) * 100`
/// with two decimal places and a trailing `%`.
pub fn to_percent(value: U256) -> String {
    // hundredths of a percent
    let scaled = match value.checked_mul(U256::from(10_000u64)) {
        Some(v) => v / U256::exp10(18),
        None => (value / U256::exp10(18)).saturating_mul(U256::from(10_000u64)),
    };
    format!(
        "{}.{:02}%",
        scaled / U256::from(100u64),
        (scaled % U256::from(100u64)).as_u64()
    )
}
