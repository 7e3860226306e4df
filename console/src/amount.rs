//! Compact human-readable amounts, e.g. `1.5M sats`.

/// Decimal places shown once an amount has been scaled to a suffix.
pub const DEFAULT_DECIMALS: usize = 1;

const SUFFIXES: [&str; 4] = ["", "k", "M", "G"];

/// Formats a millisatoshi amount as a compact satoshi amount.
///
/// The amount is converted to sats, then divided by 1000 while it is at least
/// 1000, picking up a `k`, `M` or `G` suffix on the way. Scaled amounts are
/// shown with `decimals` places; unscaled ones are whole sats. Rounding is
/// half away from zero.
///
/// ```
/// use console::amount::format_amount;
///
/// assert_eq!(format_amount(500, 1), "1");
/// assert_eq!(format_amount(1_000_000, 1), "1.0k");
/// assert_eq!(format_amount(2_500_000_000, 1), "2.5M");
/// ```
pub fn format_amount(amount_msat: u64, decimals: usize) -> String {
    let mut amount = amount_msat as f64 / 1000.0;
    let mut idx = 0;
    // Stop at the largest suffix; bigger amounts just get more digits.
    while amount >= 1000.0 && idx < SUFFIXES.len() - 1 {
        amount /= 1000.0;
        idx += 1;
    }

    let places = if idx > 0 { decimals } else { 0 };
    let factor = 10_f64.powi(places as i32);
    let rounded = (amount * factor).round() / factor;
    let suffix = SUFFIXES[idx];
    format!("{rounded:.places$}{suffix}")
}

/// [`format_amount`] with [`DEFAULT_DECIMALS`] and a `sats` unit.
pub fn format_sats(amount_msat: u64) -> String {
    let amount = format_amount(amount_msat, DEFAULT_DECIMALS);
    format!("{amount} sats")
}

#[cfg(test)]
mod test {
    use proptest::{arbitrary::any, prop_assert, proptest};

    use super::*;

    fn suffix_rank(formatted: &str) -> usize {
        SUFFIXES
            .iter()
            .rposition(|suffix| {
                !suffix.is_empty() && formatted.ends_with(suffix)
            })
            .unwrap_or(0)
    }

    #[test]
    fn concrete_cases() {
        assert_eq!(format_amount(0, 1), "0");
        assert_eq!(format_amount(499, 1), "0");
        assert_eq!(format_amount(500, 1), "1");
        assert_eq!(format_amount(1_000, 1), "1");
        assert_eq!(format_amount(999_000, 1), "999");
        assert_eq!(format_amount(1_000_000, 1), "1.0k");
        assert_eq!(format_amount(1_500_000, 1), "1.5k");
        assert_eq!(format_amount(2_500_000_000, 1), "2.5M");
        assert_eq!(format_amount(2_500_000_000, 2), "2.50M");
        assert_eq!(format_amount(2_500_000_000, 0), "3M");
        assert_eq!(format_amount(21_000_000_000_000, 1), "21.0G");
    }

    #[test]
    fn caps_at_largest_suffix() {
        // 21M BTC is 2.1e18 msat = 2.1e15 sat = 2.1M G.
        let max_supply = 2_100_000_000_000_000_000;
        assert_eq!(format_amount(max_supply, 1), "2100000.0G");
        let formatted = format_amount(u64::MAX, 1);
        assert!(formatted.ends_with('G'), "{formatted}");
    }

    #[test]
    fn format_sats_unit() {
        assert_eq!(format_sats(1_234_000), "1.2k sats");
        assert_eq!(format_sats(42_000), "42 sats");
    }

    #[test]
    fn suffix_is_monotone() {
        proptest!(|(a in any::<u64>(), b in any::<u64>())| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo_rank = suffix_rank(&format_amount(lo, DEFAULT_DECIMALS));
            let hi_rank = suffix_rank(&format_amount(hi, DEFAULT_DECIMALS));
            prop_assert!(lo_rank <= hi_rank);
        });
    }

    #[test]
    fn decimals_only_when_scaled() {
        proptest!(|(amount in any::<u64>(), decimals in 1_usize..4)| {
            let formatted = format_amount(amount, decimals);
            let scaled = suffix_rank(&formatted) > 0;
            match formatted.split_once('.') {
                Some((_, frac)) => {
                    prop_assert!(scaled);
                    let digits = frac.trim_end_matches(char::is_alphabetic);
                    prop_assert!(digits.len() == decimals);
                }
                None => prop_assert!(!scaled),
            }
        });
    }
}
