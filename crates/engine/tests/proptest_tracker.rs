use engine::tracker::{percent_change, round_percent, swap_quote, SWAP_FEE_RATE};
use proptest::prelude::*;

proptest! {
    /// Rounded percentages never drift more than half a percent from the feed.
    #[test]
    fn rounding_stays_within_half_a_percent(raw in -1_000.0f64..1_000.0f64) {
        let rounded = round_percent(raw) as f64;
        prop_assert!((rounded - raw).abs() <= 0.5 + 1e-9);
    }

    /// Exact halves always round upward.
    #[test]
    fn halves_round_up(whole in -500i64..500i64) {
        prop_assert_eq!(round_percent(whole as f64 + 0.5), whole + 1);
    }

    #[test]
    fn swap_quote_arithmetic_holds(
        eth_amount in 0.0f64..10_000.0f64,
        eth_price in 1.0f64..100_000.0f64,
        btc_price in 1.0f64..1_000_000.0f64,
    ) {
        let quote = swap_quote(eth_amount, eth_price, btc_price).unwrap();
        prop_assert!((quote.eth_fee - eth_amount * SWAP_FEE_RATE).abs() <= 1e-9 * eth_amount.max(1.0));
        prop_assert!((quote.dollar_fee - quote.eth_fee * eth_price).abs() <= 1e-6 * quote.dollar_fee.max(1.0));
        prop_assert!((quote.btc_amount * btc_price - eth_amount).abs() <= 1e-9 * eth_amount.max(1.0));
    }

    /// A rise is a positive change and a fall a negative one.
    #[test]
    fn percent_change_sign_follows_direction(
        baseline in 0.01f64..1_000_000.0f64,
        factor in 0.01f64..10.0f64,
    ) {
        let current = baseline * factor;
        let change = percent_change(baseline, current).unwrap();
        if current > baseline {
            prop_assert!(change > 0.0);
        } else if current < baseline {
            prop_assert!(change < 0.0);
        }
    }
}
