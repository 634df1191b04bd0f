//! Odds conversions, expected value and mark-to-market P&L.

use rust_decimal::Decimal;

use crate::models::Side;

/// Expected value of one share (a $1 payout) on the side the estimate favours.
///
/// Zero for a price outside (0,1).
pub fn expected_value(yes_price: f64, est_prob: f64) -> f64 {
    if yes_price <= 0.0 || yes_price >= 1.0 {
        return 0.0;
    }
    let side = Side::favoured(yes_price, est_prob);
    let price = side.token_price(yes_price);
    let p = side.token_probability(est_prob);
    (1.0 - price) * p - price * (1.0 - p)
}

/// Implied probability of decimal odds (e.g. 2.50 -> 0.40).
pub fn implied_probability_from_decimal(odds: f64) -> Option<f64> {
    (odds.is_finite() && odds > 0.0).then(|| 1.0 / odds)
}

/// Implied probability of American odds (+150 -> 0.40, -200 -> 0.667).
pub fn implied_probability_from_american(odds: i32) -> Option<f64> {
    let odds = odds as f64;
    if odds > 0.0 {
        Some(100.0 / (odds + 100.0))
    } else if odds < 0.0 {
        Some(odds.abs() / (odds.abs() + 100.0))
    } else {
        None
    }
}

/// Rough label for the distance between estimate and price.
pub fn edge_strength(yes_price: f64, est_prob: f64) -> &'static str {
    let gap = (est_prob - yes_price).abs();
    if gap > 0.2 {
        "High"
    } else if gap > 0.1 {
        "Medium"
    } else {
        "Low"
    }
}

/// Mark-to-market view of a position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPnl {
    pub pnl_per_share: f64,
    pub pnl_percent: f64,
    pub total_pnl: Decimal,
    pub current_value: Decimal,
}

/// P&L of `shares` held on `side`, with both prices quoted in YES space.
pub fn position_pnl(side: Side, entry_yes: f64, current_yes: f64, shares: Decimal) -> PositionPnl {
    let entry = side.from_yes_space(entry_yes);
    let current = side.from_yes_space(current_yes);
    let pnl_per_share = current - entry;
    let pnl_percent = if entry > 0.0 {
        pnl_per_share / entry * 100.0
    } else {
        0.0
    };

    let to_dec = |x: f64| Decimal::try_from(x).unwrap_or(Decimal::ZERO);
    PositionPnl {
        pnl_per_share,
        pnl_percent,
        total_pnl: (shares * to_dec(pnl_per_share)).round_dp(2),
        current_value: (shares * to_dec(current)).round_dp(2),
    }
}

/// Expected dollar profit of staking `stake` at the favoured side's odds.
pub fn expected_profit(stake: Decimal, yes_price: f64, est_prob: f64) -> Decimal {
    let ev = expected_value(yes_price, est_prob);
    let price = Side::favoured(yes_price, est_prob).token_price(yes_price);
    if price <= 0.0 || stake <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    // per share -> per dollar staked
    (stake * Decimal::try_from(ev / price).unwrap_or(Decimal::ZERO)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_expected_value_both_sides() {
        // YES at 0.40 with 0.50 belief: 0.6*0.5 - 0.4*0.5
        assert!((expected_value(0.40, 0.50) - 0.10).abs() < 1e-12);
        // NO side mirrors
        assert!((expected_value(0.60, 0.50) - 0.10).abs() < 1e-12);
        assert_eq!(expected_value(1.0, 0.5), 0.0);
    }

    #[test]
    fn test_implied_probability() {
        assert!((implied_probability_from_decimal(2.5).unwrap() - 0.4).abs() < 1e-12);
        assert!(implied_probability_from_decimal(0.0).is_none());
        assert!((implied_probability_from_american(150).unwrap() - 0.4).abs() < 1e-12);
        assert!((implied_probability_from_american(-200).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!(implied_probability_from_american(0).is_none());
    }

    #[test]
    fn test_position_pnl_no_side() {
        // NO bought with YES at 0.65 (NO 0.35); YES falls to 0.50 (NO 0.50)
        let pnl = position_pnl(Side::No, 0.65, 0.50, dec!(100));
        assert!((pnl.pnl_per_share - 0.15).abs() < 1e-9);
        assert!((pnl.pnl_percent - 15.0 / 0.35).abs() < 1e-6);
        assert_eq!(pnl.total_pnl, dec!(15.00));
        assert_eq!(pnl.current_value, dec!(50.00));
    }

    #[test]
    fn test_expected_profit() {
        // $100 on YES at 0.40 believing 0.50: win 150 w.p. .5, lose 100 w.p. .5
        assert_eq!(expected_profit(dec!(100), 0.40, 0.50), dec!(25.00));
        assert_eq!(expected_profit(Decimal::ZERO, 0.40, 0.50), Decimal::ZERO);
    }

    #[test]
    fn test_edge_strength() {
        assert_eq!(edge_strength(0.40, 0.65), "High");
        assert_eq!(edge_strength(0.40, 0.55), "Medium");
        assert_eq!(edge_strength(0.40, 0.45), "Low");
    }
}
