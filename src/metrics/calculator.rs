//! Performance metrics over a series of realised P&Ls: win rate, drawdown, Sharpe, Sortino.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Summary statistics for closed trades, in trade order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,

    /// Winning trades / total trades
    pub win_rate: f64,

    pub total_pnl: Decimal,
    pub avg_win: Decimal,

    /// Average loss, as a positive amount
    pub avg_loss: Decimal,

    /// Gross profit / gross loss
    pub profit_factor: f64,

    /// Average P&L per trade
    pub expectancy: Decimal,

    /// Largest peak-to-trough decline of cumulative P&L, as a fraction of the peak
    pub max_drawdown: f64,
    pub max_drawdown_usdc: Decimal,
    pub peak_equity: Decimal,

    /// Per-trade Sharpe (mean / std, risk-free 0)
    pub sharpe_ratio: f64,

    /// Per-trade Sortino (mean / downside std)
    pub sortino_ratio: f64,
}

impl PerformanceMetrics {
    /// Compute metrics from realised P&Ls.
    pub fn from_pnls(pnls: &[Decimal]) -> Self {
        let mut metrics = Self::default();
        if pnls.is_empty() {
            return metrics;
        }

        let (wins, losses): (Vec<Decimal>, Vec<Decimal>) =
            pnls.iter().partition(|&&p| p > Decimal::ZERO);

        metrics.total_trades = pnls.len() as u32;
        metrics.winning_trades = wins.len() as u32;
        metrics.losing_trades = losses.len() as u32;
        metrics.total_pnl = pnls.iter().copied().sum();
        metrics.win_rate = wins.len() as f64 / pnls.len() as f64;

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();

        if !wins.is_empty() {
            metrics.avg_win = (gross_profit / Decimal::from(wins.len() as u32)).round_dp(2);
        }
        if !losses.is_empty() {
            metrics.avg_loss = (gross_loss / Decimal::from(losses.len() as u32)).round_dp(2);
        }
        if gross_loss > Decimal::ZERO {
            metrics.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }
        metrics.expectancy = (metrics.total_pnl / Decimal::from(pnls.len() as u32)).round_dp(2);

        let mut equity = Decimal::ZERO;
        let curve: Vec<Decimal> = pnls
            .iter()
            .map(|p| {
                equity += p;
                equity
            })
            .collect();
        let drawdown = max_drawdown(Decimal::ZERO, &curve);
        metrics.max_drawdown = drawdown.pct;
        metrics.max_drawdown_usdc = drawdown.amount;
        metrics.peak_equity = drawdown.peak;

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        let (sharpe, sortino) = sharpe_sortino(&returns);
        metrics.sharpe_ratio = sharpe;
        metrics.sortino_ratio = sortino;

        metrics
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trades:         {} ({} won, {} lost)", self.total_trades, self.winning_trades, self.losing_trades)?;
        writeln!(f, "Win Rate:       {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Total P&L:      ${:+.2}", self.total_pnl)?;
        writeln!(f, "Avg Win/Loss:   ${:.2} / ${:.2}", self.avg_win, self.avg_loss)?;
        writeln!(f, "Profit Factor:  {:.2}", self.profit_factor)?;
        writeln!(f, "Expectancy:     ${:+.2}", self.expectancy)?;
        writeln!(
            f,
            "Max Drawdown:   ${:.2} ({:.1}%)",
            self.max_drawdown_usdc,
            self.max_drawdown * 100.0
        )?;
        write!(
            f,
            "Sharpe/Sortino: {:.2} / {:.2}",
            self.sharpe_ratio, self.sortino_ratio
        )
    }
}

/// Worst decline observed along an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Drawdown {
    pub amount: Decimal,
    pub pct: f64,
    pub peak: Decimal,
}

/// Maximum drawdown of `curve`, with `start` as the initial peak.
pub fn max_drawdown(start: Decimal, curve: &[Decimal]) -> Drawdown {
    let mut peak = start;
    let mut worst = Drawdown {
        peak: start,
        ..Drawdown::default()
    };

    for &value in curve {
        if value > peak {
            peak = value;
        }
        if peak <= Decimal::ZERO {
            continue;
        }

        let dd = peak - value;
        if dd > worst.amount {
            worst.amount = dd;
        }
        let pct = dd.to_f64().unwrap_or(0.0) / peak.to_f64().unwrap_or(1.0);
        if pct > worst.pct {
            worst.pct = pct;
        }
    }
    worst.peak = peak;
    worst
}

/// Sharpe and Sortino of a return series. Zero with fewer than two returns.
pub fn sharpe_sortino(returns: &[f64]) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let mean = returns.iter().mean();
    let std_dev = returns.iter().population_std_dev();
    let sharpe = if std_dev > 0.0 { mean / std_dev } else { 0.0 };

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let sortino = if downside.is_empty() {
        0.0
    } else {
        let downside_dev = downside.iter().population_std_dev();
        if downside_dev > 0.0 {
            mean / downside_dev
        } else {
            0.0
        }
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pnl_metrics() {
        let pnls = vec![dec!(100), dec!(-50), dec!(200), dec!(-30), dec!(150)];
        let metrics = PerformanceMetrics::from_pnls(&pnls);

        assert_eq!(metrics.winning_trades, 3);
        assert_eq!(metrics.losing_trades, 2);
        assert_eq!(metrics.total_pnl, dec!(370));
        assert!((metrics.win_rate - 0.6).abs() < 0.001);
        assert_eq!(metrics.avg_win, dec!(150));
        assert_eq!(metrics.avg_loss, dec!(40));
        assert!((metrics.profit_factor - 450.0 / 80.0).abs() < 1e-9);
        assert_eq!(metrics.expectancy, dec!(74));
        assert!(metrics.sharpe_ratio > 0.0);
    }

    #[test]
    fn test_drawdown_on_cumulative_pnl() {
        let pnls = vec![
            dec!(100), // 100
            dec!(50),  // 150 peak
            dec!(-80), // 70
            dec!(-20), // 50, down 100 from 150
            dec!(100), // 150
            dec!(50),  // 200
        ];
        let metrics = PerformanceMetrics::from_pnls(&pnls);

        assert!(metrics.max_drawdown > 0.65 && metrics.max_drawdown < 0.68);
        assert_eq!(metrics.max_drawdown_usdc, dec!(100));
        assert_eq!(metrics.peak_equity, dec!(200));
    }

    #[test]
    fn test_drawdown_from_starting_bankroll() {
        let curve = [dec!(900), dec!(1100), dec!(990)];
        let dd = max_drawdown(dec!(1000), &curve);
        assert_eq!(dd.amount, dec!(110));
        assert!((dd.pct - 0.1).abs() < 1e-9);
        assert_eq!(dd.peak, dec!(1100));
    }

    #[test]
    fn test_sharpe_sortino_edge_cases() {
        assert_eq!(sharpe_sortino(&[0.1]), (0.0, 0.0));
        assert_eq!(sharpe_sortino(&[0.1, 0.1]), (0.0, 0.0));

        let (sharpe, sortino) = sharpe_sortino(&[0.2, -0.1, 0.3, -0.2]);
        assert!((sharpe - 0.05 / 0.2062).abs() < 1e-3);
        assert!((sortino - 0.05 / 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_empty_series() {
        let metrics = PerformanceMetrics::from_pnls(&[]);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.total_pnl, Decimal::ZERO);
    }
}
