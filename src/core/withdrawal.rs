use tracing::debug;

use super::types::Portfolio;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawalOutcome {
    pub withdrawn: f64,
    pub shortfall: f64,
}

/// Drains holdings in `order` until `amount_needed` is covered.
///
/// Lots under one key are drained in their stored order. Keys missing from the portfolio are
/// skipped. Whatever cannot be covered is returned as the shortfall.
pub fn withdraw(portfolio: &mut Portfolio, amount_needed: f64, order: &[String]) -> WithdrawalOutcome {
    let mut remaining = amount_needed.max(0.0);

    for key in order {
        if remaining <= 0.0 {
            break;
        }

        let Some(holding) = portfolio.holdings.get_mut(key) else {
            debug!(asset = %key, "withdrawal order names an asset the portfolio does not hold");
            continue;
        };

        for record in holding.records_mut() {
            if remaining <= 0.0 {
                break;
            }
            if record.value <= remaining {
                remaining -= record.value;
                record.value = 0.0;
            } else {
                record.value -= remaining;
                remaining = 0.0;
            }
        }
    }

    WithdrawalOutcome {
        withdrawn: amount_needed.max(0.0) - remaining,
        shortfall: remaining,
    }
}
