//! Payment cost: fees, slippage and total cost per payment, averaged by month.
//!
//! Slippage compares what the sender asked to deliver (`Amount`) with what the
//! ledger actually delivered (`meta.delivered_amount`). Fees are in drops;
//! bare XRP amounts arrive in drops and are converted to XRP.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::analysis::ratio::ratio;
use crate::domain::{DROPS_PER_XRP, Granularity, PAYMENT, Period, TimeSeries, TransactionRecord};
use crate::math::mean;

/// Cost breakdown of one payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentCost {
    pub hash: Option<String>,
    pub account: Option<String>,
    pub destination: Option<String>,
    pub currency: String,
    pub date: NaiveDateTime,
    pub fee: u64,
    pub fee_xrp: f64,
    pub expected_amount: f64,
    pub delivered_amount: f64,
    pub slippage_cost_pct: f64,
    pub total_cost_currency: f64,
}

impl PaymentCost {
    /// `None` for non-payments and records without a usable date.
    pub fn from_transaction(tx: &TransactionRecord) -> Option<Self> {
        if tx.tx_type() != PAYMENT {
            return None;
        }
        let date = tx.timestamp()?;
        let expected = tx.expected_amount();
        let delivered = tx.delivered_amount();
        let fee = tx.fee_drops();
        let fee_xrp = fee as f64 / DROPS_PER_XRP;

        let slippage_cost_pct = if expected > 0.0 {
            ratio(expected - delivered, expected) * 100.0
        } else {
            0.0
        };

        Some(Self {
            hash: tx.hash.clone(),
            account: tx.account.clone(),
            destination: tx.destination.clone(),
            currency: tx.delivered_currency().unwrap_or("UNKNOWN").to_string(),
            date,
            fee,
            fee_xrp,
            expected_amount: expected,
            delivered_amount: delivered,
            slippage_cost_pct,
            total_cost_currency: expected - delivered + fee_xrp,
        })
    }
}

/// Costs of every payment on or after `start`.
pub fn payment_costs(records: &[TransactionRecord], start: NaiveDate) -> Vec<PaymentCost> {
    let mut skipped = 0usize;
    let costs: Vec<PaymentCost> = records
        .iter()
        .filter_map(|tx| {
            let cost = PaymentCost::from_transaction(tx);
            if cost.is_none() {
                skipped += 1;
            }
            cost
        })
        .filter(|c| c.date.date() >= start)
        .collect();
    debug!(payments = costs.len(), skipped, "payment costs computed");
    costs
}

/// Monthly means. `None` on months without payments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostAverages {
    pub avg_fee: f64,
    pub avg_slippage_pct: f64,
    pub avg_total_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCost {
    pub month: Period,
    pub transaction_count: usize,
    pub averages: Option<CostAverages>,
}

/// Group costs by month over a contiguous month range (first to last payment).
pub fn monthly_cost_metrics(costs: &[PaymentCost]) -> Vec<MonthlyCost> {
    let month_of = |c: &PaymentCost| Period::containing(c.date.date(), Granularity::Month);
    let (Some(first), Some(last)) = (costs.iter().map(month_of).min(), costs.iter().map(month_of).max()) else {
        return Vec::new();
    };

    Period::range_inclusive(first, last)
        .into_iter()
        .map(|month| {
            let in_month: Vec<&PaymentCost> = costs.iter().filter(|c| month_of(*c) == month).collect();
            let avg = |f: fn(&PaymentCost) -> f64| mean(&in_month.iter().map(|&c| f(c)).collect::<Vec<_>>());
            let averages = match (avg(|c| c.fee as f64), avg(|c| c.slippage_cost_pct), avg(|c| c.total_cost_currency)) {
                (Some(avg_fee), Some(avg_slippage_pct), Some(avg_total_cost)) => Some(CostAverages {
                    avg_fee,
                    avg_slippage_pct,
                    avg_total_cost,
                }),
                _ => None,
            };
            MonthlyCost {
                month,
                transaction_count: in_month.len(),
                averages,
            }
        })
        .collect()
}

/// The four monthly cost series, in display order.
pub fn cost_series(months: &[MonthlyCost]) -> Vec<TimeSeries> {
    let pick = |label: &str, f: fn(&CostAverages) -> f64| {
        TimeSeries::new(label, months.iter().map(|m| (m.month, m.averages.as_ref().map(f))).collect())
    };
    vec![
        pick("Average Fee", |a| a.avg_fee),
        pick("Average Slippage (%)", |a| a.avg_slippage_pct),
        pick("Average Total Cost", |a| a.avg_total_cost),
        TimeSeries::new(
            "Transaction Count",
            months
                .iter()
                .map(|m| (m.month, Some(m.transaction_count as f64)))
                .collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payment(date: &str, expected: &str, delivered: &str, fee: &str) -> TransactionRecord {
        serde_json::from_value(json!({
            "hash": format!("H-{date}"),
            "TransactionType": "Payment",
            "Amount": {"value": expected, "currency": "USD"},
            "Fee": fee,
            "date": date,
            "meta": {"TransactionResult": "tesSUCCESS", "delivered_amount": {"value": delivered, "currency": "USD"}}
        }))
        .unwrap()
    }

    #[test]
    fn computes_slippage_and_total_cost() {
        let cost = PaymentCost::from_transaction(&payment("2021-01-05T00:00:00.000Z", "200", "190", "12")).unwrap();
        assert_eq!(cost.currency, "USD");
        assert_eq!(cost.fee, 12);
        assert!((cost.fee_xrp - 0.000012).abs() < 1e-12);
        assert!((cost.slippage_cost_pct - 5.0).abs() < 1e-9);
        assert!((cost.total_cost_currency - 10.000012).abs() < 1e-9);
    }

    #[test]
    fn xrp_payment_cost_is_in_xrp() {
        let tx: TransactionRecord = serde_json::from_value(json!({
            "TransactionType": "Payment",
            "date": "2021-01-05T00:00:00.000Z",
            "Amount": "10000000",
            "Fee": "12",
            "meta": {"TransactionResult": "tesSUCCESS", "delivered_amount": "10000000"}
        }))
        .unwrap();
        let cost = PaymentCost::from_transaction(&tx).unwrap();
        assert_eq!(cost.currency, "XRP");
        assert_eq!(cost.expected_amount, 10.0);
        assert_eq!(cost.slippage_cost_pct, 0.0);
        assert!((cost.total_cost_currency - 0.000012).abs() < 1e-12);
    }

    #[test]
    fn zero_expected_amount_has_zero_slippage() {
        let tx: TransactionRecord = serde_json::from_value(json!({
            "TransactionType": "Payment",
            "date": "2021-01-05T00:00:00.000Z",
            "Fee": "10"
        }))
        .unwrap();
        let cost = PaymentCost::from_transaction(&tx).unwrap();
        assert_eq!(cost.slippage_cost_pct, 0.0);
        assert_eq!(cost.currency, "UNKNOWN");
    }

    #[test]
    fn filters_non_payments_and_old_records() {
        let mut records = vec![
            payment("2020-12-31T23:00:00.000Z", "10", "10", "10"),
            payment("2021-01-01T00:00:00.000Z", "10", "10", "10"),
        ];
        records.push(
            serde_json::from_value(json!({"TransactionType": "OfferCreate", "date": "2021-02-01T00:00:00.000Z"}))
                .unwrap(),
        );
        let costs = payment_costs(&records, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(costs.len(), 1);
    }

    #[test]
    fn month_grid_reconstructs_gaps() {
        let records = vec![
            payment("2021-01-10T00:00:00.000Z", "100", "100", "10"),
            payment("2021-01-20T00:00:00.000Z", "100", "90", "20"),
            payment("2021-04-02T00:00:00.000Z", "50", "50", "12"),
        ];
        let costs = payment_costs(&records, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        let months = monthly_cost_metrics(&costs);

        let keys: Vec<String> = months.iter().map(|m| m.month.key()).collect();
        assert_eq!(keys, ["2021-01", "2021-02", "2021-03", "2021-04"]);

        assert_eq!(months[0].transaction_count, 2);
        let jan = months[0].averages.unwrap();
        assert!((jan.avg_fee - 15.0).abs() < 1e-12);
        assert!((jan.avg_slippage_pct - 5.0).abs() < 1e-9);

        for gap in &months[1..3] {
            assert_eq!(gap.transaction_count, 0);
            assert!(gap.averages.is_none());
        }
        assert_eq!(months[3].transaction_count, 1);
    }

    #[test]
    fn cost_series_keep_gaps_as_none() {
        let records = vec![
            payment("2021-01-10T00:00:00.000Z", "100", "100", "10"),
            payment("2021-03-02T00:00:00.000Z", "50", "50", "12"),
        ];
        let months = monthly_cost_metrics(&payment_costs(&records, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()));
        let series = cost_series(&months);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].points[1].1, None);
        assert_eq!(series[3].points[1].1, Some(0.0));
    }
}
