//! Shared domain types.
//!
//! Raw records (`TransactionRecord`, `MetricRow`, `WellKnownAccount`) mirror the
//! explorer's JSON closely and keep unknown fields, so a fetched payload can be
//! persisted without losing anything. Everything downstream of ingestion works on
//! the typed views (`LedgerRecord`, `MetricRecord`, `PeriodStats`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Ledger result code of a fully successful transaction.
pub const SUCCESS_CODE: &str = "tesSUCCESS";
/// Payment failed: a path was found but could not deliver the full amount.
pub const PATH_PARTIAL_CODE: &str = "tecPATH_PARTIAL";
/// Payment failed: no liquidity along any path.
pub const PATH_DRY_CODE: &str = "tecPATH_DRY";

pub const PAYMENT: &str = "Payment";
pub const OFFER_CREATE: &str = "OfferCreate";

/// 1 XRP = 1,000,000 drops.
pub const DROPS_PER_XRP: f64 = 1_000_000.0;

/// Width of the buckets records are folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

/// What to do when merged data covers a period the target map does not have yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// Create the missing period and merge into it.
    Upsert,
    /// Only merge into periods that already exist; everything else is dropped.
    ExistingOnly,
}

/// A calendar day or calendar month.
///
/// Ordering is chronological, so a `BTreeMap<Period, _>` iterates in time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    start: NaiveDate,
    granularity: Granularity,
}

impl Period {
    /// The period of the given granularity that contains `date`.
    pub fn containing(date: NaiveDate, granularity: Granularity) -> Self {
        let start = match granularity {
            Granularity::Day => date,
            Granularity::Month => date.with_day(1).unwrap_or(date),
        };
        Self { start, granularity }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::containing(date, Granularity::Day)
    }

    /// `None` for an invalid month number.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|d| Self::containing(d, Granularity::Month))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// The following period of the same granularity.
    pub fn succ(&self) -> Option<Self> {
        let start = match self.granularity {
            Granularity::Day => self.start.succ_opt()?,
            Granularity::Month => self.start.checked_add_months(Months::new(1))?,
        };
        Some(Self {
            start,
            granularity: self.granularity,
        })
    }

    /// Every period from `first` to `last`, both included.
    ///
    /// Empty when `last` is before `first` or the granularities differ.
    pub fn range_inclusive(first: Period, last: Period) -> Vec<Period> {
        let mut out = Vec::new();
        if first.granularity != last.granularity {
            return out;
        }
        let mut cur = Some(first);
        while let Some(p) = cur {
            if p > last {
                break;
            }
            out.push(p);
            cur = p.succ();
        }
        out
    }

    /// `YYYY-MM-DD` for days, `YYYY-MM` for months.
    pub fn key(&self) -> String {
        match self.granularity {
            Granularity::Day => self.start.format("%Y-%m-%d").to_string(),
            Granularity::Month => self.start.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Running totals for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub total: u64,
    pub success: u64,
    /// Named counters (result codes, ledger metrics).
    pub counts: BTreeMap<String, u64>,
    /// Derived ratios, e.g. `tecPATH_DRY_ratio`.
    pub ratios: BTreeMap<String, f64>,
}

impl PeriodStats {
    /// Value of a metric by name: `total`, `success`, or a named counter (0 if absent).
    pub fn metric(&self, name: &str) -> u64 {
        match name {
            "total" => self.total,
            "success" => self.success,
            other => self.counts.get(other).copied().unwrap_or(0),
        }
    }

    pub fn add_count(&mut self, name: &str, value: u64) {
        *self.counts.entry(name.to_string()).or_insert(0) += value;
    }
}

/// Period-keyed accumulators.
pub type PeriodTable = BTreeMap<Period, PeriodStats>;

/// One labelled time series, chronologically ordered.
///
/// `None` marks a period with no data (kept so gaps stay visible).
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub label: String,
    pub points: Vec<(Period, Option<f64>)>,
}

impl TimeSeries {
    pub fn new(label: impl Into<String>, points: Vec<(Period, Option<f64>)>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    /// Present values in period order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().filter_map(|(_, v)| *v).collect()
    }
}

/// Parse the explorer's timestamp format (`2024-03-22T10:15:00.000Z`).
///
/// Also accepts RFC 3339 offsets and bare `YYYY-MM-DD` dates.
pub fn parse_ledger_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A JSON number, or a string holding one.
pub fn json_number(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Numeric value of an amount. Issued currencies are `{value, currency, ...}`
/// objects; XRP is a bare string of drops and comes back in XRP.
pub fn amount_value(amount: &Value) -> Option<f64> {
    match amount {
        Value::Object(obj) => obj.get("value").and_then(json_number),
        other => json_number(other).map(|drops| drops / DROPS_PER_XRP),
    }
}

/// Raw ledger transaction as returned by the account transactions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(rename = "Account", default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(rename = "Destination", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(rename = "TransactionType", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(rename = "Amount", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(rename = "Fee", default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TransactionMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(rename = "TransactionResult", default, skip_serializing_if = "Option::is_none")]
    pub transaction_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_amount: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionRecord {
    pub fn tx_type(&self) -> &str {
        self.transaction_type.as_deref().unwrap_or("")
    }

    pub fn result_code(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|m| m.transaction_result.as_deref())
            .unwrap_or("")
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.date.as_deref().and_then(parse_ledger_date)
    }

    /// `Amount.value`, 0 when absent.
    pub fn expected_amount(&self) -> f64 {
        self.amount.as_ref().and_then(amount_value).unwrap_or(0.0)
    }

    /// `meta.delivered_amount.value`, 0 when absent.
    pub fn delivered_amount(&self) -> f64 {
        self.delivered()
            .and_then(amount_value)
            .unwrap_or(0.0)
    }

    /// `XRP` for a bare drops amount.
    pub fn delivered_currency(&self) -> Option<&str> {
        match self.delivered()? {
            Value::Object(obj) => obj.get("currency").and_then(Value::as_str),
            Value::String(_) | Value::Number(_) => Some("XRP"),
            _ => None,
        }
    }

    /// Fee in drops, 0 when absent.
    pub fn fee_drops(&self) -> u64 {
        self.fee
            .as_ref()
            .and_then(json_number)
            .map(|v| v.max(0.0) as u64)
            .unwrap_or(0)
    }

    fn delivered(&self) -> Option<&Value> {
        self.meta.as_ref().and_then(|m| m.delivered_amount.as_ref())
    }
}

/// One page of the account transactions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default, deserialize_with = "de_marker")]
    pub marker: Option<String>,
}

/// Markers are opaque: strings pass through, anything else is re-encoded as JSON.
/// Null and empty strings mean "no more data".
fn de_marker<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Persisted transaction file: `{account: [tx, ...]}` for account groups, or a
/// flat list for single-account sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionFile {
    Flat(Vec<TransactionRecord>),
    ByAccount(BTreeMap<String, Vec<TransactionRecord>>),
}

impl TransactionFile {
    pub fn into_records(self) -> Vec<TransactionRecord> {
        match self {
            TransactionFile::Flat(txs) => txs,
            TransactionFile::ByAccount(map) => map.into_values().flatten().collect(),
        }
    }
}

/// Entry of the well-known accounts list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellKnownAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WellKnownAccount {
    pub fn new(name: &str, account: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            account: Some(account.to_string()),
            extra: Map::new(),
        }
    }
}

/// All accounts sharing one display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountGroup {
    pub name: String,
    pub accounts: Vec<String>,
    pub account_count: usize,
}

/// One daily row of a metrics endpoint: `{date, <category>: {<name>: <number>}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub date: String,
    #[serde(flatten)]
    pub categories: Map<String, Value>,
}

/// A single (date, metric) observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub date: NaiveDateTime,
    pub category: String,
    pub metric_name: String,
    pub value: f64,
}

impl MetricRow {
    /// Explode into one record per numeric metric. Unparsable dates yield nothing.
    pub fn records(&self) -> Vec<MetricRecord> {
        let Some(date) = parse_ledger_date(&self.date) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (category, group) in &self.categories {
            let Value::Object(metrics) = group else {
                continue;
            };
            for (name, value) in metrics {
                if let Some(value) = json_number(value) {
                    out.push(MetricRecord {
                        date,
                        category: category.clone(),
                        metric_name: name.clone(),
                        value,
                    });
                }
            }
        }
        out
    }
}

/// What a pre-aggregated count row is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKey {
    /// Counts per transaction type (`type` metrics).
    ByType,
    /// Counts per result code (`result` metrics).
    ByResult,
}

/// Counts for one day, keyed by transaction type or result code.
#[derive(Debug, Clone, PartialEq)]
pub struct CountRecord {
    pub date: NaiveDateTime,
    pub key: CountKey,
    pub counts: BTreeMap<String, u64>,
}

impl CountRecord {
    /// Build from a metric row's `type` or `result` group. `None` when the row
    /// has no such group or an unparsable date.
    pub fn from_row(row: &MetricRow, key: CountKey) -> Option<Self> {
        let category = match key {
            CountKey::ByType => "type",
            CountKey::ByResult => "result",
        };
        let date = parse_ledger_date(&row.date)?;
        let Value::Object(group) = row.categories.get(category)? else {
            return None;
        };
        let counts = group
            .iter()
            .filter_map(|(name, v)| json_number(v).map(|n| (name.clone(), n.max(0.0).round() as u64)))
            .collect();
        Some(Self { date, key, counts })
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

/// Input to the aggregator. The shape is decided once, at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRecord {
    PerTransaction(TransactionRecord),
    PreAggregated(CountRecord),
}

impl LedgerRecord {
    pub fn from_transactions(txs: Vec<TransactionRecord>) -> Vec<LedgerRecord> {
        txs.into_iter().map(LedgerRecord::PerTransaction).collect()
    }

    pub fn from_metric_rows(rows: &[MetricRow], key: CountKey) -> Vec<LedgerRecord> {
        rows.iter()
            .filter_map(|row| CountRecord::from_row(row, key))
            .map(LedgerRecord::PreAggregated)
            .collect()
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            LedgerRecord::PerTransaction(tx) => tx.timestamp(),
            LedgerRecord::PreAggregated(c) => Some(c.date),
        }
    }
}
