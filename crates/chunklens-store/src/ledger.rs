//! Cost ledger records and derived aggregates. Aggregation never mutates records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use chunklens_llm::CallCost;
use serde::{Deserialize, Serialize};

/// One LLM call's token usage and cost, attributed to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub document_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub recorded_at: DateTime<Utc>,
}

impl CostRecord {
    #[must_use]
    pub fn from_call(document_id: impl Into<String>, cost: &CallCost, recorded_at: DateTime<Utc>) -> Self {
        Self {
            document_id: document_id.into(),
            input_tokens: cost.input_tokens,
            output_tokens: cost.output_tokens,
            input_cost: cost.input_cost,
            output_cost: cost.output_cost,
            total_cost: cost.total_cost,
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub average_cost: f64,
}

impl CostSummary {
    #[must_use]
    pub fn of<'a>(records: impl IntoIterator<Item = &'a CostRecord>) -> Self {
        let mut summary = records.into_iter().fold(Self::default(), |acc, r| Self {
            calls: acc.calls + 1,
            input_tokens: acc.input_tokens + r.input_tokens,
            output_tokens: acc.output_tokens + r.output_tokens,
            input_cost: acc.input_cost + r.input_cost,
            output_cost: acc.output_cost + r.output_cost,
            total_cost: acc.total_cost + r.total_cost,
            average_cost: 0.0,
        });
        if summary.calls > 0 {
            #[allow(clippy::cast_precision_loss)]
            let calls = summary.calls as f64;
            summary.average_cost = summary.total_cost / calls;
        }
        summary
    }
}

/// Records with `from <= recorded_at < to`; an open bound is unbounded.
pub fn within(
    records: &[CostRecord],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &CostRecord> {
    records.iter().filter(move |r| {
        from.is_none_or(|f| r.recorded_at >= f) && to.is_none_or(|t| r.recorded_at < t)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Hour,
    Day,
}

impl Bucket {
    /// Start of the bucket containing `ts`.
    #[must_use]
    pub fn start_of(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let day = ts.date_naive();
        let start = match self {
            Self::Hour => day.and_hms_opt(ts.hour(), 0, 0),
            Self::Day => day.and_hms_opt(0, 0, 0),
        };
        start.map_or(ts, |n| n.and_utc())
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hour => "hour",
            Self::Day => "day",
        })
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Self::Hour),
            "day" | "daily" => Ok(Self::Day),
            other => Err(format!("unknown bucket {other:?}, expected hour or day")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub start: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: CostSummary,
}

/// Per-bucket summaries in chronological order. Empty buckets are omitted.
#[must_use]
pub fn bucketize(records: &[CostRecord], bucket: Bucket) -> Vec<BucketSummary> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&CostRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(bucket.start_of(record.recorded_at))
            .or_default()
            .push(record);
    }
    groups
        .into_iter()
        .map(|(start, group)| BucketSummary {
            start,
            summary: CostSummary::of(group),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(doc: &str, total: f64, ts: DateTime<Utc>) -> CostRecord {
        CostRecord {
            document_id: doc.into(),
            input_tokens: 100,
            output_tokens: 10,
            input_cost: total / 2.0,
            output_cost: total / 2.0,
            total_cost: total,
            recorded_at: ts,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn totals_sum_within_tolerance() {
        let records = vec![record("doc", 0.000_375, at(9, 0)), record("doc", 0.000_5, at(9, 5))];
        let summary = CostSummary::of(&records);
        assert!((summary.total_cost - 0.000_875).abs() < 1e-9);
        assert_eq!(summary.calls, 2);
        assert!((summary.average_cost - 0.000_437_5).abs() < 1e-12);
        assert_eq!(summary.input_tokens, 200);
    }

    #[test]
    fn empty_summary_has_zero_average() {
        let summary = CostSummary::of(&[]);
        assert_eq!(summary.calls, 0);
        assert!(summary.average_cost.abs() < f64::EPSILON);
    }

    #[test]
    fn within_is_half_open() {
        let records = vec![
            record("a", 1.0, at(8, 0)),
            record("a", 1.0, at(9, 0)),
            record("a", 1.0, at(10, 0)),
        ];
        let hits: Vec<_> = within(&records, Some(at(9, 0)), Some(at(10, 0))).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].recorded_at, at(9, 0));
        assert_eq!(within(&records, None, None).count(), 3);
    }

    #[test]
    fn hourly_buckets() {
        let records = vec![
            record("a", 1.0, at(9, 10)),
            record("b", 2.0, at(9, 50)),
            record("a", 4.0, at(11, 0)),
        ];
        let buckets = bucketize(&records, Bucket::Hour);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].start, at(9, 0));
        assert!((buckets[0].summary.total_cost - 3.0).abs() < 1e-12);
        assert_eq!(buckets[1].start, at(11, 0));

        let daily = bucketize(&records, Bucket::Day);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].start, at(0, 0));
        assert_eq!(daily[0].summary.calls, 3);
    }

    #[test]
    fn bucket_parsing() {
        assert_eq!("hour".parse::<Bucket>().unwrap(), Bucket::Hour);
        assert_eq!("Daily".parse::<Bucket>().unwrap(), Bucket::Day);
        assert!("week".parse::<Bucket>().is_err());
    }

    #[test]
    fn from_call_copies_costs() {
        let cost = CallCost {
            input_tokens: 1,
            output_tokens: 2,
            input_cost: 0.1,
            output_cost: 0.2,
            total_cost: 0.3,
        };
        let r = CostRecord::from_call("doc", &cost, at(1, 0));
        assert_eq!(r.output_tokens, 2);
        assert!((r.total_cost - 0.3).abs() < f64::EPSILON);
    }
}
