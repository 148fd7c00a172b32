// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! The data model shared by the streaming pipeline: the tagged value union,
//! `BatchItem`, and `Batch`.
//!
//! The source this core is ported from distinguishes item kinds by runtime
//! type inspection; here the distinction is an explicit enum so the grouping
//! key's value-type tag is exhaustive and a mixed-type group is impossible to
//! construct.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Reserved channel-name prefix for writer-pool latency metrics and
/// orchestrator staleness metrics. Not user-assignable.
pub const METRIC_CHANNEL_PREFIX: &str = "__nominal.metric.";

/// One telemetry value, tagged by its wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit floating point scalar.
    Double(f64),
    /// 64-bit integer scalar.
    Integer(i64),
    /// UTF-8 string scalar (also used for log lines).
    String(String),
    /// Array of doubles, e.g. a vector sample.
    DoubleArray(Vec<f64>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Arbitrary JSON-serializable struct.
    Struct(serde_json::Map<String, serde_json::Value>),
}

/// The discriminant of [`Value`], used as part of the grouping key so a
/// wire "series" is always homogeneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueTypeTag {
    /// See [`Value::Double`].
    Double,
    /// See [`Value::Integer`].
    Integer,
    /// See [`Value::String`].
    String,
    /// See [`Value::DoubleArray`].
    DoubleArray,
    /// See [`Value::StringArray`].
    StringArray,
    /// See [`Value::Struct`].
    Struct,
}

impl Value {
    /// The type tag for this value.
    pub fn type_tag(&self) -> ValueTypeTag {
        match self {
            Value::Double(_) => ValueTypeTag::Double,
            Value::Integer(_) => ValueTypeTag::Integer,
            Value::String(_) => ValueTypeTag::String,
            Value::DoubleArray(_) => ValueTypeTag::DoubleArray,
            Value::StringArray(_) => ValueTypeTag::StringArray,
            Value::Struct(_) => ValueTypeTag::Struct,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

/// The grouping key used both to sort items within a batch and to partition
/// them into wire "series": `(channel_name, sorted(tags), value_type_tag)`.
pub type GroupKey = (String, Vec<(String, String)>, ValueTypeTag);

/// An immutable record of one telemetry sample.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// Name of the channel this sample belongs to.
    pub channel_name: String,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// The sample value.
    pub value: Value,
    /// Tags attached to this sample for server-side filtering.
    pub tags: BTreeMap<String, String>,
}

impl BatchItem {
    /// Construct a new item. `tags` is accepted in any order; `BTreeMap`
    /// keeps it canonically sorted for the grouping key.
    pub fn new(
        channel_name: impl Into<String>,
        timestamp: i64,
        value: impl Into<Value>,
        tags: BTreeMap<String, String>,
    ) -> Result<Self> {
        let channel_name = channel_name.into();
        if channel_name.starts_with(METRIC_CHANNEL_PREFIX) {
            return Err(Error::config(format!(
                "channel name '{channel_name}' uses the reserved '{METRIC_CHANNEL_PREFIX}' prefix"
            )));
        }
        Ok(Self {
            channel_name,
            timestamp,
            value: value.into(),
            tags,
        })
    }

    /// Construct a metric item under the reserved prefix, bypassing the
    /// reserved-prefix check (only the writer pool and orchestrator do this).
    pub(crate) fn new_metric(name: &str, timestamp: i64, value: f64) -> Self {
        Self {
            channel_name: format!("{METRIC_CHANNEL_PREFIX}{name}"),
            timestamp,
            value: Value::Double(value),
            tags: BTreeMap::new(),
        }
    }

    /// The grouping key: `(channel_name, sorted(tags), value_type_tag)`.
    pub fn group_key(&self) -> GroupKey {
        (
            self.channel_name.clone(),
            self.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            self.value.type_tag(),
        )
    }
}

/// An immutable sequence of [`BatchItem`]s plus the inclusive timestamp
/// extremes across all items.
#[derive(Debug, Clone)]
pub struct Batch {
    /// The items in this batch, in original enqueue order.
    pub items: Vec<BatchItem>,
    /// Minimum timestamp across `items`.
    pub oldest_timestamp: i64,
    /// Maximum timestamp across `items`.
    pub newest_timestamp: i64,
}

impl Batch {
    /// Build a batch from a non-empty slice of items, computing the
    /// timestamp bounds. Fails if `items` is empty: empty batches are never
    /// emitted by the batcher, and a `Batch` cannot represent one.
    pub fn new(items: Vec<BatchItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::config("a batch must contain at least one item"));
        }
        let oldest_timestamp = items.iter().map(|i| i.timestamp).min().expect("non-empty");
        let newest_timestamp = items.iter().map(|i| i.timestamp).max().expect("non-empty");
        Ok(Self {
            items,
            oldest_timestamp,
            newest_timestamp,
        })
    }

    /// True if every item in this batch is a writer-pool latency metric.
    /// The writer pool checks this before re-enqueuing new metrics so a
    /// metrics-only write never generates metrics about itself.
    pub fn is_metrics_only(&self) -> bool {
        self.items.iter().all(|i| i.channel_name.starts_with(METRIC_CHANNEL_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(channel: &str, ts: i64, value: impl Into<Value>) -> BatchItem {
        BatchItem::new(channel, ts, value, BTreeMap::new()).unwrap()
    }

    #[test]
    fn rejects_reserved_channel_prefix() {
        let err = BatchItem::new("__nominal.metric.foo", 0, 1.0, BTreeMap::new());
        assert!(err.is_err());
    }

    #[test]
    fn group_key_sorts_tags() {
        let mut tags = BTreeMap::new();
        tags.insert("b".to_string(), "2".to_string());
        tags.insert("a".to_string(), "1".to_string());
        let item = BatchItem::new("c", 0, 1.0, tags).unwrap();
        let (_, sorted_tags, _) = item.group_key();
        assert_eq!(
            sorted_tags,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn batch_computes_timestamp_bounds() {
        let items = vec![item("c", 5, 1.0), item("c", 1, 2.0), item("c", 3, 3.0)];
        let batch = Batch::new(items).unwrap();
        assert_eq!(batch.oldest_timestamp, 1);
        assert_eq!(batch.newest_timestamp, 5);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(Batch::new(vec![]).is_err());
    }

    #[test]
    fn grouping_scenario_from_spec() {
        // enqueue in order: (c,1,1.0,{}), (c,2,2.0,{}), (d,1,"x",{}), (c,3,3.0,{r:1})
        let mut tagged = BTreeMap::new();
        tagged.insert("r".to_string(), "1".to_string());
        let items = vec![
            item("c", 1, 1.0),
            item("c", 2, 2.0),
            item("d", 1, "x"),
            BatchItem::new("c", 3, 3.0, tagged).unwrap(),
        ];
        let batch = Batch::new(items).unwrap();
        assert_eq!(batch.oldest_timestamp, 1);
        assert_eq!(batch.newest_timestamp, 3);

        let mut sorted = batch.items.clone();
        sorted.sort_by_key(|i| i.group_key());
        let keys: Vec<_> = sorted.iter().map(|i| i.group_key()).collect();
        // three distinct groups expected: (c,{}), (c,{r:1}), (d,{})
        let distinct: std::collections::HashSet<_> = keys.into_iter().collect();
        assert_eq!(distinct.len(), 3);
    }
}
