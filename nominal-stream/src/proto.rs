// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Generated protobuf types for the channel-writer wire format, plus the
//! conversion from the in-memory [`nominal_kernel::value`] model.

#![allow(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/nominal.stream.rs"));

use std::collections::HashMap;

use nominal_kernel::value::{Batch, BatchItem, Value, ValueTypeTag};

use points::Payload;

impl Timestamp {
    fn from_nanos(ts: i64) -> Self {
        Self {
            seconds: ts.div_euclid(1_000_000_000),
            nanos: ts.rem_euclid(1_000_000_000) as i32,
        }
    }
}

/// Build one wire `Series` from a group of items that share a grouping key.
/// Panics if `items` is empty or mixes value type tags; callers only ever
/// pass groups produced by [`group_items`].
fn series_from_group(channel_name: String, tags: HashMap<String, String>, items: &[BatchItem]) -> Series {
    let tag = items[0].value.type_tag();
    let payload = match tag {
        ValueTypeTag::Double => Payload::DoublePoints(DoublePoints {
            points: items
                .iter()
                .map(|i| DoublePoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    value: as_f64(&i.value),
                })
                .collect(),
        }),
        ValueTypeTag::Integer => Payload::IntPoints(IntegerPoints {
            points: items
                .iter()
                .map(|i| IntegerPoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    value: as_i64(&i.value),
                })
                .collect(),
        }),
        ValueTypeTag::String => Payload::StringPoints(StringPoints {
            points: items
                .iter()
                .map(|i| StringPoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    value: as_string(&i.value),
                })
                .collect(),
        }),
        ValueTypeTag::DoubleArray => Payload::DoubleArrayPoints(DoubleArrayPoints {
            points: items
                .iter()
                .map(|i| DoubleArrayPoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    value: as_f64_array(&i.value),
                })
                .collect(),
        }),
        ValueTypeTag::StringArray => Payload::StringArrayPoints(StringArrayPoints {
            points: items
                .iter()
                .map(|i| StringArrayPoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    value: as_string_array(&i.value),
                })
                .collect(),
        }),
        ValueTypeTag::Struct => Payload::StructPoints(StructPoints {
            points: items
                .iter()
                .map(|i| StructPoint {
                    timestamp: Some(Timestamp::from_nanos(i.timestamp)),
                    json_string: as_json_string(&i.value),
                })
                .collect(),
        }),
    };

    Series {
        channel: Some(Channel { name: channel_name }),
        points: Some(Points { payload: Some(payload) }),
        tags,
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Double(d) => *d,
        _ => unreachable!("group is homogeneous by construction"),
    }
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Integer(i) => *i,
        _ => unreachable!("group is homogeneous by construction"),
    }
}

fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        _ => unreachable!("group is homogeneous by construction"),
    }
}

fn as_f64_array(v: &Value) -> Vec<f64> {
    match v {
        Value::DoubleArray(a) => a.clone(),
        _ => unreachable!("group is homogeneous by construction"),
    }
}

fn as_string_array(v: &Value) -> Vec<String> {
    match v {
        Value::StringArray(a) => a.clone(),
        _ => unreachable!("group is homogeneous by construction"),
    }
}

fn as_json_string(v: &Value) -> String {
    match v {
        Value::Struct(m) => serde_json::Value::Object(m.clone()).to_string(),
        _ => unreachable!("group is homogeneous by construction"),
    }
}

/// Group a batch's items by their grouping key and encode the result as a
/// `WriteRequestNominal`. Items within each group keep their original
/// relative order.
pub fn encode_batch(batch: &Batch) -> WriteRequestNominal {
    let mut order: Vec<(String, Vec<(String, String)>, ValueTypeTag)> = Vec::new();
    let mut groups: HashMap<(String, Vec<(String, String)>, ValueTypeTag), Vec<BatchItem>> = HashMap::new();

    for item in &batch.items {
        let key = item.group_key();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item.clone());
    }

    let series = order
        .into_iter()
        .map(|key| {
            let (channel_name, tags, _tag) = key.clone();
            let items = groups.remove(&key).expect("key came from groups");
            let tag_map: HashMap<String, String> = tags.into_iter().collect();
            series_from_group(channel_name, tag_map, &items)
        })
        .collect();

    WriteRequestNominal { series }
}
