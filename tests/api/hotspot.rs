use super::Guard;
use sentinel_guard::{
    base::{BlockType, TrafficType},
    core::hotspot,
    EntryBuilder,
};
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn per_value_qps() {
    let guard = Guard::new();
    guard
        .managers
        .hotspot
        .load_rules(vec![Arc::new(hotspot::Rule {
            resource: "query".into(),
            metric_type: hotspot::MetricType::QPS,
            control_strategy: hotspot::ControlStrategy::Reject,
            param_index: 0,
            threshold: 2,
            duration_in_sec: 1,
            specific_items: [("vip".to_string(), 4)].iter().cloned().collect(),
            ..Default::default()
        })])
        .unwrap();

    let call = |user: &str| {
        EntryBuilder::new("query".into())
            .with_traffic_type(TrafficType::Inbound)
            .with_args(Some(vec![user.to_string()]))
            .with_slot_chain(guard.chain.clone())
            .build()
            .map(|entry| entry.exit())
            .map_err(|err| err.block_type())
    };
    for _ in 0..2 {
        assert!(call("alice").is_ok());
    }
    assert_eq!(Err(BlockType::ParamFlow), call("alice"));
    // other values have their own budget
    assert!(call("bob").is_ok());
    for _ in 0..4 {
        assert!(call("vip").is_ok());
    }
    assert_eq!(Err(BlockType::ParamFlow), call("vip"));
}

#[test]
fn concurrency_by_attachment() {
    let guard = Guard::new();
    guard
        .managers
        .hotspot
        .load_rules(vec![Arc::new(hotspot::Rule {
            resource: "upload".into(),
            metric_type: hotspot::MetricType::Concurrency,
            param_key: "tenant".into(),
            threshold: 1,
            ..Default::default()
        })])
        .unwrap();

    let build = || {
        let mut attachments = HashMap::new();
        attachments.insert("tenant".to_string(), "t1".to_string());
        EntryBuilder::new("upload".into())
            .with_attachments(Some(attachments))
            .with_slot_chain(guard.chain.clone())
            .build()
    };
    let first = build().unwrap();
    assert_eq!(BlockType::ParamFlow, build().unwrap_err().block_type());
    first.exit();
    build().unwrap().exit();
}
