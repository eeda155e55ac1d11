use super::Guard;
use rand;
use sentinel_guard::utils::sleep_for_ms;
use sentinel_guard::{
    base::{BlockType, ConcurrencyStat, MetricEvent, ReadStat, SentinelRule, TrafficType},
    core::flow,
    logging, EntryBuilder,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn qps_rule(resource: &str, threshold: f64) -> Arc<flow::Rule> {
    Arc::new(flow::Rule {
        resource: resource.into(),
        threshold,
        calculate_strategy: flow::CalculateStrategy::Direct,
        control_strategy: flow::ControlStrategy::Reject,
        ..Default::default()
    })
}

#[test]
fn direct_reject() {
    let guard = Guard::new();
    guard
        .managers
        .flow
        .load_rules(vec![qps_rule("r1", 5.0)])
        .unwrap();

    // 5 calls in a second are all admitted
    for _ in 0..5 {
        let entry = EntryBuilder::new("r1".into())
            .with_traffic_type(TrafficType::Inbound)
            .with_slot_chain(guard.chain.clone())
            .build()
            .unwrap();
        entry.exit();
    }
    sleep_for_ms(1100);

    // 10 calls in a second, half of them are blocked
    let mut passed = 0;
    let mut blocked = 0;
    for _ in 0..10 {
        match EntryBuilder::new("r1".into())
            .with_traffic_type(TrafficType::Inbound)
            .with_slot_chain(guard.chain.clone())
            .build()
        {
            Ok(entry) => {
                passed += 1;
                entry.exit();
            }
            Err(err) => {
                blocked += 1;
                assert_eq!(BlockType::Flow, err.block_type());
                assert_eq!("r1", err.triggered_rule().unwrap().resource_name());
            }
        }
    }
    assert_eq!(5, passed);
    assert_eq!(5, blocked);

    let node = guard.storage.get_cluster_node("r1").unwrap().stat();
    assert_eq!(0, node.current_concurrency());
    assert_eq!(5, node.sum(MetricEvent::Block));
}

#[test]
fn concurrent_callers() {
    let guard = Arc::new(Guard::new());
    guard
        .managers
        .flow
        .load_rules(vec![qps_rule("concurrent_callers", 10.0)])
        .unwrap();
    let passed = Arc::new(AtomicU32::new(0));
    let mut handlers = Vec::new();
    for _ in 0..8 {
        let guard = guard.clone();
        let passed = passed.clone();
        handlers.push(std::thread::spawn(move || {
            for _ in 0..5 {
                let entry_builder = EntryBuilder::new("concurrent_callers".into())
                    .with_traffic_type(TrafficType::Inbound)
                    .with_slot_chain(guard.chain.clone());
                if let Ok(entry) = entry_builder.build() {
                    passed.fetch_add(1, Ordering::SeqCst);
                    sleep_for_ms(rand::random::<u64>() % 10);
                    entry.exit()
                } else {
                    sleep_for_ms(rand::random::<u64>() % 10);
                }
            }
        }));
    }
    for h in handlers {
        h.join().expect("Couldn't join on the associated thread");
    }
    assert!(passed.load(Ordering::SeqCst) >= 10);
    let node = guard
        .storage
        .get_cluster_node("concurrent_callers")
        .unwrap()
        .stat();
    assert_eq!(0, node.current_concurrency());
}

#[test]
fn global_slot_chain() {
    sentinel_guard::init_default().unwrap_or_else(|err| logging::error!("{:?}", err));
    let resource_name = String::from("global_direct_reject");
    flow::load_rules(vec![qps_rule(&resource_name, 1.0)]).unwrap();

    let entry = sentinel_guard::entry(resource_name.clone(), TrafficType::Inbound).unwrap();
    entry.exit();
    let err = sentinel_guard::entry(resource_name.clone(), TrafficType::Inbound).unwrap_err();
    assert_eq!(BlockType::Flow, err.block_type());
    flow::load_rules_of_resource(&resource_name, Vec::new()).unwrap();
}
