#[macro_use]
extern crate criterion;
use criterion::Criterion;

mod stat {
    use super::*;
    use sentinel_guard::base::{MetricEvent, ReadStat, WriteStat};
    use sentinel_guard::stat::{StatParams, StatisticNode};

    pub fn bench_statistic_node(c: &mut Criterion) {
        let node = StatisticNode::new(&StatParams::default()).unwrap();
        c.bench_function("statistic node add pass", |b| {
            b.iter(|| node.add_count(MetricEvent::Pass, 1))
        });
        c.bench_function("statistic node qps", |b| {
            b.iter(|| node.qps(MetricEvent::Pass))
        });
    }
}

mod entry {
    use super::*;
    use sentinel_guard::{
        api::{build_slot_chain, RuleManagers},
        base::TrafficType,
        flow,
        stat::NodeStorage,
        EntryBuilder,
    };
    use std::sync::Arc;

    pub fn bench_entry(c: &mut Criterion) {
        let managers = RuleManagers::new();
        managers
            .flow
            .load_rules(vec![Arc::new(flow::Rule {
                resource: "bench".into(),
                threshold: 1e9,
                ..Default::default()
            })])
            .unwrap();
        let chain = Arc::new(build_slot_chain(
            &managers,
            Arc::new(NodeStorage::default()),
        ));
        c.bench_function("entry and exit", |b| {
            b.iter(|| {
                EntryBuilder::new("bench".into())
                    .with_traffic_type(TrafficType::Inbound)
                    .with_slot_chain(chain.clone())
                    .build()
                    .unwrap()
                    .exit()
            })
        });
    }
}

criterion_group!(benches, stat::bench_statistic_node, entry::bench_entry);
criterion_main!(benches);
