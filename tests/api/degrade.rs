use super::Guard;
use sentinel_guard::utils::sleep_for_ms;
use sentinel_guard::{
    base::{BlockType, TrafficType},
    core::circuitbreaker::{self, CircuitBreakerTrait},
    EntryBuilder,
};
use std::sync::Arc;

fn call(guard: &Guard, fail: bool) -> Result<Result<(), String>, BlockType> {
    EntryBuilder::new("degrade_res".into())
        .with_traffic_type(TrafficType::Inbound)
        .with_slot_chain(guard.chain.clone())
        .call(|| if fail { Err("boom".to_string()) } else { Ok(()) })
        .map_err(|err| err.block_type())
}

#[test]
fn error_ratio_breaker() {
    let guard = Guard::new();
    guard
        .managers
        .circuitbreaker
        .load_rules(vec![Arc::new(circuitbreaker::Rule {
            resource: "degrade_res".into(),
            strategy: circuitbreaker::BreakerStrategy::ErrorRatio,
            retry_timeout_ms: 200,
            min_request_amount: 4,
            stat_interval_ms: 10000,
            threshold: 0.5,
            ..Default::default()
        })])
        .unwrap();

    // business errors are handed back unchanged and counted
    for _ in 0..4 {
        assert_eq!(Ok(Err("boom".to_string())), call(&guard, true));
    }
    // the breaker is open for the retry window
    assert_eq!(Err(BlockType::Degrade), call(&guard, false));

    // a single probe after the window, which fails and reopens the breaker
    sleep_for_ms(250);
    let probe = EntryBuilder::new("degrade_res".into())
        .with_slot_chain(guard.chain.clone())
        .build()
        .unwrap();
    assert_eq!(Err(BlockType::Degrade), call(&guard, false));
    probe.set_err(sentinel_guard::Error::msg("boom"));
    probe.exit();
    assert_eq!(Err(BlockType::Degrade), call(&guard, false));

    // a successful probe closes the breaker
    sleep_for_ms(250);
    assert_eq!(Ok(Ok(())), call(&guard, false));
    assert_eq!(Ok(Ok(())), call(&guard, false));
    let snapshot = guard.managers.circuitbreaker.snapshot();
    let breaker = &snapshot.breakers_of("degrade_res")[0];
    assert_eq!(circuitbreaker::State::Closed, breaker.current_state());
}
