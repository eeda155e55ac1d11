pub mod base;
pub mod system_metric;
// statistic preparation slots, statistic slots
pub mod stat;
// statistic slots
pub mod log;
// rule check slots
pub mod authority;
pub mod circuitbreaker;
pub mod config;
pub mod flow;
pub mod hotspot;
pub mod system;
