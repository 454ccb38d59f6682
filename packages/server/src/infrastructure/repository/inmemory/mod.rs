//! インメモリ実装

pub mod broker;

pub use broker::InMemoryBrokerRepository;
