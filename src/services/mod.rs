pub mod availability_resolver;
pub mod search_orchestrator;
pub mod search_strategy;
pub mod worker_dispatcher;

pub use availability_resolver::{closest_available, closest_available_within};
pub use search_orchestrator::{
    SearchEvent, SearchOptions, SearchOrchestrator, SearchReport, StopHandle, StopReason,
};
pub use search_strategy::{
    build_strategy, CompositeSearch, NArySearch, NArySequence, NextStep, SearchStrategy,
    SequenceState, StrategyKind,
};
pub use worker_dispatcher::{DispatcherSettings, WorkerDispatcher};
