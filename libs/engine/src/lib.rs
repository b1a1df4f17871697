pub mod args;
pub mod checkpointer;
pub mod error;
pub mod executor;
pub mod job;
pub mod range;
pub mod retry;
pub mod optimizer {
    pub mod index;
    pub mod plan;
    pub mod strategy;
    pub mod types;
}
pub mod sink {
    pub mod handle;
    pub mod logger;
}
pub mod state {
    pub mod adapter;
    pub mod chain;
    pub mod import;
}
