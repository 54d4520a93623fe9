//! Market state coordination.
//!
//! Many pricing algos publish theoretical prices into the same shared
//! market records. The coordinator keeps that consistent:
//!
//! - every algo writes its own `{algo}:` namespaced fields
//! - the first algo to price a market owns its canonical `algo`/`direction`
//! - challengers are recorded in per-day rejection counters
//! - markets an algo stops pricing are cleared of its fields
//!
//! All store access goes through a [`fv_retry::RetryExecutor`].

pub mod config;
pub mod coordinator;
pub mod direction;
pub mod error;
pub mod outcome;
pub mod rejections;
pub mod stats;
pub mod view;

pub use config::CoordinatorConfig;
pub use coordinator::MarketStateCoordinator;
pub use direction::compute_direction;
pub use error::{MarketError, MarketResult};
pub use outcome::{AlgoUpdateResult, BatchResult, UpdateOutcome, UpdateResult};
pub use rejections::RejectionStats;
pub use stats::{AlgoStats, AlgoStatsDelta};
pub use view::MarketView;
