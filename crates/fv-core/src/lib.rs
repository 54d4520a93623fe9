//! Core domain vocabulary shared by every fair-value crate.
//!
//! - `AlgoId`: validated identifier of a pricing algorithm
//! - `Price`: precision-safe theoretical/exchange price
//! - `PriceSignal`: one algo's theoretical bid/ask for a market
//! - `Direction`: trading direction relative to the exchange quote
//! - `fields`: naming of canonical and algo-namespaced record fields
//! - `MarketKeyBuilder`: ticker <-> store key mapping

pub mod algo;
pub mod decimal;
pub mod direction;
pub mod error;
pub mod fields;
pub mod key;
pub mod signal;

pub use algo::AlgoId;
pub use decimal::Price;
pub use direction::Direction;
pub use error::{CoreError, Result};
pub use key::{MarketKeyBuilder, PrefixKeyBuilder};
pub use signal::PriceSignal;
