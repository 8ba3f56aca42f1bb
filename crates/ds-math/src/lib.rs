//! Drift Sentinel math utilities.

pub mod math;

pub use math::ewm::*;
pub use math::gauss::*;
pub use math::histogram::*;
pub use math::logistic::*;
pub use math::quantile::*;
pub use math::rolling::*;
pub use math::trend::*;
