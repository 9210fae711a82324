//! irt::core — data structures and E-step numerics for 2PL estimation.
//!
//! - [`records`]: raw `(user, item, answer)` triples and numeric row parsing.
//! - [`index`]: [`ResponseIndex`], the sparse item/user adjacency.
//! - [`grid`]: [`AbilityGrid`] and [`AbilityDensity`].
//! - [`params`]: [`ItemParam`] and [`ItemBounds`].
//! - [`likelihood`]: 2PL response probabilities.
//! - [`options`]: [`GridSpec`] and [`EmOptions`].
//! - [`posterior`]: posterior rows and expected counts.

pub mod grid;
pub mod index;
pub mod likelihood;
pub mod options;
pub mod params;
pub mod posterior;
pub mod records;

pub use self::grid::{AbilityDensity, AbilityGrid};
pub use self::index::{Response, ResponseIndex};
pub use self::likelihood::{log_likelihood_2pl, probability_2pl};
pub use self::options::{EmOptions, GridSpec};
pub use self::params::{ItemBounds, ItemParam};
pub use self::posterior::{ExpectedCounts, Posterior, compute_posterior, expected_counts};
pub use self::records::{ResponseId, ResponseRecord, records_from_matrix, records_from_row_major};
