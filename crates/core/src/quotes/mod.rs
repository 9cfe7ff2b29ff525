//! Quote management module.
//!
//! This module provides the boundary types for working with prices:
//!
//! - [`PriceQuote`] - the shape delivered by the external price collaborator
//! - [`RefreshQueue`] - bounded throttle queue preserving the collaborator's
//!   refresh policy (capacity 3, oldest dropped on overflow)

mod model;
mod refresh;

pub use model::PriceQuote;
pub use refresh::RefreshQueue;
