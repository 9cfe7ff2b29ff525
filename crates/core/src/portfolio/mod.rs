pub mod positions;
pub mod state;
pub mod valuation;

pub use positions::*;
pub use state::*;
pub use valuation::*;
