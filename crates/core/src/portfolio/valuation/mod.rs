mod valuation_engine;
mod valuation_model;


pub use valuation_engine::ValuationEngine;
pub use valuation_model::{ClassAllocation, PortfolioSummary};
