mod position_builder;
mod positions_model;

#[cfg(test)]
mod position_builder_tests;

pub use position_builder::PositionBuilder;
pub use positions_model::{is_quantity_significant, MonetaryValue, Position};
