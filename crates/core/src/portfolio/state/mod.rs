mod state_manager;
mod state_model;
mod subscriptions;


pub use state_manager::StateManager;
pub use state_model::{PortfolioState, TransactionsSignature};
pub use subscriptions::{MockSnapshotSubscriber, SnapshotSubscriber, Subscription};
