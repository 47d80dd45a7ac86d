mod coordinator;
mod table;

pub use coordinator::{CoordinatorConfig, PriceCoordinator};
pub use table::PriceTable;
