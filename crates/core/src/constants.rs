/// Decimal precision for valuation calculations
pub const DECIMAL_PRECISION: u32 = 6;

/// Quantity threshold for significant positions
pub const QUANTITY_THRESHOLD: &str = "0.000000001";

/// Default base (reporting) currency
pub const DEFAULT_BASE_CURRENCY: &str = "IDR";

/// Default foreign currency cross-valued against the base
pub const DEFAULT_FOREIGN_CURRENCY: &str = "USD";

/// Capacity of the price-refresh throttle queue
pub const REFRESH_QUEUE_CAPACITY: usize = 3;
