pub mod filter;
pub mod period;

pub use filter::{DivisionScope, FactTable, ReportFilter, RevenueSource};
pub use period::{ComparisonWindows, Month, PeriodWindow, WindowLabel};
