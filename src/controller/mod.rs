pub mod filter;
pub mod pagination;
pub mod table;

pub use filter::{FilterState, SignalFilter};
pub use pagination::Pagination;
pub use table::{SortDir, SortKey, SortState};
