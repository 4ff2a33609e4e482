pub mod date_ref;
pub mod error;
pub mod holiday;
pub mod normalizer;
pub mod response;
pub mod store;
pub mod verdict;

// Re-export common error type
pub use error::{CoreError, Result};

pub use date_ref::DateRef;
pub use holiday::Holiday;
pub use response::ApiResponse;
pub use store::HolidayListStore;
pub use verdict::Verdict;
