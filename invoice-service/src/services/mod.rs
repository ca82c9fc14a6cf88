pub mod ai;
pub mod allocator;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod totals;

pub use ai::{GenerationError, TextGenerator};
pub use allocator::{AllocationError, InvoiceNumberAllocator};
pub use database::MongoDb;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{
    InvoiceFilter, InvoicePage, InvoiceStore, PageRequest, ProfileStore, StoreError,
};
pub use totals::{
    compute_totals, parse_numeric, parse_numeric_or_default, price_line_items, OutOfRange,
    RawLineItem,
};
