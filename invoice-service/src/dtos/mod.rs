pub mod ai;
pub mod invoices;
pub mod profile;

pub use ai::{
    GenerateDescriptionRequest, GenerateDescriptionResponse, SuggestItemsRequest,
    SuggestItemsResponse,
};
pub use invoices::{
    parse_date, CreateInvoiceRequest, InvoiceListParams, InvoiceListResponse, InvoiceResponse,
    LineItemResponse, Pagination, UpdateInvoiceRequest, UpdateStatusRequest,
};
pub use profile::{InvoiceDetailResponse, ProfileResponse, UpdateProfileRequest};
