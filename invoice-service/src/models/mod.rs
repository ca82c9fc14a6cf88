//! Domain models for invoice-service.

mod invoice;
mod invoice_number;
mod profile;

pub use invoice::{
    DisplayTotals, Invoice, InvoiceDraft, InvoiceStatus, InvoiceTotals, LineItem,
};
pub use invoice_number::{InvalidInvoiceNumber, InvoiceNumber, INVOICE_NUMBER_PREFIX};
pub use profile::{ProfileChanges, UserProfile};
