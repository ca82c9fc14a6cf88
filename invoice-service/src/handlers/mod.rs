pub mod ai;
pub mod health;
pub mod invoices;
pub mod profile;

pub use ai::{generate_description, suggest_items};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{
    create_invoice, delete_invoice, get_invoice, list_invoices, list_user_invoices,
    update_invoice, update_invoice_status,
};
pub use profile::{get_profile, update_profile};
