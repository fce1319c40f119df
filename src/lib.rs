//! Receipt ingestion pipeline for expense categorization: file intake with a
//! media-type allow-list, Claude vision extraction with validation and
//! bounded retries, and per-category aggregation for dashboard display.

pub mod models;
pub mod services;
pub mod utils;

pub use models::{
    CategoryMap, ExpenseBreakdown, ExpenseCategory, ExpenseDatum, ExpenseRow, ExtractedReceipt,
    ExtractorConfig, ImagePayload, RawFile, RetryPolicy, UploadCandidate,
};
pub use services::aggregation::aggregate;
pub use services::claude::{ClaudeExtractor, ExtractError};
pub use services::intake::{IntakeService, SubmitOutcome, DEFAULT_ACCEPTED_TYPES};
pub use services::processor::{process_batch, process_receipt, ReceiptOutcome};
