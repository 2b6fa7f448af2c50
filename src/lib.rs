pub mod blob;
pub mod config;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod lead;
pub mod lifecycle;
pub mod patch;
pub mod selector;
pub mod service;
pub mod store;
pub mod utils;

pub use error::{LeadError, ValidationError};
pub use service::{LeadService, NewLead};
