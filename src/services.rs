pub mod auth;
pub mod payment_intent_service;
pub mod pricing;
pub mod print_job_service;
pub mod sale_service;
pub mod stock_service;
pub mod terminal_service;
