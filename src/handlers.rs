// src/handlers.rs

pub mod payments;
pub mod print_jobs;
pub mod sales;
pub mod terminals;
