pub mod auth;
pub mod merchant;
pub mod payment;
pub mod print_job;
pub mod product;
pub mod sale;
pub mod terminal;
