pub mod merchant_repo;
pub use merchant_repo::MerchantRepository;
pub mod product_repo;
pub use product_repo::ProductRepository;
pub mod sale_repo;
pub use sale_repo::SaleRepository;
pub mod payment_repo;
pub use payment_repo::PaymentIntentRepository;
pub mod terminal_repo;
pub use terminal_repo::TerminalRepository;
pub mod pairing_code_repo;
pub use pairing_code_repo::PairingCodeRepository;
pub mod print_job_repo;
pub use print_job_repo::PrintJobRepository;
