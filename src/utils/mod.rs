pub mod csv_ledger;
pub mod otp_store;
pub mod shift_clock;
pub mod submission_cache;
pub mod upload;
