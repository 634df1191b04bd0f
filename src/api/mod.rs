//! Polymarket Gamma API client and response types.

mod gamma_client;
mod types;

pub use gamma_client::{GammaClient, GAMMA_API_BASE};
pub use types::parse_end_date;
