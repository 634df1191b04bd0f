//! Data models: markets and outcome sides.

mod market;
mod side;

pub use market::Market;
pub use side::Side;
