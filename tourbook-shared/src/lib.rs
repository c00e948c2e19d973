pub mod models;
pub mod money;
pub mod pii;

pub use money::{format_naira, to_minor_units};
pub use pii::Masked;
