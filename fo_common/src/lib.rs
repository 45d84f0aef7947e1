pub mod helpers;
mod money;
pub mod op;
mod secret;

pub use money::{Cents, CentsConversionError, CURRENCY_CODE};
pub use secret::Secret;
