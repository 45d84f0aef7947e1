mod clock;
mod reference_extractor;

pub use clock::{Clock, FixedClock, SystemClock};
pub use reference_extractor::extract_order_number_from_reference;
