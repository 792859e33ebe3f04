mod error;

pub mod deal;
pub mod leg;


pub use deal::{Deal, DealPhase, LegSlot};
pub use error::{SwapError, SwapResult};
pub use leg::{Leg, LegState};
