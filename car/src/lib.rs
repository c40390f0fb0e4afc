pub mod doors;
pub mod fsm;
pub mod requests;
pub mod view;

pub use fsm::{AdvanceOutcome, Car};
pub use requests::{Phase, QueuedRequest, RequestQueue};
pub use view::{CarStatus, CarView};
