pub mod call;
pub mod config;
pub mod direction;
pub mod error;
pub mod event;
pub mod request;
pub mod state;

pub use call::Call;
pub use config::{CarSettings, FleetConfig, StrategyKind};
pub use direction::Direction;
pub use error::{CommandError, ConfigError};
pub use event::{EventPublisher, FleetEvent};
pub use request::{CarId, Request, RequestId, Rejection};
pub use state::{DoorState, MotionState};
