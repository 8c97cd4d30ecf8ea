pub mod realtime;
pub mod session;

pub use realtime::{
    ClientEvent, ConnectionManager, Connector, CoordinatorState, RealtimeError, RealtimeResult,
    ServerEvent, WebSocketConnector,
};
pub use session::{HostEnv, SessionCoordinator, SessionHandle};
