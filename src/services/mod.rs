pub mod assignment_registry;
pub mod location_propagator;
pub mod position_source;
pub mod presence_session;

pub use assignment_registry::AssignmentRegistry;
pub use location_propagator::LocationPropagator;
pub use position_source::{
    ChannelPositionSource, PositionFeed, PositionSource, SampleSender, SimulatedPositionSource,
    SourceEvent,
};
pub use presence_session::{SessionFault, SessionManager, SessionState, SessionStatus};
