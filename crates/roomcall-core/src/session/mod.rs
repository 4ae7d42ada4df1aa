//! Call session: room lifecycle and the UI-facing command/event surface.

mod handle;
mod orchestrator;
mod types;


pub use handle::CallHandle;
pub use orchestrator::{Collaborators, SessionOrchestrator};
pub use types::{
    CallCommand, CallEvent, EventSink, Generations, LocalSession, Participants,
    RemoteParticipant, RoomState, Roster, SessionConfig, LOCAL_SCREEN_ID,
};
