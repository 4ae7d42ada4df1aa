//! Local screen sharing over a secondary connection per peer.

mod controller;

pub use controller::{ScreenShareController, ShareContext};
