//! Local media: track/stream handles, the device port, and the tiered
//! acquisition policy used before joining a room.

mod acquirer;
mod types;

pub use acquirer::{AcquiredMedia, AcquirerConfig, AcquisitionTier, MediaAcquirer};
pub use types::{
    DeviceError, MediaConstraints, MediaDevices, MediaStream, MediaTrack, TrackKind,
    VideoConstraint,
};
