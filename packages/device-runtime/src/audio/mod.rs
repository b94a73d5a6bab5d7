//! Device audio engine (C6): capture→encode→send and receive→buffer→playback.

pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::CaptureSession;
pub use codec::OpusCodec;
pub use playback::PlaybackPipeline;
