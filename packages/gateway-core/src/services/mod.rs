//! Application services layer: AI dispatch (C4) and the TTS provider
//! abstraction (C2) that it drives.

pub mod dispatch;
pub mod tts;

pub use dispatch::{AiDispatcher, ToyConfigWire};
