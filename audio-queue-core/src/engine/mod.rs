pub mod capture;
pub mod playback;
pub mod queue_engine;
