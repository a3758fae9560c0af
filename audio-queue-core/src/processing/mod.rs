pub mod amplitude;
pub mod buffer_ring;
pub mod pcm_container;
pub mod pitch;
