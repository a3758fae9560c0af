pub mod metadata;
pub mod pcm_file;
