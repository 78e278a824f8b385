//! Audio Engine Module
//!
//! Sample buffers and WAV file I/O shared by the pipeline and the CLI.

pub mod buffer;
pub mod io;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer, MAX_CHANNELS, SILENCE_FLOOR_DB};
pub use io::{generate_test_tone, read_wav, write_wav};
