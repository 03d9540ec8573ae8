//! Everything between "a file exists" and "a record is ready to write".

pub mod filename_parser;
pub mod normalizer;
pub mod parse;
pub mod probe;

pub use normalizer::{MovieNormalizer, NormalizedMovie, NormalizedTrack, TrackNormalizer};
pub use probe::{FfprobeProber, ProbeError, ProbeOutput, Prober};
