#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/spectrum.rs"]
pub mod spectrum;

#[path = "core/vector.rs"]
pub mod vector;

#[path = "core/vocab.rs"]
pub mod vocab;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/pipeline.rs"]
pub mod pipeline;

#[path = "core/network.rs"]
pub mod network;

pub mod observer;
