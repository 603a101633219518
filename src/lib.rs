//! Brush conversion, material batching and drawing for the mapforge editor.

pub mod camera;
pub mod config;
pub mod convert;
pub mod error;
pub mod mesh;
pub mod preload;
pub mod renderer;
pub mod scene;
pub mod textures;
pub mod world;
