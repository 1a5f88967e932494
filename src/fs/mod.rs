//! Filesystem module

pub mod image;

pub use image::load_image;
