pub mod geometry;
pub mod header;

pub use geometry::{BoundingBox, PixelRadius, Position};
pub use header::CubeHeader;
