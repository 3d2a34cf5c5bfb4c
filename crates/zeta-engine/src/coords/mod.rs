//! Coordinate, size and color types shared by the renderer and games.
//!
//! Canonical CPU space:
//! - pixels, origin top-left
//! - +X right, +Y down
//!
//! Passes build their projection from this convention, so geometry submitted
//! in pixel coordinates lands where expected without a camera.

mod color;
mod extent;
mod rect;
mod vec2;

pub use color::Color;
pub use extent::Extent;
pub use rect::Rect;
pub use vec2::Vec2;
