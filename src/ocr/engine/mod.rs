//! Pure page-layout math: token lookup, word geometry, font fitting and the
//! strict conversion from a recognition result into a [`Page`](super::Page).

mod fit;
mod geom;
pub(crate) mod index;
mod parse;

pub use fit::{FontFit, TextMeasure};
pub use geom::{PageOrientation, WordGeometry, pixels_to_dots};
pub use parse::page_from_response;

#[cfg(test)]
pub(crate) use fit::tests::MonospaceMeasure;
