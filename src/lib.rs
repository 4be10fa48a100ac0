//! Virtual background replacement by reference-frame subtraction.
//!
//! A photo of the empty scene is subtracted from every live frame; pixels
//! that differ enough are the subject and are kept, everything else is
//! replaced by a still image. The raw classification is cleaned with a
//! morphological opening (drops specks) and closing (fills holes).

pub mod capture;
pub mod compositor;
pub mod error;
pub mod output;
pub mod params;
pub mod session;

pub use compositor::{BackgroundCompositor, BinarizePolicy, CompositingParameters, ForegroundMask};
pub use error::{Error, Result};
pub use session::{Session, SessionState};
