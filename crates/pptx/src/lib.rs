//! PPTX (Office Open XML) deck backend.
//!
//! Writes picture-only decks as ZIP archives of PresentationML parts, and
//! reads them back for verification.

pub mod inspector;
pub mod parts;
pub mod writer;

pub use inspector::{DeckInspector, DeckLayout, InspectedSlide, SlidePicture};
pub use writer::{DeckWriter, MediaFormat, MediaImage, Placement, PptxAssembler};
