//! Document Model - the in-memory form of a word processing document
//!
//! This crate holds everything the engine knows about a document once it has
//! been decoded: paragraphs, runs and tables, the style sheet with its
//! inheritance resolver, and the comment collection. It performs no I/O;
//! reading and writing packages lives in the `store` crate.

mod comment;
mod document;
mod error;
mod paragraph;
mod parts;
pub mod properties;
mod run;
pub mod style;
mod table;

pub use comment::*;
pub use document::*;
pub use error::*;
pub use paragraph::*;
pub use parts::*;
pub use properties::*;
pub use run::*;
pub use style::*;
pub use table::*;
