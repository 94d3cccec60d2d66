//! Building Anki `.apkg` packages.
//!
//! A [`Deck`] of vocabulary [`Note`]s is written to a schema-11
//! `collection.anki2` SQLite database, which [`PackageWriter`] zips together
//! with the audio clips the notes reference.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use wanikani_deck_core::api::Subject;
//! use wanikani_deck_core::package::{Deck, PackageWriter};
//!
//! # async fn example(subjects: Vec<Subject>) -> Result<(), Box<dyn std::error::Error>> {
//! let deck = Deck::from_subjects(&subjects);
//! PackageWriter::new()
//!     .write(&deck, &[], Path::new("wanikani_vocab.apkg"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod collection;
mod error;
mod guid;
mod model;
mod writer;

pub use collection::{Timestamp, write_collection};
pub use error::PackageError;
pub use guid::{field_checksum, guid_for, strip_html_preserving_media};
pub use model::{DECK_ID, DECK_NAME, Deck, FIELD_NAMES, MODEL_ID, MODEL_NAME, Note, NoteModel, Template};
pub use writer::{COLLECTION_ENTRY, MEDIA_ENTRY, PackageSummary, PackageWriter};
