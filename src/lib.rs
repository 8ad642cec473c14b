//! Sequence labeling with linear-chain conditional random fields.
//!
//! Load a model trained by CRFsuite, bind a [`Tagger`] to it and label
//! sequences of observations through a [`FeatureExtractor`]:
//!
//! ```no_run
//! use crftag::Model;
//!
//! let model = Model::from_file("ner.crfsuite")?;
//! let tagger = model.tagger();
//! let tokens = ["John", "lives", "in", "Paris"];
//! let labels = tagger.tag_with(&tokens, &|token: &&str| vec![format!("word={}", token)])?;
//! assert_eq!(labels.len(), tokens.len());
//! # Ok::<(), crftag::Error>(())
//! ```
//!
//! A [`Model`] is immutable once loaded; any number of taggers on any number
//! of threads may share it.

mod attribute;
pub mod crf;
mod dataset;
mod error;
mod evaluation;
mod model;
pub mod quark;
mod tagger;

pub use self::attribute::{Attribute, FeatureExtractor};
pub use self::crf::crf1d::ModelWriter;
pub use self::crf::data::{Attr, Instance, Item};
pub use self::crf::decoder::Decoder;
pub use self::dataset::{Dataset, Sequence};
pub use self::error::{Error, Result};
pub use self::evaluation::{Estimation, Evaluation, LabelMeasure};
pub use self::model::Model;
pub use self::quark::{Quark, SharedQuark, StringTable, TextVectorizer};
pub use self::tagger::{Tagged, Tagger};
