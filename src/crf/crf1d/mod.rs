//! First-order (linear-chain) CRF: model format, decoder and writer.

mod context;
pub mod decoder;
pub mod model;
pub mod writer;

pub use self::decoder::Crf1dDecoder;
pub use self::model::Crf1dModel;
pub use self::writer::ModelWriter;
