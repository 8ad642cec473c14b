pub mod crf1d;
pub mod data;
pub mod decoder;
