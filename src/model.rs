use std::fs;
use std::io::Write;
use std::path::Path;

use crate::crf::crf1d::{Crf1dDecoder, Crf1dModel};
use crate::crf::decoder::Decoder;
use crate::error::{Error, Result};
use crate::quark::Quark;
use crate::tagger::Tagger;

/// A trained CRF model: labels, attributes and the decoder built on them.
///
/// A model never changes after loading. Share it by reference (or behind an
/// `Arc`) between as many [`Tagger`]s and threads as needed.
#[derive(Debug, Clone)]
pub struct Model {
    decoder: Crf1dDecoder,
}

impl Model {
    /// Load a model from a CRFsuite model file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = fs::read(path).map_err(|e| {
            Error::invalid_model(format!("failed to read {}: {}", path.display(), e))
        })?;
        log::debug!("read model {} ({} bytes)", path.display(), buffer.len());
        Self::from_memory(&buffer)
    }

    /// Load a model from the bytes of a CRFsuite model file.
    pub fn from_memory(buffer: &[u8]) -> Result<Self> {
        let model = Crf1dModel::from_memory(buffer)?;
        Ok(Self {
            decoder: Crf1dDecoder::new(model),
        })
    }

    /// Label dictionary.
    pub fn labels(&self) -> &Quark {
        self.decoder.model().labels()
    }

    /// Attribute dictionary.
    pub fn attrs(&self) -> &Quark {
        self.decoder.model().attrs()
    }

    pub fn num_labels(&self) -> usize {
        self.decoder.num_labels()
    }

    pub fn num_attrs(&self) -> usize {
        self.decoder.model().num_attrs()
    }

    pub fn decoder(&self) -> &Crf1dDecoder {
        &self.decoder
    }

    /// A tagger bound to this model's dictionaries and decoder.
    pub fn tagger(&self) -> Tagger<'_> {
        Tagger::new(self.labels(), self.attrs(), &self.decoder)
    }

    /// Print the model in a human-readable format.
    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        self.decoder.model().dump(w)
    }

    pub fn dump_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path)?;
        self.dump(&mut file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::crf1d::ModelWriter;
    use crate::quark::StringTable;

    fn weather() -> Vec<u8> {
        let mut writer = ModelWriter::new();
        writer
            .transition("sunny", "sunny", 0.200033)
            .transition("sunny", "rainy", 0.008212)
            .transition("rainy", "sunny", -0.239633)
            .transition("rainy", "rainy", 0.031389)
            .state("walk", "sunny", 0.443627)
            .state("walk", "rainy", -0.443627)
            .state("shop", "sunny", 0.003924)
            .state("shop", "rainy", -0.003924)
            .state("clean", "sunny", -0.500569)
            .state("clean", "rainy", 0.500569);
        writer.to_bytes().unwrap()
    }

    #[test]
    fn model_new() {
        let model = Model::from_memory(&weather()).unwrap();
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.num_attrs(), 3);
        assert_eq!(model.labels().to_str(0), Some("sunny"));
        assert_eq!(model.attrs().to_id("clean"), Some(2));
        let _debug = format!("{:?}", model);
    }

    #[test]
    fn missing_file() {
        let ret = Model::from_file("tests/does-not-exist.crfsuite");
        assert!(matches!(ret, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn model_dump() {
        let model = Model::from_memory(&weather()).unwrap();
        let mut out = Vec::new();
        model.dump(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("FILEHEADER = {\n  magic: lCRF\n"));
        assert!(out.contains("  num_features: 10\n"));
        assert!(out.contains("LABELS = {\n      0: sunny\n      1: rainy\n}\n"));
        assert!(out.contains(
            "ATTRIBUTES = {\n      0: walk\n      1: shop\n      2: clean\n}\n"
        ));
        assert!(out.contains(
            "TRANSITIONS = {\n  (1) sunny --> sunny: 0.200033\n  (1) sunny --> rainy: 0.008212\n  (1) rainy --> sunny: -0.239633\n  (1) rainy --> rainy: 0.031389\n}\n"
        ));
        assert!(out.contains("  (0) clean --> rainy: 0.500569\n"));
    }
}
