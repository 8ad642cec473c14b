use std::convert::TryFrom;
use std::io::Write;

use cqdb::CQDB;

use crate::crf::data::Float;
use crate::error::{Error, Result};
use crate::quark::{Quark, StringTable, TextVectorizer};

pub(crate) const MAGIC: &[u8; 4] = b"lCRF";
pub(crate) const MODEL_TYPE: &[u8; 4] = b"FOMC";
pub(crate) const VERSION: u32 = 100;
pub(crate) const HEADER_SIZE: usize = 48;
pub(crate) const CHUNK_SIZE: usize = 12;
pub(crate) const FEATURE_SIZE: usize = 20;

/// Kind of a model feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatCat {
    /// Attribute `src` fires label `dst`.
    State = 0,
    /// Label `src` is followed by label `dst`.
    Trans = 1,
}

impl TryFrom<u32> for FeatCat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::State),
            1 => Ok(Self::Trans),
            x => Err(Error::invalid_model(format!("unknown feature type {}", x))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub cat: FeatCat,
    pub src: u32,
    pub dst: u32,
    pub weight: Float,
}

/// Feature ids fired by one attribute, or leaving one label.
pub type FeatRefs = Vec<u32>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Header {
    pub size: u32,
    pub version: u32,
    pub num_features: u32,
    pub num_labels: u32,
    pub num_attrs: u32,
    pub off_features: u32,
    pub off_labels: u32,
    pub off_attrs: u32,
    pub off_label_refs: u32,
    pub off_attr_refs: u32,
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| Error::invalid_model(format!("truncated model at offset {:#X}", offset)))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_f64(buf: &[u8], offset: usize) -> Result<Float> {
    let bytes = offset
        .checked_add(8)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| Error::invalid_model(format!("truncated model at offset {:#X}", offset)))?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(Float::from_le_bytes(raw))
}

/// A first-order CRF model parsed from the CRFsuite `lCRF` format.
///
/// Everything is copied out of the buffer on load, so the model owns its
/// data and may be shared freely between threads.
#[derive(Debug, Clone)]
pub struct Crf1dModel {
    header: Header,
    features: Vec<Feature>,
    label_refs: Vec<FeatRefs>,
    attr_refs: Vec<FeatRefs>,
    labels: Quark,
    attrs: Quark,
}

impl Crf1dModel {
    pub fn from_memory(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::invalid_model("model is smaller than its header"));
        }
        if &buffer[0..4] != MAGIC {
            return Err(Error::invalid_model("magic mismatch, not a CRFsuite model"));
        }
        if &buffer[8..12] != MODEL_TYPE {
            return Err(Error::invalid_model(format!(
                "unsupported model type {:?}",
                String::from_utf8_lossy(&buffer[8..12])
            )));
        }
        let header = Header {
            size: read_u32(buffer, 4)?,
            version: read_u32(buffer, 12)?,
            num_features: read_u32(buffer, 16)?,
            num_labels: read_u32(buffer, 20)?,
            num_attrs: read_u32(buffer, 24)?,
            off_features: read_u32(buffer, 28)?,
            off_labels: read_u32(buffer, 32)?,
            off_attrs: read_u32(buffer, 36)?,
            off_label_refs: read_u32(buffer, 40)?,
            off_attr_refs: read_u32(buffer, 44)?,
        };
        if header.version != VERSION {
            return Err(Error::invalid_model(format!(
                "unsupported model version {}",
                header.version
            )));
        }

        let features = Self::read_features(buffer, &header)?;
        let labels = Self::read_quark(buffer, header.off_labels, header.num_labels, "labels")?;
        let attrs = Self::read_quark(buffer, header.off_attrs, header.num_attrs, "attributes")?;
        let label_refs = Self::read_refs(buffer, header.off_label_refs, header.num_labels)?;
        let attr_refs = Self::read_refs(buffer, header.off_attr_refs, header.num_attrs)?;

        let model = Self {
            header,
            features,
            label_refs,
            attr_refs,
            labels,
            attrs,
        };
        model.validate()?;
        log::debug!(
            "loaded model (features: {}, labels: {}, attrs: {})",
            model.features.len(),
            model.labels.len(),
            model.attrs.len()
        );
        Ok(model)
    }

    fn read_features(buffer: &[u8], header: &Header) -> Result<Vec<Feature>> {
        let off = header.off_features as usize;
        let n = read_u32(buffer, off + 8)? as usize;
        let mut features = Vec::with_capacity(n.min(buffer.len() / FEATURE_SIZE));
        for i in 0..n {
            let offset = off + CHUNK_SIZE + FEATURE_SIZE * i;
            features.push(Feature {
                cat: FeatCat::try_from(read_u32(buffer, offset)?)?,
                src: read_u32(buffer, offset + 4)?,
                dst: read_u32(buffer, offset + 8)?,
                weight: read_f64(buffer, offset + 12)?,
            });
        }
        Ok(features)
    }

    fn read_refs(buffer: &[u8], off: u32, n: u32) -> Result<Vec<FeatRefs>> {
        let off = off as usize;
        let mut refs = Vec::with_capacity((n as usize).min(buffer.len() / 4));
        for i in 0..n as usize {
            let offset = read_u32(buffer, off + CHUNK_SIZE + 4 * i)? as usize;
            let num_fids = read_u32(buffer, offset)? as usize;
            let fids = (0..num_fids)
                .map(|j| read_u32(buffer, offset + 4 + 4 * j))
                .collect::<Result<FeatRefs>>()?;
            refs.push(fids);
        }
        Ok(refs)
    }

    fn read_quark(buffer: &[u8], off: u32, n: u32, what: &str) -> Result<Quark> {
        let db = buffer
            .get(off as usize..)
            .ok_or_else(|| Error::invalid_model(format!("{} offset out of bounds", what)))
            .and_then(|buf| {
                CQDB::new(buf)
                    .map_err(|e| Error::invalid_model(format!("failed to read {}: {}", what, e)))
            })?;
        let mut quark = Quark::new();
        for id in 0..n {
            let s = db
                .to_str(id)
                .ok_or_else(|| Error::invalid_model(format!("missing {} entry #{}", what, id)))?;
            let s = std::str::from_utf8(s)
                .map_err(|_| Error::invalid_model(format!("{} entry #{} is not UTF-8", what, id)))?;
            if quark.find_or_insert(s) != id {
                return Err(Error::invalid_model(format!("duplicate {} entry {:?}", what, s)));
            }
        }
        Ok(quark)
    }

    fn validate(&self) -> Result<()> {
        let num_labels = self.header.num_labels;
        for (fid, f) in self.features.iter().enumerate() {
            let src_bound = match f.cat {
                FeatCat::State => self.header.num_attrs,
                FeatCat::Trans => num_labels,
            };
            if f.src >= src_bound || f.dst >= num_labels {
                return Err(Error::invalid_model(format!("feature #{} out of range", fid)));
            }
        }
        if self.features.len() != self.header.num_features as usize {
            return Err(Error::invalid_model(format!(
                "header declares {} features, feature chunk holds {}",
                self.header.num_features,
                self.features.len()
            )));
        }
        Self::validate_refs(&self.features, &self.label_refs, FeatCat::Trans, "label")?;
        Self::validate_refs(&self.features, &self.attr_refs, FeatCat::State, "attribute")?;
        Ok(())
    }

    /// Each list must only reference features of `cat` whose source is the
    /// list's owner.
    fn validate_refs(
        features: &[Feature],
        refs: &[FeatRefs],
        cat: FeatCat,
        what: &str,
    ) -> Result<()> {
        for (owner, fids) in refs.iter().enumerate() {
            for &fid in fids {
                let f = features.get(fid as usize).ok_or_else(|| {
                    Error::invalid_model(format!(
                        "{} #{} references missing feature #{}",
                        what, owner, fid
                    ))
                })?;
                if f.cat != cat || f.src as usize != owner {
                    return Err(Error::invalid_model(format!(
                        "{} #{} references feature #{} of another source",
                        what, owner, fid
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn num_labels(&self) -> usize {
        self.header.num_labels as usize
    }

    pub fn num_attrs(&self) -> usize {
        self.header.num_attrs as usize
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn labels(&self) -> &Quark {
        &self.labels
    }

    pub fn attrs(&self) -> &Quark {
        &self.attrs
    }

    pub fn label_ref(&self, lid: u32) -> &[u32] {
        self.label_refs.get(lid as usize).map_or(&[], Vec::as_slice)
    }

    pub fn attr_ref(&self, aid: u32) -> &[u32] {
        self.attr_refs.get(aid as usize).map_or(&[], Vec::as_slice)
    }

    pub fn feature(&self, fid: u32) -> Option<&Feature> {
        self.features.get(fid as usize)
    }

    /// Print the model in a human-readable format.
    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = &self.header;
        writeln!(w, "FILEHEADER = {{")?;
        writeln!(w, "  magic: {}", String::from_utf8_lossy(MAGIC))?;
        writeln!(w, "  size: {}", header.size)?;
        writeln!(w, "  type: {}", String::from_utf8_lossy(MODEL_TYPE))?;
        writeln!(w, "  version: {}", header.version)?;
        writeln!(w, "  num_features: {}", header.num_features)?;
        writeln!(w, "  num_labels: {}", header.num_labels)?;
        writeln!(w, "  num_attrs: {}", header.num_attrs)?;
        writeln!(w, "  off_features: {:#X}", header.off_features)?;
        writeln!(w, "  off_labels: {:#X}", header.off_labels)?;
        writeln!(w, "  off_attrs: {:#X}", header.off_attrs)?;
        writeln!(w, "  off_labelrefs: {:#X}", header.off_label_refs)?;
        writeln!(w, "  off_attrrefs: {:#X}", header.off_attr_refs)?;
        writeln!(w, "}}\n")?;

        writeln!(w, "LABELS = {{")?;
        for (id, label) in self.labels.iter() {
            writeln!(w, "  {:>5}: {}", id, label)?;
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "ATTRIBUTES = {{")?;
        for (id, attr) in self.attrs.iter() {
            writeln!(w, "  {:>5}: {}", id, attr)?;
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "TRANSITIONS = {{")?;
        for lid in 0..header.num_labels {
            for f in self.label_ref(lid).iter().filter_map(|&fid| self.feature(fid)) {
                writeln!(
                    w,
                    "  ({}) {} --> {}: {:.6}",
                    f.cat as u32,
                    self.labels.to_str(f.src).unwrap_or_default(),
                    self.labels.to_str(f.dst).unwrap_or_default(),
                    f.weight
                )?;
            }
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "STATE_FEATURES = {{")?;
        for aid in 0..header.num_attrs {
            for f in self.attr_ref(aid).iter().filter_map(|&fid| self.feature(fid)) {
                writeln!(
                    w,
                    "  ({}) {} --> {}: {:.6}",
                    f.cat as u32,
                    self.attrs.to_str(f.src).unwrap_or_default(),
                    self.labels.to_str(f.dst).unwrap_or_default(),
                    f.weight
                )?;
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::crf1d::writer::ModelWriter;

    fn weather() -> Vec<u8> {
        let mut writer = ModelWriter::new();
        writer.transition("sunny", "sunny", 0.5);
        writer.transition("rainy", "rainy", 0.25);
        writer.state("walk", "sunny", 1.0);
        writer.state("clean", "rainy", 0.75);
        writer.to_bytes().unwrap()
    }

    #[test]
    fn read_buf() {
        let buf = weather();
        let model = Crf1dModel::from_memory(&buf).unwrap();
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.num_attrs(), 2);
        assert_eq!(model.num_features(), 4);
        assert_eq!(model.labels().to_id("rainy"), Some(1));
        assert_eq!(model.attrs().to_str(1), Some("clean"));

        let fid = model.attr_ref(1)[0];
        let f = model.feature(fid).unwrap();
        assert_eq!(f.cat, FeatCat::State);
        assert_eq!((f.src, f.dst, f.weight), (1, 1, 0.75));
        assert_eq!(model.label_ref(0).len(), 1);
        assert!(model.attr_ref(99).is_empty());
    }

    #[test]
    fn invalid_header() {
        assert!(matches!(Crf1dModel::from_memory(b""), Err(Error::InvalidModel(_))));
        assert!(matches!(Crf1dModel::from_memory(b"lCRFabcdefg"), Err(Error::InvalidModel(_))));

        let mut buf = weather();
        buf[0] = b'L';
        assert!(matches!(Crf1dModel::from_memory(&buf), Err(Error::InvalidModel(_))));

        let mut buf = weather();
        buf[12..16].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(Crf1dModel::from_memory(&buf), Err(Error::InvalidModel(_))));
    }

    /// Byte offset of the first feature id in the ref list of `owner`.
    fn first_ref(buf: &[u8], header_field: usize, owner: usize) -> usize {
        let off = read_u32(buf, header_field).unwrap() as usize;
        read_u32(buf, off + CHUNK_SIZE + 4 * owner).unwrap() as usize + 4
    }

    fn patched(mut buf: Vec<u8>, at: usize, value: u32) -> Vec<u8> {
        buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
        buf
    }

    #[test]
    fn misdirected_feature_refs() {
        let buf = weather();
        // features: #0 sunny->sunny, #1 rainy->rainy, #2 walk->sunny, #3 clean->rainy
        let label0 = first_ref(&buf, 40, 0);
        let attr0 = first_ref(&buf, 44, 0);
        assert_eq!(read_u32(&buf, label0).unwrap(), 0);
        assert_eq!(read_u32(&buf, attr0).unwrap(), 2);

        for (at, fid) in [(label0, 2), (label0, 1), (attr0, 0), (attr0, 3), (label0, 9)] {
            let corrupt = patched(buf.clone(), at, fid);
            assert!(
                matches!(Crf1dModel::from_memory(&corrupt), Err(Error::InvalidModel(_))),
                "ref at {} -> #{}",
                at,
                fid
            );
        }
    }

    #[test]
    fn feature_count_mismatch() {
        let buf = patched(weather(), 16, 3);
        assert!(matches!(Crf1dModel::from_memory(&buf), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn truncated() {
        let buf = weather();
        for len in [HEADER_SIZE, HEADER_SIZE + CHUNK_SIZE, buf.len() - 1] {
            assert!(Crf1dModel::from_memory(&buf[..len]).is_err(), "len = {}", len);
        }
    }
}
