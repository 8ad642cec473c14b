use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use cqdb::CQDBWriter;

use super::model::{FeatCat, Feature, CHUNK_SIZE, FEATURE_SIZE, HEADER_SIZE, MAGIC, MODEL_TYPE, VERSION};
use crate::crf::data::Float;
use crate::error::{Error, Result};
use crate::quark::{Quark, StringTable, TextVectorizer};

/// Assembles a CRFsuite `lCRF` model from explicit feature weights.
///
/// Labels and attributes receive ids in the order they are first mentioned.
/// No weights are estimated here; this is for shipping weights obtained
/// elsewhere, and for fixtures.
#[derive(Debug, Default, Clone)]
pub struct ModelWriter {
    labels: Quark,
    attrs: Quark,
    features: Vec<Feature>,
}

impl ModelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label without any feature, fixing its id.
    pub fn label(&mut self, label: &str) -> u32 {
        self.labels.find_or_insert(label)
    }

    /// Add a state feature: `attr` observed with `label`.
    pub fn state(&mut self, attr: &str, label: &str, weight: Float) -> &mut Self {
        let src = self.attrs.find_or_insert(attr);
        let dst = self.labels.find_or_insert(label);
        self.features.push(Feature {
            cat: FeatCat::State,
            src,
            dst,
            weight,
        });
        self
    }

    /// Add a transition feature: `from` followed by `to`.
    pub fn transition(&mut self, from: &str, to: &str, weight: Float) -> &mut Self {
        let src = self.labels.find_or_insert(from);
        let dst = self.labels.find_or_insert(to);
        self.features.push(Feature {
            cat: FeatCat::Trans,
            src,
            dst,
            weight,
        });
        self
    }

    pub fn labels(&self) -> &Quark {
        &self.labels
    }

    pub fn attrs(&self) -> &Quark {
        &self.attrs
    }

    /// Write the model to a file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let buf = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Serialize the model.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Cursor::new(Vec::new());

        // header is rewritten once the offsets are known
        w.write_all(&[0u8; HEADER_SIZE])?;

        let off_features = position(&mut w)?;
        self.write_features(&mut w)?;

        let off_labels = position(&mut w)?;
        write_cqdb(&mut w, &self.labels)?;

        let off_attrs = position(&mut w)?;
        write_cqdb(&mut w, &self.attrs)?;

        align_to_u32(&mut w)?;
        let off_label_refs = position(&mut w)?;
        let label_refs = self.refs(FeatCat::Trans, self.labels.len());
        write_refs(&mut w, b"LFRF", &label_refs, 2)?;

        align_to_u32(&mut w)?;
        let off_attr_refs = position(&mut w)?;
        let attr_refs = self.refs(FeatCat::State, self.attrs.len());
        write_refs(&mut w, b"AFRF", &attr_refs, 0)?;

        let size = position(&mut w)?;
        w.seek(SeekFrom::Start(0))?;
        w.write_all(MAGIC)?;
        w.write_all(&size.to_le_bytes())?;
        w.write_all(MODEL_TYPE)?;
        for v in [
            VERSION,
            to_u32(self.features.len())?,
            to_u32(self.labels.len())?,
            to_u32(self.attrs.len())?,
            off_features,
            off_labels,
            off_attrs,
            off_label_refs,
            off_attr_refs,
        ] {
            w.write_all(&v.to_le_bytes())?;
        }
        Ok(w.into_inner())
    }

    fn write_features<W: Write>(&self, w: &mut W) -> Result<()> {
        let num_features = to_u32(self.features.len())?;
        let chunk_size = to_u32(CHUNK_SIZE + FEATURE_SIZE * self.features.len())?;
        w.write_all(b"FEAT")?;
        w.write_all(&chunk_size.to_le_bytes())?;
        w.write_all(&num_features.to_le_bytes())?;
        for f in &self.features {
            w.write_all(&(f.cat as u32).to_le_bytes())?;
            w.write_all(&f.src.to_le_bytes())?;
            w.write_all(&f.dst.to_le_bytes())?;
            w.write_all(&f.weight.to_le_bytes())?;
        }
        Ok(())
    }

    /// Feature ids grouped by their source.
    fn refs(&self, cat: FeatCat, n: usize) -> Vec<Vec<u32>> {
        let mut refs = vec![Vec::new(); n];
        for (fid, f) in self.features.iter().enumerate() {
            if f.cat == cat {
                refs[f.src as usize].push(fid as u32);
            }
        }
        refs
    }
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::invalid_model("model exceeds 4 GiB"))
}

fn position<S: Seek>(w: &mut S) -> Result<u32> {
    let pos = w.stream_position()?;
    u32::try_from(pos).map_err(|_| Error::invalid_model("model exceeds 4 GiB"))
}

fn align_to_u32(w: &mut Cursor<Vec<u8>>) -> Result<()> {
    while position(w)? % 4 != 0 {
        w.write_all(&[0])?;
    }
    Ok(())
}

fn write_cqdb(w: &mut Cursor<Vec<u8>>, quark: &Quark) -> Result<()> {
    {
        let mut db = CQDBWriter::new(&mut *w)?;
        for (id, s) in quark.iter() {
            db.put(s, id)?;
        }
        // the database is finalized when the writer is dropped
    }
    w.seek(SeekFrom::End(0))?;
    Ok(())
}

/// Write a feature-reference chunk; `extra` reserves unused trailing slots.
fn write_refs(w: &mut Cursor<Vec<u8>>, chunk: &[u8; 4], refs: &[Vec<u32>], extra: usize) -> Result<()> {
    let start = position(w)?;
    let num = to_u32(refs.len() + extra)?;
    let header_size = CHUNK_SIZE + 4 * (refs.len() + extra);

    let mut offsets = Vec::with_capacity(refs.len() + extra);
    let mut offset = start as usize + header_size;
    for fids in refs {
        offsets.push(to_u32(offset)?);
        offset += 4 + 4 * fids.len();
    }
    offsets.resize(refs.len() + extra, 0);

    w.write_all(chunk)?;
    w.write_all(&to_u32(offset - start as usize)?.to_le_bytes())?;
    w.write_all(&num.to_le_bytes())?;
    for off in &offsets {
        w.write_all(&off.to_le_bytes())?;
    }
    for fids in refs {
        w.write_all(&to_u32(fids.len())?.to_le_bytes())?;
        for fid in fids {
            w.write_all(&fid.to_le_bytes())?;
        }
    }
    Ok(())
}
