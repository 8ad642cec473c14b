use std::time::Instant;

use serde::Serialize;

use crate::attribute::{Attribute, FeatureExtractor};
use crate::crf::data::{Attr, Float, Instance, Item};
use crate::crf::decoder::Decoder;
use crate::error::{Error, Result};
use crate::quark::{Quark, StringTable};

/// Labels predicted for a sequence, with their confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tagged<'a> {
    pub labels: Vec<&'a str>,
    /// Probability of the whole label sequence.
    pub probability: Float,
    /// Marginal probability of each predicted label.
    pub marginals: Vec<Float>,
}

/// Predicts label sequences with a model's dictionaries and decoder.
///
/// A tagger holds no per-call state; it is cheap to create and may be used
/// from several threads at once.
#[derive(Clone, Copy)]
pub struct Tagger<'a> {
    labels: &'a Quark,
    attrs: &'a Quark,
    decoder: &'a dyn Decoder,
}

impl<'a> std::fmt::Debug for Tagger<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tagger")
            .field("labels", &self.labels.len())
            .field("attrs", &self.attrs.len())
            .finish()
    }
}

impl<'a> Tagger<'a> {
    /// Bind a decoder to the dictionaries its label and attribute ids refer to.
    pub fn new(labels: &'a Quark, attrs: &'a Quark, decoder: &'a dyn Decoder) -> Self {
        Self {
            labels,
            attrs,
            decoder,
        }
    }

    /// All labels of the model, in id order.
    pub fn labels(&self) -> Vec<&'a str> {
        self.labels.iter().map(|(_, s)| s).collect()
    }

    /// Encode already extracted attributes.
    ///
    /// Attributes the model does not know carry no weight and are left out.
    pub fn encode<T: AsRef<[Attribute]>>(&self, xseq: &[T]) -> Instance {
        let mut instance = Instance::with_capacity(xseq.len());
        for item in xseq {
            instance.append(self.encode_item(item.as_ref()), None);
        }
        instance
    }

    /// Run `extractor` over every observation and encode the result.
    pub fn extract<O, X>(&self, observations: &[O], extractor: &X) -> Result<Instance>
    where
        X: FeatureExtractor<O> + ?Sized,
    {
        let mut instance = Instance::with_capacity(observations.len());
        for observation in observations {
            let attrs = extractor
                .extract(observation)
                .map_err(|e| Error::Extractor(e.into()))?;
            instance.append(self.encode_item(&attrs), None);
        }
        Ok(instance)
    }

    fn encode_item(&self, attrs: &[Attribute]) -> Item {
        attrs
            .iter()
            .filter_map(|a| self.attrs.to_id(&a.name).map(|id| Attr::new(id, a.value)))
            .collect()
    }

    /// Predict the label sequence for already extracted attributes.
    pub fn tag<T: AsRef<[Attribute]>>(&self, xseq: &[T]) -> Result<Vec<&'a str>> {
        self.decode(&self.encode(xseq))
    }

    /// Predict one label per observation.
    ///
    /// An empty input yields an empty output without consulting the decoder.
    pub fn tag_with<O, X>(&self, observations: &[O], extractor: &X) -> Result<Vec<&'a str>>
    where
        X: FeatureExtractor<O> + ?Sized,
    {
        let instance = self.extract(observations, extractor)?;
        self.decode(&instance)
    }

    /// Like [`Self::tag_with`], but gives up with [`Error::DeadlineExceeded`]
    /// if `deadline` has passed once features are extracted. A decode that
    /// has started always runs to completion.
    pub fn tag_until<O, X>(
        &self,
        observations: &[O],
        extractor: &X,
        deadline: Instant,
    ) -> Result<Vec<&'a str>>
    where
        X: FeatureExtractor<O> + ?Sized,
    {
        let instance = self.extract(observations, extractor)?;
        if !instance.is_empty() && Instant::now() >= deadline {
            return Err(Error::DeadlineExceeded);
        }
        self.decode(&instance)
    }

    /// Predict labels along with the sequence probability and the marginal
    /// probability of every predicted label.
    pub fn tag_with_marginals<O, X>(&self, observations: &[O], extractor: &X) -> Result<Tagged<'a>>
    where
        X: FeatureExtractor<O> + ?Sized,
    {
        let instance = self.extract(observations, extractor)?;
        self.decode_with_marginals(&instance)
    }

    /// Label an encoded instance.
    pub fn decode(&self, instance: &Instance) -> Result<Vec<&'a str>> {
        if instance.is_empty() {
            return Ok(Vec::new());
        }
        log::trace!("decoding {} items", instance.len());
        let path = self.decoder.viterbi(instance)?;
        self.to_labels(instance, &path.labels)
    }

    pub fn decode_with_marginals(&self, instance: &Instance) -> Result<Tagged<'a>> {
        if instance.is_empty() {
            return Ok(Tagged {
                labels: Vec::new(),
                probability: 1.0,
                marginals: Vec::new(),
            });
        }
        let path = self.decoder.viterbi(instance)?;
        let labels = self.to_labels(instance, &path.labels)?;
        let m = self.decoder.marginals(instance)?;
        let marginals = path
            .labels
            .iter()
            .enumerate()
            .map(|(t, &l)| {
                m.point(l, t)
                    .ok_or_else(|| Error::decode(format!("no marginal for item {}", t)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tagged {
            labels,
            probability: m.probability(path.score),
            marginals,
        })
    }

    /// Probability of the label sequence `yseq` for `instance`.
    pub fn probability(&self, instance: &Instance, yseq: &[&str]) -> Result<Float> {
        if yseq.len() != instance.len() {
            return Err(Error::decode(format!(
                "{} labels given for {} items",
                yseq.len(),
                instance.len()
            )));
        }
        if instance.is_empty() {
            return Ok(1.0);
        }
        let path = yseq
            .iter()
            .map(|&y| self.label_id(y))
            .collect::<Result<Vec<_>>>()?;
        let score = self.decoder.score(instance, &path)?;
        let m = self.decoder.marginals(instance)?;
        Ok(m.probability(score))
    }

    /// Marginal probability of `label` at position `t` of `instance`.
    pub fn marginal(&self, instance: &Instance, label: &str, t: usize) -> Result<Float> {
        let l = self.label_id(label)?;
        if t >= instance.len() {
            return Err(Error::decode(format!(
                "position {} is out of range for {} items",
                t,
                instance.len()
            )));
        }
        let m = self.decoder.marginals(instance)?;
        m.point(l, t)
            .ok_or_else(|| Error::decode(format!("no marginal for item {}", t)))
    }

    fn label_id(&self, label: &str) -> Result<u32> {
        self.labels
            .to_id(label)
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }

    fn to_labels(&self, instance: &Instance, ids: &[u32]) -> Result<Vec<&'a str>> {
        if ids.len() != instance.len() {
            return Err(Error::decode(format!(
                "decoder returned {} labels for {} items",
                ids.len(),
                instance.len()
            )));
        }
        ids.iter()
            .map(|&id| {
                self.labels
                    .to_str(id)
                    .ok_or_else(|| Error::decode(format!("unknown label id {}", id)))
            })
            .collect()
    }
}
