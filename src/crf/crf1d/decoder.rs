use super::context::{Crf1dContext, Flag};
use super::model::Crf1dModel;
use crate::crf::data::{Float, Instance};
use crate::crf::decoder::{Decoder, Marginals, Path};
use crate::error::{Error, Result};

/// Exact decoder for first-order CRF models.
///
/// Transition scores are computed once; each call works in its own
/// [`Crf1dContext`], so one decoder serves any number of threads.
#[derive(Debug, Clone)]
pub struct Crf1dDecoder {
    model: Crf1dModel,
    /// `[L][L]` transition scores.
    trans: Vec<Float>,
}

impl Crf1dDecoder {
    pub fn new(model: Crf1dModel) -> Self {
        let l = model.num_labels();
        let mut trans = vec![0.0; l * l];
        /* Compute transition scores between two labels. */
        for i in 0..l {
            for &fid in model.label_ref(i as u32) {
                /* Transition feature from #i to #(f->dst). */
                if let Some(f) = model.feature(fid) {
                    trans[l * f.src as usize + f.dst as usize] = f.weight;
                }
            }
        }
        Self { model, trans }
    }

    pub fn model(&self) -> &Crf1dModel {
        &self.model
    }

    /// A context holding the state scores of `instance`.
    fn context(&self, flag: Flag, instance: &Instance) -> Result<Crf1dContext> {
        if instance.is_empty() {
            return Err(Error::decode("empty instance"));
        }
        let l = self.model.num_labels();
        if l == 0 {
            return Err(Error::decode("model has no labels"));
        }
        let mut ctx = Crf1dContext::new(flag, l, instance.len());
        ctx.trans.copy_from_slice(&self.trans);

        /* Loop over the items in the sequence. */
        for (t, item) in instance.items.iter().enumerate() {
            let state = &mut ctx.state[l * t..l * (t + 1)];
            /* Loop over the contents (attributes) attached to the item. */
            for attr in item {
                if attr.id as usize >= self.model.num_attrs() {
                    return Err(Error::decode(format!(
                        "attribute #{} at item {} is not part of the model",
                        attr.id, t
                    )));
                }
                /* A scale usually represents the attribute frequency in the item. */
                for &fid in self.model.attr_ref(attr.id) {
                    /* The state feature #fid, represented by the attribute #a, outputs the label #(f->dst). */
                    if let Some(f) = self.model.feature(fid) {
                        state[f.dst as usize] += f.weight * attr.value;
                    }
                }
            }
        }
        Ok(ctx)
    }

    fn check_path(&self, instance: &Instance, labels: &[u32]) -> Result<()> {
        if labels.len() != instance.len() {
            return Err(Error::decode(format!(
                "path has {} labels for {} items",
                labels.len(),
                instance.len()
            )));
        }
        if let Some(&l) = labels.iter().find(|&&l| l as usize >= self.model.num_labels()) {
            return Err(Error::decode(format!("label #{} is not part of the model", l)));
        }
        Ok(())
    }
}

impl Decoder for Crf1dDecoder {
    fn num_labels(&self) -> usize {
        self.model.num_labels()
    }

    fn viterbi(&self, instance: &Instance) -> Result<Path> {
        let mut ctx = self.context(Flag::VITERBI, instance)?;
        let (labels, score) = ctx.viterbi();
        Ok(Path {
            labels: labels.into_iter().map(|l| l as u32).collect(),
            score,
        })
    }

    fn marginals(&self, instance: &Instance) -> Result<Marginals> {
        let mut ctx = self.context(Flag::MARGINALS, instance)?;
        ctx.exp_transition();
        ctx.exp_state();
        ctx.alpha_score();
        ctx.beta_score();
        ctx.marginals();
        let log_norm = ctx.log_norm();
        Ok(Marginals::new(log_norm, self.model.num_labels(), ctx.mexp_state))
    }

    fn score(&self, instance: &Instance, labels: &[u32]) -> Result<Float> {
        self.check_path(instance, labels)?;
        let ctx = self.context(Flag::VITERBI, instance)?;
        let path: Vec<usize> = labels.iter().map(|&l| l as usize).collect();
        Ok(ctx.score(&path))
    }
}
