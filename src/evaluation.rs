use std::collections::BTreeMap;
use std::fmt::Display;
use std::iter::zip;

use serde::Serialize;

/// Label-wise performance values.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LabelMeasure {
    /// Number of correct predictions.
    pub num_correct: usize,
    /// Number of occurrences of the label in the gold-standard data.
    pub num_observation: usize,
    /// Number of predictions.
    pub num_prediction: usize,
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

/// Overall performance of a tagger against reference labels.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Evaluation {
    /// Number of labels the macro averages are taken over.
    pub num_labels: usize,
    tbl: BTreeMap<String, LabelMeasure>,

    /// Number of correctly predicted items.
    item_total_correct: usize,
    /// Total number of items.
    item_total_num: usize,
    item_accuracy: f64,

    /// Number of correctly predicted sequences.
    inst_total_correct: usize,
    /// Total number of sequences.
    inst_total_num: usize,
    inst_accuracy: f64,

    macro_precision: f64,
    macro_recall: f64,
    macro_fmeasure: f64,
}

/// Summary returned by [`Evaluation::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimation {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
    pub item_accuracy: f64,
    pub inst_accuracy: f64,
}

impl Evaluation {
    pub fn new(num_labels: usize) -> Self {
        Self {
            num_labels,
            ..Default::default()
        }
    }

    /// Count one sequence; `reference` and `prediction` are aligned by position.
    pub fn accumulate<R: AsRef<str>, P: AsRef<str>>(&mut self, reference: &[R], prediction: &[P]) {
        let mut matched = 0;
        for (r, p) in zip(reference, prediction) {
            let (r, p) = (r.as_ref(), p.as_ref());
            self.tbl.entry(r.to_string()).or_default().num_observation += 1;
            self.tbl.entry(p.to_string()).or_default().num_prediction += 1;
            if r == p {
                self.tbl.entry(r.to_string()).or_default().num_correct += 1;
                matched += 1;
            }
            self.item_total_num += 1;
        }

        if matched == reference.len() && reference.len() == prediction.len() {
            self.inst_total_correct += 1;
        }
        self.inst_total_num += 1;
    }

    pub fn label(&self, label: &str) -> Option<&LabelMeasure> {
        self.tbl.get(label)
    }

    pub fn evaluate(&mut self) -> Estimation {
        self.item_total_correct = 0;
        self.macro_precision = 0.0;
        self.macro_recall = 0.0;
        self.macro_fmeasure = 0.0;

        for lev in self.tbl.values_mut() {
            if lev.num_observation == 0 {
                continue;
            }
            self.item_total_correct += lev.num_correct;

            lev.precision = 0.0;
            lev.recall = 0.0;
            lev.fmeasure = 0.0;
            if lev.num_prediction > 0 {
                lev.precision = lev.num_correct as f64 / lev.num_prediction as f64;
            }
            lev.recall = lev.num_correct as f64 / lev.num_observation as f64;
            if lev.precision + lev.recall > 0.0 {
                lev.fmeasure = lev.precision * lev.recall * 2.0 / (lev.precision + lev.recall);
            }
            self.macro_precision += lev.precision;
            self.macro_recall += lev.recall;
            self.macro_fmeasure += lev.fmeasure;
        }

        let num_labels = if self.num_labels > 0 {
            self.num_labels
        } else {
            self.tbl.values().filter(|x| x.num_observation > 0).count()
        };
        if num_labels > 0 {
            self.macro_precision /= num_labels as f64;
            self.macro_recall /= num_labels as f64;
            self.macro_fmeasure /= num_labels as f64;
        }

        if self.item_total_num > 0 {
            self.item_accuracy = self.item_total_correct as f64 / self.item_total_num as f64;
        }
        if self.inst_total_num > 0 {
            self.inst_accuracy = self.inst_total_correct as f64 / self.inst_total_num as f64;
        }
        Estimation {
            precision: self.macro_precision,
            recall: self.macro_recall,
            fmeasure: self.macro_fmeasure,
            item_accuracy: self.item_accuracy,
            inst_accuracy: self.inst_accuracy,
        }
    }
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Performance by label (#match, #model, #ref) (precision, recall, F1):")?;
        for (label, lev) in &self.tbl {
            if lev.num_observation == 0 {
                writeln!(
                    f,
                    "    {}: ({}, {}, {}) (******, ******, ******)",
                    label, lev.num_correct, lev.num_prediction, lev.num_observation
                )?;
            } else {
                writeln!(
                    f,
                    "    {}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    label,
                    lev.num_correct,
                    lev.num_prediction,
                    lev.num_observation,
                    lev.precision,
                    lev.recall,
                    lev.fmeasure
                )?;
            }
        }
        writeln!(
            f,
            "Macro-average precision, recall, F1: ({:.6}, {:.6}, {:.6})",
            self.macro_precision, self.macro_recall, self.macro_fmeasure
        )?;
        writeln!(
            f,
            "Item accuracy: {} / {} ({:.4})",
            self.item_total_correct, self.item_total_num, self.item_accuracy
        )?;
        writeln!(
            f,
            "Instance accuracy: {} / {} ({:.4})",
            self.inst_total_correct, self.inst_total_num, self.inst_accuracy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction() {
        let mut ev = Evaluation::new(2);
        ev.accumulate(&["B-PER", "O"], &["B-PER", "O"]);
        let est = ev.evaluate();
        assert_eq!(est.precision, 1.0);
        assert_eq!(est.recall, 1.0);
        assert_eq!(est.item_accuracy, 1.0);
        assert_eq!(est.inst_accuracy, 1.0);
    }

    #[test]
    fn partial_prediction() {
        let mut ev = Evaluation::new(2);
        ev.accumulate(&["B-PER", "O", "O", "B-LOC"], &["B-PER", "O", "O", "O"]);
        ev.accumulate(&["O"], &["O"]);
        let est = ev.evaluate();

        let o = ev.label("O").unwrap();
        assert_eq!((o.num_correct, o.num_prediction, o.num_observation), (3, 4, 3));
        assert_eq!(o.precision, 0.75);
        assert_eq!(ev.label("B-LOC").unwrap().recall, 0.0);
        assert_eq!(est.item_accuracy, 4.0 / 5.0);
        assert_eq!(est.inst_accuracy, 0.5);

        let report = ev.to_string();
        assert!(report.contains("    O: (3, 4, 3) (0.7500, 1.0000, 0.8571)"));
        assert!(report.contains("Item accuracy: 4 / 5 (0.8000)"));
        assert!(report.contains("Instance accuracy: 1 / 2 (0.5000)"));
    }

    #[test]
    fn evaluate_twice() {
        let mut ev = Evaluation::new(1);
        ev.accumulate(&["O"], &["O"]);
        let first = ev.evaluate();
        assert_eq!(first, ev.evaluate());
    }
}
