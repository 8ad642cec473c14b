use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::attribute::Attribute;
use crate::crf::data::{Attr, Instance};
use crate::quark::TextVectorizer;

/// One labeled sequence read from a data file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sequence {
    pub items: Vec<Vec<Attribute>>,
    pub labels: Vec<String>,
}

impl Sequence {
    pub fn push(&mut self, item: Vec<Attribute>, label: String) {
        self.items.push(item);
        self.labels.push(label);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.labels.clear();
    }
}

/// Sequences in the CRFsuite text format.
///
/// Each line holds a label followed by tab-separated attributes, an
/// attribute optionally carrying a value after its last unescaped `:`
/// (`\:` and `\\` escape a colon and a backslash). Blank lines separate
/// sequences.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dataset {
    pub seqs: Vec<Sequence>,
}

impl Dataset {
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }

    pub fn read<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut dataset = Self::default();
        let mut seq = Sequence::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                if !seq.is_empty() {
                    dataset.seqs.push(std::mem::take(&mut seq));
                }
                continue;
            }
            let mut fields = line.split('\t');
            let label = fields.next().unwrap_or_default();
            if label.is_empty() {
                log::warn!("line {}: missing label: {:?}", lineno + 1, line);
                continue;
            }
            let item = fields
                .filter(|f| !f.is_empty())
                .map(parse_attribute)
                .collect();
            seq.push(item, label.to_string());
        }
        if !seq.is_empty() {
            dataset.seqs.push(seq);
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn max_length(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).max().unwrap_or_default()
    }

    pub fn total_items(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).sum()
    }

    /// Encode every sequence, assigning fresh ids to unseen labels and
    /// attributes.
    pub fn encode<L, A>(&self, labels: &mut L, attrs: &mut A) -> Vec<Instance>
    where
        L: TextVectorizer,
        A: TextVectorizer,
    {
        self.seqs
            .iter()
            .map(|seq| {
                let mut instance = Instance::with_capacity(seq.len());
                for (item, label) in seq.items.iter().zip(&seq.labels) {
                    let item = item
                        .iter()
                        .map(|a| Attr::new(attrs.find_or_insert(&a.name), a.value))
                        .collect();
                    instance.append(item, Some(labels.find_or_insert(label)));
                }
                instance
            })
            .collect()
    }
}

/// Parse `name[:value]`, honoring `\:` and `\\` escapes in the name.
///
/// A suffix that is not a finite number stays part of the name.
fn parse_attribute(field: &str) -> Attribute {
    let mut name = String::with_capacity(field.len());
    let mut value = None;
    let mut chars = field.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, next)) => name.push(next),
                None => name.push('\\'),
            },
            ':' => {
                let rest = &field[i + 1..];
                match rest.parse::<f64>() {
                    Ok(v) if v.is_finite() && !rest.contains(':') => {
                        value = Some(v);
                        break;
                    }
                    _ => name.push(':'),
                }
            }
            _ => name.push(c),
        }
    }
    Attribute::new(name, value.unwrap_or(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quark::{Quark, StringTable};

    const DATA: &str = "sunny\twalk\tshop:0.5\n\
                        rainy\tclean\n\
                        \n\
                        \n\
                        sunny\twalk\n";

    #[test]
    fn read_sequences() {
        let ds = Dataset::read(DATA.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.max_length(), 2);
        assert_eq!(ds.total_items(), 3);
        assert_eq!(ds.seqs[0].labels, vec!["sunny", "rainy"]);
        assert_eq!(
            ds.seqs[0].items[0],
            vec![Attribute::new("walk", 1.0), Attribute::new("shop", 0.5)]
        );
    }

    #[test]
    fn attribute_escapes() {
        assert_eq!(parse_attribute("w[0]=a"), Attribute::new("w[0]=a", 1.0));
        assert_eq!(parse_attribute("w:2.5"), Attribute::new("w", 2.5));
        assert_eq!(parse_attribute("t\\:x"), Attribute::new("t:x", 1.0));
        assert_eq!(parse_attribute("t\\:x:0.25"), Attribute::new("t:x", 0.25));
        assert_eq!(parse_attribute("a\\\\b"), Attribute::new("a\\b", 1.0));
        assert_eq!(parse_attribute("url:http"), Attribute::new("url:http", 1.0));
    }

    #[test]
    fn non_finite_values_stay_in_the_name() {
        for field in ["w:nan", "w:NaN", "w:inf", "w:-inf", "w:infinity"] {
            assert_eq!(parse_attribute(field), Attribute::new(field, 1.0));
        }
        assert_eq!(parse_attribute("w:1e3"), Attribute::new("w", 1000.0));
    }

    #[test]
    fn encode_with_growing_dictionaries() {
        let ds = Dataset::read(DATA.as_bytes()).unwrap();
        let mut labels = Quark::new();
        let mut attrs = Quark::new();
        let instances = ds.encode(&mut labels, &mut attrs);
        assert_eq!(instances.len(), 2);
        assert_eq!(labels.len(), 2);
        assert_eq!(attrs.len(), 3);
        assert_eq!(instances[0].labels, vec![Some(0), Some(1)]);
        assert_eq!(instances[1].items[0], vec![Attr::new(0, 1.0)]);
        assert_eq!(attrs.to_str(1), Some("shop"));
    }
}
