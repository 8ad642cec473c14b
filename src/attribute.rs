use std::convert::Infallible;

use serde::{Deserialize, Serialize};

/// A named feature and its value, as produced by feature extraction.
///
/// Binary features use a value of `1.0`; numeric features carry an
/// arbitrary weight that scales the learned feature weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: f64,
}

impl Attribute {
    pub fn new<T: Into<String>>(name: T, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl From<String> for Attribute {
    fn from(name: String) -> Self {
        Self { name, value: 1.0 }
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: 1.0,
        }
    }
}

impl<S: Into<String>> From<(S, f64)> for Attribute {
    fn from((name, value): (S, f64)) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Maps one raw observation to the attributes describing it.
///
/// Any `Fn(&O) -> impl IntoIterator<Item = impl Into<Attribute>>` closure is an
/// infallible extractor. Extractors that can fail implement the trait
/// themselves; their errors abort tagging of the whole sequence.
pub trait FeatureExtractor<O: ?Sized> {
    type Error: Into<Box<dyn std::error::Error + Send + Sync>>;

    fn extract(&self, observation: &O) -> Result<Vec<Attribute>, Self::Error>;
}

impl<O, F, I> FeatureExtractor<O> for F
where
    O: ?Sized,
    F: Fn(&O) -> I,
    I: IntoIterator,
    I::Item: Into<Attribute>,
{
    type Error = Infallible;

    fn extract(&self, observation: &O) -> Result<Vec<Attribute>, Self::Error> {
        Ok(self(observation).into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Attribute::from("walk"), Attribute::new("walk", 1.0));
        assert_eq!(Attribute::from(("shop", 0.5)), Attribute::new("shop", 0.5));
        assert_eq!(
            Attribute::from("clean".to_string()),
            Attribute::new("clean", 1.0)
        );
    }

    #[test]
    fn closure_extractor() {
        let extractor = |token: &str| {
            vec![
                (format!("word={}", token.to_lowercase()), 1.0),
                (format!("len={}", token.len()), 0.5),
            ]
        };
        let attrs = extractor.extract("Paris").unwrap();
        assert_eq!(
            attrs,
            vec![Attribute::new("word=paris", 1.0), Attribute::new("len=5", 0.5)]
        );
    }

    #[test]
    fn attribute_json() {
        let attr: Attribute = serde_json::from_str(r#"{"name":"walk","value":0.5}"#).unwrap();
        assert_eq!(attr, Attribute::new("walk", 0.5));
    }
}
