pub type Float = f64;

/// An attribute id with its value, the encoded form of an [`crate::Attribute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attr {
    pub id: u32,
    pub value: Float,
}

impl Attr {
    pub fn new(id: u32, value: Float) -> Self {
        Self { id, value }
    }
}

/// The attributes observed at one position of a sequence.
///
/// Ids may repeat; their contributions add up.
pub type Item = Vec<Attr>;

/// A sequence of items, optionally paired with reference labels.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Instance {
    pub items: Vec<Item>,
    /// Reference label per item; `None` when tagging.
    pub labels: Vec<Option<u32>>,
}

impl Instance {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: Vec::with_capacity(cap),
            labels: Vec::with_capacity(cap),
        }
    }

    pub fn append(&mut self, item: Item, label: Option<u32>) {
        self.items.push(item);
        self.labels.push(label);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The reference labels, if every item has one.
    pub fn reference(&self) -> Option<Vec<u32>> {
        self.labels.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_items() {
        let mut instance = Instance::default();
        assert!(instance.is_empty());

        let mut item = Item::new();
        item.push(Attr::new(0, 1.0));
        item.push(Attr::new(0, 0.5));
        instance.append(item, None);
        instance.append(Item::new(), Some(1));

        assert!(!instance.is_empty());
        assert_eq!(instance.len(), 2);
        assert_eq!(instance.items[0].len(), 2);
        assert_eq!(instance.reference(), None);

        instance.clear();
        assert!(instance.is_empty());
    }

    #[test]
    fn reference_labels() {
        let mut instance = Instance::with_capacity(2);
        instance.append(vec![Attr::new(3, 1.0)], Some(0));
        instance.append(vec![], Some(2));
        assert_eq!(instance.reference(), Some(vec![0, 2]));
    }
}
