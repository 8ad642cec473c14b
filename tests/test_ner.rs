use std::sync::Arc;
use std::thread;

use crftag::{Attribute, Dataset, Evaluation, Model, ModelWriter, Quark, StringTable};

fn ner_model() -> Model {
    let mut writer = ModelWriter::new();
    for label in ["B-PER", "I-PER", "B-LOC", "O"] {
        writer.label(label);
    }
    writer
        .transition("B-PER", "I-PER", 0.2)
        .transition("B-PER", "O", 0.5)
        .transition("I-PER", "O", 0.2)
        .transition("O", "B-LOC", 0.5)
        .transition("O", "O", 0.3)
        .state("word=John", "B-PER", 3.0)
        .state("word=lives", "O", 3.0)
        .state("word=in", "O", 3.0)
        .state("word=Paris", "B-LOC", 3.0)
        .state("shape=Xx", "B-PER", 0.5)
        .state("shape=Xx", "B-LOC", 0.5)
        .state("shape=x", "O", 0.5);
    Model::from_memory(&writer.to_bytes().unwrap()).unwrap()
}

fn features(token: &&str) -> Vec<Attribute> {
    let shape = if token.starts_with(char::is_uppercase) {
        "shape=Xx"
    } else {
        "shape=x"
    };
    vec![Attribute::from(format!("word={}", token)), Attribute::from(shape)]
}

#[test]
fn tag_sentence() {
    let model = ner_model();
    assert_eq!(model.num_labels(), 4);
    let tagger = model.tagger();
    let labels = tagger
        .tag_with(&["John", "lives", "in", "Paris"], &features)
        .unwrap();
    assert_eq!(labels, vec!["B-PER", "O", "O", "B-LOC"]);
}

#[test]
fn empty_sentence() {
    let model = ner_model();
    let labels = model.tagger().tag_with(&[] as &[&str], &features).unwrap();
    assert!(labels.is_empty());
}

#[test]
fn unknown_words() {
    let model = ner_model();
    let tagger = model.tagger();
    let labels = tagger.tag_with(&["Zork", "blorps"], &features).unwrap();
    assert_eq!(labels.len(), 2);
    assert!(labels.iter().all(|l| model.labels().to_id(l).is_some()));

    let labels = tagger
        .tag_with(&["John", "visited", "Paris"], &features)
        .unwrap();
    assert_eq!(labels[0], "B-PER");
    assert_eq!(labels[2], "B-LOC");
    assert_eq!(model.num_attrs(), 6);
    assert_eq!(model.attrs().to_id("word=visited"), None);
}

#[test]
fn concurrent_taggers() {
    let model = ner_model();
    let sentences: [&[&str]; 3] = [
        &["John", "lives", "in", "Paris"],
        &["Paris"],
        &["in", "Paris", "John", "lives"],
    ];
    let expected: Vec<Vec<&str>> = sentences
        .iter()
        .map(|s| model.tagger().tag_with(*s, &features).unwrap())
        .collect();

    thread::scope(|scope| {
        for i in 0..8 {
            let model = &model;
            let expected = &expected;
            scope.spawn(move || {
                let tagger = model.tagger();
                for n in 0..100 {
                    let k = (i + n) % sentences.len();
                    let labels = tagger.tag_with(sentences[k], &features).unwrap();
                    assert_eq!(labels, expected[k]);
                }
            });
        }
    });
}

#[test]
fn shared_model() {
    let model = Arc::new(ner_model());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = Arc::clone(&model);
            thread::spawn(move || {
                let tagger = model.tagger();
                tagger
                    .tag_with(&["John", "lives", "in", "Paris"], &features)
                    .unwrap()
                    .into_iter()
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec!["B-PER", "O", "O", "B-LOC"]);
    }
}

const DATA: &str = "B-PER\tword=John\tshape=Xx
O\tword=lives\tshape=x
O\tword=in\tshape=x
B-LOC\tword=Paris\tshape=Xx

B-LOC\tword=Paris\tshape=Xx
O\tword=is\tshape=x
O\tword=nice\tshape=x

B-PER\tword=Mary\tshape=Xx
";

#[test]
fn evaluate_dataset() {
    let model = ner_model();
    let tagger = model.tagger();
    let dataset = Dataset::read(DATA.as_bytes()).unwrap();
    assert_eq!(dataset.len(), 3);

    let mut evaluation = Evaluation::new(model.num_labels());
    for seq in &dataset.seqs {
        let labels = tagger.tag(&seq.items).unwrap();
        assert_eq!(labels.len(), seq.len());
        evaluation.accumulate(&seq.labels, &labels);
    }
    let est = evaluation.evaluate();
    assert!(est.item_accuracy >= 7.0 / 8.0);
    let o = evaluation.label("O").unwrap();
    assert_eq!(o.num_observation, 4);
    assert_eq!(o.num_correct, 4);
    assert!(evaluation.to_string().contains("Item accuracy:"));
}

#[test]
fn encode_dataset_into_new_dictionaries() {
    let dataset = Dataset::read(DATA.as_bytes()).unwrap();
    let mut labels = Quark::new();
    let mut attrs = Quark::new();
    let instances = dataset.encode(&mut labels, &mut attrs);
    assert_eq!(instances.len(), 3);
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.to_str(0), Some("B-PER"));
    assert_eq!(attrs.to_id("word=Mary"), Some(8));
    assert_eq!(instances[1].reference(), Some(vec![2, 1, 1]));
}
