use packetflow::core::{HandlerRef, Inputs, Outputs};
use packetflow::engine::{Graph, RuntimeConfig};
use packetflow::file::{FileRecord, MediaTypes, Walker};
use packetflow::registry::HandlerRegistry;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;
use tokio::time::Duration;

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.json"), r#"{"k": 1}"#).unwrap();
    fs::write(dir.path().join("b.txt"), "plain text").unwrap();
    fs::write(dir.path().join(".hidden.json"), "{}").unwrap();
    fs::write(dir.path().join("LICENSE"), "MIT").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("c.JSON"), r#"[1, 2]"#).unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git").join("config.json"), "{}").unwrap();
    dir
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        component_timeout: Some(Duration::from_millis(300)),
        ..RuntimeConfig::default()
    }
}

fn records() -> (HandlerRef, Rc<RefCell<Vec<FileRecord>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let handler = HandlerRef::local(move |input: &Inputs, _: &Outputs| {
        while let Some(ip) = input.port("in").and_then(|p| p.read()) {
            log.borrow_mut().push(FileRecord::from_value(ip.into_data()).unwrap());
        }
    });
    (handler, seen)
}

fn sorted_paths(seen: &Rc<RefCell<Vec<FileRecord>>>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = seen.borrow().iter().map(|r| r.path.clone()).collect();
    paths.sort();
    paths
}

#[tokio::test]
async fn test_walker_skips_hidden_and_license() {
    let dir = fixture();
    let mut graph = Graph::new(config());
    let walker = graph.load("walker").unwrap();
    graph
        .initialize(&walker, json!({"base": dir.path().to_str().unwrap()}))
        .unwrap();
    let (handler, seen) = records();
    let sink = graph.load(handler).unwrap();
    graph
        .connect(&walker, "out", &sink, "in", 0, Some(Duration::from_secs(1)))
        .unwrap();

    graph.run(|| {}).await.unwrap();

    assert_eq!(
        sorted_paths(&seen),
        vec![
            PathBuf::from("a.json"),
            PathBuf::from("b.txt"),
            PathBuf::from("sub").join("c.JSON"),
        ]
    );
    let nested = seen
        .borrow()
        .iter()
        .find(|r| r.name == "c.JSON")
        .cloned()
        .unwrap();
    assert_eq!(nested.level, 1);
    assert_eq!(nested.media_type.as_deref(), Some("application/json"));
    assert_eq!(nested.base, dir.path());
}

#[tokio::test]
async fn test_walker_mask_then_reader_parses_json() {
    let dir = fixture();
    let mut graph = Graph::new(config());
    let walker = graph.load("walker").unwrap();
    graph
        .initialize(
            &walker,
            json!({"base": dir.path().to_str().unwrap(), "mask": r"\.json$"}),
        )
        .unwrap();
    let reader = graph.load("reader").unwrap();
    let (handler, seen) = records();
    let sink = graph.load(handler).unwrap();
    let timeout = Some(Duration::from_secs(1));
    graph.connect(&walker, "out", &reader, "in", 0, timeout).unwrap();
    graph.connect(&reader, "out", &sink, "in", 0, timeout).unwrap();

    graph.run(|| {}).await.unwrap();

    assert_eq!(
        sorted_paths(&seen),
        vec![PathBuf::from("a.json"), PathBuf::from("sub").join("c.JSON")]
    );
    let contents: Vec<Value> = {
        let mut records = seen.borrow().clone();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records.into_iter().map(|r| r.contents.unwrap()).collect()
    };
    assert_eq!(contents, vec![json!({"k": 1}), json!([1, 2])]);
}

#[tokio::test]
async fn test_reader_keeps_text_and_skips_missing_files() {
    let dir = fixture();
    let media = MediaTypes::standard();
    let text = FileRecord::new(dir.path(), &dir.path().join("b.txt"), 0, &media).unwrap();
    let missing = FileRecord::new(dir.path(), &dir.path().join("gone.txt"), 0, &media).unwrap();

    let mut graph = Graph::new(config());
    let source = graph
        .load(HandlerRef::local(move |_: &Inputs, output: &Outputs| {
            output.send(missing.to_value());
            output.send(text.to_value());
            output.close();
        }))
        .unwrap();
    let reader = graph.load("reader").unwrap();
    let (handler, seen) = records();
    let sink = graph.load(handler).unwrap();
    let timeout = Some(Duration::from_secs(1));
    graph.connect(&source, "out", &reader, "in", 0, timeout).unwrap();
    graph.connect(&reader, "out", &sink, "in", 0, timeout).unwrap();

    graph.run(|| {}).await.unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "b.txt");
    assert_eq!(seen[0].contents, Some(json!("plain text")));
}

#[tokio::test]
async fn test_walker_with_shared_media_table() {
    let dir = fixture();
    let media = Rc::new(MediaTypes::new().with("text/x-note", &["txt"]));
    let mut graph = Graph::new(config());
    let walker = graph
        .load(HandlerRef::local(Walker::new(media.clone())))
        .unwrap();
    graph
        .initialize(&walker, json!({"base": dir.path().to_str().unwrap(), "mask": "txt$"}))
        .unwrap();
    let (handler, seen) = records();
    let sink = graph.load(handler).unwrap();
    graph
        .connect(&walker, "out", &sink, "in", 0, Some(Duration::from_secs(1)))
        .unwrap();

    graph.run(|| {}).await.unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].media_type.as_deref(), Some("text/x-note"));
}

#[tokio::test]
async fn test_registered_walker_uses_injected_media_table() {
    let dir = fixture();
    let media = Rc::new(MediaTypes::new().with("text/x-note", &["txt"]));
    let mut graph = Graph::with_registry(config(), HandlerRegistry::with_media(media));
    let walker = graph.load("walker").unwrap();
    graph
        .initialize(&walker, json!({"base": dir.path().to_str().unwrap(), "mask": "txt$"}))
        .unwrap();
    let (handler, seen) = records();
    let sink = graph.load(handler).unwrap();
    graph
        .connect(&walker, "out", &sink, "in", 0, Some(Duration::from_secs(1)))
        .unwrap();

    graph.run(|| {}).await.unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].media_type.as_deref(), Some("text/x-note"));
}
