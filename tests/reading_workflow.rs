use std::fs;
use std::path::Path;

use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

use mokuyomi::parsing::ingest_volume;
use mokuyomi::storage::Database;
use mokuyomi::text::LexiconTokenizer;
use mokuyomi::{ContextSynchronizer, ReaderSession, SyncOutcome, SyncSink, SyncSummary, ViewMode, VocabularyService};

const LEXICON: &str = r#"
[[entry]]
surface = "猫"
lemma = "猫"
reading = "ねこ"
pos = "NOUN"

[[entry]]
surface = "走った"
lemma = "走る"
reading = "はしった"
pos = "VERB"

[[entry]]
surface = "走る"
lemma = "走る"
reading = "はしる"
pos = "VERB"
"#;

struct AlwaysYes {
    progress: Vec<(usize, usize)>,
    messages: Vec<String>,
}

impl SyncSink for AlwaysYes {
    fn confirm(&mut self, _title: &str, _prompt: &str) -> bool {
        true
    }

    fn notify_progress(&mut self, done: usize, total: usize) {
        self.progress.push((done, total));
    }

    fn notify_info(&mut self, _title: &str, message: &str) {
        self.messages.push(message.to_string());
    }

    fn notify_error(&mut self, title: &str, _message: &str) {
        panic!("unexpected error notification: {title}");
    }
}

/// Cover (landscape), a two-page spread, then a final portrait page.
#[fixture]
fn library() -> TempDir {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("neko-vol1");
    fs::create_dir(&dir).unwrap();
    for image in ["p0.jpg", "p1.jpg", "p2.jpg", "p3.jpg"] {
        fs::write(dir.join(image), b"").unwrap();
    }
    let page = |img: &str, w: u32, h: u32, blocks: serde_json::Value| {
        json!({ "img_path": img, "img_width": w, "img_height": h, "blocks": blocks })
    };
    let mokuro = json!({
        "pages": [
            page("p0.jpg", 1600, 1200, json!([])),
            page("p1.jpg", 800, 1200, json!([{ "box": [0, 0, 100, 300], "lines": ["猫が", "走った"] }])),
            page("p2.jpg", 800, 1200, json!([
                { "box": [0, 0, 100, 300], "lines": ["猫だ"] },
                { "box": [200, 0, 300, 300], "lines": ["また走る"] }
            ])),
            page("p3.jpg", 800, 1200, json!([{ "box": [0, 0, 100, 100], "lines": ["猫！"] }]))
        ]
    });
    fs::write(dir.join("neko-vol1.mokuro"), mokuro.to_string()).unwrap();
    fs::write(root.path().join("lexicon.toml"), LEXICON).unwrap();
    root
}

fn volume_dir(root: &TempDir) -> std::path::PathBuf {
    root.path().join("neko-vol1")
}

fn service(root: &Path) -> VocabularyService<LexiconTokenizer> {
    let tokenizer = LexiconTokenizer::load(&root.join("lexicon.toml")).unwrap();
    VocabularyService::new(Database::open(&root.join("db/vocab.db")).unwrap(), tokenizer)
}

#[rstest]
fn spreads_follow_page_shapes(library: TempDir) {
    let volume = ingest_volume(&volume_dir(&library)).unwrap();
    assert_eq!(volume.title, "neko-vol1");

    let mut session = ReaderSession::new(ViewMode::Double);
    session.open_volume(volume).unwrap();
    let mut spreads = Vec::new();
    loop {
        spreads.push(session.visible_pages().unwrap().iter().map(|p| p.page_number).collect::<Vec<_>>());
        if !session.next_page().unwrap() {
            break;
        }
    }
    assert_eq!(spreads, vec![vec![0], vec![1, 2], vec![3]]);
}

#[rstest]
fn track_then_sync_finds_remaining_appearances(library: TempDir) {
    let volume = ingest_volume(&volume_dir(&library)).unwrap();
    let service = service(library.path());

    let block = &volume.get_page(1).unwrap().blocks[0];
    let (word, first) = service
        .track_word_from_surface("猫", volume.path(), 1, &block.crop, &block.full_text())
        .unwrap()
        .unwrap();
    assert_eq!(word.lemma, "猫");
    assert_eq!(first.unwrap().sentence_text, "猫が走った");

    let synchronizer = ContextSynchronizer::new(&service, LexiconTokenizer::load(&library.path().join("lexicon.toml")).unwrap());
    let mut sink = AlwaysYes { progress: Vec::new(), messages: Vec::new() };
    let outcome = synchronizer.synchronize(Some(&volume), &mut sink).unwrap();

    // page 1 was already recorded by tracking; pages 2 and 3 are new
    assert_eq!(outcome, SyncOutcome::Completed(SyncSummary { new_appearances: 2, words_with_hits: 1 }));
    assert_eq!(sink.progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);

    let pages: Vec<_> = service.list_appearances(word.id).unwrap().iter().map(|a| a.page_index).collect();
    assert_eq!(pages, vec![1, 2, 3]);

    // a second run over a reopened database adds nothing
    drop(synchronizer);
    drop(service);
    let service = self::service(library.path());
    let synchronizer = ContextSynchronizer::new(&service, LexiconTokenizer::load(&library.path().join("lexicon.toml")).unwrap());
    let mut sink = AlwaysYes { progress: Vec::new(), messages: Vec::new() };
    let outcome = synchronizer.synchronize(Some(&volume), &mut sink).unwrap();
    assert_eq!(outcome, SyncOutcome::Completed(SyncSummary::default()));
    assert_eq!(sink.messages, vec!["No new context appearances were found in this volume.".to_string()]);
}

#[rstest]
fn context_overlay_jumps_to_appearance_and_back(library: TempDir) {
    let volume = ingest_volume(&volume_dir(&library)).unwrap();
    let mut session = ReaderSession::new(ViewMode::Double);
    session.open_volume(volume).unwrap();
    session.next_page().unwrap();

    session.enter_context(Some(2)).unwrap();
    assert_eq!(session.view_mode(), ViewMode::Single);
    assert_eq!(session.select_appearance(3).unwrap(), 3);

    session.exit_context();
    assert_eq!(session.view_mode(), ViewMode::Double);
    assert_eq!(session.current_page(), 1);
    // double mode lands on the spread that holds page 2
    assert_eq!(session.select_appearance(2).unwrap(), 1);
}

#[rstest]
fn opened_volumes_land_on_the_library_shelf(library: TempDir) {
    let db = Database::open(&library.path().join("db/vocab.db")).unwrap();
    let volume = ingest_volume(&volume_dir(&library)).unwrap();

    let shelved = db.register_volume(&volume).unwrap();
    assert_eq!(shelved.title, "neko-vol1");
    assert!(shelved.cover_image_path.unwrap().ends_with("p0.jpg"));

    let mut session = ReaderSession::new(ViewMode::Double);
    session.open_volume(volume).unwrap();
    session.next_page().unwrap();
    db.save_reading_position(session.volume().unwrap().path(), session.current_page()).unwrap();
    db.rename_library_volume(&volume_dir(&library), "Neko, volume 1").unwrap();

    // reopening refreshes the entry but keeps the reader's title and position
    let reopened = ingest_volume(&volume_dir(&library)).unwrap();
    let again = db.register_volume(&reopened).unwrap();
    assert_eq!(again.title, "Neko, volume 1");
    assert_eq!(again.last_page_read, 1);

    db.remove_library_volume(&volume_dir(&library)).unwrap();
    assert!(db.list_library_volumes().unwrap().is_empty());
}
