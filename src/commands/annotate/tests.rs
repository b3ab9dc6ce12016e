use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::time::Duration;

use serde_json::{Value, json};

use super::debug::DebugCapture;
use super::orchestrator::{Orchestrator, OrchestratorConfig, plan_work};
use super::prompts::{CLASSIFY_SYSTEM_PROMPT, REPAIR_SYSTEM_PROMPT};
use super::response::extract_json_array;
use super::retry::tests::RecordingPause;
use crate::classifier::{Classifier, ClassifierError, CompletionRequest};
use crate::model::RawComment;
use crate::normalize::Normalizer;
use crate::store::AnnotatedStore;

#[derive(Default)]
struct ScriptedClassifier {
    script: RefCell<VecDeque<Result<String, ClassifierError>>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedClassifier {
    fn new(script: Vec<Result<String, ClassifierError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Classifier for ScriptedClassifier {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError> {
        self.requests.borrow_mut().push(request.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifierError::Transport("script exhausted".to_string())))
    }
}

#[derive(Default)]
struct EchoClassifier {
    calls: RefCell<usize>,
}

impl Classifier for EchoClassifier {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError> {
        *self.calls.borrow_mut() += 1;
        let embedded = extract_json_array(&request.user)
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;
        let inputs: Vec<Value> = serde_json::from_str(embedded)
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;

        let answers = inputs
            .iter()
            .map(|input| {
                json!({
                    "id": input["id"],
                    "sentiment": "negative",
                    "intent": "constructive_criticism",
                    "emotion_intensity": 0.5,
                    "key_topics": ["Pacing", "audio mix"]
                })
            })
            .collect::<Vec<_>>();
        Ok(format!("```json\n{}\n```", Value::Array(answers)))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: AnnotatedStore,
    debug: DebugCapture,
    debug_dir: std::path::PathBuf,
    normalizer: Normalizer,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let debug_dir = dir.path().join("debug");
        Self {
            store: AnnotatedStore::new(dir.path().join("annotated.json")),
            debug: DebugCapture::new(&debug_dir),
            debug_dir,
            normalizer: Normalizer::new().expect("normalizer should build"),
            _dir: dir,
        }
    }

    fn orchestrator<'a>(
        &'a self,
        classifier: &'a dyn Classifier,
        config: OrchestratorConfig,
    ) -> Orchestrator<'a> {
        Orchestrator::new(classifier, &self.normalizer, &self.store, &self.debug, config)
    }

    fn debug_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.debug_dir) else {
            return Vec::new();
        };
        let mut names = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(ToOwned::to_owned))
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

fn config(batch_size: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size,
        max_retries: 2,
        repair_enabled: true,
        batch_pause: Duration::from_millis(500),
        max_response_tokens: 3500,
    }
}

fn raw(id: &str, text: &str) -> RawComment {
    RawComment {
        comment_id: id.to_string(),
        text: text.to_string(),
        author: Some("viewer".to_string()),
        published_at: "2024-03-04T10:00:00Z".to_string(),
        like_count: Some(3),
        video_id: Some("v1".to_string()),
        video_title: Some("Episode 1".to_string()),
        extra: Default::default(),
    }
}

fn ids_of(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row["comment_id"].as_str().map(ToOwned::to_owned))
        .collect()
}

#[test]
fn second_run_over_same_input_adds_nothing_and_keeps_content() {
    let harness = Harness::new();
    let classifier = EchoClassifier::default();
    let comments = (1..=5)
        .map(|n| raw(&format!("c{n}"), "too slow"))
        .collect::<Vec<_>>();

    let orchestrator = harness.orchestrator(&classifier, config(2));
    let first = orchestrator
        .run(&comments, Vec::new(), &mut RecordingPause::default())
        .expect("first run should succeed");
    assert_eq!(first.counts.comments_added, 5);
    assert_eq!(first.counts.batches_total, 3);
    assert_eq!(*classifier.calls.borrow(), 3);

    let reloaded = harness.store.load().expect("persisted annotations should load");
    assert_eq!(reloaded.rows, first.annotated);

    let second = orchestrator
        .run(&comments, reloaded.rows, &mut RecordingPause::default())
        .expect("second run should succeed");
    assert_eq!(second.counts.remaining, 0);
    assert_eq!(second.counts.comments_added, 0);
    assert_eq!(*classifier.calls.borrow(), 3);
    assert_eq!(second.annotated, first.annotated);
    assert_eq!(ids_of(&second.annotated), vec!["c1", "c2", "c3", "c4", "c5"]);
}

#[test]
fn merged_rows_keep_raw_fields_and_normalized_classification() {
    let harness = Harness::new();
    let classifier = EchoClassifier::default();
    let mut comment = raw("c1", "the mix is muddy");
    comment
        .extra
        .insert("channel".to_string(), json!("@someone"));

    let outcome = harness
        .orchestrator(&classifier, config(10))
        .run(&[comment], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    let row = &outcome.annotated[0];
    assert_eq!(row["comment_id"], "c1");
    assert_eq!(row["text"], "the mix is muddy");
    assert_eq!(row["video_title"], "Episode 1");
    assert_eq!(row["channel"], "@someone");
    assert_eq!(row["sentiment"], "negative");
    assert_eq!(row["intent"], "constructive_criticism");
    assert_eq!(row["emotion_intensity"], 0.5);
    assert_eq!(row["key_topics"], json!(["pacing", "audio_mix"]));
}

#[test]
fn resume_skips_ids_from_both_historical_key_names() {
    let comments = vec![raw("a", "x"), raw("b", "y"), raw("c", "z"), raw("", "no id")];
    let previously = vec![json!({"comment_id": "a"}), json!({"id": "b"})];

    let plan = plan_work(&comments, &previously);
    let remaining = plan
        .remaining
        .iter()
        .map(|comment| comment.comment_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec!["c"]);
    assert_eq!(plan.recognized_ids, 2);
}

#[test]
fn duplicate_raw_ids_are_only_queued_once() {
    let comments = vec![raw("a", "first"), raw("a", "again"), raw("b", "other")];
    let plan = plan_work(&comments, &[]);
    assert_eq!(plan.remaining.len(), 2);
    assert_eq!(plan.remaining[0].text, "first");
}

#[test]
fn fenced_upper_case_response_is_normalized() {
    let harness = Harness::new();
    let payload = json!([{
        "id": "x1",
        "sentiment": "POSITIVE",
        "intent": "Praise",
        "emotion_intensity": "0.8",
        "key_topics": ["Great Editing"]
    }]);
    let classifier = ScriptedClassifier::new(vec![Ok(format!("```json\n{payload}\n```"))]);

    let outcome = harness
        .orchestrator(&classifier, config(10))
        .run(&[raw("x1", "love it")], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    assert_eq!(outcome.annotated.len(), 1);
    assert_eq!(outcome.annotated[0]["sentiment"], "positive");
    assert_eq!(outcome.annotated[0]["intent"], "praise");
    assert_eq!(outcome.annotated[0]["emotion_intensity"], 0.8);
    assert_eq!(outcome.annotated[0]["key_topics"], json!(["great_editing"]));

    let requests = classifier.requests.borrow();
    assert_eq!(requests[0].system, CLASSIFY_SYSTEM_PROMPT);
    assert_eq!(requests[0].max_tokens, 3500);
}

#[test]
fn unknown_and_repeated_ids_are_discarded() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![Ok(json!([
        {"id": "a", "sentiment": "neutral"},
        {"id": "ghost", "sentiment": "negative"},
        {"id": "a", "sentiment": "positive"},
        {"sentiment": "positive"}
    ])
    .to_string())]);

    let outcome = harness
        .orchestrator(&classifier, config(10))
        .run(&[raw("a", "hm"), raw("b", "ok")], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    assert_eq!(ids_of(&outcome.annotated), vec!["a"]);
    assert_eq!(outcome.annotated[0]["sentiment"], "neutral");
    assert_eq!(outcome.counts.comments_added, 1);
    assert_eq!(outcome.counts.ids_discarded, 3);
}

#[test]
fn repair_pass_recovers_malformed_output() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![
        Ok("[{\"id\": \"a\", \"sentiment\": \"negative\",}]".to_string()),
        Ok("[{\"id\": \"a\", \"sentiment\": \"negative\"}]".to_string()),
    ]);

    let outcome = harness
        .orchestrator(&classifier, config(10))
        .run(&[raw("a", "meh")], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    assert_eq!(outcome.counts.batches_succeeded, 1);
    assert_eq!(outcome.annotated[0]["sentiment"], "negative");

    let requests = classifier.requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].system, REPAIR_SYSTEM_PROMPT);
    assert!(requests[1].user.contains("\"sentiment\": \"negative\",}"));
    assert!(harness.debug_files().is_empty());
}

#[test]
fn failed_repair_abandons_batch_captures_artifacts_and_continues() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![
        Ok("I cannot classify these.".to_string()),
        Ok("Still no JSON, sorry.".to_string()),
        Ok(json!([{"id": "b", "intent": "question"}]).to_string()),
    ]);
    let mut pause = RecordingPause::default();

    let outcome = harness
        .orchestrator(&classifier, config(1))
        .run(&[raw("a", "?"), raw("b", "when?")], Vec::new(), &mut pause)
        .expect("run should continue past the bad batch");

    assert_eq!(outcome.counts.batches_abandoned, 1);
    assert_eq!(outcome.counts.batches_succeeded, 1);
    assert_eq!(ids_of(&outcome.annotated), vec!["b"]);
    assert_eq!(classifier.request_count(), 3);
    assert_eq!(pause.pauses, vec![Duration::from_millis(500)]);
    assert_eq!(outcome.warnings.len(), 1);

    let files = harness.debug_files();
    assert_eq!(files.len(), 2);
    assert!(files[0].starts_with("classifier_bad_json_attempt1_"));
    assert!(files[1].starts_with("classifier_repair_failed_attempt1_"));
    assert!(outcome.warnings[0].contains("(raw output: "));
    assert!(outcome.warnings[0].contains(&files[0]));
    assert!(outcome.warnings[0].contains(&files[1]));
}

#[test]
fn disabled_repair_abandons_without_second_request() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![Ok("not json".to_string())]);
    let mut cfg = config(10);
    cfg.repair_enabled = false;

    let outcome = harness
        .orchestrator(&classifier, cfg)
        .run(&[raw("a", "x")], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    assert_eq!(outcome.counts.batches_abandoned, 1);
    assert_eq!(classifier.request_count(), 1);
    let files = harness.debug_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("classifier_bad_json_attempt1_"));
}

#[test]
fn transport_failures_back_off_then_skip_batch_only() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![
        Err(ClassifierError::Transport("connection reset".to_string())),
        Err(ClassifierError::Api {
            status: 529,
            body: "overloaded".to_string(),
        }),
        Err(ClassifierError::Transport("timeout".to_string())),
        Ok(json!([{"id": "b", "sentiment": "positive"}]).to_string()),
    ]);
    let mut pause = RecordingPause::default();

    let outcome = harness
        .orchestrator(&classifier, config(1))
        .run(&[raw("a", "x"), raw("b", "y")], Vec::new(), &mut pause)
        .expect("run should survive transport failures");

    assert_eq!(outcome.counts.batches_skipped, 1);
    assert_eq!(outcome.counts.batches_succeeded, 1);
    assert_eq!(ids_of(&outcome.annotated), vec!["b"]);
    assert_eq!(
        pause.pauses,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_millis(500)
        ]
    );
    assert!(outcome.warnings[0].contains("retry budget exhausted after 3 attempts"));
}

#[test]
fn transient_failure_then_success_merges_batch() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![
        Err(ClassifierError::Transport("reset".to_string())),
        Ok(json!([{"id": "a", "sentiment": "negative"}]).to_string()),
    ]);

    let outcome = harness
        .orchestrator(&classifier, config(10))
        .run(&[raw("a", "x")], Vec::new(), &mut RecordingPause::default())
        .expect("run should succeed");

    assert_eq!(outcome.counts.batches_succeeded, 1);
    assert_eq!(outcome.counts.batches_skipped, 0);
    assert_eq!(classifier.request_count(), 2);
}

#[test]
fn annotations_are_persisted_after_each_successful_batch() {
    let harness = Harness::new();
    let classifier = ScriptedClassifier::new(vec![
        Ok(json!([{"id": "a", "sentiment": "positive"}]).to_string()),
        Err(ClassifierError::Transport("down".to_string())),
        Err(ClassifierError::Transport("down".to_string())),
        Err(ClassifierError::Transport("down".to_string())),
    ]);
    let previously = vec![json!({"comment_id": "old", "sentiment": "neutral", "legacy_field": 1})];

    let outcome = harness
        .orchestrator(&classifier, config(1))
        .run(&[raw("a", "x"), raw("b", "y")], previously, &mut RecordingPause::default())
        .expect("run should succeed");

    let persisted = harness.store.load().expect("store should load");
    assert_eq!(ids_of(&persisted.rows), vec!["old", "a"]);
    assert_eq!(persisted.rows[0]["legacy_field"], 1);
    assert_eq!(persisted.rows, outcome.annotated);
}
