mod mocks;

use std::{path::Path, time::Duration};

use idea_datastore::NewIdea;
use idea_pulse::{
    pipeline::{keys, AppendSink, RunPolicy, StageErrorKind},
    stages::{DOWNLOAD, SYNTHESIZE, TRANSCRIBE},
    yt::search::{SearchOptions, SortOrder, CANDIDATE_FACTOR},
    AudioInput, IdeaProcessor, IdeaProcessorBuilder, IDEA_SYSTEM_PROMPT, IDEA_USER_PROMPT,
};
use mocks::{
    audio_handler::MockAudioHandler, datastore::MockDataStore, searcher::MockSearcher,
    synthesizer::MockSynthesizer, transcriber::MockTranscriber,
};

const IDEA: &str = "## Idea\nA tool that turns lectures into flashcards.";

type TestProcessor =
    IdeaProcessor<MockDataStore, MockTranscriber, MockSynthesizer, MockAudioHandler, MockSearcher>;

fn build_processor(
    workdir: &Path,
    store: MockDataStore,
    transcriber: MockTranscriber,
    synthesizer: MockSynthesizer,
    audio_handler: MockAudioHandler,
    searcher: MockSearcher,
) -> TestProcessor {
    IdeaProcessorBuilder::new(workdir)
        .store(store)
        .transcriber(transcriber)
        .synthesizer(synthesizer)
        .audio_handler(audio_handler)
        .searcher(searcher)
        .search_limit(3)
        .build()
}

fn urls(ids: &[&str]) -> Vec<String> {
    ids.iter()
        .map(|id| format!("https://youtube.com/watch?v={id}"))
        .collect()
}

fn transcript_of(url: &str) -> String {
    format!("transcript of {url}")
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_happy_path_persists_one_idea_for_all_videos() {
    let workdir = tempfile::tempdir().unwrap();
    let store = MockDataStore::default();
    let transcriber = MockTranscriber::default();
    let synthesizer = MockSynthesizer::new(IDEA);
    let audio_handler = MockAudioHandler::default();

    let inserted = store.inserted.clone();
    let transcriber_calls = transcriber.calls.clone();
    let synthesizer_calls = synthesizer.calls.clone();
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        transcriber,
        synthesizer,
        audio_handler,
        MockSearcher::default(),
    );

    let selection = urls(&["a1", "b2", "c3"]);
    let outcome = processor
        .run(&selection, &RunPolicy::default())
        .await
        .expect("Pipeline should succeed");

    assert_eq!(outcome.batch.success_count(), 3);
    assert_eq!(outcome.idea.as_deref(), Some(IDEA));
    assert_eq!(outcome.record_id, Some(1));
    assert!(outcome.synthesis_error.is_none());

    assert_eq!(*audio_calls.lock().unwrap(), selection);
    assert_eq!(transcriber_calls.lock().unwrap().len(), 3);

    let synthesizer_calls = synthesizer_calls.lock().unwrap();
    assert_eq!(synthesizer_calls.len(), 1, "Should synthesize exactly once");
    assert_eq!(synthesizer_calls[0].prompt.system, IDEA_SYSTEM_PROMPT);
    assert_eq!(synthesizer_calls[0].prompt.user, IDEA_USER_PROMPT);
    assert_eq!(
        synthesizer_calls[0].context_texts,
        selection.iter().map(|u| transcript_of(u)).collect::<Vec<_>>(),
        "Transcripts should be passed in selection order"
    );

    let inserted = inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1, "Should insert a single record");
    assert_eq!(
        inserted[0],
        NewIdea::new(
            selection.clone(),
            selection.iter().map(|u| transcript_of(u)).collect::<Vec<_>>().join("\n"),
            IDEA,
        )
    );
}

#[tokio::test]
async fn test_concurrent_run_keeps_selection_order() {
    let workdir = tempfile::tempdir().unwrap();
    let store = MockDataStore::default();
    let audio_handler = MockAudioHandler {
        delay: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let inserted = store.inserted.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    let selection = urls(&["a1", "b2", "c3", "d4", "e5"]);
    let outcome = processor
        .run(&selection, &RunPolicy::default().with_concurrency(3))
        .await
        .unwrap();

    let ids = outcome.batch.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids, selection);
    assert_eq!(inserted.lock().unwrap()[0].video_urls, selection);
}

// ─── Chunking ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chunked_audio_input_when_chunking_enabled() {
    let workdir = tempfile::tempdir().unwrap();
    let transcriber = MockTranscriber::default();
    let transcriber_calls = transcriber.calls.clone();

    let processor = IdeaProcessorBuilder::new(workdir.path())
        .store(MockDataStore::default())
        .transcriber(transcriber)
        .synthesizer(MockSynthesizer::new(IDEA))
        .audio_handler(MockAudioHandler::default())
        .searcher(MockSearcher::default())
        .with_chunking(900)
        .build();

    processor
        .run(&urls(&["a1"]), &RunPolicy::default())
        .await
        .expect("Pipeline should succeed");

    let calls = transcriber_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);

    match &calls[0] {
        AudioInput::Chunked {
            chunk_duration_seconds,
            chunks_dir_path,
            ..
        } => {
            assert_eq!(*chunk_duration_seconds, 900, "Chunk duration should be 900s");
            assert!(
                chunks_dir_path.starts_with(workdir.path().join("scratch")),
                "Chunks should live in the item scratch space"
            );
        }
        AudioInput::File(_) => {
            panic!("Expected Chunked audio input when chunking is enabled");
        }
    }
}

#[tokio::test]
async fn test_whole_file_input_without_chunking() {
    let workdir = tempfile::tempdir().unwrap();
    let transcriber = MockTranscriber::default();
    let transcriber_calls = transcriber.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        transcriber,
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    processor.run(&urls(&["a1"]), &RunPolicy::default()).await.unwrap();

    assert!(matches!(
        transcriber_calls.lock().unwrap()[0],
        AudioInput::File(_)
    ));
}

// ─── Partial failure ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_video_is_isolated_and_left_out_of_record() {
    let workdir = tempfile::tempdir().unwrap();
    let selection = urls(&["a1", "b2", "c3"]);

    let store = MockDataStore::default();
    let transcriber = MockTranscriber::default();
    let audio_handler = MockAudioHandler::failing_for(&selection[1], StageErrorKind::Permanent);

    let inserted = store.inserted.clone();
    let transcriber_calls = transcriber.calls.clone();
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        transcriber,
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    let outcome = processor.run(&selection, &RunPolicy::default()).await.unwrap();

    assert_eq!(outcome.batch.success_count(), 2);
    let error = outcome.batch.get(&selection[1]).unwrap().error().unwrap();
    assert_eq!(error.stage, DOWNLOAD);
    assert_eq!(error.kind, StageErrorKind::Permanent);

    // permanent failures are not retried
    assert_eq!(audio_calls.lock().unwrap().len(), 3);
    assert_eq!(transcriber_calls.lock().unwrap().len(), 2);

    let inserted = inserted.lock().unwrap();
    assert_eq!(
        inserted[0].video_urls,
        vec![selection[0].clone(), selection[2].clone()]
    );
    assert_eq!(
        inserted[0].transcript,
        format!("{}\n{}", transcript_of(&selection[0]), transcript_of(&selection[2]))
    );
}

#[tokio::test]
async fn test_transient_download_failure_is_retried() {
    let workdir = tempfile::tempdir().unwrap();
    let selection = urls(&["a1", "b2"]);

    let audio_handler = MockAudioHandler::flaky_for(&selection[0], 1);
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    let outcome = processor.run(&selection, &RunPolicy::default()).await.unwrap();

    assert_eq!(outcome.batch.success_count(), 2);
    let calls = audio_calls.lock().unwrap();
    assert_eq!(
        calls.iter().filter(|u| **u == selection[0]).count(),
        2,
        "Flaky download should be attempted twice"
    );
    assert_eq!(
        outcome.batch.get(&selection[0]).unwrap().context().unwrap().text(keys::TRANSCRIPT),
        Some(transcript_of(&selection[0]).as_str())
    );
}

#[tokio::test]
async fn test_retry_budget_is_respected() {
    let workdir = tempfile::tempdir().unwrap();
    let selection = urls(&["a1"]);

    let audio_handler = MockAudioHandler::flaky_for(&selection[0], 5);
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    let outcome = processor
        .run(&selection, &RunPolicy::default().with_max_retries(2))
        .await
        .unwrap();

    let error = outcome.batch.get(&selection[0]).unwrap().error().unwrap();
    assert_eq!(error.kind, StageErrorKind::Transient);
    assert_eq!(audio_calls.lock().unwrap().len(), 3);
    assert!(outcome.idea.is_none());
}

#[tokio::test]
async fn test_empty_transcript_fails_item_permanently() {
    let workdir = tempfile::tempdir().unwrap();
    let selection = urls(&["a1", "b2"]);

    let store = MockDataStore::default();
    let inserted = store.inserted.clone();
    let transcriber = MockTranscriber::silent_for(&selection[0]);
    let transcriber_calls = transcriber.calls.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        transcriber,
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let outcome = processor.run(&selection, &RunPolicy::default()).await.unwrap();

    let error = outcome.batch.get(&selection[0]).unwrap().error().unwrap();
    assert_eq!(error.stage, TRANSCRIBE);
    assert_eq!(error.kind, StageErrorKind::Permanent);
    assert_eq!(transcriber_calls.lock().unwrap().len(), 2, "No retry for silence");

    assert_eq!(inserted.lock().unwrap()[0].video_urls, vec![selection[1].clone()]);
}

#[tokio::test]
async fn test_all_videos_failing_skips_synthesis() {
    let workdir = tempfile::tempdir().unwrap();

    let store = MockDataStore::default();
    let synthesizer = MockSynthesizer::new(IDEA);
    let inserted = store.inserted.clone();
    let synthesizer_calls = synthesizer.calls.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        MockTranscriber::failing(StageErrorKind::Permanent),
        synthesizer,
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let outcome = processor
        .run(&urls(&["a1", "b2"]), &RunPolicy::default())
        .await
        .expect("Per video failures should not fail the run");

    assert_eq!(outcome.batch.failure_count(), 2);
    assert_eq!(outcome.batch.failure_report().len(), 2);
    assert!(outcome.idea.is_none());
    assert!(outcome.record_id.is_none());
    assert!(synthesizer_calls.lock().unwrap().is_empty());
    assert!(inserted.lock().unwrap().is_empty());
}

// ─── Synthesis ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_synthesis_failure_keeps_transcripts_and_skips_insert() {
    let workdir = tempfile::tempdir().unwrap();
    let store = MockDataStore::default();
    let inserted = store.inserted.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        MockTranscriber::default(),
        MockSynthesizer::failing(StageErrorKind::Permanent),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let outcome = processor
        .run(&urls(&["a1", "b2"]), &RunPolicy::default())
        .await
        .unwrap();

    assert_eq!(outcome.batch.success_count(), 2);
    let error = outcome.synthesis_error.expect("Synthesis error should be reported");
    assert_eq!(error.stage, SYNTHESIZE);
    assert_eq!(error.kind, StageErrorKind::Permanent);
    assert!(outcome.idea.is_none());
    assert!(inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transient_synthesis_failure_is_retried() {
    let workdir = tempfile::tempdir().unwrap();
    let synthesizer = MockSynthesizer::flaky(IDEA, 1);
    let synthesizer_calls = synthesizer.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        synthesizer,
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let outcome = processor.run(&urls(&["a1"]), &RunPolicy::default()).await.unwrap();

    assert_eq!(outcome.idea.as_deref(), Some(IDEA));
    assert_eq!(outcome.record_id, Some(1));
    assert_eq!(synthesizer_calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_idea_is_not_persisted() {
    let workdir = tempfile::tempdir().unwrap();
    let store = MockDataStore::default();
    let inserted = store.inserted.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        MockTranscriber::default(),
        MockSynthesizer::new("   \n"),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let outcome = processor.run(&urls(&["a1"]), &RunPolicy::default()).await.unwrap();

    assert_eq!(
        outcome.synthesis_error.map(|e| e.kind),
        Some(StageErrorKind::Permanent)
    );
    assert!(inserted.lock().unwrap().is_empty());
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_selection_is_an_error() {
    let workdir = tempfile::tempdir().unwrap();
    let audio_handler = MockAudioHandler::default();
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    assert!(processor.run(&[], &RunPolicy::default()).await.is_err());
    assert!(processor
        .run(&["  ".to_string()], &RunPolicy::default())
        .await
        .is_err());
    assert!(audio_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_urls_are_processed_once() {
    let workdir = tempfile::tempdir().unwrap();
    let audio_handler = MockAudioHandler::default();
    let audio_calls = audio_handler.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        audio_handler,
        MockSearcher::default(),
    );

    let mut selection = urls(&["a1", "b2"]);
    selection.push(selection[0].clone());

    let outcome = processor.run(&selection, &RunPolicy::default()).await.unwrap();
    assert_eq!(outcome.batch.len(), 2);
    assert_eq!(audio_calls.lock().unwrap().len(), 2);
}

// ─── Search & listing ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_uses_configured_limit() {
    let workdir = tempfile::tempdir().unwrap();
    let searcher = MockSearcher::with_videos(&["a1", "b2", "c3", "d4"]);
    let search_calls = searcher.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        searcher,
    );

    let videos = processor.search("rust async").await.unwrap();
    assert_eq!(videos.len(), 3);
    assert_eq!(videos[0].url, "https://youtube.com/watch?v=a1");
    assert_eq!(
        *search_calls.lock().unwrap(),
        vec![("rust async".to_string(), 3)]
    );
}

#[tokio::test]
async fn test_search_with_duration_filter_and_sort() {
    let workdir = tempfile::tempdir().unwrap();
    let mut searcher = MockSearcher::with_videos(&["a1", "b2", "c3", "d4", "e5"]);
    for (video, (duration_seconds, view_count)) in searcher
        .videos
        .iter_mut()
        .zip([(120, 10), (900, 300), (1500, 9_000), (600, 5_000), (700, 50)])
    {
        video.duration_seconds = duration_seconds;
        video.view_count = view_count;
    }
    let search_calls = searcher.calls.clone();

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        searcher,
    );

    let options = SearchOptions::default()
        .with_duration(300, Some(1200))
        .with_sort(SortOrder::Views);
    let videos = processor.search_with("rust async", &options).await.unwrap();

    // three in-range videos in page order are b2, d4 and e5; then by views
    assert_eq!(
        videos.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
        vec!["d4", "b2", "e5"]
    );
    assert_eq!(
        *search_calls.lock().unwrap(),
        vec![("rust async".to_string(), 3 * CANDIDATE_FACTOR)],
        "A duration filter should widen the candidate set"
    );
}

#[tokio::test]
async fn test_transcript_markup_is_cleaned() {
    let workdir = tempfile::tempdir().unwrap();
    let store = MockDataStore::default();
    let inserted = store.inserted.clone();

    let processor = build_processor(
        workdir.path(),
        store,
        MockTranscriber::with_markup(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let selection = urls(&["a1"]);
    let outcome = processor
        .run(&selection, &RunPolicy::default())
        .await
        .unwrap();

    let expected = transcript_of(&selection[0]);
    assert_eq!(
        outcome.batch.artifacts(keys::TRANSCRIPT),
        vec![("https://youtube.com/watch?v=a1", expected.as_str())]
    );
    assert_eq!(inserted.lock().unwrap()[0].transcript, expected);
}

#[tokio::test]
async fn test_search_failure_propagates_error() {
    let workdir = tempfile::tempdir().unwrap();
    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::failing("Search network error"),
    );

    let err = processor.search("rust").await.unwrap_err();
    assert!(
        format!("{err:?}").contains("Search network error"),
        "Error should contain searcher message, got: {err:?}"
    );
}

#[tokio::test]
async fn test_ideas_are_listed_newest_first() {
    let workdir = tempfile::tempdir().unwrap();
    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    processor.run(&urls(&["a1"]), &RunPolicy::default()).await.unwrap();
    processor.run(&urls(&["b2"]), &RunPolicy::default()).await.unwrap();

    let ideas = processor.list_ideas().await.unwrap();
    assert_eq!(ideas.len(), 2);
    assert_eq!(ideas[0].urls(), vec!["https://youtube.com/watch?v=b2"]);
    assert_eq!(ideas[1].urls(), vec!["https://youtube.com/watch?v=a1"]);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_db_insert_failure_propagates_error() {
    let workdir = tempfile::tempdir().unwrap();
    let processor = build_processor(
        workdir.path(),
        MockDataStore::failing("Connection refused"),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );

    let result = processor.run(&urls(&["a1"]), &RunPolicy::default()).await;
    assert!(result.is_err(), "Should propagate DB insert error");
}

#[tokio::test]
async fn test_sink_serializes_concurrent_appends() {
    let store = MockDataStore::slow(Duration::from_millis(20));
    let max_in_flight = store.max_in_flight.clone();
    let inserted = store.inserted.clone();

    let sink = AppendSink::new(store);
    let ideas = (0..5)
        .map(|i| NewIdea::new([format!("https://youtube.com/watch?v={i}")], "t", "i"))
        .collect::<Vec<_>>();

    let results = futures::future::join_all(ideas.iter().map(|idea| sink.append(idea))).await;
    for result in results {
        result.unwrap();
    }

    assert_eq!(inserted.lock().unwrap().len(), 5);
    assert_eq!(
        max_in_flight.load(std::sync::atomic::Ordering::SeqCst),
        1,
        "Only one write may be in flight"
    );
}

// ─── Scratch space ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scratch_space_is_released() {
    let workdir = tempfile::tempdir().unwrap();
    let scratch_root = workdir.path().join("scratch");

    let processor = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::failing_for("https://youtube.com/watch?v=b2", StageErrorKind::Permanent),
        MockSearcher::default(),
    );

    processor
        .run(&urls(&["a1", "b2"]), &RunPolicy::default())
        .await
        .unwrap();

    let leftovers = std::fs::read_dir(&scratch_root)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "Item scratch directories should be removed");

    drop(processor);
    assert!(scratch_root.exists());
    assert_eq!(std::fs::read_dir(&scratch_root).unwrap().count(), 0);
}

#[tokio::test]
async fn test_processors_sharing_a_workdir_keep_their_scratch() {
    let workdir = tempfile::tempdir().unwrap();

    let first = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler::default(),
        MockSearcher::default(),
    );
    let second = build_processor(
        workdir.path(),
        MockDataStore::default(),
        MockTranscriber::default(),
        MockSynthesizer::new(IDEA),
        MockAudioHandler {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        },
        MockSearcher::default(),
    );

    first
        .run(&urls(&["a1"]), &RunPolicy::default())
        .await
        .unwrap();

    // the first processor goes away while the second is mid-download
    let second_urls = urls(&["b2"]);
    let second_policy = RunPolicy::default();
    let (outcome, _) = tokio::join!(
        second.run(&second_urls, &second_policy),
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(first);
        }
    );

    let outcome = outcome.unwrap();
    assert_eq!(outcome.batch.success_count(), 1);
    assert_eq!(outcome.idea.as_deref(), Some(IDEA));
}
