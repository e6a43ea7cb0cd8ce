use std::sync::Arc;
use std::time::Duration;

use docload::cipher;
use docload::handoff::Readiness;
use docload::pipeline::Stage;
use docload::source::{MemoryAssets, Sources};
use docload::test_utils::test_helpers::{RecordingRenderer, recording_listener, serve_once};
use docload::{
    AnalyticsEvent, DisplayOptions, ErrorKind, LoadOutcome, LoadPipeline, LoadRequest,
    LoadService, ReadingAnalytics, StreamEndpoint, deliver,
};
use tempfile::TempDir;

fn sample_document(len: usize) -> Vec<u8> {
    b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<<>>\nendobj\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

#[test]
fn encrypted_file_round_trips_through_pipeline() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("doc.pdf");
    let original = sample_document(16);

    let mut encrypted = original.clone();
    cipher::apply(&mut encrypted, "ab").unwrap();
    std::fs::write(&path, &encrypted).unwrap();

    let pipeline = LoadPipeline::default();
    let (result, state) = pipeline.run_traced(LoadRequest::from_file(&path).with_key("ab"));
    let loaded = result.unwrap();

    assert_eq!(loaded.bytes.len(), 16);
    assert_eq!(loaded.bytes, original);
    assert_eq!(state.stage(), Stage::Complete);

    // Byte i of the file was XORed with "ab"[i % 2].
    for (i, (plain, cipher_byte)) in original.iter().zip(&encrypted).enumerate() {
        assert_eq!(plain ^ b"ab"[i % 2], *cipher_byte);
    }
}

#[test]
fn streamed_bytes_arrive_verbatim_without_cipher() {
    let payload = sample_document(1024);
    let (port, server) = serve_once(payload.clone(), 97);

    let sources = Sources::new(
        Arc::new(MemoryAssets::default()),
        Some(Duration::from_secs(5)),
    );
    let request = LoadRequest::from_stream(StreamEndpoint::new("127.0.0.1", port, 1024));
    let (result, state) = LoadPipeline::new(sources).run_traced(request);
    server.join().unwrap();

    let loaded = result.unwrap();
    assert_eq!(loaded.bytes, payload);
    assert!(!loaded.decrypted);
    assert!(!state.visited().contains(&Stage::Decrypting));
}

#[test]
fn truncated_stream_never_succeeds() {
    let (port, server) = serve_once(sample_document(6), 3);

    let sources = Sources::new(
        Arc::new(MemoryAssets::default()),
        Some(Duration::from_secs(5)),
    );
    let request =
        LoadRequest::from_stream(StreamEndpoint::new("127.0.0.1", port, 10)).with_key("k");
    let err = LoadPipeline::new(sources).run(request).unwrap_err();
    server.join().unwrap();

    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn encrypted_asset_is_decrypted() {
    let original = sample_document(333);
    let mut encrypted = original.clone();
    cipher::apply(&mut encrypted, "s3cret").unwrap();

    let mut assets = MemoryAssets::default();
    assets.insert("books/guide.pdf", encrypted).unwrap();
    let pipeline = LoadPipeline::new(Sources::new(Arc::new(assets), None));

    let loaded = pipeline
        .run(LoadRequest::from_asset("books/guide.pdf").with_key("s3cret"))
        .unwrap();
    assert_eq!(loaded.bytes, original);
}

#[test]
fn service_result_reaches_renderer() {
    let original = sample_document(64);
    let mut encrypted = original.clone();
    cipher::apply(&mut encrypted, "xyz").unwrap();

    let display = DisplayOptions {
        night_mode: true,
        pages: Some(vec![0, 1]),
        ..DisplayOptions::default()
    };
    let mut service = LoadService::new(LoadPipeline::default());
    service
        .submit(
            LoadRequest::from_bytes(encrypted)
                .with_key("xyz")
                .with_password("owner")
                .with_display(display.clone()),
        )
        .unwrap();

    let response = service.wait_next().unwrap();
    assert!(matches!(response.outcome, LoadOutcome::Complete(_)));

    let mut renderer = RecordingRenderer::with_pages(2);
    let (listener, signals) = recording_listener();
    let pages = deliver(response.outcome, &mut renderer, listener, None).unwrap();

    assert_eq!(pages, 2);
    let shown = &renderer.displayed()[0];
    assert_eq!(shown.bytes, original);
    assert_eq!(shown.password.as_deref(), Some("owner"));
    assert_eq!(shown.options, display);
    assert_eq!(
        signals.try_iter().collect::<Vec<_>>(),
        vec![Readiness::Ready { page_count: 2 }]
    );
}

#[test]
fn concurrent_requests_are_independent() {
    let tmp = TempDir::new().unwrap();
    let mut service = LoadService::new(LoadPipeline::default());
    let mut expected = Vec::new();

    for i in 0..8u8 {
        let path = tmp.path().join(format!("doc{i}.pdf"));
        let content = vec![i; 100 + usize::from(i)];
        std::fs::write(&path, &content).unwrap();
        let id = service.submit(LoadRequest::from_file(path)).unwrap();
        expected.push((id, content));
    }
    let missing = service
        .submit(LoadRequest::from_file(tmp.path().join("absent.pdf")))
        .unwrap();

    let mut seen = 0;
    while let Some(response) = service.wait_next() {
        seen += 1;
        if response.id == missing {
            assert!(
                matches!(response.outcome, LoadOutcome::Failed(ref e) if e.kind() == ErrorKind::Io)
            );
            continue;
        }
        let (_, content) = expected.iter().find(|(id, _)| *id == response.id).unwrap();
        match response.outcome {
            LoadOutcome::Complete(loaded) => assert_eq!(&loaded.bytes, content),
            LoadOutcome::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }
    assert_eq!(seen, 9);
}

#[test]
fn delivered_document_feeds_reading_analytics() {
    let mut assets = MemoryAssets::default();
    assets.insert("guide.pdf", sample_document(48)).unwrap();
    let mut service = LoadService::new(LoadPipeline::new(Sources::new(Arc::new(assets), None)));

    let display = DisplayOptions {
        pages: Some(vec![10, 20, 30]),
        ..DisplayOptions::default()
    };
    service
        .submit(
            LoadRequest::from_asset("guide.pdf")
                .with_document_id("guide")
                .with_display(display),
        )
        .unwrap();
    let response = service.wait_next().unwrap();

    let analytics = ReadingAnalytics::new();
    let mut renderer = RecordingRenderer::with_pages(3);
    let (listener, _signals) = recording_listener();
    deliver(response.outcome, &mut renderer, listener, Some(&analytics)).unwrap();

    analytics.handle(AnalyticsEvent::PageChanged(2));
    for _ in 0..4 {
        analytics.tick(Duration::from_millis(500));
    }

    let records = analytics.records(Some("guide")).unwrap();
    assert_eq!(records.pages.get(&30), Some(&1500));
    assert_eq!(records.pages.len(), 1);
}

#[test]
fn oversized_stream_length_fails_instead_of_hanging() {
    let (port, server) = serve_once(sample_document(64), 16);

    let sources = Sources::new(
        Arc::new(MemoryAssets::default()),
        Some(Duration::from_secs(5)),
    );
    let mut service = LoadService::new(LoadPipeline::new(sources));
    let id = service
        .submit(LoadRequest::from_stream(StreamEndpoint::new(
            "127.0.0.1",
            port,
            usize::MAX,
        )))
        .unwrap();

    let response = service
        .response_receiver()
        .recv_timeout(Duration::from_secs(10))
        .unwrap();
    server.join().unwrap();

    assert_eq!(response.id, id);
    assert!(matches!(response.outcome, LoadOutcome::Failed(ref e) if e.kind() == ErrorKind::Io));
}
