//! Every completion call is wrapped in one `llm.request` span whose fields are
//! filled in after the call returns.

use promptgrid_core::errors::ProviderFailure;
use promptgrid_core::providers::llm::fake::FakeProvider;
use promptgrid_core::{CompletionClient, RequestGate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl MockWriter {
    fn output(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }
}

fn setup_capture() -> (MockWriter, tracing::subscriber::DefaultGuard) {
    let writer = MockWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .finish();
    (writer, tracing::subscriber::set_default(subscriber))
}

/// Span fields of the closed `llm.request` span.
fn closed_request_span(output: &str) -> serde_json::Map<String, serde_json::Value> {
    output
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter(|v| v.pointer("/fields/message").and_then(|m| m.as_str()) == Some("close"))
        .filter_map(|v| v.get("span").and_then(|s| s.as_object()).cloned())
        .find(|s| s.get("name").and_then(|n| n.as_str()) == Some("llm.request"))
        .expect("llm.request span closed")
}

fn client(provider: FakeProvider) -> CompletionClient {
    CompletionClient::new(Arc::new(RequestGate::unpaced(1)), Duration::from_secs(5))
        .with_model("modelZ", Arc::new(provider))
}

#[tokio::test]
async fn success_records_provider_and_observed_model() {
    let (writer, _guard) = setup_capture();
    let client = client(FakeProvider::new().reporting_model("modelZ-2024-06"));

    client
        .complete("secret system text", "u", "modelZ", 0.1, None)
        .await
        .unwrap();

    let output = writer.output();
    assert!(!output.contains("secret system text"), "prompt text leaked into logs");
    let span = closed_request_span(&output);
    assert_eq!(span["llm.model.requested"], "modelZ");
    assert_eq!(span["llm.model.observed"], "modelZ-2024-06");
    assert!(span.contains_key("llm.duration_ms"));
    assert!(!span.contains_key("error"));
}

#[tokio::test]
async fn failure_records_error_kind() {
    let (writer, _guard) = setup_capture();
    let client = client(
        FakeProvider::new().fail_when(|_| Some(ProviderFailure::message("429 rate limit exceeded"))),
    );

    client.complete("s", "u", "modelZ", 0.1, None).await.unwrap_err();

    let span = closed_request_span(&writer.output());
    assert_eq!(span["error"], true);
    assert_eq!(span["error.kind"], "rate_limit");
}
