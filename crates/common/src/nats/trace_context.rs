use async_nats::HeaderMap;
use opentelemetry::{
    global,
    propagation::{Extractor, Injector},
    Context,
};
use tracing_opentelemetry::OpenTelemetrySpanExt;

const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        vec![TRACEPARENT, TRACESTATE]
    }
}

/// Write the current span's W3C trace context into outgoing message headers
pub fn inject_trace_context(headers: &mut HeaderMap) {
    global::get_text_map_propagator(|propagator| {
        let ctx = tracing::Span::current().context();
        propagator.inject_context(&ctx, &mut HeaderInjector(headers));
    });
}

/// Read the publisher's trace context from message headers
pub fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Parent the current span on the trace that published the message
pub fn set_parent_from_headers(headers: &HeaderMap) {
    let ctx = extract_trace_context(headers);
    tracing::Span::current().set_parent(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_without_propagator_does_not_panic() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
    }

    #[test]
    fn test_empty_headers_are_tolerated() {
        let headers = HeaderMap::new();
        let _ctx = extract_trace_context(&headers);
        set_parent_from_headers(&headers);
    }

    #[test]
    fn test_extractor_reads_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            TRACEPARENT,
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        );

        let extractor = HeaderExtractor(&headers);
        assert!(extractor
            .get(TRACEPARENT)
            .is_some_and(|v| v.starts_with("00-")));
        assert!(extractor.get(TRACESTATE).is_none());
    }
}
