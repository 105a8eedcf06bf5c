use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ragchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("ragchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("ragchat.client.request_duration_seconds");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("ragchat.stream.frames");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ragchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("ragchat.stream.bytes");
pub(crate) static MALFORMED_LINES: Counter = Counter::new("ragchat.stream.malformed_lines");
pub(crate) static STREAM_DURATION: Moments = Moments::new("ragchat.stream.duration_seconds");

pub(crate) static SESSION_COMMITS: Counter = Counter::new("ragchat.session.commits");
pub(crate) static SESSION_COMMIT_FAILURES: Counter =
    Counter::new("ragchat.session.commit_failures");
pub(crate) static SESSION_LOOKUP_FALLBACKS: Counter =
    Counter::new("ragchat.session.lookup_fallbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&MALFORMED_LINES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_COMMITS);
    collector.register_counter(&SESSION_COMMIT_FAILURES);
    collector.register_counter(&SESSION_LOOKUP_FALLBACKS);
}
