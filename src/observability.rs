use biometrics::{Collector, Counter, Moments};

pub(crate) static API_REQUESTS: Counter = Counter::new("densechat.api.requests");
pub(crate) static API_REQUEST_ERRORS: Counter = Counter::new("densechat.api.request_errors");
pub(crate) static API_AUTH_REJECTIONS: Counter = Counter::new("densechat.api.auth_rejections");

pub(crate) static MOCK_REQUESTS: Counter = Counter::new("densechat.mock.requests");
pub(crate) static MOCK_REQUEST_ERRORS: Counter = Counter::new("densechat.mock.request_errors");
pub(crate) static MOCK_TOKENS_ISSUED: Counter = Counter::new("densechat.mock.tokens_issued");

pub(crate) static GEMINI_REQUESTS: Counter = Counter::new("densechat.gemini.requests");
pub(crate) static GEMINI_REQUEST_ERRORS: Counter =
    Counter::new("densechat.gemini.request_errors");
pub(crate) static GEMINI_REQUEST_DURATION: Moments =
    Moments::new("densechat.gemini.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("densechat.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("densechat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("densechat.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("densechat.stream.duration_seconds");

pub(crate) static CHAT_TURNS: Counter = Counter::new("densechat.chat.turns");
pub(crate) static CHAT_TURN_ERRORS: Counter = Counter::new("densechat.chat.turn_errors");
pub(crate) static CHAT_TURN_DURATION: Moments =
    Moments::new("densechat.chat.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&API_REQUESTS);
    collector.register_counter(&API_REQUEST_ERRORS);
    collector.register_counter(&API_AUTH_REJECTIONS);

    collector.register_counter(&MOCK_REQUESTS);
    collector.register_counter(&MOCK_REQUEST_ERRORS);
    collector.register_counter(&MOCK_TOKENS_ISSUED);

    collector.register_counter(&GEMINI_REQUESTS);
    collector.register_counter(&GEMINI_REQUEST_ERRORS);
    collector.register_moments(&GEMINI_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_ERRORS);
    collector.register_moments(&CHAT_TURN_DURATION);
}
