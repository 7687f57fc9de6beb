lazy_static! {

    pub static ref HANDLER_SECS: prometheus::HistogramVec = register_histogram_vec!(
        "fsplink_handler_secs",
        "Seconds taken for each response, partitioned by endpoint name",
        &["endpoint_name"],
        vec![0.01, 0.05, 0.25, 1.0, 4.0] // Prometheus buckets
    )
    .expect("couldn't make HANDLER_SECS");

    pub static ref RESPONSES: prometheus::IntCounterVec = register_int_counter_vec!(
        "fsplink_responses",
        "How many responses of Ok/Err per endpoint",
        &["endpoint_name", "result"]
    )
    .expect("couldn't make RESPONSES");

    pub static ref HTTP_RESPONSES: prometheus::IntCounterVec = register_int_counter_vec!(
        "fsplink_http_responses",
        "Count of each HTTP status code served by fsplink responses",
        &["status"]
    )
    .expect("couldn't make HTTP_RESPONSES");

    pub static ref SELECTION_TOGGLES: prometheus::IntCounterVec = register_int_counter_vec!(
        "fsplink_selection_toggles",
        "How many times users saved or unsaved a selection",
        &["action"]
    )
    .expect("couldn't make SELECTION_TOGGLES");

    pub static ref BOT_UPDATES: prometheus::IntCounterVec = register_int_counter_vec!(
        "fsplink_bot_updates",
        "Telegram updates seen by the bot, by how they were handled",
        &["result"]
    )
    .expect("couldn't make BOT_UPDATES");
}

pub mod endpoint {
    use actix_web::{http, HttpRequest, HttpResponse};
    use prometheus::Encoder;

    pub async fn gather(_req: HttpRequest) -> HttpResponse {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = vec![];
        let metric_families = prometheus::gather();
        match encoder.encode(&metric_families, &mut buffer) {
            Ok(()) => HttpResponse::build(http::StatusCode::OK)
                .content_type(encoder.format_type())
                .body(buffer),
            Err(e) => {
                let message = format!("{:?}", e);
                HttpResponse::build(http::StatusCode::INTERNAL_SERVER_ERROR).body(message)
            }
        }
    }
}
