pub mod genai_service;
pub mod response_parser;
pub mod result_writer;
pub mod retry;

pub use genai_service::GenAiService;
pub use response_parser::{
    normalize_questions, normalize_with_report, parse_json_response, try_parse_json_response,
    NormalizeReport, ParseError,
};
pub use result_writer::ResultWriter;
pub use retry::{retry_with_backoff, retry_with_classifier, RetryError, RetryPolicy, RetryableError};
