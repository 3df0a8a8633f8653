pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
pub use traits::ExamBackend;
pub use types::{
    ApiError, AttemptProgress, AttemptRecord, QuestionAnswerRecord, SavePayload, SubmitResult,
};
