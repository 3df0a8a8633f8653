//! HTTP implementation of the backend contract.
//!
//! All requests carry the externally supplied bearer credential. The
//! client owns a current-thread tokio runtime so the synchronous trait
//! methods work from the CLI and from tests without an ambient runtime.

use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::api::traits::ExamBackend;
use crate::api::types::{ApiError, AttemptRecord, SavePayload, SubmitResult};
use crate::catalog::{ExamDescriptor, Question};
use crate::integrity::IntegrityEvent;
use crate::storage::Config;

#[derive(Deserialize)]
struct AttemptedFlag {
    attempted: bool,
}

pub struct HttpBackend {
    base: Url,
    bearer: String,
    http: reqwest::Client,
    rt: tokio::runtime::Runtime,
    submit_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str, bearer: &str) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, bearer, Duration::from_secs(10), Duration::from_secs(15))
    }

    pub fn with_timeouts(
        base_url: &str,
        bearer: &str,
        request_timeout: Duration,
        submit_timeout: Duration,
    ) -> Result<Self, ApiError> {
        // Url::join treats a base without a trailing slash as a file.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            base,
            bearer: bearer.to_string(),
            http,
            rt,
            submit_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeouts(
            &config.backend.base_url,
            &config.backend.bearer_token,
            Duration::from_secs(config.backend.request_timeout_secs),
            Duration::from_secs(config.backend.submit_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    fn execute<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        self.rt.block_on(async {
            let resp = req
                .bearer_auth(&self.bearer)
                .send()
                .await
                .map_err(classify)?;
            let status = resp.status();
            if status == StatusCode::CONFLICT {
                return Err(ApiError::AlreadySubmitted);
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ApiError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            resp.json::<T>().await.map_err(ApiError::from)
        })
    }

    /// Same as `execute` but discards the body.
    fn execute_unit(&self, req: reqwest::RequestBuilder) -> Result<(), ApiError> {
        self.rt.block_on(async {
            let resp = req
                .bearer_auth(&self.bearer)
                .send()
                .await
                .map_err(classify)?;
            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ApiError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            Ok(())
        })
    }
}

fn classify(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(err)
    }
}

impl ExamBackend for HttpBackend {
    fn list_exams(&self) -> Result<Vec<ExamDescriptor>, ApiError> {
        let url = self.endpoint("exams")?;
        self.execute(self.http.get(url))
    }

    fn fetch_exam(&self, exam_id: &str) -> Result<ExamDescriptor, ApiError> {
        let url = self.endpoint(&format!("exams/{exam_id}"))?;
        self.execute(self.http.get(url))
    }

    fn fetch_questions(&self, exam_id: &str, randomize: bool) -> Result<Vec<Question>, ApiError> {
        let url = self.endpoint(&format!("exams/{exam_id}/questions"))?;
        self.execute(
            self.http
                .get(url)
                .query(&[("randomize", if randomize { "true" } else { "false" })]),
        )
    }

    fn start_attempt(&self, exam_id: &str) -> Result<AttemptRecord, ApiError> {
        debug!("starting attempt for exam {exam_id}");
        let url = self.endpoint(&format!("exams/{exam_id}/attempt"))?;
        self.execute(self.http.post(url))
    }

    fn save_answer(
        &self,
        exam_id: &str,
        question_id: &str,
        payload: &SavePayload,
    ) -> Result<AttemptRecord, ApiError> {
        debug!("saving answer for {exam_id}/{question_id}");
        let url = self.endpoint(&format!("exams/{exam_id}/questions/{question_id}/answer"))?;
        self.execute(self.http.put(url).json(payload))
    }

    fn submit(&self, exam_id: &str) -> Result<SubmitResult, ApiError> {
        debug!("submitting exam {exam_id}");
        let url = self.endpoint(&format!("exams/{exam_id}/submit"))?;
        // A stuck submit must not strand the attempt in Submitting; the
        // bounded timeout surfaces as ApiError::Timeout and the caller
        // reverts to Active.
        self.execute(self.http.post(url).timeout(self.submit_timeout))
    }

    fn log_integrity_event(&self, exam_id: &str, event: &IntegrityEvent) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("exams/{exam_id}/integrity"))?;
        self.execute_unit(self.http.post(url).json(event))
    }

    fn has_attempted(&self, exam_id: &str) -> Result<bool, ApiError> {
        let url = self.endpoint(&format!("exams/{exam_id}/attempted"))?;
        let flag: AttemptedFlag = self.execute(self.http.get(url))?;
        Ok(flag.attempted)
    }
}
