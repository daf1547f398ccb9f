//! Shared fixtures: a scripted engine and a canned HTTP server.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use artdoc::client::{ClientError, ClientResult, EngineClient};
use artdoc::model::{ConclusionId, DiagnosisResult, SymptomId, VerificationResult};

/// Engine double that answers from raw JSON, counts calls and records what
/// it was sent. Responses go through the same boundary validation as the
/// HTTP bridge.
pub struct StubEngine {
    pub symptoms: Vec<String>,
    pub conclusions: Option<Vec<String>>,
    pub diagnosis: serde_json::Value,
    pub verification: serde_json::Value,
    pub unreachable: bool,
    /// When set, analyses wait for `release` after signalling `entered`.
    pub gated: bool,
    pub entered: Notify,
    pub release: Notify,
    pub catalog_calls: AtomicUsize,
    pub analysis_calls: AtomicUsize,
    pub received: Mutex<Vec<Vec<SymptomId>>>,
    pub targets: Mutex<Vec<ConclusionId>>,
}

impl StubEngine {
    pub fn new(symptoms: &[&str], conclusions: &[&str]) -> Self {
        Self {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            conclusions: Some(conclusions.iter().map(|s| s.to_string()).collect()),
            diagnosis: serde_json::json!({ "fired_rules": [] }),
            verification: serde_json::json!({ "success": false, "trace": [] }),
            unreachable: false,
            gated: false,
            entered: Notify::new(),
            release: Notify::new(),
            catalog_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn with_diagnosis(mut self, raw: serde_json::Value) -> Self {
        self.diagnosis = raw;
        self
    }

    pub fn with_verification(mut self, raw: serde_json::Value) -> Self {
        self.verification = raw;
        self
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub fn last_received(&self) -> Option<Vec<SymptomId>> {
        self.received.lock().unwrap().last().cloned()
    }

    async fn analysis(&self, symptoms: &[SymptomId]) -> ClientResult<()> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(symptoms.to_vec());
        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.unreachable {
            return Err(ClientError::Unavailable {
                message: "connection refused".into(),
            });
        }
        Ok(())
    }
}

impl EngineClient for StubEngine {
    async fn list_symptoms(&self) -> ClientResult<Vec<SymptomId>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(ClientError::Unavailable {
                message: "connection refused".into(),
            });
        }
        Ok(self.symptoms.iter().map(|s| SymptomId::new(s.as_str())).collect())
    }

    async fn list_conclusions(&self) -> ClientResult<Vec<ConclusionId>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        match &self.conclusions {
            Some(list) => Ok(list.iter().map(|c| ConclusionId::new(c.as_str())).collect()),
            None => Err(ClientError::Unavailable {
                message: "conclusions endpoint down".into(),
            }),
        }
    }

    async fn run_diagnosis(&self, symptoms: &[SymptomId]) -> ClientResult<DiagnosisResult> {
        self.analysis(symptoms).await?;
        Ok(DiagnosisResult::from_wire(&self.diagnosis)?)
    }

    async fn run_verification(
        &self,
        target: &ConclusionId,
        symptoms: &[SymptomId],
    ) -> ClientResult<VerificationResult> {
        self.targets.lock().unwrap().push(target.clone());
        self.analysis(symptoms).await?;
        Ok(VerificationResult::from_wire(&self.verification)?)
    }
}

/// Serve `responses` in order, one per connection, and return the base URL.
pub fn canned_server(responses: Vec<(u16, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            let _ = reader.read_exact(&mut request_body);

            let response = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}
