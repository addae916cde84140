//! HTTP client for the hosted sequence model.
//!
//! The model is served behind a TensorFlow-Serving style REST endpoint:
//! `POST {base}/v1/models/{program}:predict` with columnar `inputs`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::encode::{split_courses, split_grades};
use crate::error::RecommendError;
use crate::models::EncodedRow;

const USER_AGENT: &str = "groupscholar-course-recommender/0.1.0";

#[derive(Debug, Serialize, PartialEq)]
pub struct PredictInputs {
    pub seq_matkul: Vec<Vec<String>>,
    pub target_matkul: Vec<String>,
    pub seq_nilai: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    inputs: &'a PredictInputs,
}

/// Columnar model inputs for a batch of rows, in row order.
pub fn build_inputs(rows: &[EncodedRow]) -> Result<PredictInputs, RecommendError> {
    let mut inputs = PredictInputs {
        seq_matkul: Vec::with_capacity(rows.len()),
        target_matkul: Vec::with_capacity(rows.len()),
        seq_nilai: Vec::with_capacity(rows.len()),
    };
    for row in rows {
        inputs.seq_matkul.push(split_courses(&row.seq_matkul));
        inputs.target_matkul.push(row.target_matkul.clone());
        inputs.seq_nilai.push(split_grades(&row.seq_nilai)?);
    }
    Ok(inputs)
}

/// Flatten the `outputs` member of a predict response into one score per row.
pub fn parse_outputs(body: &Value) -> Result<Vec<f64>, RecommendError> {
    let outputs = body
        .get("outputs")
        .or_else(|| body.get("predictions"))
        .ok_or_else(|| RecommendError::Inference("response has no outputs".to_string()))?;
    let mut scores = Vec::new();
    flatten(outputs, &mut scores)?;
    Ok(scores)
}

fn flatten(value: &Value, scores: &mut Vec<f64>) -> Result<(), RecommendError> {
    match value {
        Value::Number(number) => {
            let score = number
                .as_f64()
                .ok_or_else(|| RecommendError::Inference(format!("score {number} is out of range")))?;
            scores.push(score);
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(|item| flatten(item, scores)),
        other => Err(RecommendError::Inference(format!("unexpected output value {other}"))),
    }
}

/// Handle to the model server. Construct once per process and pass it in.
pub struct ModelClient {
    http_client: reqwest::Client,
    base_url: String,
    batch_size: usize,
}

impl ModelClient {
    pub fn new(base_url: &str, timeout: Duration, batch_size: usize) -> Result<Self, RecommendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RecommendError::Inference(e.to_string()))?;

        Ok(Self::with_client(http_client, base_url, batch_size))
    }

    fn with_client(http_client: reqwest::Client, base_url: &str, batch_size: usize) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            batch_size: batch_size.max(1),
        }
    }

    fn predict_url(&self, program_code: &str) -> String {
        format!("{}/v1/models/{}:predict", self.base_url, program_code)
    }

    /// Score every row, preserving row order across batches.
    pub async fn predict(&self, program_code: &str, rows: &[EncodedRow]) -> Result<Vec<f64>, RecommendError> {
        let url = self.predict_url(program_code);
        let mut scores = Vec::with_capacity(rows.len());

        for batch in rows.chunks(self.batch_size) {
            let inputs = build_inputs(batch)?;
            tracing::debug!(url = %url, rows = batch.len(), "requesting model scores");

            let response = self
                .http_client
                .post(&url)
                .json(&PredictRequest { inputs: &inputs })
                .send()
                .await
                .map_err(|e| RecommendError::Inference(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(RecommendError::ProgramNotFound {
                    program_code: program_code.to_string(),
                });
            }
            if !status.is_success() {
                let error_text = match response.text().await {
                    Ok(text) => text,
                    Err(e) => format!("response body unreadable: {e}"),
                };
                return Err(RecommendError::Inference(format!("{}: {}", status.as_u16(), error_text)));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| RecommendError::Inference(e.to_string()))?;
            let mut batch_scores = parse_outputs(&body)?;
            if batch_scores.len() != batch.len() {
                return Err(RecommendError::Inference(format!(
                    "model returned {} scores for {} rows",
                    batch_scores.len(),
                    batch.len()
                )));
            }
            scores.append(&mut batch_scores);
        }

        tracing::info!(program = %program_code, rows = rows.len(), "model scores received");
        Ok(scores)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Local model server that answers one connection per `(status, body)`
    /// pair, in order, and returns the JSON request bodies it received.
    pub(crate) async fn stub_server(replies: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });
        (base_url, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> Value {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before request headers");
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|value| value.trim().parse().unwrap())
            .unwrap_or(0);
        while buffer.len() < header_end + length {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before request body");
            buffer.extend_from_slice(&chunk[..read]);
        }
        serde_json::from_slice(&buffer[header_end..header_end + length]).unwrap()
    }

    /// Client for a local stub server, bypassing any proxy settings.
    pub(crate) fn stub_client(base_url: &str, batch_size: usize) -> ModelClient {
        let http_client = reqwest::Client::builder().no_proxy().build().unwrap();
        ModelClient::with_client(http_client, base_url, batch_size)
    }

    fn row(courses: &str, grades: &str, target: &str) -> EncodedRow {
        EncodedRow {
            student_id: "195515200111".to_string(),
            seq_matkul: courses.to_string(),
            seq_nilai: grades.to_string(),
            target_matkul: target.to_string(),
        }
    }

    #[test]
    fn builds_columnar_inputs() {
        let inputs = build_inputs(&[row("A,B", "3.5,4", "X"), row("B,C", "4,2", "Y")]).unwrap();
        assert_eq!(inputs.seq_matkul, vec![vec!["A", "B"], vec!["B", "C"]]);
        assert_eq!(inputs.target_matkul, vec!["X", "Y"]);
        assert_eq!(inputs.seq_nilai, vec![vec![3.5, 4.0], vec![4.0, 2.0]]);
    }

    #[test]
    fn request_body_wraps_inputs() {
        let inputs = build_inputs(&[row("A", "3", "X")]).unwrap();
        let body = serde_json::to_value(PredictRequest { inputs: &inputs }).unwrap();
        assert_eq!(body["inputs"]["target_matkul"], json!(["X"]));
        assert_eq!(body["inputs"]["seq_nilai"], json!([[3.0]]));
    }

    #[test]
    fn parses_nested_and_flat_outputs() {
        assert_eq!(parse_outputs(&json!({"outputs": [[3.1], [2.5]]})).unwrap(), vec![3.1, 2.5]);
        assert_eq!(parse_outputs(&json!({"predictions": [1.0, 2.0]})).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn rejects_malformed_outputs() {
        assert!(parse_outputs(&json!({"error": "boom"})).is_err());
        assert!(parse_outputs(&json!({"outputs": ["x"]})).is_err());
    }

    #[test]
    fn predict_url_uses_program_code() {
        let client = ModelClient::new("http://models.local/", Duration::from_secs(5), 256).unwrap();
        assert_eq!(client.predict_url("515"), "http://models.local/v1/models/515:predict");
    }

    #[tokio::test]
    async fn batches_keep_row_order() {
        let (base_url, server) = stub_server(vec![
            (200, r#"{"outputs": [[1.0]]}"#),
            (200, r#"{"outputs": [[2.0]]}"#),
            (200, r#"{"outputs": [[3.0]]}"#),
        ])
        .await;
        let client = stub_client(&base_url, 1);
        let rows = [row("A,B", "3.5,0", "X"), row("B,C", "4,0", "Y"), row("C,D", "2,0", "Z")];

        let scores = client.predict("515", &rows).await.unwrap();
        assert_eq!(scores, vec![1.0, 2.0, 3.0]);

        let requests = server.await.unwrap();
        let targets: Vec<&Value> = requests.iter().map(|body| &body["inputs"]["target_matkul"]).collect();
        assert_eq!(targets, vec![&json!(["X"]), &json!(["Y"]), &json!(["Z"])]);
    }

    #[tokio::test]
    async fn missing_model_is_program_not_found() {
        let (base_url, server) = stub_server(vec![(404, r#"{"error": "no such model"}"#)]).await;
        let client = stub_client(&base_url, 8);

        let err = client.predict("999", &[row("A", "3", "X")]).await.unwrap_err();
        assert!(matches!(err, RecommendError::ProgramNotFound { ref program_code } if program_code == "999"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let (base_url, server) = stub_server(vec![(500, "model exploded")]).await;
        let client = stub_client(&base_url, 8);

        match client.predict("515", &[row("A", "3", "X")]).await {
            Err(RecommendError::Inference(message)) => {
                assert!(message.contains("500"));
                assert!(message.contains("model exploded"));
            }
            other => panic!("expected inference error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn score_count_must_match_batch() {
        let (base_url, server) = stub_server(vec![(200, r#"{"outputs": [[1.0], [2.0]]}"#)]).await;
        let client = stub_client(&base_url, 1);

        let err = client.predict("515", &[row("A", "3", "X")]).await.unwrap_err();
        assert!(matches!(err, RecommendError::Inference(ref message) if message.contains("2 scores for 1 rows")));
        server.await.unwrap();
    }
}
