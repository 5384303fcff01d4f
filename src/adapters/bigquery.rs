//! BigQuery REST adapter for full-replace CSV loads.
//!
//! A load is one multipart upload to the `jobs.insert` upload endpoint
//! followed by `jobs.get` polls until the job reports `DONE`. Job ids are
//! generated client-side, so a duplicate insert resolves to the job that
//! already exists.

use crate::adapters::auth::TokenProvider;
use crate::config::warehouse::WarehouseConfig;
use crate::core::Warehouse;
use crate::domain::model::{JobState, LoadJob, TableRef};
use crate::utils::error::{EtlError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BOUNDARY: &str = "taxi_etl_load_boundary_5f1c2a";

#[derive(Debug, Clone)]
pub struct BigQueryClient {
    client: Client,
    base_url: String,
    auth: TokenProvider,
    location: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobRequest<'a> {
    job_reference: RequestJobReference<'a>,
    configuration: JobConfiguration<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestJobReference<'a> {
    project_id: &'a str,
    job_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Serialize)]
struct JobConfiguration<'a> {
    load: LoadConfiguration<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration<'a> {
    destination_table: &'a TableRef,
    source_format: &'static str,
    autodetect: bool,
    write_disposition: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl JobResource {
    fn into_load_job(self) -> Result<LoadJob> {
        let state = match self.status {
            None => JobState::Pending,
            Some(status) => match (status.state.as_str(), status.error_result) {
                ("PENDING", _) => JobState::Pending,
                ("RUNNING", _) => JobState::Running,
                ("DONE", None) => JobState::Done,
                ("DONE", Some(error)) => JobState::Failed {
                    reason: match (error.reason, error.message) {
                        (Some(reason), Some(message)) => format!("{}: {}", reason, message),
                        (None, Some(message)) => message,
                        (Some(reason), None) => reason,
                        (None, None) => "unknown error".to_string(),
                    },
                },
                (other, _) => {
                    return Err(EtlError::load(format!(
                        "job {} reported unknown state '{}'",
                        self.job_reference.job_id, other
                    )))
                }
            },
        };

        Ok(LoadJob {
            job_id: self.job_reference.job_id,
            project: self.job_reference.project_id,
            location: self.job_reference.location,
            state,
        })
    }
}

fn new_job_id() -> String {
    format!("taxi_etl_{}", Uuid::new_v4().simple())
}

/// 組出 multipart/related 請求主體：先是作業設定 JSON，接著是 CSV 內容
fn multipart_related(metadata: &[u8], csv: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + csv.len() + 256);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\nContent-Type: text/csv\r\n\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(csv);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl BigQueryClient {
    pub fn new(config: &WarehouseConfig) -> Self {
        let client = Client::new();
        Self {
            auth: TokenProvider::new(client.clone(), config.credentials.clone()),
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            location: config.location.clone(),
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.auth.token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn read_job(response: Response) -> Result<LoadJob> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(EtlError::load(format!(
                "BigQuery API returned {}: {}",
                status, message
            )));
        }

        let job: JobResource = serde_json::from_str(&text)?;
        job.into_load_job()
    }
}

impl Warehouse for BigQueryClient {
    async fn submit_load(&self, destination: &TableRef, csv: Vec<u8>) -> Result<LoadJob> {
        let job_id = new_job_id();
        let request = JobRequest {
            job_reference: RequestJobReference {
                project_id: &destination.project,
                job_id: &job_id,
                location: self.location.as_deref(),
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    destination_table: destination,
                    source_format: "CSV",
                    autodetect: true,
                    write_disposition: "WRITE_TRUNCATE",
                },
            },
        };
        let metadata = serde_json::to_vec(&request)?;

        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs",
            self.base_url, destination.project
        );
        tracing::debug!("POST {} job {} ({} bytes of CSV)", url, job_id, csv.len());

        let response = self
            .authorize(self.client.post(&url))
            .await?
            .query(&[("uploadType", "multipart")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .body(multipart_related(&metadata, &csv))
            .send()
            .await?;

        // 同一個 jobId 已存在：接手那個作業，不重複載入
        if response.status() == StatusCode::CONFLICT {
            tracing::warn!(job_id = %job_id, "Load job already exists, resuming it");
            let existing = LoadJob {
                job_id,
                project: destination.project.clone(),
                location: self.location.clone(),
                state: JobState::Pending,
            };
            return self.refresh_job(&existing).await;
        }

        Self::read_job(response).await
    }

    async fn refresh_job(&self, job: &LoadJob) -> Result<LoadJob> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.base_url, job.project, job.job_id
        );

        let mut request = self.authorize(self.client.get(&url)).await?;
        if let Some(location) = job.location.as_deref().or(self.location.as_deref()) {
            request = request.query(&[("location", location)]);
        }

        let response = request.send().await?;
        Self::read_job(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(json: serde_json::Value) -> Result<LoadJob> {
        serde_json::from_value::<JobResource>(json)
            .unwrap()
            .into_load_job()
    }

    #[test]
    fn test_job_states_from_api() {
        let job = resource(serde_json::json!({
            "jobReference": {"projectId": "p", "jobId": "j", "location": "US"},
            "status": {"state": "RUNNING"}
        }))
        .unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.location.as_deref(), Some("US"));

        let job = resource(serde_json::json!({
            "jobReference": {"projectId": "p", "jobId": "j"}
        }))
        .unwrap();
        assert_eq!(job.state, JobState::Pending);

        let job = resource(serde_json::json!({
            "jobReference": {"projectId": "p", "jobId": "j"},
            "status": {"state": "DONE", "errorResult": {"reason": "invalid", "message": "bad row"}}
        }))
        .unwrap();
        assert_eq!(
            job.state,
            JobState::Failed {
                reason: "invalid: bad row".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_state_is_load_error() {
        let err = resource(serde_json::json!({
            "jobReference": {"projectId": "p", "jobId": "j"},
            "status": {"state": "EXPLODED"}
        }))
        .unwrap_err();
        assert!(matches!(err, EtlError::LoadError { .. }));
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_related(b"{}", b"a,b\n1,2\n");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{}\r\n", BOUNDARY)));
        assert!(text.contains("application/json; charset=UTF-8\r\n\r\n{}\r\n"));
        assert!(text.contains("text/csv\r\n\r\na,b\n1,2\n\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", BOUNDARY)));
    }

    #[test]
    fn test_job_reference_carries_generated_id() {
        let destination = TableRef {
            project: "p".to_string(),
            dataset: "d".to_string(),
            table: "t".to_string(),
        };
        let job_id = new_job_id();
        let request = JobRequest {
            job_reference: RequestJobReference {
                project_id: &destination.project,
                job_id: &job_id,
                location: None,
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    destination_table: &destination,
                    source_format: "CSV",
                    autodetect: true,
                    write_disposition: "WRITE_TRUNCATE",
                },
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jobReference"]["jobId"], job_id.as_str());
        assert!(json["jobReference"].get("location").is_none());
        assert!(job_id.starts_with("taxi_etl_"));
        assert_ne!(job_id, new_job_id());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = BigQueryClient::new(&WarehouseConfig {
            destination: TableRef {
                project: "demo-project".to_string(),
                dataset: "demo_ds".to_string(),
                table: "nyc_taxi".to_string(),
            },
            location: None,
            api_base_url: "http://localhost".to_string(),
            credentials: crate::config::warehouse::Credentials::AccessToken(
                "secret-token".to_string(),
            ),
            poll_interval: std::time::Duration::ZERO,
        });
        assert!(!format!("{:?}", client).contains("secret-token"));
    }
}
