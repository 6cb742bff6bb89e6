use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ApiConfig;

use super::api_types::{error_message, InviteRequest, NewProject, NewTask, TaskUpdate, TextBody};
use super::error::{ApiError, ApiResult};
use super::types::{ChatMessage, Comment, Project, Task};
use super::ProjectApi;

/// How read requests are retried on transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay: Duration,
}

impl RetryPolicy {
  /// Delay before retry number `attempt` (0-based), doubling each time
  pub fn delay(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(1 << attempt.min(16))
  }
}

/// ProjectStack REST client
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  retry: RetryPolicy,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, token: &str) -> ApiResult<Self> {
    let mut headers = HeaderMap::new();
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| ApiError::Network(format!("invalid token header: {}", e)))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .default_headers(headers)
      .build()
      .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url: parse_base_url(&config.url)?,
      retry: RetryPolicy {
        max_retries: config.max_retries,
        base_delay: config.retry_backoff(),
      },
    })
  }

  fn endpoint(&self, path: &str) -> ApiResult<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
  }

  /// GET with retries on transient failures
  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
    let url = self.endpoint(path)?;
    let mut attempt = 0;

    loop {
      let result = match self.execute(self.http.get(url.clone())).await {
        Ok(response) => response.json::<T>().await.map_err(ApiError::from),
        Err(e) => Err(e),
      };

      match result {
        Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
          let delay = self.retry.delay(attempt);
          warn!(%url, attempt, ?delay, error = %e, "retrying read");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }

  /// Single-shot write returning a JSON body
  async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: &B,
  ) -> ApiResult<T> {
    let url = self.endpoint(path)?;
    let response = self
      .execute(self.http.request(method, url).json(body))
      .await?;
    Ok(response.json::<T>().await?)
  }

  /// Single-shot write whose response body is ignored
  async fn send_discarding(
    &self,
    method: Method,
    path: &str,
    body: Option<&serde_json::Value>,
  ) -> ApiResult<()> {
    let url = self.endpoint(path)?;
    let mut request = self.http.request(method, url);
    if let Some(body) = body {
      request = request.json(body);
    }
    self.execute(request).await?;
    Ok(())
  }

  async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
    let response = request.send().await.map_err(|e| {
      if e.is_timeout() {
        ApiError::Network(format!("request timed out: {}", e))
      } else {
        ApiError::Network(e.to_string())
      }
    })?;

    let status = response.status();
    debug!(url = %response.url(), %status, "response");
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_status(status.as_u16(), error_message(&body));
    if err.is_session_terminal() {
      error!("server rejected credentials; session expired");
    }
    Err(err)
  }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
  // Url::join drops the last segment unless the base ends with '/'
  let normalized = format!("{}/", raw.trim_end_matches('/'));
  Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
}

impl ProjectApi for ApiClient {
  async fn list_projects(&self) -> ApiResult<Vec<Project>> {
    self.get_json("projects").await
  }

  async fn get_project(&self, project_id: &str) -> ApiResult<Project> {
    self.get_json(&format!("projects/{}", project_id)).await
  }

  async fn create_project(&self, project: &NewProject) -> ApiResult<Project> {
    self.send_json(Method::POST, "projects", project).await
  }

  async fn update_project(&self, project_id: &str, project: &NewProject) -> ApiResult<Project> {
    self
      .send_json(Method::PUT, &format!("projects/{}", project_id), project)
      .await
  }

  async fn delete_project(&self, project_id: &str) -> ApiResult<()> {
    self
      .send_discarding(Method::DELETE, &format!("projects/{}", project_id), None)
      .await
  }

  async fn list_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
    self
      .get_json(&format!("projects/{}/tasks", project_id))
      .await
  }

  async fn create_task(&self, project_id: &str, task: &NewTask) -> ApiResult<Task> {
    self
      .send_json(Method::POST, &format!("projects/{}/tasks", project_id), task)
      .await
  }

  async fn update_task(
    &self,
    project_id: &str,
    task_id: &str,
    update: &TaskUpdate,
  ) -> ApiResult<Task> {
    self
      .send_json(
        Method::PUT,
        &format!("projects/{}/tasks/{}", project_id, task_id),
        update,
      )
      .await
  }

  async fn delete_task(&self, project_id: &str, task_id: &str) -> ApiResult<()> {
    self
      .send_discarding(
        Method::DELETE,
        &format!("projects/{}/tasks/{}", project_id, task_id),
        None,
      )
      .await
  }

  async fn list_comments(&self, project_id: &str, task_id: &str) -> ApiResult<Vec<Comment>> {
    self
      .get_json(&format!(
        "projects/{}/tasks/{}/comments",
        project_id, task_id
      ))
      .await
  }

  async fn create_comment(&self, project_id: &str, task_id: &str, text: &str) -> ApiResult<Comment> {
    self
      .send_json(
        Method::POST,
        &format!("projects/{}/tasks/{}/comments", project_id, task_id),
        &TextBody { text },
      )
      .await
  }

  async fn delete_comment(&self, project_id: &str, task_id: &str, comment_id: &str) -> ApiResult<()> {
    self
      .send_discarding(
        Method::DELETE,
        &format!(
          "projects/{}/tasks/{}/comments/{}",
          project_id, task_id, comment_id
        ),
        None,
      )
      .await
  }

  async fn list_chat(&self, project_id: &str) -> ApiResult<Vec<ChatMessage>> {
    self.get_json(&format!("projects/{}/chat", project_id)).await
  }

  async fn send_message(&self, project_id: &str, text: &str) -> ApiResult<ChatMessage> {
    self
      .send_json(
        Method::POST,
        &format!("projects/{}/chat", project_id),
        &TextBody { text },
      )
      .await
  }

  async fn invite_members(&self, project_id: &str, invite: &InviteRequest) -> ApiResult<()> {
    let body = serde_json::to_value(invite)?;
    self
      .send_discarding(
        Method::POST,
        &format!("projects/{}/invites", project_id),
        Some(&body),
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::{TcpListener, TcpStream};

  fn config(url: &str) -> ApiConfig {
    ApiConfig {
      url: url.to_string(),
      timeout_ms: 1_000,
      max_retries: 2,
      retry_backoff_ms: 100,
    }
  }

  #[test]
  fn test_endpoint_keeps_base_path() {
    let client = ApiClient::new(&config("http://localhost:8080/api"), "tok").unwrap();
    assert_eq!(
      client.endpoint("projects/p1/tasks").unwrap().as_str(),
      "http://localhost:8080/api/projects/p1/tasks"
    );
    assert_eq!(
      client.endpoint("/projects").unwrap().as_str(),
      "http://localhost:8080/api/projects"
    );
  }

  #[test]
  fn test_base_url_trailing_slashes_normalized() {
    let url = parse_base_url("https://stack.example.com/api///").unwrap();
    assert_eq!(url.as_str(), "https://stack.example.com/api/");
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(matches!(
      ApiClient::new(&config("not a url"), "tok"),
      Err(ApiError::InvalidUrl(_))
    ));
  }

  #[test]
  fn test_retry_delay_doubles() {
    let policy = RetryPolicy {
      max_retries: 3,
      base_delay: Duration::from_millis(100),
    };
    assert_eq!(policy.delay(0), Duration::from_millis(100));
    assert_eq!(policy.delay(1), Duration::from_millis(200));
    assert_eq!(policy.delay(3), Duration::from_millis(800));
  }

  #[tokio::test]
  async fn test_unreachable_host_is_network_error() {
    // Port 9 (discard) on localhost is closed in test environments
    let mut cfg = config("http://127.0.0.1:9/api");
    cfg.max_retries = 0;
    let client = ApiClient::new(&cfg, "tok").unwrap();

    let err = client.list_projects().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
  }

  /// Read one request (headers and any body) off the socket
  async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
      if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        break pos + 4;
      }
      match socket.read(&mut chunk).await {
        Ok(0) | Err(_) => return,
        Ok(n) => buf.extend_from_slice(&chunk[..n]),
      }
    };
    let body_len = String::from_utf8_lossy(&buf[..header_end])
      .lines()
      .find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name
          .eq_ignore_ascii_case("content-length")
          .then(|| value.trim().parse::<usize>().ok())
          .flatten()
      })
      .unwrap_or(0);
    while buf.len() < header_end + body_len {
      match socket.read(&mut chunk).await {
        Ok(0) | Err(_) => return,
        Ok(n) => buf.extend_from_slice(&chunk[..n]),
      }
    }
  }

  /// Answer requests on a loopback port with `replies` in order, repeating
  /// the last one. Returns the API base URL and the number of requests seen.
  async fn serve(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);

    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        read_request(&mut socket).await;
        let n = seen.fetch_add(1, Ordering::SeqCst);
        let (status, body) = replies[n.min(replies.len() - 1)];
        let response = format!(
          "HTTP/1.1 {} Reply\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
          status,
          body.len(),
          body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
      }
    });

    (format!("http://{}/api", addr), hits)
  }

  fn fast_client(url: &str, max_retries: u32) -> ApiClient {
    let mut cfg = config(url);
    cfg.max_retries = max_retries;
    cfg.retry_backoff_ms = 1;
    ApiClient::new(&cfg, "tok").unwrap()
  }

  #[tokio::test]
  async fn test_read_retries_transient_failures() {
    let (url, hits) = serve(vec![(503, "{}"), (502, "{}"), (200, "[]")]).await;
    let client = fast_client(&url, 2);

    let projects = client.list_projects().await.unwrap();

    assert!(projects.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_read_gives_up_after_max_retries() {
    let (url, hits) = serve(vec![(500, r#"{"message":"boom"}"#)]).await;
    let client = fast_client(&url, 2);

    let err = client.list_tasks("p1").await.unwrap_err();

    assert_eq!(
      err,
      ApiError::Http {
        status: 500,
        message: Some("boom".to_string())
      }
    );
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_unauthorized_read_is_not_retried() {
    let (url, hits) = serve(vec![(401, "{}")]).await;
    let client = fast_client(&url, 3);

    let err = client.get_project("p1").await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_writes_are_not_retried() {
    let (url, hits) = serve(vec![(503, "{}")]).await;
    let client = fast_client(&url, 3);

    let err = client.create_project(&NewProject::default()).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }
}
