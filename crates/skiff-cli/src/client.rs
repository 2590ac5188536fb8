//! Thin HTTP client for the skiff API server.
//!
//! Every request carries the saved identity in the `X-User` header; error
//! bodies are unwrapped into their `detail` message so command code only
//! sees `anyhow` errors.

use anyhow::{Result, anyhow};
use futures::StreamExt;
use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;

use skiff_model::{TaskStatus, VolumeStatus};

#[derive(Debug, Deserialize)]
pub struct SubmitReceipt {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StopReceipt {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StopAllReceipt {
    pub count: usize,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeReceipt {
    pub volume_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    tasks: Vec<TaskStatus>,
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    volumes: Vec<VolumeStatus>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            username: username.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("detail").map(|d| match d.as_str() {
                Some(s) => s.to_string(),
                None => d.to_string(),
            }))
            .unwrap_or_else(|| format!("API request failed with status {status}"));
        Err(anyhow!("{detail}"))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        all_users: bool,
    ) -> Result<T> {
        let mut req = self.http.get(self.url(path)).header("X-User", &self.username);
        if all_users {
            req = req.query(&[("all_users", "true")]);
        }
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn submit_task(&self, task: &Value) -> Result<SubmitReceipt> {
        let resp = self
            .http
            .post(self.url("/tasks/submit"))
            .header("X-User", &self.username)
            .json(task)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn list_tasks(&self, all_users: bool) -> Result<Vec<TaskStatus>> {
        let list: TaskList = self.get_json("/tasks", all_users).await?;
        Ok(list.tasks)
    }

    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        self.get_json(&format!("/tasks/{task_id}"), false).await
    }

    pub async fn stop_task(&self, task_id: &str) -> Result<StopReceipt> {
        let resp = self
            .http
            .post(self.url(&format!("/tasks/{task_id}/stop")))
            .header("X-User", &self.username)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn stop_all_tasks(&self, all_users: bool) -> Result<StopAllReceipt> {
        let mut req = self
            .http
            .post(self.url("/tasks/stop"))
            .header("X-User", &self.username);
        if all_users {
            req = req.query(&[("all_users", "true")]);
        }
        Ok(Self::check(req.send().await?).await?.json().await?)
    }

    /// Stream the merged log feed, invoking `sink` once per line. Returns
    /// when the server closes the stream.
    pub async fn tail_logs(&self, task_id: &str, mut sink: impl FnMut(&str)) -> Result<()> {
        let resp = self
            .http
            .get(self.url(&format!("/tasks/{task_id}/logs")))
            .header("X-User", &self.username)
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                sink(String::from_utf8_lossy(&line[..pos]).trim_end_matches('\r'));
            }
        }
        if !buf.is_empty() {
            sink(String::from_utf8_lossy(&buf).trim_end_matches('\r'));
        }
        Ok(())
    }

    pub async fn create_volume(&self, def: &Value) -> Result<VolumeReceipt> {
        let resp = self
            .http
            .post(self.url("/volumes/create"))
            .header("X-User", &self.username)
            .json(def)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn list_volumes(&self, all_users: bool) -> Result<Vec<VolumeStatus>> {
        let list: VolumeList = self.get_json("/volumes", all_users).await?;
        Ok(list.volumes)
    }

    pub async fn volume_status(&self, volume_id: &str) -> Result<VolumeStatus> {
        self.get_json(&format!("/volumes/{volume_id}"), false).await
    }

    pub async fn delete_volume(&self, volume_id: &str) -> Result<VolumeReceipt> {
        let resp = self
            .http
            .delete(self.url(&format!("/volumes/{volume_id}")))
            .header("X-User", &self.username)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}
