//! Remote dataset store: Hugging Face Hub dataset repositories

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine;
use harvestline_core::{PipelineError, block_on, http_client};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, HeaderMap, LINK};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Key-listing and blob-upload operations the publisher needs.
pub trait DatasetStore {
    /// Create the repository if it doesn't exist yet.
    fn ensure_repo(&self) -> Result<(), PipelineError>;
    /// Paths of every file currently in the repository.
    fn list_files(&self) -> Result<Vec<String>, PipelineError>;
    /// Store the contents of `local` under `path_in_repo`, replacing any previous version.
    fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<(), PipelineError>;
}

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Bytes of file content the Hub inspects to pick an upload mode
const PREUPLOAD_SAMPLE: usize = 512;

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Hub HTTP API client for one dataset repository
#[derive(Clone)]
pub struct HubClient {
    endpoint: String,
    repo_id: String,
    revision: String,
    token: String,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("endpoint", &self.endpoint)
            .field("repo_id", &self.repo_id)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

/// How the Hub wants a file delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Inline, base64 in the commit body
    Regular,
    /// Stored as an LFS object, referenced from the commit by its sha256
    Lfs,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

impl HubClient {
    pub fn new(endpoint: &str, repo_id: &str, token: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            repo_id: repo_id.to_string(),
            revision: "main".to_string(),
            token: token.to_string(),
        }
    }

    pub fn with_revision(mut self, revision: &str) -> Self {
        self.revision = revision.to_string();
        self
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    fn tree_url(&self) -> String {
        format!(
            "{}/api/datasets/{}/tree/{}?recursive=true",
            self.endpoint, self.repo_id, self.revision
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/api/datasets/{}/commit/{}",
            self.endpoint, self.repo_id, self.revision
        )
    }

    fn preupload_url(&self) -> String {
        format!(
            "{}/api/datasets/{}/preupload/{}",
            self.endpoint, self.repo_id, self.revision
        )
    }

    fn lfs_batch_url(&self) -> String {
        format!(
            "{}/datasets/{}.git/info/lfs/objects/batch",
            self.endpoint, self.repo_id
        )
    }

    /// Ask the Hub whether `path_in_repo` goes inline or through LFS.
    async fn preupload(
        &self,
        path_in_repo: &str,
        content: &[u8],
    ) -> Result<UploadMode, PipelineError> {
        let sample = &content[..content.len().min(PREUPLOAD_SAMPLE)];
        let body = serde_json::json!({
            "files": [{
                "path": path_in_repo,
                "sample": base64::engine::general_purpose::STANDARD.encode(sample),
                "size": content.len(),
            }],
        });
        let response = http_client()
            .post(self.preupload_url())
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(PipelineError::from_reqwest)?;
        let response = check_status(response).await?;
        let text = response.text().await.map_err(PipelineError::from_reqwest)?;
        let parsed: PreuploadResponse = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Parse(format!("preupload response: {e}")))?;
        parsed
            .files
            .into_iter()
            .find(|f| f.path == path_in_repo)
            .map(|f| f.upload_mode)
            .ok_or_else(|| PipelineError::Parse(format!("preupload response lacks {path_in_repo}")))
    }

    /// Push `content` to LFS storage under `oid` unless the Hub already has it.
    async fn upload_lfs(&self, oid: &str, content: &[u8]) -> Result<(), PipelineError> {
        let body = serde_json::json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "objects": [{ "oid": oid, "size": content.len() }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });
        let response = http_client()
            .post(self.lfs_batch_url())
            .bearer_auth(&self.token)
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(body.to_string())
            .send()
            .await
            .map_err(PipelineError::from_reqwest)?;
        let response = check_status(response).await?;
        let text = response.text().await.map_err(PipelineError::from_reqwest)?;
        let batch: LfsBatchResponse = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Parse(format!("LFS batch response: {e}")))?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Parse("LFS batch response has no objects".into()))?;
        if let Some(err) = object.error {
            return Err(PipelineError::Http {
                status: Some(err.code),
                message: err.message,
            });
        }
        let Some(actions) = object.actions else {
            log::debug!("LFS object {oid} already stored");
            return Ok(());
        };

        if let Some(upload) = &actions.upload {
            match upload.header.get("chunk_size").and_then(header_number) {
                Some(chunk_size) => self.put_multipart(oid, upload, content, chunk_size).await?,
                None => {
                    put_part(&upload.href, content.to_vec()).await?;
                }
            }
        }
        if let Some(verify) = &actions.verify {
            let response = http_client()
                .post(&verify.href)
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(serde_json::json!({ "oid": oid, "size": content.len() }).to_string())
                .send()
                .await
                .map_err(PipelineError::from_reqwest)?;
            check_status(response).await?;
        }
        Ok(())
    }

    /// Upload `content` in `chunk_size` parts to the numbered part URLs, then
    /// send the collected etags to the completion URL.
    async fn put_multipart(
        &self,
        oid: &str,
        upload: &LfsAction,
        content: &[u8],
        chunk_size: usize,
    ) -> Result<(), PipelineError> {
        let chunk_size = chunk_size.max(1);
        let part_urls = multipart_urls(&upload.header);
        let expected = content.len().div_ceil(chunk_size);
        if part_urls.len() != expected {
            return Err(PipelineError::Parse(format!(
                "LFS multipart: {} part URLs for {expected} chunks",
                part_urls.len()
            )));
        }

        let mut parts = Vec::with_capacity(expected);
        for ((number, url), chunk) in part_urls.iter().zip(content.chunks(chunk_size)) {
            let etag = put_part(url, chunk.to_vec()).await?;
            parts.push(serde_json::json!({ "partNumber": number, "etag": etag }));
        }
        log::debug!("LFS object {oid}: {} parts uploaded", parts.len());

        let response = http_client()
            .post(&upload.href)
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::json!({ "oid": oid, "parts": parts }).to_string())
            .send()
            .await
            .map_err(PipelineError::from_reqwest)?;
        check_status(response).await?;
        Ok(())
    }
}

/// Pass successful responses through; turn others into an error carrying the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("request failed").to_string();
    }
    Err(PipelineError::Http {
        status: Some(status.as_u16()),
        message,
    })
}

/// PUT one body to a storage URL, returning its etag (empty if none was sent).
async fn put_part(url: &str, body: Vec<u8>) -> Result<String, PipelineError> {
    let response = http_client()
        .put(url)
        .body(body)
        .send()
        .await
        .map_err(PipelineError::from_reqwest)?;
    let response = check_status(response).await?;
    Ok(response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string())
}

/// LFS header values arrive as either JSON numbers or strings
fn header_number(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Numbered part URLs of a multipart upload action, in part order
fn multipart_urls(header: &BTreeMap<String, serde_json::Value>) -> Vec<(u32, String)> {
    let mut parts: Vec<(u32, String)> = header
        .iter()
        .filter_map(|(key, value)| Some((key.parse().ok()?, value.as_str()?.to_string())))
        .collect();
    parts.sort_by_key(|(number, _)| *number);
    parts
}

/// Lowercase hex sha256, the LFS object id of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

/// Target of a `Link: <url>; rel="next"` header
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (url, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), r#"rel="next""# | "rel=next"));
        is_next.then(|| {
            url.trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

/// NDJSON commit body adding or replacing a single file.
pub fn commit_payload(path_in_repo: &str, content: &[u8]) -> String {
    let header = serde_json::json!({
        "key": "header",
        "value": { "summary": format!("Upload {path_in_repo}"), "description": "" },
    });
    let file = serde_json::json!({
        "key": "file",
        "value": {
            "path": path_in_repo,
            "encoding": "base64",
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        },
    });
    format!("{header}\n{file}\n")
}

/// NDJSON commit body pointing `path_in_repo` at an uploaded LFS object.
pub fn lfs_commit_payload(path_in_repo: &str, oid: &str, size: usize) -> String {
    let header = serde_json::json!({
        "key": "header",
        "value": { "summary": format!("Upload {path_in_repo}"), "description": "" },
    });
    let file = serde_json::json!({
        "key": "lfsFile",
        "value": { "path": path_in_repo, "algo": "sha256", "oid": oid, "size": size },
    });
    format!("{header}\n{file}\n")
}

impl DatasetStore for HubClient {
    fn ensure_repo(&self) -> Result<(), PipelineError> {
        let (organization, name) = match self.repo_id.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, self.repo_id.as_str()),
        };
        let body = serde_json::json!({
            "type": "dataset",
            "name": name,
            "organization": organization,
        });

        block_on(async {
            let response = http_client()
                .post(format!("{}/api/repos/create", self.endpoint))
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string())
                .send()
                .await
                .map_err(PipelineError::from_reqwest)?;
            if response.status() == StatusCode::CONFLICT {
                log::debug!("dataset {} already exists", self.repo_id);
                return Ok(());
            }
            check_status(response).await?;
            log::info!("Created dataset repository {}", self.repo_id);
            Ok(())
        })
    }

    fn list_files(&self) -> Result<Vec<String>, PipelineError> {
        block_on(async {
            let mut files = Vec::new();
            let mut url = Some(self.tree_url());
            while let Some(page_url) = url.take() {
                let response = http_client()
                    .get(&page_url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(PipelineError::from_reqwest)?;
                if response.status() == StatusCode::NOT_FOUND && files.is_empty() {
                    log::debug!("{}: no tree yet, treating as empty", self.repo_id);
                    break;
                }
                let response = check_status(response).await?;
                url = next_link(response.headers());

                let body = response.text().await.map_err(PipelineError::from_reqwest)?;
                let entries: Vec<TreeEntry> = serde_json::from_str(&body)
                    .map_err(|e| PipelineError::Parse(format!("tree listing: {e}")))?;
                files.extend(
                    entries
                        .into_iter()
                        .filter(|e| e.kind == "file")
                        .map(|e| e.path),
                );
            }
            Ok(files)
        })
    }

    /// Files the Hub routes to LFS (large or binary) are pushed to LFS storage
    /// first and committed by object id; everything else goes inline.
    fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<(), PipelineError> {
        let content = std::fs::read(local)?;

        block_on(async {
            let payload = match self.preupload(path_in_repo, &content).await? {
                UploadMode::Regular => commit_payload(path_in_repo, &content),
                UploadMode::Lfs => {
                    let oid = sha256_hex(&content);
                    log::debug!("{path_in_repo}: LFS upload of {} bytes", content.len());
                    self.upload_lfs(&oid, &content).await?;
                    lfs_commit_payload(path_in_repo, &oid, content.len())
                }
            };

            let response = http_client()
                .post(self.commit_url())
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(payload)
                .send()
                .await
                .map_err(PipelineError::from_reqwest)?;
            check_status(response).await?;
            Ok(())
        })
    }
}
