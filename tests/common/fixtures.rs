//! Stub coub.com API and media host backed by wiremock

use coub_archive::config::{ApiConfig, ArchiveConfig, ItemErrorPolicy, RetryConfig};
use coub_archive::{Config, ProgressSink, ProgressUpdate};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Path prefix the stub serves the listing API under
pub const API_PREFIX: &str = "/api/v2";

/// Query id used by every integration run
pub const QUERY_ID: &str = "it-run";

/// One wiremock server playing both the listing API and the media CDN
pub struct StubCoub {
    pub server: MockServer,
}

impl StubCoub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}{}", self.server.uri(), API_PREFIX)
    }

    pub fn video_url(&self, permalink: &str) -> String {
        format!("{}/media/{permalink}/higher.mp4", self.server.uri())
    }

    pub fn audio_url(&self, permalink: &str) -> String {
        format!("{}/media/{permalink}/high.mp3", self.server.uri())
    }

    /// Raw coub record with a `higher` video link and, optionally, a `high` audio link
    pub fn coub(&self, id: u64, permalink: &str, with_audio: bool) -> Value {
        let mut html5 = json!({
            "video": {
                "higher": { "url": self.video_url(permalink) },
                "high": { "url": "" },
                "med": { "url": "" }
            }
        });
        if with_audio {
            html5["audio"] = json!({
                "high": { "url": self.audio_url(permalink) },
                "med": { "url": "" }
            });
        }
        json!({
            "id": id,
            "permalink": permalink,
            "title": format!("title of {permalink}"),
            "file_versions": { "html5": html5 }
        })
    }

    /// Serve `page` of the likes timeline
    pub async fn page(&self, page: u32, total_pages: u32, coubs: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("{API_PREFIX}/timeline/likes")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": page,
                "total_pages": total_pages,
                "coubs": coubs,
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve the video of `permalink`
    pub async fn video(&self, permalink: &str, body: &[u8]) {
        self.media(&format!("/media/{permalink}/higher.mp4"), body).await;
    }

    /// Serve the audio of `permalink`
    pub async fn audio(&self, permalink: &str, body: &[u8]) {
        self.media(&format!("/media/{permalink}/high.mp3"), body).await;
    }

    async fn media(&self, media_path: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(media_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Config pointed at the stub with fast retries
    pub fn config(&self, dir: &TempDir, workers: usize, policy: ItemErrorPolicy) -> Config {
        Config {
            api: ApiConfig {
                base_url: self.api_url(),
                cookie: Some("remember_token=integration".to_string()),
                ..ApiConfig::default()
            },
            archive: ArchiveConfig {
                root_dir: dir.path().join("coubs"),
                temp_dir: dir.path().join("coubs-temporary-folder"),
                workers,
                queue_capacity: 8,
                on_item_error: policy,
            },
            retry: RetryConfig {
                retries: 1,
                delay: Duration::from_millis(20),
            },
            ..Config::default()
        }
    }
}

/// Progress sink recording every update
pub fn recording_sink() -> (Arc<dyn ProgressSink>, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let recorded = updates.clone();
    let sink = move |update: ProgressUpdate| {
        if let Ok(mut updates) = recorded.lock() {
            updates.push(update);
        }
    };
    (Arc::new(sink), updates)
}

/// Stub IPFS RPC API accepting every mkdir, add, cp, and unpin
pub async fn stub_ipfs() -> MockServer {
    let server = MockServer::start().await;

    for endpoint in ["files/mkdir", "files/cp", "pin/rm", "version"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/v0/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
    }

    // Echo a root entry for whatever staging directory was sent
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(|req: &Request| {
            let body = String::from_utf8_lossy(&req.body);
            let root = body
                .split("filename=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default()
                .to_string();
            ResponseTemplate::new(200)
                .set_body_string(format!("{{\"Name\":\"{root}\",\"Hash\":\"Qm{root}\"}}\n"))
        })
        .mount(&server)
        .await;

    server
}
