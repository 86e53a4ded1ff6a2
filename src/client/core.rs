// File: src/client/core.rs
use crate::client::auth::sign;
use crate::client::service::{
    RemoteList, RemoteTask, ServiceError, TaskService, Timeline,
};
use crate::config::Config;

use chrono::NaiveDate;
use http::{Request, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

pub const DEFAULT_API_URL: &str = "https://api.rememberthemilk.com/services/rest/";
pub const DEFAULT_AUTH_URL: &str = "https://www.rememberthemilk.com/services/auth/";
pub const DEFAULT_PERMISSIONS: &str = "delete";

type HttpsClient =
    Client<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, String>;

/// Remember The Milk REST client. Every call is a signed GET answered with an
/// `<rsp>` XML document.
#[derive(Clone)]
pub struct RtmClient {
    http: HttpsClient,
    api_url: String,
    auth_url: String,
    api_key: String,
    shared_secret: String,
    permissions: String,
    token: Option<String>,
}

impl RtmClient {
    pub fn new(
        api_url: &str,
        auth_url: &str,
        api_key: &str,
        shared_secret: &str,
    ) -> Result<Self, String> {
        api_url
            .parse::<Uri>()
            .map_err(|e: http::uri::InvalidUri| e.to_string())?;

        let mut root_store = rustls::RootCertStore::empty();
        let result = rustls_native_certs::load_native_certs();
        root_store.add_parsable_certificates(result.certs);
        if root_store.is_empty() {
            // Plain http endpoints still work, https ones will fail the handshake.
            log::warn!("No valid system certificates found.");
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let http = Client::builder(TokioExecutor::new()).build(https_connector);
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            auth_url: auth_url.to_string(),
            api_key: api_key.to_string(),
            shared_secret: shared_secret.to_string(),
            permissions: DEFAULT_PERMISSIONS.to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, String> {
        if config.api_key.is_empty() || config.shared_secret.is_empty() {
            return Err("api_key and shared_secret must be set in the config file".to_string());
        }
        let mut client = Self::new(
            &config.api_url,
            &config.auth_url,
            &config.api_key,
            &config.shared_secret,
        )?;
        client.permissions = config.permissions.clone();
        Ok(client)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn shared_secret(&self) -> &str {
        &self.shared_secret
    }

    pub(crate) fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub(crate) fn permissions(&self) -> &str {
        &self.permissions
    }

    /// Builds the signed request URL for `method`.
    fn request_url(&self, method: &str, params: &[(&str, &str)]) -> Result<String, ServiceError> {
        let mut pairs = vec![
            ("method".to_string(), method.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
        ];
        if let Some(token) = &self.token {
            pairs.push(("auth_token".to_string(), token.clone()));
        }
        pairs.extend(params.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let sig = sign(&self.shared_secret, &pairs);
        pairs.push(("api_sig".to_string(), sig));

        let url = url::Url::parse_with_params(&self.api_url, &pairs)
            .map_err(|e| ServiceError::Transport(format!("bad API url: {}", e)))?;
        Ok(url.to_string())
    }

    /// Performs one API call and returns the raw body once `stat="ok"` has been checked.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<String, ServiceError> {
        let url = self.request_url(method, params)?;
        log::debug!("-> {}", method);

        let req = Request::builder()
            .method("GET")
            .uri(&url)
            .body(String::new())
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let resp = self
            .http
            .request(req)
            .await
            .map_err(|e| ServiceError::Transport(format!("{:?}", e)))?;

        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?
            .to_bytes();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!("{} failed: {}", method, status)));
        }

        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        Self::parse_response(&body)?;
        Ok(body)
    }

    /// Parses an `<rsp>` document, turning `stat="fail"` into [`ServiceError::Api`].
    pub(crate) fn parse_response(body: &str) -> Result<roxmltree::Document<'_>, ServiceError> {
        let doc = roxmltree::Document::parse(body)
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        let rsp = doc.root_element();
        if !rsp.has_tag_name("rsp") {
            return Err(ServiceError::Malformed(format!(
                "unexpected root element '{}'",
                rsp.tag_name().name()
            )));
        }
        if rsp.attribute("stat") != Some("ok") {
            let err = rsp.children().find(|n| n.has_tag_name("err"));
            let code = err
                .and_then(|e| e.attribute("code"))
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let message = err
                .and_then(|e| e.attribute("msg"))
                .unwrap_or("unknown error")
                .to_string();
            return Err(ServiceError::Api { code, message });
        }
        Ok(doc)
    }

    /// Text of the first element named `tag` in an ok response.
    pub(crate) fn parse_text(body: &str, tag: &str) -> Result<String, ServiceError> {
        let doc = Self::parse_response(body)?;
        doc.descendants()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ServiceError::Malformed(format!("missing <{}>", tag)))
    }

    fn parse_lists(body: &str) -> Result<Vec<RemoteList>, ServiceError> {
        let doc = Self::parse_response(body)?;
        let mut lists = Vec::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("list")) {
            if node.attribute("deleted") == Some("1") {
                continue;
            }
            lists.push(RemoteList {
                id: required_attr(node, "id")?,
                name: required_attr(node, "name")?,
                smart: node.attribute("smart") == Some("1"),
            });
        }
        Ok(lists)
    }

    /// Reads every `<taskseries>` under `<list>` elements, keeping the first task of each series.
    fn parse_task_series(body: &str) -> Result<Vec<RemoteTask>, ServiceError> {
        let doc = Self::parse_response(body)?;
        let mut tasks = Vec::new();
        for list in doc.descendants().filter(|n| n.has_tag_name("list")) {
            let list_id = required_attr(list, "id")?;
            for series in list.children().filter(|n| n.has_tag_name("taskseries")) {
                let task_id = series
                    .children()
                    .find(|n| n.has_tag_name("task"))
                    .and_then(|n| n.attribute("id"))
                    .unwrap_or_default()
                    .to_string();
                tasks.push(RemoteTask {
                    name: series.attribute("name").unwrap_or_default().to_string(),
                    list_id: list_id.clone(),
                    series_id: required_attr(series, "id")?,
                    task_id,
                });
            }
        }
        Ok(tasks)
    }

    fn parse_created_task(body: &str) -> Result<RemoteTask, ServiceError> {
        Self::parse_task_series(body)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Malformed("missing <taskseries>".to_string()))
    }

    async fn task_call(
        &self,
        method: &str,
        timeline: &Timeline,
        task: &RemoteTask,
        extra: &[(&str, &str)],
    ) -> Result<(), ServiceError> {
        let mut params = vec![
            ("timeline", timeline.0.as_str()),
            ("list_id", task.list_id.as_str()),
            ("taskseries_id", task.series_id.as_str()),
            ("task_id", task.task_id.as_str()),
        ];
        params.extend_from_slice(extra);
        self.call(method, &params).await.map(|_| ())
    }
}

fn required_attr(node: roxmltree::Node, name: &str) -> Result<String, ServiceError> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        ServiceError::Malformed(format!(
            "<{}> without '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

impl TaskService for RtmClient {
    async fn lists(&self) -> Result<Vec<RemoteList>, ServiceError> {
        let body = self.call("rtm.lists.getList", &[]).await?;
        Self::parse_lists(&body)
    }

    async fn task_series(&self) -> Result<Vec<RemoteTask>, ServiceError> {
        let body = self.call("rtm.tasks.getList", &[]).await?;
        Self::parse_task_series(&body)
    }

    async fn create_timeline(&self) -> Result<Timeline, ServiceError> {
        let body = self.call("rtm.timelines.create", &[]).await?;
        Self::parse_text(&body, "timeline").map(Timeline)
    }

    async fn add_list(&self, timeline: &Timeline, name: &str) -> Result<RemoteList, ServiceError> {
        let body = self
            .call("rtm.lists.add", &[("timeline", &timeline.0), ("name", name)])
            .await?;
        Self::parse_lists(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Malformed("missing <list>".to_string()))
    }

    async fn add_task(
        &self,
        timeline: &Timeline,
        list_id: &str,
        name: &str,
    ) -> Result<RemoteTask, ServiceError> {
        let body = self
            .call(
                "rtm.tasks.add",
                &[("timeline", &timeline.0), ("list_id", list_id), ("name", name)],
            )
            .await?;
        Self::parse_created_task(&body)
    }

    async fn add_tags(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        tags: &[String],
    ) -> Result<(), ServiceError> {
        let joined = tags.join(",");
        self.task_call("rtm.tasks.addTags", timeline, task, &[("tags", &joined)])
            .await
    }

    async fn add_note(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        title: &str,
        text: &str,
    ) -> Result<(), ServiceError> {
        self.task_call(
            "rtm.tasks.notes.add",
            timeline,
            task,
            &[("note_title", title), ("note_text", text)],
        )
        .await
    }

    async fn set_due_date(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        due: NaiveDate,
    ) -> Result<(), ServiceError> {
        let due = due.format("%Y-%m-%d").to_string();
        self.task_call(
            "rtm.tasks.setDueDate",
            timeline,
            task,
            &[("due", &due), ("has_due_time", "0"), ("parse", "0")],
        )
        .await
    }

    async fn complete(&self, timeline: &Timeline, task: &RemoteTask) -> Result<(), ServiceError> {
        self.task_call("rtm.tasks.complete", timeline, task, &[])
            .await
    }

    async fn delete_task(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
    ) -> Result<(), ServiceError> {
        self.task_call("rtm.tasks.delete", timeline, task, &[])
            .await
    }
}
