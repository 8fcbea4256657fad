use debugkit_types::{Handler, HandlerCore, Result, format_timestamp, now};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::BTreeMap;

pub const TYPE: &str = "request";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Request data as seen by the web layer; populated by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSnapshot {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub server: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub session: BTreeMap<String, Value>,
    pub get: BTreeMap<String, Value>,
    pub post: BTreeMap<String, Value>,
    pub put: BTreeMap<String, Value>,
    pub patch: BTreeMap<String, Value>,
    pub delete: BTreeMap<String, Value>,
    pub files: Vec<UploadedFile>,
    pub raw_body: Option<String>,
    pub parsed_body: Option<Value>,
}

impl RequestSnapshot {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.get.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.parsed_body = serde_json::from_str(&raw).ok();
        self.raw_body = Some(raw);
        self
    }

    /// Body parameters for the request's own verb.
    pub fn body_params(&self) -> &BTreeMap<String, Value> {
        match self.method.to_ascii_uppercase().as_str() {
            "POST" => &self.post,
            "PUT" => &self.put,
            "PATCH" => &self.patch,
            "DELETE" => &self.delete,
            _ => &self.get,
        }
    }
}

/// Captures request metadata, timestamped when the handler is created.
#[derive(Debug)]
pub struct RequestHandler {
    core: HandlerCore,
    request: RequestSnapshot,
    request_time: f64,
}

impl RequestHandler {
    pub fn new(request: RequestSnapshot) -> Self {
        let request_time = now();
        let mut core = HandlerCore::new();
        core.start(Some(request_time));

        Self {
            core,
            request,
            request_time,
        }
    }

    pub fn request(&self) -> &RequestSnapshot {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestSnapshot {
        &mut self.request
    }

    pub fn request_time(&self) -> f64 {
        self.request_time
    }

    fn summary(&self) -> String {
        format!("{} {}", self.request.method, self.request.uri)
    }
}

fn push_section<V: std::fmt::Display>(out: &mut String, title: &str, map: &BTreeMap<String, V>) {
    if map.is_empty() {
        return;
    }
    out.push_str(&format!("{}:\n", title));
    for (key, value) in map {
        out.push_str(&format!("\t{}: {}\n", key, value));
    }
    out.push('\n');
}

impl Handler for RequestHandler {
    fn handler_type(&self) -> &'static str {
        TYPE
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn prepare(&mut self) -> Value {
        let r = &self.request;
        json!({
            "method": r.method,
            "uri": r.uri,
            "timestamp": self.request_time,
            "headers": r.headers,
            "server": r.server,
            "env": r.env,
            "cookies": r.cookies,
            "session": r.session,
            "get": r.get,
            "post": r.post,
            "put": r.put,
            "patch": r.patch,
            "delete": r.delete,
            "files": r.files,
            "raw_body": r.raw_body,
            "parsed_body": r.parsed_body,
        })
    }

    fn prepare_as_string(&mut self) -> String {
        let r = &self.request;
        let mut out = format!(
            "{}\nTimestamp:\t{}\n\n",
            self.summary(),
            format_timestamp(self.request_time)
        );

        push_section(&mut out, "Headers", &r.headers);
        push_section(&mut out, "Cookies", &r.cookies);
        push_section(&mut out, "Session", &r.session);
        push_section(&mut out, "GET", &r.get);
        push_section(&mut out, "POST", &r.post);
        push_section(&mut out, "PUT", &r.put);
        push_section(&mut out, "PATCH", &r.patch);
        push_section(&mut out, "DELETE", &r.delete);

        if !r.files.is_empty() {
            out.push_str("Files:\n");
            for file in &r.files {
                out.push_str(&format!(
                    "\t{}: {} ({} bytes)\n",
                    file.field, file.filename, file.size
                ));
            }
            out.push('\n');
        }

        if let Some(body) = &r.raw_body {
            out.push_str(&format!("Body:\n\t{}\n\n", body));
        }

        push_section(&mut out, "Server", &r.server);
        push_section(&mut out, "Environment", &r.env);
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        let context = self.log_context(target.params.context);
        target.emit(&self.summary(), &context);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
