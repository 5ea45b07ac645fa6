//! Outbound AWS communication: Lambda invocation and IMDS credential
//! bootstrap, sharing one in-flight correlation queue.
//!
//! Requests are dispatched as real concurrent `reqwest` futures (rather
//! than serialized one-at-a-time, as the original single-threaded client
//! did), but completions are only handed to the caller in dispatch order
//! — a small reorder buffer in front of [`AwsClient::pop_ready`]
//! reproduces the "responses dequeue in registration order" invariant
//! without giving up real concurrency. Each spawned task fully resolves
//! its response (status, headers, body) before reporting back, so the
//! completion side of the client never has to await anything.

pub mod credentials;
pub mod sigv4;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use crate::address::Address;
use crate::envelope::OutboundEnvelope;

use credentials::{BootstrapState, Credentials};
use sigv4::Signer;

const IMDS_HOST: &str = "169.254.169.254";
const IMDS_TIMEOUT: Duration = Duration::from_secs(10);
const REFRESH_INTERVAL: Duration = Duration::from_secs(240);

/// Interval at which credentials acquired from IMDS are refreshed.
pub fn refresh_interval() -> Duration {
    REFRESH_INTERVAL
}

fn amz_datetime() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

/// What a dispatched request was for — replaces the original client's
/// raw continuation function pointers with a tagged variant.
#[derive(Debug, Clone)]
pub enum AwsOp {
    InvokeLambda { mailbox: Address },
    ImdsRegion,
    ImdsRole,
    ImdsCredentials { role: String },
}

/// A Lambda invocation's HTTP outcome, prior to interpretation by the mailbox.
#[derive(Debug, Clone)]
pub struct LambdaResponse {
    pub status: u16,
    pub function_error: bool,
    pub body: Bytes,
}

/// Transport-level failure: the request never completed with a status line,
/// or the response could not be read.
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully-resolved outcome of one dispatched request, produced entirely
/// inside the spawned task so the completion side never awaits.
enum Resolved {
    Lambda(Result<LambdaResponse, TransportError>),
    ImdsRegion(Result<String, TransportError>),
    ImdsRole(Result<String, TransportError>),
    /// `(access_key, secret, session_token)`
    ImdsCredentials(Result<(String, String, String), TransportError>),
}

struct RawCompletion {
    seq: u64,
    op: AwsOp,
    resolved: Resolved,
}

/// One event surfaced by [`AwsClient::pop_ready`] for the server to act on.
pub enum AwsEvent {
    /// A Lambda invocation for `mailbox` finished (success or transport failure).
    LambdaResult {
        mailbox: Address,
        result: Result<LambdaResponse, TransportError>,
    },
    /// The IMDS bootstrap reached `Done`; credentials are ready.
    CredentialsReady,
    /// The IMDS bootstrap reached `Error`.
    CredentialsFailed,
}

/// Async HTTP client to AWS, owning the signer, credentials, IMDS
/// bootstrap state, and the single in-flight correlation queue.
pub struct AwsClient {
    http: Client,
    endpoint_override: Option<Url>,
    role: String,
    credentials: Option<Credentials>,
    signer: Option<Signer>,
    bootstrap: BootstrapState,
    role_confirmed: bool,
    next_seq: u64,
    pending_order: VecDeque<u64>,
    arrived: HashMap<u64, RawCompletion>,
    lambda_mailboxes: HashMap<u64, Address>,
    tx: mpsc::UnboundedSender<RawCompletion>,
    rx: mpsc::UnboundedReceiver<RawCompletion>,
}

impl AwsClient {
    pub fn new(http: Client, endpoint_override: Option<Url>, role: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            http,
            endpoint_override,
            role,
            credentials: None,
            signer: None,
            bootstrap: BootstrapState::Region,
            role_confirmed: false,
            next_seq: 0,
            pending_order: VecDeque::new(),
            arrived: HashMap::new(),
            lambda_mailboxes: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Installs credentials known at startup, bypassing IMDS entirely.
    pub fn configure_static(&mut self, access_key: &str, secret: &str, region: &str) {
        self.credentials = Some(Credentials::static_config(access_key, secret, region));
        self.signer = Some(Signer::new(
            access_key,
            SecretString::from(secret.to_owned()),
            region,
            "lambda",
        ));
        self.bootstrap = BootstrapState::Done;
    }

    pub fn region(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.region.as_str())
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending_order.push_back(seq);
        seq
    }

    fn lambda_base_url(&self, region: &str) -> Url {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| Url::parse(&format!("https://lambda.{region}.amazonaws.com")).expect("valid lambda url"))
    }

    /// Builds and dispatches a signed Lambda `Invoke` request.
    pub fn invoke_lambda(
        &mut self,
        function_name: &str,
        mailbox: Address,
        envelope: &OutboundEnvelope,
    ) -> Result<u64, TransportError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| TransportError("no AWS credentials configured".into()))?
            .clone();

        let payload = serde_json::to_vec(envelope)
            .map_err(|e| TransportError(format!("failed to encode envelope: {e}")))?;

        let base = self.lambda_base_url(&creds.region);
        let host = base.host_str().unwrap_or("lambda.amazonaws.com").to_owned();
        let path = format!("/2015-03-31/functions/{function_name}/invocations");
        let datetime = amz_datetime();

        let signer = self
            .signer
            .as_mut()
            .ok_or_else(|| TransportError("signer not initialized".into()))?;
        let authorization = signer.sign("POST", &host, &path, "", &datetime, &payload);

        let url = base
            .join(&path)
            .map_err(|e| TransportError(format!("invalid lambda url: {e}")))?;

        let mut request = self
            .http
            .post(url)
            .header("host", &host)
            .header("x-amz-date", &datetime)
            .header("Authorization", authorization)
            .header("X-Amz-Invocation-Type", "RequestResponse")
            .header("X-Amz-Log-Type", "None")
            .header("Content-Type", "application/json");

        if let Some(token) = &creds.session_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        let request = request.body(payload);
        let seq = self.next_seq();
        let op = AwsOp::InvokeLambda {
            mailbox: mailbox.clone(),
        };
        self.lambda_mailboxes.insert(seq, mailbox);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let resolved = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let function_error = response
                        .headers()
                        .keys()
                        .any(|name| name.as_str().eq_ignore_ascii_case("x-amz-function-error"));
                    match response.bytes().await {
                        Ok(body) => Resolved::Lambda(Ok(LambdaResponse {
                            status,
                            function_error,
                            body,
                        })),
                        Err(e) => Resolved::Lambda(Err(TransportError(e.to_string()))),
                    }
                }
                Err(e) => Resolved::Lambda(Err(TransportError(e.to_string()))),
            };
            let _ = tx.send(RawCompletion { seq, op, resolved });
        });

        Ok(seq)
    }

    fn imds_url(path: &str) -> String {
        format!("http://{IMDS_HOST}{path}")
    }

    /// Begins (or restarts) the IMDS bootstrap state machine.
    ///
    /// Non-blocking: dispatches the request appropriate to the current
    /// state and returns immediately. The periodic refresh timer calls
    /// this once region and role are already known, which skips straight
    /// to re-fetching credentials rather than re-discovering the region.
    pub fn refresh_credentials(&mut self) {
        let region_known = self.credentials.is_some();
        self.bootstrap = BootstrapState::starting(region_known, self.role_confirmed);
        self.dispatch_bootstrap_request();
    }

    fn dispatch_bootstrap_request(&mut self) {
        match self.bootstrap {
            BootstrapState::Region => self.dispatch_imds_region(),
            BootstrapState::Role => self.dispatch_imds_role(),
            BootstrapState::Credentials => self.dispatch_imds_credentials(self.role.clone()),
            BootstrapState::Done | BootstrapState::Error => {}
        }
    }

    fn dispatch_imds_region(&mut self) {
        let request = self
            .http
            .get(Self::imds_url("/latest/dynamic/instance-identity/document"))
            .timeout(IMDS_TIMEOUT);
        let seq = self.next_seq();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resolved = Resolved::ImdsRegion(fetch_region(request).await);
            let _ = tx.send(RawCompletion {
                seq,
                op: AwsOp::ImdsRegion,
                resolved,
            });
        });
    }

    fn dispatch_imds_role(&mut self) {
        let request = self
            .http
            .get(Self::imds_url("/latest/meta-data/iam/security-credentials/"))
            .timeout(IMDS_TIMEOUT);
        let seq = self.next_seq();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resolved = Resolved::ImdsRole(fetch_role(request).await);
            let _ = tx.send(RawCompletion {
                seq,
                op: AwsOp::ImdsRole,
                resolved,
            });
        });
    }

    fn dispatch_imds_credentials(&mut self, role: String) {
        let request = self
            .http
            .get(Self::imds_url(&format!(
                "/latest/meta-data/iam/security-credentials/{role}"
            )))
            .timeout(IMDS_TIMEOUT);
        let seq = self.next_seq();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resolved = Resolved::ImdsCredentials(fetch_credentials(request).await);
            let _ = tx.send(RawCompletion {
                seq,
                op: AwsOp::ImdsCredentials { role },
                resolved,
            });
        });
    }

    /// Drives [`Self::refresh_credentials`] synchronously, draining
    /// completions on the current task until the bootstrap reaches
    /// `Done` or `Error`.
    pub async fn refresh_credentials_sync(&mut self) -> Result<(), ()> {
        self.refresh_credentials();
        loop {
            let raw = match self.rx.recv().await {
                Some(raw) => raw,
                None => return Err(()),
            };
            self.pending_order.retain(|seq| *seq != raw.seq);

            match self.process_completion(raw) {
                Some(AwsEvent::CredentialsReady) => return Ok(()),
                Some(AwsEvent::CredentialsFailed) => return Err(()),
                _ => {}
            }
        }
    }

    /// Non-blocking: awaits the next raw completion from the network,
    /// inserting it into the arrival buffer.
    pub async fn ingest(&mut self) {
        if let Some(raw) = self.rx.recv().await {
            self.arrived.insert(raw.seq, raw);
        }
    }

    /// Pulls and processes the next completion if its sequence number is
    /// at the front of the dispatch-order queue, i.e. it is safe to
    /// surface without violating request/response pairing order.
    pub fn pop_ready(&mut self) -> Option<AwsEvent> {
        let seq = *self.pending_order.front()?;
        let raw = self.arrived.remove(&seq)?;
        self.pending_order.pop_front();
        self.process_completion(raw)
    }

    /// `true` once the completion at the front of the dispatch queue has arrived.
    pub fn ready(&self) -> bool {
        self.pending_order
            .front()
            .is_some_and(|seq| self.arrived.contains_key(seq))
    }

    fn process_completion(&mut self, raw: RawCompletion) -> Option<AwsEvent> {
        tracing::trace!(seq = raw.seq, op = ?raw.op, "aws completion");
        match raw.resolved {
            Resolved::Lambda(result) => {
                let mailbox = self
                    .lambda_mailboxes
                    .remove(&raw.seq)
                    .expect("every dispatched lambda seq has a registered mailbox");
                Some(AwsEvent::LambdaResult { mailbox, result })
            }
            Resolved::ImdsRegion(result) => self.on_imds_region(result),
            Resolved::ImdsRole(result) => self.on_imds_role(result),
            Resolved::ImdsCredentials(result) => self.on_imds_credentials(result),
        }
    }

    fn on_imds_region(&mut self, result: Result<String, TransportError>) -> Option<AwsEvent> {
        match result {
            Ok(region) => {
                self.credentials = Some(Credentials::static_config("", "", &region));
                self.bootstrap = BootstrapState::Role;
                self.dispatch_bootstrap_request();
                None
            }
            Err(_) => {
                self.bootstrap = BootstrapState::Error;
                Some(AwsEvent::CredentialsFailed)
            }
        }
    }

    fn on_imds_role(&mut self, result: Result<String, TransportError>) -> Option<AwsEvent> {
        match result {
            Ok(role) => {
                self.role = role;
                self.role_confirmed = true;
                self.bootstrap = BootstrapState::Credentials;
                self.dispatch_bootstrap_request();
                None
            }
            Err(_) => {
                self.bootstrap = BootstrapState::Error;
                Some(AwsEvent::CredentialsFailed)
            }
        }
    }

    fn on_imds_credentials(
        &mut self,
        result: Result<(String, String, String), TransportError>,
    ) -> Option<AwsEvent> {
        match result {
            Ok((access_key, secret, token)) => {
                let region = self
                    .credentials
                    .as_ref()
                    .map(|c| c.region.clone())
                    .unwrap_or_default();
                self.signer = Some(Signer::new(
                    access_key.clone(),
                    SecretString::from(secret.clone()),
                    region.clone(),
                    "lambda",
                ));
                self.credentials = Some(Credentials::from_imds(
                    access_key,
                    SecretString::from(secret),
                    region,
                    token,
                ));
                self.bootstrap = BootstrapState::Done;
                Some(AwsEvent::CredentialsReady)
            }
            Err(_) => {
                self.bootstrap = BootstrapState::Error;
                Some(AwsEvent::CredentialsFailed)
            }
        }
    }
}

async fn fetch_region(request: reqwest::RequestBuilder) -> Result<String, TransportError> {
    let response = request.send().await.map_err(|e| TransportError(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TransportError(format!("IMDS region fetch returned {}", response.status())));
    }
    let document: ImdsIdentityDocument = response
        .json()
        .await
        .map_err(|e| TransportError(format!("malformed IMDS identity document: {e}")))?;
    Ok(document.region)
}

async fn fetch_role(request: reqwest::RequestBuilder) -> Result<String, TransportError> {
    let response = request.send().await.map_err(|e| TransportError(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TransportError(format!("IMDS role fetch returned {}", response.status())));
    }
    let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;
    let role = body.trim();
    if role.is_empty() {
        return Err(TransportError("IMDS returned an empty role name".into()));
    }
    Ok(role.to_owned())
}

async fn fetch_credentials(
    request: reqwest::RequestBuilder,
) -> Result<(String, String, String), TransportError> {
    let response = request.send().await.map_err(|e| TransportError(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TransportError(format!(
            "IMDS credentials fetch returned {}",
            response.status()
        )));
    }
    let doc: ImdsCredentialsDoc = response
        .json()
        .await
        .map_err(|e| TransportError(format!("malformed IMDS credentials document: {e}")))?;
    // The AWS-documented success marker is "Success"; older mqless versions
    // compared this case-inconsistently (see the spec's open questions).
    if doc.code != "Success" {
        return Err(TransportError(format!("IMDS credentials Code was {:?}", doc.code)));
    }
    Ok((doc.access_key_id, doc.secret_access_key, doc.token))
}

#[derive(Debug, Deserialize)]
struct ImdsIdentityDocument {
    region: String,
}

#[derive(Debug, Deserialize)]
struct ImdsCredentialsDoc {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "Token")]
    token: String,
}

/// Fetches the instance's private IPv4 address from IMDS, used to publish
/// the broker's endpoint when running on EC2. Best-effort: a failure here
/// just falls back to [`crate::net::local_interface_ip`].
pub async fn imds_private_ip(http: &Client) -> Option<std::net::IpAddr> {
    let response = http
        .get(AwsClient::imds_url("/latest/meta-data/local-ipv4"))
        .timeout(IMDS_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let body = response.text().await.ok()?;
    body.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpResponse, HttpServer};
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use tokio::time::sleep;

    /// Spawns a mock Lambda endpoint that echoes back a canned reply per
    /// function name, optionally delaying before responding, and records
    /// the headers it saw for each invocation.
    async fn spawn_mock_lambda() -> (Url, tokio::task::JoinHandle<()>) {
        async fn invoke(
            path: web::Path<String>,
            body: web::Bytes,
            req: actix_web::HttpRequest,
        ) -> HttpResponse {
            let function = path.into_inner();
            let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

            if payload.get("body").and_then(Value::as_str) == Some("slow") {
                sleep(StdDuration::from_millis(100)).await;
            }

            if function == "erroring" {
                return HttpResponse::InternalServerError()
                    .insert_header(("X-Amz-Function-Error", "Unhandled"))
                    .json(json!({"errorMessage": "boom"}));
            }

            let has_token = req.headers().get("X-Amz-Security-Token").is_some();
            HttpResponse::Ok().json(json!({
                "subject": "ack",
                "body": {"function": function, "had_token": has_token},
            }))
        }

        let server = HttpServer::new(|| {
            App::new().route(
                "/2015-03-31/functions/{function}/invocations",
                web::post().to(invoke),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock lambda listener");

        let addr = server.addrs()[0];
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        (Url::parse(&format!("http://{addr}")).unwrap(), handle)
    }

    fn client_with_mock(endpoint: Url) -> AwsClient {
        let mut client = AwsClient::new(Client::new(), Some(endpoint), "mqless-role".into());
        client.configure_static("AKID", "secret", "us-west-2");
        client
    }

    fn envelope(subject: &str, body: Option<Value>) -> (Address, OutboundEnvelope) {
        envelope_for("1", subject, body)
    }

    fn envelope_for(actor_id: &str, subject: &str, body: Option<Value>) -> (Address, OutboundEnvelope) {
        let mailbox = Address::from_parts("echo", actor_id).unwrap();
        let envelope = OutboundEnvelope {
            subject: subject.into(),
            from: Address::http_connection(1),
            address: mailbox.clone(),
            body,
        };
        (mailbox, envelope)
    }

    #[tokio::test]
    async fn invoke_lambda_round_trips_through_mock_server() {
        let (endpoint, _server) = spawn_mock_lambda().await;
        let mut client = client_with_mock(endpoint);

        let (mailbox, env) = envelope("greet", Some(json!("hi")));
        client.invoke_lambda("echo", mailbox.clone(), &env).unwrap();

        client.ingest().await;
        match client.pop_ready() {
            Some(AwsEvent::LambdaResult { mailbox: got, result }) => {
                assert_eq!(got, mailbox);
                let response = result.unwrap();
                assert_eq!(response.status, 200);
                assert!(!response.function_error);
            }
            _ => panic!("expected a lambda result"),
        }
    }

    #[tokio::test]
    async fn function_error_header_is_surfaced_on_the_response() {
        let (endpoint, _server) = spawn_mock_lambda().await;
        let mut client = client_with_mock(endpoint);

        let (mailbox, env) = envelope("do", None);
        client.invoke_lambda("erroring", mailbox, &env).unwrap();

        client.ingest().await;
        match client.pop_ready() {
            Some(AwsEvent::LambdaResult { result, .. }) => {
                let response = result.unwrap();
                assert_eq!(response.status, 500);
                assert!(response.function_error);
            }
            _ => panic!("expected a lambda result"),
        }
    }

    #[tokio::test]
    async fn session_token_header_is_sent_when_credentials_have_one() {
        let (endpoint, _server) = spawn_mock_lambda().await;
        let mut client = client_with_mock(endpoint);
        client.credentials = Some(Credentials::from_imds(
            "AKID".into(),
            SecretString::from("secret".to_string()),
            "us-west-2".into(),
            "ST".into(),
        ));

        let (mailbox, env) = envelope("do", None);
        client.invoke_lambda("echo", mailbox, &env).unwrap();

        client.ingest().await;
        match client.pop_ready() {
            Some(AwsEvent::LambdaResult { result, .. }) => {
                let response = result.unwrap();
                let body: Value = serde_json::from_slice(&response.body).unwrap();
                assert_eq!(body["body"]["had_token"], json!(true));
            }
            _ => panic!("expected a lambda result"),
        }
    }

    #[tokio::test]
    async fn completions_surface_in_dispatch_order_not_arrival_order() {
        let (endpoint, _server) = spawn_mock_lambda().await;
        let mut client = client_with_mock(endpoint);

        // First dispatched call is the slow one; the second finishes
        // first at the transport level, but must not be surfaced before it.
        let (slow_mailbox, slow_env) = envelope_for("slow-target", "do", Some(json!("slow")));
        let (fast_mailbox, fast_env) = envelope_for("fast-target", "do", Some(json!("fast")));
        client.invoke_lambda("echo", slow_mailbox.clone(), &slow_env).unwrap();
        client.invoke_lambda("echo", fast_mailbox.clone(), &fast_env).unwrap();

        // Wait for both requests to actually land before draining, so the
        // fast one really does arrive first.
        sleep(StdDuration::from_millis(150)).await;

        let mut seen = Vec::new();
        while seen.len() < 2 {
            if client.ready() {
                if let Some(AwsEvent::LambdaResult { mailbox, .. }) = client.pop_ready() {
                    seen.push(mailbox);
                }
            } else {
                client.ingest().await;
            }
        }

        assert_eq!(seen, vec![slow_mailbox, fast_mailbox]);
    }

    /// Spawns a mock IMDS responding to the three endpoints the bootstrap
    /// state machine calls, so the parsing/validation logic in
    /// `fetch_region`/`fetch_role`/`fetch_credentials` can be exercised
    /// without touching the real (link-local, hardcoded) IMDS host.
    async fn spawn_mock_imds(code: &'static str) -> (String, tokio::task::JoinHandle<()>) {
        async fn identity_document() -> HttpResponse {
            HttpResponse::Ok().json(json!({"region": "us-west-2"}))
        }

        async fn role() -> HttpResponse {
            HttpResponse::Ok().body("demo-role")
        }

        let server = HttpServer::new(move || {
            App::new()
                .route(
                    "/latest/dynamic/instance-identity/document",
                    web::get().to(identity_document),
                )
                .route(
                    "/latest/meta-data/iam/security-credentials/",
                    web::get().to(role),
                )
                .route(
                    "/latest/meta-data/iam/security-credentials/{role}",
                    web::get().to(move || {
                        let code = code.to_owned();
                        async move {
                            HttpResponse::Ok().json(json!({
                                "Code": code,
                                "AccessKeyId": "AKID",
                                "SecretAccessKey": "secret",
                                "Token": "ST",
                            }))
                        }
                    }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock imds listener");

        let addr = server.addrs()[0];
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        (format!("http://{addr}"), handle)
    }

    // `refresh_credentials` dispatches to the real (hardcoded) IMDS host,
    // so these only assert the state transition it computes before that
    // dispatch, not the network round-trip — the hardcoded host rules out
    // redirecting it at a mock server (see DESIGN.md).
    #[tokio::test]
    async fn refresh_before_any_bootstrap_starts_at_region() {
        let mut client = AwsClient::new(Client::new(), None, "mqless-role".into());
        client.refresh_credentials();
        assert_eq!(client.bootstrap, BootstrapState::Region);
    }

    #[tokio::test]
    async fn refresh_after_a_full_bootstrap_skips_straight_to_credentials() {
        let mut client = AwsClient::new(Client::new(), None, "mqless-role".into());
        client.credentials = Some(Credentials::static_config("AKID", "secret", "us-west-2"));
        client.role_confirmed = true;
        client.refresh_credentials();
        assert_eq!(client.bootstrap, BootstrapState::Credentials);
    }

    #[tokio::test]
    async fn fetch_region_parses_the_identity_document() {
        let (base, _server) = spawn_mock_imds("Success").await;
        let http = Client::new();
        let request = http.get(format!("{base}/latest/dynamic/instance-identity/document"));
        assert_eq!(fetch_region(request).await.unwrap(), "us-west-2");
    }

    #[tokio::test]
    async fn fetch_role_trims_the_body() {
        let (base, _server) = spawn_mock_imds("Success").await;
        let http = Client::new();
        let request = http.get(format!("{base}/latest/meta-data/iam/security-credentials/"));
        assert_eq!(fetch_role(request).await.unwrap(), "demo-role");
    }

    #[tokio::test]
    async fn fetch_credentials_succeeds_on_exact_success_code() {
        let (base, _server) = spawn_mock_imds("Success").await;
        let http = Client::new();
        let request = http.get(format!(
            "{base}/latest/meta-data/iam/security-credentials/demo-role"
        ));
        let (access_key, secret, token) = fetch_credentials(request).await.unwrap();
        assert_eq!(access_key, "AKID");
        assert_eq!(secret, "secret");
        assert_eq!(token, "ST");
    }

    #[tokio::test]
    async fn fetch_credentials_rejects_non_success_code() {
        // Older mqless versions compared this case-inconsistently
        // (`"SUCCESS"` vs `"Success"`); this crate requires the exact
        // AWS-documented value.
        let (base, _server) = spawn_mock_imds("SUCCESS").await;
        let http = Client::new();
        let request = http.get(format!(
            "{base}/latest/meta-data/iam/security-credentials/demo-role"
        ));
        assert!(fetch_credentials(request).await.is_err());
    }
}
