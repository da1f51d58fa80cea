//! Test doubles: a mock database HTTP endpoint and a fake container runtime.

use alloc::sync::Arc;
use core::{
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use std::{
    collections::HashMap,
    io,
    net::TcpListener as StdTcpListener,
    sync::{Mutex, MutexGuard, PoisonError},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE},
    response::{IntoResponse as _, Response},
    routing::post,
};
use futures::future::BoxFuture;
use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    process::{ProcessInvoker, ProcessOutput},
    session::ConnectionConfig,
};

/// Behaviour of a [`MockSurreal`].
#[derive(Debug, Clone)]
pub(crate) struct MockSurrealOptions {
    pub user: String,
    pub pass: String,
    pub token: String,
    /// Replaces the sign-in success body.
    pub signin_body: Option<String>,
    pub signin_delay_ms: u64,
    pub sql_status: StatusCode,
    pub sql_body: String,
}

impl Default for MockSurrealOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            pass: "root".to_string(),
            token: "abc".to_string(),
            signin_body: None,
            signin_delay_ms: 0,
            sql_status: StatusCode::OK,
            sql_body: r#"[{"result":[],"status":"OK","time":"10µs"}]"#.to_string(),
        }
    }
}

/// A `/sql` request as the mock received it.
#[derive(Debug, Clone)]
pub(crate) struct SeenQuery {
    pub authorization: Option<String>,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub body: String,
}

pub(crate) struct MockState {
    options: MockSurrealOptions,
    pub signins: AtomicUsize,
    pub queries: AtomicUsize,
    last_query: Mutex<Option<SeenQuery>>,
}

impl MockState {
    pub(crate) fn last_query(&self) -> Option<SeenQuery> {
        self.last_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Database HTTP endpoint double serving `/signin` and `/sql` on an ephemeral port.
pub(crate) struct MockSurreal {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockSurreal {
    pub(crate) async fn spawn(options: MockSurrealOptions) -> Self {
        let state = Arc::new(MockState {
            options,
            signins: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        });
        let app = Router::new()
            .route("/signin", post(signin))
            .route("/sql", post(sql))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state, task }
    }
}

impl Drop for MockSurreal {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn signin(State(state): State<Arc<MockState>>, Json(body): Json<serde_json::Value>) -> Response {
    state.signins.fetch_add(1, Ordering::SeqCst);
    let options = &state.options;
    if options.signin_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(options.signin_delay_ms)).await;
    }

    if body["user"] == options.user.as_str() && body["pass"] == options.pass.as_str() {
        let body = options.signin_body.clone().unwrap_or_else(|| {
            serde_json::json!({
                "code": 200,
                "details": "Authentication succeeded",
                "token": options.token,
            })
            .to_string()
        });
        (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(CONTENT_TYPE, "application/json")],
            r#"{"code":401,"details":"Authentication failed"}"#,
        )
            .into_response()
    }
}

async fn sql(State(state): State<Arc<MockState>>, headers: HeaderMap, body: String) -> Response {
    state.queries.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let seen = SeenQuery {
        authorization: header(AUTHORIZATION.as_str()),
        namespace: header("ns"),
        database: header("db"),
        body,
    };
    let authorized = seen.authorization.as_deref()
        == Some(format!("Bearer {}", state.options.token).as_str());
    *state
        .last_query
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(seen);

    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing or invalid token").into_response();
    }
    (
        state.options.sql_status,
        [(CONTENT_TYPE, "application/json")],
        state.options.sql_body.clone(),
    )
        .into_response()
}

/// Default connection settings pointing at `addr`.
pub(crate) fn connection_to(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..ConnectionConfig::default()
    }
}

/// An address nothing listens on.
pub(crate) fn unused_addr() -> SocketAddr {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeStatus {
    Running,
    Exited,
}

#[derive(Debug, Default)]
struct FakeDocker {
    containers: HashMap<String, FakeStatus>,
    next_id: usize,
    calls: Vec<(String, Vec<String>)>,
}

/// In-memory stand-in for the `docker` CLI.
#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    inner: Mutex<FakeDocker>,
    /// Every call fails to spawn, as if the runtime was not installed.
    unavailable: bool,
    /// `rm` fails with this stderr regardless of state.
    rm_failure: Option<String>,
    /// `run` fails with this stderr regardless of state.
    run_failure: Option<String>,
}

impl FakeRuntime {
    pub(crate) fn with_container(self, name: &str, status: FakeStatus) -> Self {
        self.lock().containers.insert(name.to_string(), status);
        self
    }

    /// Every call fails to spawn.
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_rm_failure(mut self, stderr: &str) -> Self {
        self.rm_failure = Some(stderr.to_string());
        self
    }

    pub(crate) fn with_run_failure(mut self, stderr: &str) -> Self {
        self.run_failure = Some(stderr.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeDocker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn containers(&self) -> HashMap<String, FakeStatus> {
        self.lock().containers.clone()
    }

    pub(crate) fn subcommands(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.0.clone()).collect()
    }

    pub(crate) fn last_args(&self, subcommand: &str) -> Option<Vec<String>> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.0 == subcommand)
            .map(|c| c.1.clone())
    }

    fn apply(&self, subcommand: &str, args: &[String]) -> ProcessOutput {
        let mut docker = self.lock();
        docker
            .calls
            .push((subcommand.to_string(), args.to_vec()));
        let ok = |stdout: String| ProcessOutput {
            stdout,
            stderr: String::new(),
            code: Some(0),
        };
        let fail = |stderr: String, code: i32| ProcessOutput {
            stdout: String::new(),
            stderr,
            code: Some(code),
        };
        let no_such = |name: &str| {
            fail(
                format!("Error response from daemon: No such container: {name}\n"),
                1,
            )
        };
        let last = args.last().cloned().unwrap_or_default();

        match subcommand {
            "ps" => {
                let filter = args
                    .iter()
                    .find_map(|a| a.strip_prefix("name="))
                    .unwrap_or_default()
                    .to_string();
                let lines = docker
                    .containers
                    .iter()
                    .filter(|&(name, _)| name.contains(&filter))
                    .map(|(name, status)| {
                        let state = match *status {
                            FakeStatus::Running => "running",
                            FakeStatus::Exited => "exited",
                        };
                        serde_json::json!({ "Names": name, "State": state }).to_string()
                    })
                    .collect::<Vec<_>>();
                ok(lines.join("\n"))
            }
            "rm" => {
                if let Some(ref stderr) = self.rm_failure {
                    return fail(stderr.clone(), 1);
                }
                if docker.containers.remove(&last).is_some() {
                    ok(format!("{last}\n"))
                } else {
                    no_such(&last)
                }
            }
            "run" => {
                if let Some(ref stderr) = self.run_failure {
                    return fail(stderr.clone(), 125);
                }
                let name = args
                    .iter()
                    .position(|a| a == "--name")
                    .and_then(|i| args.get(i + 1))
                    .cloned()
                    .unwrap_or_default();
                if docker.containers.contains_key(&name) {
                    return fail(
                        format!(
                            "docker: Error response from daemon: Conflict. The container name \"/{name}\" is already in use.\n"
                        ),
                        125,
                    );
                }
                docker.next_id += 1;
                let id = format!("{:064x}", docker.next_id);
                docker.containers.insert(name, FakeStatus::Running);
                ok(format!("{id}\n"))
            }
            "stop" | "restart" => match docker.containers.get_mut(&last) {
                Some(status) => {
                    *status = if subcommand == "stop" {
                        FakeStatus::Exited
                    } else {
                        FakeStatus::Running
                    };
                    ok(format!("{last}\n"))
                }
                None => no_such(&last),
            },
            other => fail(format!("unknown command: {other}"), 1),
        }
    }
}

impl ProcessInvoker for FakeRuntime {
    fn exec<'call>(
        &'call self,
        subcommand: &'call str,
        args: &'call [String],
    ) -> BoxFuture<'call, io::Result<ProcessOutput>> {
        Box::pin(async move {
            // Give concurrent callers a chance to interleave.
            tokio::task::yield_now().await;
            if self.unavailable {
                return Err(io::Error::new(io::ErrorKind::NotFound, "docker: not found"));
            }
            Ok(self.apply(subcommand, args))
        })
    }
}
