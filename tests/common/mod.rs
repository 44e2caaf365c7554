#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use citykit::{
    ApiClient, City, CityApi, Config, ContextBroadcaster, FeatureState, FeatureStatus,
    HttpCredentialsGateway, MemoryStore, SessionManager, UserProfile,
};

#[derive(Clone)]
struct Canned {
    status: u16,
    body: String,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Scripted one-shot HTTP server. Responses are staged per `METHOD path`
/// and consumed in order; anything unstaged answers 404. Every request is
/// recorded for the assertions.
#[derive(Default)]
pub struct Script {
    responses: Mutex<HashMap<String, VecDeque<Canned>>>,
    log: Mutex<Vec<Recorded>>,
}

impl Script {
    pub fn stage(&self, method: &str, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(Canned {
                status,
                body: body.to_string(),
            });
    }

    pub fn calls(&self, method: &str, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| recorded.method == method && recorded.path == path)
            .count()
    }

    pub fn requests(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| recorded.method == method && recorded.path == path)
            .cloned()
            .collect()
    }

    fn next(&self, method: &str, path: &str) -> Canned {
        self.responses
            .lock()
            .unwrap()
            .get_mut(&format!("{method} {path}"))
            .and_then(VecDeque::pop_front)
            .unwrap_or(Canned {
                status: 404,
                body: String::new(),
            })
    }
}

pub async fn start_server() -> (SocketAddr, Arc<Script>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(Script::default());
    let serving = script.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(handle(socket, serving.clone()));
        }
    });
    (addr, script)
}

async fn handle(mut socket: TcpStream, script: Arc<Script>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 2048];
    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
                    break end;
                }
            }
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = header_value(&head, "content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = (body_start + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[body_start..body_end]).into_owned();

    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let authorization = header_value(&head, "authorization");

    let canned = script.next(&method, &path);
    script.log.lock().unwrap().push(Recorded {
        method,
        path,
        authorization,
        body,
    });

    let reply = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        canned.status,
        reason(canned.status),
        canned.body.len(),
        canned.body
    );
    let _ = socket.write_all(reply.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(header, _)| header.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        _ => "Error",
    }
}

/// The full client stack wired against a scripted server.
pub struct TestApp {
    pub script: Arc<Script>,
    pub store: Arc<MemoryStore>,
    pub context: ContextBroadcaster,
    pub session: Arc<SessionManager<HttpCredentialsGateway>>,
    pub api: Arc<CityApi<HttpCredentialsGateway>>,
}

pub async fn start_app() -> TestApp {
    let (addr, script) = start_server().await;
    let config = Arc::new(Config {
        base_url: format!("http://{addr}"),
        ..Config::default()
    });
    let store = Arc::new(MemoryStore::new());
    let context = ContextBroadcaster::new();
    let gateway = Arc::new(HttpCredentialsGateway::new(config.clone()).unwrap());
    let session = Arc::new(SessionManager::new(
        gateway,
        store.clone(),
        context.clone(),
        config.clone(),
    ));
    let api = Arc::new(CityApi::new(Arc::new(
        ApiClient::new(session.clone(), config).unwrap(),
    )));
    TestApp {
        script,
        store,
        context,
        session,
        api,
    }
}

pub fn token_envelope(access: &str, expires_in: i64) -> String {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": "refresh-1",
        "expiresIn": expires_in,
        "refreshExpiresIn": 86_400,
        "userId": "user-7",
    })
    .to_string()
}

pub fn city(id: i64) -> City {
    City {
        id,
        name: format!("City {id}"),
        color: 0,
        postal_codes: Vec::new(),
    }
}

pub fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email: None,
        postal_code: None,
        home_city_id: None,
    }
}

pub async fn wait_for_status<T: Clone + Send + Sync>(
    rx: &mut watch::Receiver<FeatureState<T>>,
    want: FeatureStatus,
) {
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|state| state.status() == want),
    )
    .await
    .expect("feature state did not settle in time")
    .unwrap();
}
