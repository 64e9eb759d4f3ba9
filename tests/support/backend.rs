//! Minimal routed HTTP/1.1 server for exercising the real client.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One request as seen by the server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct Route {
    status: u16,
    content_type: &'static str,
    extra_headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Default)]
pub struct BackendBuilder {
    routes: HashMap<String, Route>,
}

impl BackendBuilder {
    pub fn json(mut self, path: &str, status: u16, body: serde_json::Value) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status,
                content_type: "application/json",
                extra_headers: Vec::new(),
                body: body.to_string().into_bytes(),
            },
        );
        self
    }

    pub fn file(mut self, path: &str, disposition: &str, body: &[u8]) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status: 200,
                content_type: "application/octet-stream",
                extra_headers: vec![("Content-Disposition".into(), disposition.into())],
                body: body.to_vec(),
            },
        );
        self
    }

    /// Start serving on an ephemeral port. Unknown paths get a 404.
    pub fn start(self) -> Backend {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(self.routes);
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, &routes, &log));
            }
        });
        Backend { base_url, requests }
    }
}

pub struct Backend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Backend {
    pub fn builder() -> BackendBuilder {
        BackendBuilder::default()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

fn handle(stream: TcpStream, routes: &HashMap<String, Route>, log: &Mutex<Vec<Recorded>>) {
    let Some(request) = read_request(&stream) else {
        return;
    };
    let route = routes.get(&request.path).cloned().unwrap_or(Route {
        status: 404,
        content_type: "application/json",
        extra_headers: Vec::new(),
        body: br#"{"detail":"Not Found"}"#.to_vec(),
    });
    log.lock().unwrap().push(request);
    let mut head = format!(
        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        route.status,
        route.content_type,
        route.body.len()
    );
    for (name, value) in &route.extra_headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let mut stream = stream;
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&route.body);
    let _ = stream.flush();
}

fn read_request(stream: &TcpStream) -> Option<Recorded> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target, String::new()),
    };
    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;
    Some(Recorded {
        method,
        path,
        query,
        headers,
        body,
    })
}
