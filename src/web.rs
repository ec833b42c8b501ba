//! Local web UI: a small HTTP server on localhost that renders the controller
//! state and turns form posts into controller operations.
//!
//! | Method | Path | Action |
//! |---|---|---|
//! | GET  | `/` | rendered page |
//! | GET  | `/state` | state as JSON |
//! | POST | `/files` | select newline-separated local `paths` |
//! | POST | `/files/clear` | clear the selection |
//! | POST | `/upload` | upload the selection |
//! | POST | `/populate` | populate, `reset` checkbox |
//! | POST | `/query` | ask `question` |
//! | POST | `/chat/clear` | clear the transcript |
//! | POST | `/status/dismiss` | dismiss banner `target` (`upload`/`db`) |
//! | POST | `/diagnose` | check the embedding pipeline |
//!
//! Every POST answers `303 See Other` back to the page. Each connection is
//! served on its own task, so a slow populate does not block a query.

use std::collections::HashMap;

use colored::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::controller::{Controller, StatusTarget};
use crate::error::DocchatError;
use crate::render::LATEST_ANCHOR;

/// Largest request body accepted, in bytes.
const MAX_BODY: usize = 1 << 20;

/// Percent-decoding for form values. `+` is a space; invalid escapes are kept
/// literally and the result is decoded as UTF-8.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                out.push((hex_value(bytes[i + 1]) << 4) | hex_value(bytes[i + 2]));
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Parse an `application/x-www-form-urlencoded` body or query string.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let val = parts.next().unwrap_or("");
            Some((url_decode(key), url_decode(val)))
        })
        .collect()
}

/// A request mapped onto a controller operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Page,
    State,
    SelectFiles(Vec<String>),
    ClearFiles,
    Upload,
    Populate { reset: bool },
    Query(String),
    ClearChat,
    Dismiss(StatusTarget),
    Diagnose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    NotFound,
    MethodNotAllowed,
    BadRequest(&'static str),
}

/// Map method, path and form body to an [`Action`].
pub fn route(method: &str, path: &str, form: &HashMap<String, String>) -> Result<Action, RouteError> {
    let path = path.split('?').next().unwrap_or(path);
    let action = match path {
        "/" | "/index.html" => Action::Page,
        "/state" => Action::State,
        "/files" => Action::SelectFiles(
            form.get("paths")
                .map(|p| {
                    p.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "/files/clear" => Action::ClearFiles,
        "/upload" => Action::Upload,
        "/populate" => Action::Populate {
            reset: form.get("reset").is_some_and(|v| !v.is_empty() && v != "0"),
        },
        "/query" => Action::Query(form.get("question").cloned().unwrap_or_default()),
        "/chat/clear" => Action::ClearChat,
        "/status/dismiss" => match form.get("target").map(String::as_str) {
            Some("upload") => Action::Dismiss(StatusTarget::Upload),
            Some("db") => Action::Dismiss(StatusTarget::Database),
            _ => return Err(RouteError::BadRequest("unknown banner target")),
        },
        "/diagnose" => Action::Diagnose,
        _ => return Err(RouteError::NotFound),
    };
    let wants_get = matches!(action, Action::Page | Action::State);
    match (method, wants_get) {
        ("GET", true) | ("POST", false) => Ok(action),
        _ => Err(RouteError::MethodNotAllowed),
    }
}

/// Start the UI server. Runs until the listener fails.
pub async fn serve<B: Backend>(
    controller: Controller<B>,
    port: u16,
    open_browser: bool,
) -> Result<(), DocchatError> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    let url = format!("http://localhost:{}", listener.local_addr()?.port());

    info!(%url, "web UI listening");
    eprintln!("{}", format!("  Web UI running at {url}").bright_green());
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());

    if open_browser {
        open_in_browser(&url);
    }

    let startup = controller.clone();
    tokio::spawn(async move { startup.load_initial_counts().await });

    serve_on(listener, controller).await
}

/// Accept connections on `listener` until it fails, one task per connection.
pub async fn serve_on<B: Backend>(
    listener: TcpListener,
    controller: Controller<B>,
) -> Result<(), DocchatError> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let controller = controller.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, controller).await {
                warn!(%addr, error = %e, "connection error");
            }
        });
    }
}

fn open_in_browser(url: &str) {
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd").args(["/C", &format!("start {url}")]).spawn();
    }
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
}

/// Method, path and body of one request.
struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

async fn read_request(stream: &mut TcpStream) -> Result<Option<Request>, DocchatError> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        let status = req
            .parse(&buf)
            .map_err(|e| DocchatError::Transport(format!("malformed request: {e}")))?;
        let httparse::Status::Complete(head_len) = status else {
            if buf.len() > MAX_BODY {
                return Err(DocchatError::Validation("request head too large".into()));
            }
            continue;
        };

        let content_length = req
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-length"))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if content_length > MAX_BODY {
            return Err(DocchatError::Validation("request body too large".into()));
        }
        let method = req.method.unwrap_or("GET").to_string();
        let path = req.path.unwrap_or("/").to_string();

        let mut body = buf[head_len..].to_vec();
        while body.len() < content_length {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(content_length);
        return Ok(Some(Request { method, path, body }));
    }
}

async fn handle_connection<B: Backend>(
    mut stream: TcpStream,
    controller: Controller<B>,
) -> Result<(), DocchatError> {
    let request = match read_request(&mut stream).await {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(DocchatError::Validation(why)) => {
            stream.write_all(plain("413 Payload Too Large", &why).as_bytes()).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    debug!(method = %request.method, path = %request.path, "request");

    let form = parse_query(&String::from_utf8_lossy(&request.body));
    let response = match route(&request.method, &request.path, &form) {
        Ok(action) => dispatch(&controller, action).await,
        Err(RouteError::NotFound) => plain("404 Not Found", "Not Found"),
        Err(RouteError::MethodNotAllowed) => plain("405 Method Not Allowed", "Method Not Allowed"),
        Err(RouteError::BadRequest(why)) => plain("400 Bad Request", why),
    };
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Run the action and build the HTTP response.
///
/// Upload, populate and query are started on their own task and answered
/// right away; the page shows them in flight and refreshes until they settle.
pub async fn dispatch<B: Backend>(controller: &Controller<B>, action: Action) -> String {
    match action {
        Action::Page => {
            let html = controller.render_page();
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n{}",
                html.len(),
                html,
            )
        }
        Action::State => {
            let body = serde_json::to_string(&controller.snapshot()).unwrap_or_else(|_| "{}".to_string());
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body,
            )
        }
        Action::SelectFiles(paths) => {
            controller.select_files(paths);
            redirect("/")
        }
        Action::ClearFiles => {
            controller.clear_selection();
            redirect("/")
        }
        Action::Upload => {
            controller.spawn_upload();
            redirect("/")
        }
        Action::Populate { reset } => {
            controller.spawn_populate(reset);
            redirect("/")
        }
        Action::Query(question) => {
            controller.spawn_query(&question);
            redirect(&format!("/#{LATEST_ANCHOR}"))
        }
        Action::ClearChat => {
            controller.clear_chat();
            redirect("/")
        }
        Action::Dismiss(target) => {
            controller.dismiss(target);
            redirect("/")
        }
        Action::Diagnose => {
            controller.diagnose().await;
            redirect("/")
        }
    }
}

fn redirect(location: &str) -> String {
    format!("HTTP/1.1 303 See Other\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
}

fn plain(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    // -- url_decode ---------------------------------------------------------

    #[test]
    fn test_url_decode_basic() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a%26b"), "a&b");
        assert_eq!(url_decode("plain"), "plain");
    }

    #[test]
    fn test_url_decode_empty() {
        assert_eq!(url_decode(""), "");
    }

    #[test]
    fn test_url_decode_utf8_sequence() {
        assert_eq!(url_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_url_decode_newlines() {
        assert_eq!(url_decode("a.pdf%0D%0Ab.txt"), "a.pdf\r\nb.txt");
    }

    #[test]
    fn test_url_decode_truncated_escape_kept() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%4"), "%4");
    }

    #[test]
    fn test_url_decode_sign_is_not_hex() {
        assert_eq!(url_decode("%+1"), "% 1");
        assert_eq!(url_decode("%-1x"), "%-1x");
        assert_eq!(url_decode("%41%2f%2F"), "A//");
    }

    // -- parse_query --------------------------------------------------------

    #[test]
    fn test_parse_query_basic() {
        let params = parse_query("question=what+is+this%3F&reset=1");
        assert_eq!(params.get("question").map(String::as_str), Some("what is this?"));
        assert_eq!(params.get("reset").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_query_empty() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn test_parse_query_key_without_value() {
        let params = parse_query("reset");
        assert_eq!(params.get("reset").map(String::as_str), Some(""));
    }

    // -- route --------------------------------------------------------------

    #[test]
    fn route_page_and_state() {
        assert_eq!(route("GET", "/", &form(&[])), Ok(Action::Page));
        assert_eq!(route("GET", "/state", &form(&[])), Ok(Action::State));
        assert_eq!(route("GET", "/?x=1", &form(&[])), Ok(Action::Page));
    }

    #[test]
    fn route_select_files_splits_lines() {
        let f = form(&[("paths", "/tmp/a.pdf\r\n\r\n  /tmp/b.txt  \n")]);
        assert_eq!(
            route("POST", "/files", &f),
            Ok(Action::SelectFiles(vec!["/tmp/a.pdf".into(), "/tmp/b.txt".into()]))
        );
    }

    #[test]
    fn route_populate_reset_checkbox() {
        assert_eq!(route("POST", "/populate", &form(&[])), Ok(Action::Populate { reset: false }));
        assert_eq!(
            route("POST", "/populate", &form(&[("reset", "1")])),
            Ok(Action::Populate { reset: true })
        );
        assert_eq!(
            route("POST", "/populate", &form(&[("reset", "0")])),
            Ok(Action::Populate { reset: false })
        );
    }

    #[test]
    fn route_query_carries_question() {
        assert_eq!(
            route("POST", "/query", &form(&[("question", "why?")])),
            Ok(Action::Query("why?".into()))
        );
    }

    #[test]
    fn route_dismiss_targets() {
        assert_eq!(
            route("POST", "/status/dismiss", &form(&[("target", "db")])),
            Ok(Action::Dismiss(StatusTarget::Database))
        );
        assert!(matches!(
            route("POST", "/status/dismiss", &form(&[("target", "nope")])),
            Err(RouteError::BadRequest(_))
        ));
    }

    #[test]
    fn route_wrong_method() {
        assert_eq!(route("GET", "/upload", &form(&[])), Err(RouteError::MethodNotAllowed));
        assert_eq!(route("POST", "/", &form(&[])), Err(RouteError::MethodNotAllowed));
    }

    #[test]
    fn route_unknown_path() {
        assert_eq!(route("GET", "/nope", &form(&[])), Err(RouteError::NotFound));
    }

    #[test]
    fn redirect_is_303() {
        let r = redirect("/#chat-latest");
        assert!(r.starts_with("HTTP/1.1 303 See Other\r\n"));
        assert!(r.contains("Location: /#chat-latest\r\n"));
    }

    #[test]
    fn plain_sets_length() {
        let r = plain("413 Payload Too Large", "request body too large");
        assert!(r.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(r.contains("Content-Length: 22\r\n"));
    }
}
