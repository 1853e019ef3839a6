use std::net::SocketAddr;

use sitepipe::server::{
    DevServer, EVENTS_PATH, ReloadEvent, ReloadHandle, SCRIPT_PATH, inject_reload_script,
};
use sitepipe_test_utils::builders::write_file;
use sitepipe_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn read_until(stream: &mut TcpStream, buf: &mut String, needle: &str) {
    let mut chunk = [0u8; 1024];
    while !buf.contains(needle) {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before {needle:?} arrived");
        buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "index.html",
        "<html><body><h1>Home</h1></body></html>",
    );
    write_file(dir.path(), "css/main.css", "body{color:red}");
    dir
}

#[tokio::test]
async fn html_pages_get_the_reload_script() {
    init_tracing();
    let dir = site();
    let server = DevServer::start(dir.path(), "127.0.0.1", 0, ReloadHandle::new())
        .await
        .unwrap();
    let addr = server.local_addr();

    let index = with_timeout(get(addr, "/")).await;
    assert!(index.starts_with("HTTP/1.1 200"), "{index}");
    assert!(index.contains(&format!(
        "<h1>Home</h1><script src=\"{SCRIPT_PATH}\"></script></body>"
    )));

    let css = with_timeout(get(addr, "/css/main.css")).await;
    assert!(css.starts_with("HTTP/1.1 200"));
    assert!(css.ends_with("body{color:red}"));
    assert!(!css.contains("<script"));

    let missing = with_timeout(get(addr, "/nope.html")).await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    with_timeout(server.stop()).await;
}

#[tokio::test]
async fn client_script_is_served() {
    init_tracing();
    let dir = site();
    let server = DevServer::start(dir.path(), "127.0.0.1", 0, ReloadHandle::new())
        .await
        .unwrap();

    let script = with_timeout(get(server.local_addr(), SCRIPT_PATH)).await;

    assert!(script.to_ascii_lowercase().contains("content-type: application/javascript"));
    assert!(script.contains(&format!("new EventSource(\"{EVENTS_PATH}\")")));
    with_timeout(server.stop()).await;
}

#[tokio::test]
async fn reload_events_reach_connected_clients_and_stop_ends_streams() {
    init_tracing();
    let dir = site();
    let reload = ReloadHandle::new();
    let server = DevServer::start(dir.path(), "127.0.0.1", 0, reload.clone())
        .await
        .unwrap();

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let request = format!("GET {EVENTS_PATH} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = String::new();
    with_timeout(read_until(&mut stream, &mut received, "\r\n\r\n")).await;
    assert!(received.to_ascii_lowercase().contains("content-type: text/event-stream"));

    assert_eq!(reload.inject_css(), 1);
    with_timeout(read_until(&mut stream, &mut received, "data: css")).await;
    assert!(received.contains("event: css"));

    reload.publish(ReloadEvent::Full);
    with_timeout(read_until(&mut stream, &mut received, "event: reload")).await;

    // An open event stream must not keep the server alive.
    with_timeout(server.stop()).await;
}

#[tokio::test]
async fn occupied_port_is_a_server_error() {
    init_tracing();
    let dir = site();
    let first = DevServer::start(dir.path(), "127.0.0.1", 0, ReloadHandle::new())
        .await
        .unwrap();
    let port = first.local_addr().port();

    let err = DevServer::start(dir.path(), "127.0.0.1", port, ReloadHandle::new())
        .await
        .unwrap_err();

    assert!(matches!(err, sitepipe::errors::SitepipeError::ServerError(_)));
    with_timeout(first.stop()).await;
}

#[test]
fn script_goes_before_the_last_closing_body_tag() {
    let tag = format!("<script src=\"{SCRIPT_PATH}\"></script>");

    assert_eq!(
        inject_reload_script("<p>a</p></BODY></html>"),
        format!("<p>a</p>{tag}</BODY></html>")
    );
    assert_eq!(
        inject_reload_script("<body></body><!-- </body> -->"),
        format!("<body></body><!-- {tag}</body> -->")
    );
    assert_eq!(inject_reload_script("<p>fragment</p>"), format!("<p>fragment</p>{tag}"));
}
