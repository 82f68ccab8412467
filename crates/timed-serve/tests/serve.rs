use std::io::{Read as _, Write as _};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use timed_serve::{ErrorKind, Server, ServerBuilder, Shutdown};

fn build(root: &Path, idle_timeout: Duration) -> Server {
    let mut builder = ServerBuilder::new(root);
    builder.hostname("127.0.0.1").idle_timeout(idle_timeout);
    builder.build().unwrap()
}

fn request(addr: SocketAddr, method: &str, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

/// Run `client` against a live server, then stop the server
fn with_server(root: &Path, client: impl FnOnce(SocketAddr)) {
    let server = build(root, Duration::from_secs(30));
    let addr = server.addr();
    let interrupter = server.interrupter();
    let handle = thread::spawn(move || server.serve());

    client(addr);

    interrupter.interrupt();
    assert_eq!(handle.join().unwrap(), Shutdown::Interrupted);
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
    std::fs::write(dir.path().join("style.css"), "body { margin: 0 }").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs").join("b.txt"), "b").unwrap();
    std::fs::write(dir.path().join("docs").join("A.txt"), "a").unwrap();
    std::fs::write(dir.path().join("docs").join("my notes.txt"), "notes").unwrap();
    std::fs::create_dir(dir.path().join("docs").join("img")).unwrap();
    dir
}

#[test]
fn idle_timeout_without_connections() {
    let dir = tempfile::tempdir().unwrap();
    let server = build(dir.path(), Duration::from_secs(1));
    assert_eq!(server.idle_timeout(), Duration::from_secs(1));
    assert_eq!(server.source(), dir.path());
    assert_eq!(server.addr().ip().to_string(), "127.0.0.1");

    let start = Instant::now();
    let shutdown = server.serve();
    let elapsed = start.elapsed();

    assert_eq!(shutdown, Shutdown::IdleTimeout);
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[test]
fn activity_restarts_idle_timer() {
    let dir = site();
    let server = build(dir.path(), Duration::from_secs(1));
    let addr = server.addr();

    let start = Instant::now();
    let handle = thread::spawn(move || server.serve());
    // Keeps the server busy well past a single idle timeout
    for _ in 0..5 {
        let response = request(addr, "GET", "/");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        thread::sleep(Duration::from_millis(400));
    }
    let shutdown = handle.join().unwrap();
    let elapsed = start.elapsed();

    assert_eq!(shutdown, Shutdown::IdleTimeout);
    assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
}

#[test]
fn interrupt_releases_socket() {
    let dir = tempfile::tempdir().unwrap();
    let server = build(dir.path(), Duration::from_secs(60));
    let addr = server.addr();
    let interrupter = server.interrupter();

    let start = Instant::now();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        interrupter.interrupt();
    });
    let shutdown = server.serve();

    assert_eq!(shutdown, Shutdown::Interrupted);
    assert!(start.elapsed() < Duration::from_secs(30));
    assert_ne!(shutdown.to_string(), Shutdown::IdleTimeout.to_string());
    TcpListener::bind(addr).unwrap();
}

#[test]
fn timeout_releases_socket() {
    let dir = tempfile::tempdir().unwrap();
    let server = build(dir.path(), Duration::from_millis(200));
    let addr = server.addr();

    assert_eq!(server.serve(), Shutdown::IdleTimeout);
    TcpListener::bind(addr).unwrap();
}

#[test]
fn interrupt_before_serve() {
    let dir = tempfile::tempdir().unwrap();
    let server = build(dir.path(), Duration::from_secs(60));
    server.interrupter().interrupt();

    assert_eq!(server.serve(), Shutdown::Interrupted);
}

#[test]
fn stale_interrupter_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let server = build(dir.path(), Duration::from_millis(100));
    let interrupter = server.interrupter();

    assert_eq!(server.serve(), Shutdown::IdleTimeout);
    interrupter.interrupt();
}

#[test]
fn bind_failure() {
    let dir = tempfile::tempdir().unwrap();
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut builder = ServerBuilder::new(dir.path());
    builder.hostname("127.0.0.1").port(port);
    let err = builder.build().err().unwrap();

    assert_eq!(err.kind(), ErrorKind::Bind);
    assert!(err.to_string().contains(&port.to_string()), "{err}");
}

#[test]
fn serves_files() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "GET", "/style.css?v=2");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("Content-Type: text/css"), "{response}");
        assert!(response.ends_with("body { margin: 0 }"), "{response}");

        let response = request(addr, "GET", "/docs/my%20notes.txt");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("notes"), "{response}");
    });
}

#[test]
fn serves_index() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "GET", "/");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("<p>home</p>"), "{response}");
    });
}

#[test]
fn head_omits_body() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "HEAD", "/style.css");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(!response.contains("margin"), "{response}");
    });
}

#[test]
fn redirects_directory_without_slash() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "GET", "/docs");
        assert!(response.starts_with("HTTP/1.1 301"), "{response}");
        assert!(response.contains("Location: /docs/\r\n"), "{response}");

        let response = request(addr, "GET", "/docs?sort=name");
        assert!(response.starts_with("HTTP/1.1 301"), "{response}");
        assert!(response.contains("Location: /docs/?sort=name\r\n"), "{response}");
    });
}

#[test]
fn lists_directory() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "GET", "/docs/");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("Directory listing for /docs/"), "{response}");
        assert!(response.contains(r#"<a href="img/">img/</a>"#), "{response}");
        assert!(
            response.contains(r#"<a href="my%20notes.txt">my notes.txt</a>"#),
            "{response}"
        );
        let a = response.find(">A.txt<").unwrap();
        let b = response.find(">b.txt<").unwrap();
        let img = response.find(">img/<").unwrap();
        assert!(a < b && b < img, "{response}");
    });
}

#[test]
fn missing_file() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "GET", "/nope.html");
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
        assert!(response.contains("404: Page not found"), "{response}");
    });
}

#[test]
fn cannot_escape_root() {
    let outer = tempfile::tempdir().unwrap();
    std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();
    let root = outer.path().join("public");
    std::fs::create_dir(&root).unwrap();
    with_server(&root, |addr| {
        let response = request(addr, "GET", "/../secret.txt");
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
        let response = request(addr, "GET", "/%2E%2E/secret.txt");
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    });
}

#[test]
fn rejects_other_methods() {
    let dir = site();
    with_server(dir.path(), |addr| {
        let response = request(addr, "DELETE", "/style.css");
        assert!(response.starts_with("HTTP/1.1 501"), "{response}");
    });
    assert!(dir.path().join("style.css").exists());
}
