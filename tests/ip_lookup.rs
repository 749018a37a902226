use glitch_overlay::ip_lookup::{IpLocator, Location};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

fn read_request(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    let mut seen = Vec::new();
    while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => seen.extend_from_slice(&buf[..n]),
        }
    }
}

/// Serves `body` as JSON to a single client.
fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}/json")
}

/// Accepts connections and never answers.
fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://{addr}/")
}

fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

#[test]
fn falls_through_to_a_working_endpoint() {
    let good = serve_once(r#"{"city": "Reykjavik", "country_name": "Iceland"}"#);
    let locator = IpLocator::new(vec![closed_port(), good], Duration::from_secs(2));
    assert_eq!(
        locator.lookup(),
        Some(Location {
            city: "Reykjavik".into(),
            country: "Iceland".into()
        })
    );
}

#[test]
fn unusable_response_yields_none() {
    let url = serve_once(r#"{"status": "fail"}"#);
    let locator = IpLocator::new(vec![url], Duration::from_secs(2));
    assert_eq!(locator.lookup(), None);
}

#[test]
fn wait_is_bounded_by_timeout_when_server_hangs() {
    let timeout = Duration::from_millis(200);
    let locator = IpLocator::new(vec![silent_server(), silent_server()], timeout);
    let start = Instant::now();
    let result = locator.spawn().wait();
    let waited = start.elapsed();
    assert_eq!(result, None);
    assert!(
        waited < timeout + Duration::from_millis(150),
        "waited {waited:?}"
    );
}

#[test]
fn background_lookup_delivers_result() {
    let url = serve_once(r#"{"region": "Ontario", "country": "CA"}"#);
    let locator = IpLocator::new(vec![url], Duration::from_secs(2));
    let loc = locator.spawn().wait().expect("lookup should succeed");
    assert_eq!(loc.describe(), "Ontario, CA");
}
