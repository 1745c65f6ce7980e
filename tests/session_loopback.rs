//! Session and terminal against a local TCP peer

use sppterm_core::config::{LineEnding, TerminalConfig};
use sppterm_core::core::bridge::DeliveryLoop;
use sppterm_core::core::session::Session;
use sppterm_core::core::terminal::{LinkStatus, SpanStyle, Terminal};
use sppterm_core::core::transport::{create_transport, TcpConfig, Transport};
use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

fn terminal_config() -> TerminalConfig {
    TerminalConfig {
        newline: LineEnding::CrLf,
        hex_mode: false,
        show_timestamps: false,
    }
}

fn setup() -> (Session, DeliveryLoop, Rc<RefCell<Terminal>>) {
    let (session, mut delivery) = Session::new();
    let terminal = Rc::new(RefCell::new(Terminal::new(session.clone(), &terminal_config())));
    delivery.attach(Box::new(Rc::clone(&terminal)));
    (session, delivery, terminal)
}

fn tcp(port: u16) -> Transport {
    Transport::Tcp(TcpConfig::new("127.0.0.1", port).timeout(2))
}

/// Drive delivery until `done` or timeout, collecting output text
fn pump(
    delivery: &mut DeliveryLoop,
    terminal: &Rc<RefCell<Terminal>>,
    out: &mut String,
    done: impl Fn(&Terminal, &str) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        delivery.run_timeout(Duration::from_millis(20));
        let mut term = terminal.borrow_mut();
        for span in term.take_output() {
            out.push_str(&span.text);
        }
        if done(&term, out) {
            return;
        }
    }
    panic!("timed out, output so far: {out:?}");
}

#[test]
fn echo_round_trip_then_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"hello\r").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b"\n").unwrap();

        let mut line = String::new();
        BufReader::new(stream.try_clone().unwrap()).read_line(&mut line).unwrap();
        assert_eq!(line, "ping\r\n");
        stream.write_all(b"pong\r\n").unwrap();
    });

    let (session, mut delivery, terminal) = setup();
    terminal.borrow_mut().connect(create_transport(tcp(port))).unwrap();

    let mut out = String::new();
    pump(&mut delivery, &terminal, &mut out, |_, out| out.contains("hello\n"));
    assert!(session.is_connected());
    assert_eq!(terminal.borrow().status(), LinkStatus::Connected);

    terminal.borrow_mut().send("ping").unwrap();
    pump(&mut delivery, &terminal, &mut out, |term, _| term.status() == LinkStatus::Disconnected);
    peer.join().unwrap();

    assert_eq!(
        out,
        "connecting...\nconnected\nhello\nping\npong\nconnection lost: connection closed by peer\n"
    );
    assert!(!session.is_connected());
}

#[test]
fn refused_connection_reports_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let (session, mut delivery, terminal) = setup();
    terminal.borrow_mut().connect(create_transport(tcp(port))).unwrap();

    let mut out = String::new();
    pump(&mut delivery, &terminal, &mut out, |term, _| term.status() == LinkStatus::Disconnected);
    assert!(out.starts_with("connecting...\nconnection failed: "));
    assert!(!session.is_connected());
    assert_eq!(session.queued_events(), 0);
}

#[test]
fn signal_disconnects_live_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        // returns once the client side shuts down
        let _ = BufReader::new(stream).read_line(&mut line);
    });

    let (session, mut delivery, terminal) = setup();
    terminal.borrow_mut().connect(create_transport(tcp(port))).unwrap();

    let mut out = String::new();
    pump(&mut delivery, &terminal, &mut out, |term, _| term.status() == LinkStatus::Connected);

    assert_eq!(session.signal().fire(), 1);
    pump(&mut delivery, &terminal, &mut out, |term, _| term.status() == LinkStatus::Disconnected);
    peer.join().unwrap();

    assert!(out.ends_with("connection lost: background disconnect\n"));
    assert!(session.signal().is_empty());
    assert!(!session.is_connected());
}

#[test]
fn detached_terminal_catches_up_on_attach() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"\x02status\x03\n").unwrap();
    });

    let (session, mut delivery, terminal) = setup();
    delivery.detach();
    terminal.borrow_mut().connect(create_transport(tcp(port))).unwrap();
    peer.join().unwrap();

    // connected, data and the EOF error all land in the backlog
    let deadline = Instant::now() + Duration::from_secs(10);
    while session.is_connected() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!session.is_connected());

    delivery.attach(Box::new(Rc::clone(&terminal)));
    let spans = terminal.borrow_mut().take_output();
    let text: String = spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        text,
        "connecting...\nconnected\n^Bstatus^C\nconnection lost: connection closed by peer\n"
    );
    assert_eq!(spans.iter().filter(|s| s.style == SpanStyle::Caret).count(), 2);
}
