//! End-to-end lifecycle tests over loopback.
//!
//! Every test except `test_echo_on_8081` binds port 0 so the tests can run in
//! parallel.

use proptest::prelude::*;
use rawtcp_socket::{
    ClientConnection, ClientPhase, ConnectionError, ReadOutcome, Role, ServerConnection,
    ServerPhase, SocketStep,
};
use std::thread;
use std::time::{Duration, Instant};

fn listening_server() -> (ServerConnection, u16) {
    let mut server = ServerConnection::new(0, Some("127.0.0.1")).expect("bind");
    server.listen().expect("listen");
    let port = server.local_addr().expect("local addr").port();
    (server, port)
}

fn write_all<R: Role>(role: &mut R, mut data: &[u8]) {
    while !data.is_empty() {
        let n = role.write(data).expect("write");
        assert!(n > 0, "write made no progress");
        data = &data[n..];
    }
}

fn read_exact<R: Role>(role: &mut R, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut buf = vec![0u8; len.max(1)];
    while out.len() < len {
        match role.read(&mut buf[..len - out.len()]).expect("read") {
            ReadOutcome::Data(n) => out.extend_from_slice(&buf[..n]),
            other => panic!("unexpected {other:?} after {} bytes", out.len()),
        }
    }
    out
}

#[test]
fn test_echo_on_8081() {
    let mut server = ServerConnection::new(8081, Some("127.0.0.1")).expect("bind 8081");
    server.listen().unwrap();

    let client = thread::spawn(|| {
        let mut client = ClientConnection::new(8081, "127.0.0.1").unwrap();
        client.connect().unwrap();
        assert_eq!(client.write(b"AB").unwrap(), 2);

        let mut buf = [0u8; 2];
        let outcome = client.read(&mut buf).unwrap();
        assert_eq!(outcome, ReadOutcome::Data(2));
        assert_eq!(&buf, b"AB");
        client.close().unwrap();
    });

    server.accept().unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(2));
    assert_eq!(&buf, b"AB");
    assert_eq!(server.write(&buf).unwrap(), 2);

    client.join().unwrap();
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::PeerClosed);
    server.close().unwrap();
    assert_eq!(server.phase(), ServerPhase::Listening);
}

#[test]
fn test_connect_without_listener() {
    let port = {
        let server = ServerConnection::new(0, Some("127.0.0.1")).unwrap();
        server.local_addr().unwrap().port()
    };

    let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
    let err = client.connect().unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::ResourceAcquisition {
            step: SocketStep::Connect,
            ..
        }
    ));
    assert!(!client.is_connected());
    assert!(!client.state().is_connected());
    assert_ne!(client.phase(), ClientPhase::Connected);
}

#[test]
fn test_rebind_after_close() {
    let (mut server, port) = listening_server();

    // Leave a connection behind so the port has TIME_WAIT state.
    let client = thread::spawn(move || {
        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.connect().unwrap();
        write_all(&mut client, b"bye");
        client
    });
    server.accept().unwrap();
    assert_eq!(read_exact(&mut server, 3), b"bye");
    server.close().unwrap();
    drop(server);
    drop(client.join().unwrap());

    let start = Instant::now();
    let mut rebound = ServerConnection::new(port, Some("127.0.0.1")).expect("rebind");
    rebound.listen().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(rebound.local_addr().unwrap().port(), port);
}

#[test]
fn test_io_rejected_outside_connection() {
    let (mut server, port) = listening_server();
    let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
    let mut buf = [0u8; 8];

    assert!(client.read(&mut buf).unwrap_err().is_not_connected());
    assert!(client.write(b"x").unwrap_err().is_not_connected());
    assert!(server.read(&mut buf).unwrap_err().is_not_connected());
    assert!(server.write(b"x").unwrap_err().is_not_connected());
    assert_eq!(client.phase(), ClientPhase::SocketReady);
    assert_eq!(server.phase(), ServerPhase::Listening);

    let handle = thread::spawn(move || {
        client.connect().unwrap();
        client.close().unwrap();
        client
    });
    server.accept().unwrap();
    let mut client = handle.join().unwrap();

    server.close().unwrap();
    assert!(server.close().unwrap_err().is_not_connected());
    assert!(server.read(&mut buf).unwrap_err().is_not_connected());
    assert!(server.write(b"x").unwrap_err().is_not_connected());

    assert!(client.close().unwrap_err().is_not_connected());
    assert!(client.read(&mut buf).unwrap_err().is_not_connected());
    assert!(client.write(b"x").unwrap_err().is_not_connected());
}

#[test]
fn test_partial_read_drains_then_reports_no_data() {
    let (mut server, port) = listening_server();

    let client = thread::spawn(move || {
        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.connect().unwrap();
        write_all(&mut client, b"0123456789");
        client
    });
    server.accept().unwrap();
    let mut client = client.join().unwrap();

    // One blocking read, then drain whatever else has arrived.
    let mut buf = [0u8; 4];
    let mut received = Vec::new();
    let n = server.read(&mut buf).unwrap().len();
    received.extend_from_slice(&buf[..n]);

    let deadline = Instant::now() + Duration::from_secs(5);
    while received.len() < 10 && Instant::now() < deadline {
        if let ReadOutcome::Data(n) = server.partial_read(&mut buf).unwrap() {
            received.extend_from_slice(&buf[..n]);
        }
    }
    assert_eq!(received, b"0123456789");

    let start = Instant::now();
    assert_eq!(server.partial_read(&mut buf).unwrap(), ReadOutcome::NoData);
    assert!(start.elapsed() < Duration::from_secs(1));

    // Back in blocking mode: this read waits for the late byte instead of
    // reporting NoData.
    let late = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        write_all(&mut client, b"!");
        client
    });
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(1));
    assert_eq!(buf[0], b'!');
    drop(late.join().unwrap());
}

#[test]
fn test_set_nonblock_survives_partial_read() {
    let (mut server, port) = listening_server();
    let client = thread::spawn(move || {
        let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
        client.connect().unwrap();
        client
    });
    server.accept().unwrap();
    let _client = client.join().unwrap();

    let mut buf = [0u8; 4];
    server.set_nonblock().unwrap();
    assert!(server.partial_read(&mut buf).unwrap().is_no_data());
    assert!(server.read(&mut buf).unwrap().is_no_data());
    assert!(server.connection().is_nonblocking());

    server.unset_nonblock().unwrap();
    assert!(!server.connection().is_nonblocking());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_bytes_arrive_intact(payload in proptest::collection::vec(any::<u8>(), 1..4096)) {
        let (mut server, port) = listening_server();
        let len = payload.len();
        let sent = payload.clone();

        let client = thread::spawn(move || {
            let mut client = ClientConnection::new(port, "127.0.0.1").unwrap();
            client.connect().unwrap();
            write_all(&mut client, &sent);
            client
        });

        server.accept().unwrap();
        let received = read_exact(&mut server, len);
        drop(client.join().unwrap());

        prop_assert_eq!(received, payload);
    }
}
