//! End-to-end tests against a real server on loopback.
//!
//! Each test binds the server on an OS-chosen port, runs it in a background
//! task, and talks to it either through a raw `ControlChannel` or a full
//! `Client` run.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use udptest::protocol::{
    constants,
    packet::{PacketAck, RandomPacket, Request, Response, Status, WireEncodable},
    types::Sequence,
};
use udptest::transport::ControlChannel;
use udptest::{Client, ClientConfig, ConfigError, Server, ServerConfig, UdptestError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct RunningServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningServer {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not shut down")
            .expect("server task panicked");
    }
}

async fn start_server() -> RunningServer {
    let config = ServerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
    };
    let server = Server::bind(&config).await.expect("bind server");
    let addr = server.local_addr();
    let (stop, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async move {
        let _ = stop_rx.await;
    }));
    RunningServer { addr, stop, task }
}

async fn exchange(control: &mut ControlChannel, req: Request) -> Response {
    tokio::time::timeout(Duration::from_secs(5), control.exchange(&req))
        .await
        .expect("control exchange timed out")
        .expect("control exchange failed")
}

async fn echo_once(endpoint: SocketAddr, seq: u32) -> Sequence {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut out = BytesMut::new();
    RandomPacket::new(Sequence::new(seq), Bytes::from_static(&[0x5a; 32])).encode_wire(&mut out);
    socket.send_to(&out, endpoint).await.unwrap();

    let mut buf = [0u8; 16];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("ack timed out")
        .unwrap();
    let mut src = &buf[..len];
    PacketAck::decode_wire(&mut src).unwrap().seq
}

/// Like `echo_once`, but `None` when nothing answers within `wait`.
async fn try_echo(endpoint: SocketAddr, wait: Duration) -> Option<Sequence> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.ok()?;
    let mut out = BytesMut::new();
    RandomPacket::new(Sequence::new(1), Bytes::new()).encode_wire(&mut out);
    socket.send_to(&out, endpoint).await.ok()?;

    let mut buf = [0u8; 16];
    let (len, _) = tokio::time::timeout(wait, socket.recv_from(&mut buf))
        .await
        .ok()?
        .ok()?;
    RandomPacket::peek_seq(&buf[..len]).ok()
}

fn client_config(addr: SocketAddr, bitrate: u64, packet_rate: u32, secs: u64) -> ClientConfig {
    ClientConfig {
        address: addr.ip().to_string(),
        port: addr.port(),
        bitrate,
        packet_rate,
        duration: Duration::from_secs(secs),
    }
}

// ---------------------------------------------------------------------------
// Control protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_then_close_yields_ok_then_ok() {
    let server = start_server().await;

    for payload in [0u32, 1246, constants::MAXIMUM_PAYLOAD_SIZE as u32] {
        let mut control = ControlChannel::connect(server.addr).await.unwrap();

        let rsp = exchange(&mut control, Request::open(payload)).await;
        assert_eq!(rsp.status, Status::Ok, "open({payload})");
        assert_eq!(rsp.endpoint.ip(), &std::net::Ipv4Addr::LOCALHOST);

        let rsp = exchange(&mut control, Request::close()).await;
        assert_eq!(rsp.status, Status::Ok, "close after open({payload})");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn second_open_is_already_open_and_keeps_endpoint() {
    let server = start_server().await;
    let mut control = ControlChannel::connect(server.addr).await.unwrap();

    let first = exchange(&mut control, Request::open(32)).await;
    assert_eq!(first.status, Status::Ok);

    let second = exchange(&mut control, Request::open(32)).await;
    assert_eq!(second.status, Status::AlreadyOpen);

    // The original socket still echoes.
    let endpoint = SocketAddr::V4(first.endpoint);
    assert_eq!(echo_once(endpoint, 11).await.value(), 11);

    let rsp = exchange(&mut control, Request::close()).await;
    assert_eq!(rsp.status, Status::Ok);

    server.shutdown().await;
}

#[tokio::test]
async fn oversized_open_is_refused_and_session_stays_idle() {
    let server = start_server().await;
    let mut control = ControlChannel::connect(server.addr).await.unwrap();

    let too_big = constants::MAXIMUM_PAYLOAD_SIZE as u32 + 1;
    let rsp = exchange(&mut control, Request::open(too_big)).await;
    assert_eq!(rsp.status, Status::FailedToOpen);
    assert_eq!(rsp.endpoint, constants::UNSPECIFIED_ENDPOINT);

    // Still Idle: a valid Open succeeds rather than reporting AlreadyOpen.
    let rsp = exchange(&mut control, Request::open(32)).await;
    assert_eq!(rsp.status, Status::Ok);
    assert_eq!(echo_once(SocketAddr::V4(rsp.endpoint), 5).await.value(), 5);

    server.shutdown().await;
}

#[tokio::test]
async fn session_can_reopen_after_close() {
    let server = start_server().await;
    let mut control = ControlChannel::connect(server.addr).await.unwrap();

    for _ in 0..3 {
        let rsp = exchange(&mut control, Request::open(32)).await;
        assert_eq!(rsp.status, Status::Ok);
        assert_eq!(echo_once(SocketAddr::V4(rsp.endpoint), 0).await, Sequence::ZERO);
        assert_eq!(exchange(&mut control, Request::close()).await.status, Status::Ok);
    }

    server.shutdown().await;
}

#[tokio::test]
async fn sessions_are_independent() {
    let server = start_server().await;
    let mut a = ControlChannel::connect(server.addr).await.unwrap();
    let mut b = ControlChannel::connect(server.addr).await.unwrap();

    let ra = exchange(&mut a, Request::open(32)).await;
    let rb = exchange(&mut b, Request::open(32)).await;
    assert_eq!(ra.status, Status::Ok);
    assert_eq!(rb.status, Status::Ok);
    assert_ne!(ra.endpoint, rb.endpoint);

    // Dropping one control stream tears down only that session.
    drop(a);
    assert_eq!(echo_once(SocketAddr::V4(rb.endpoint), 3).await.value(), 3);

    server.shutdown().await;
}

#[tokio::test]
async fn disconnect_tears_down_transport() {
    let server = start_server().await;
    let mut control = ControlChannel::connect(server.addr).await.unwrap();
    let rsp = exchange(&mut control, Request::open(0)).await;
    assert_eq!(rsp.status, Status::Ok);
    let endpoint = SocketAddr::V4(rsp.endpoint);
    assert!(try_echo(endpoint, Duration::from_secs(5)).await.is_some());

    drop(control);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(try_echo(endpoint, Duration::from_millis(300)).await, None);

    // The server keeps accepting new sessions.
    let mut control = ControlChannel::connect(server.addr).await.unwrap();
    assert_eq!(exchange(&mut control, Request::open(0)).await.status, Status::Ok);

    server.shutdown().await;
}

#[tokio::test]
async fn server_shutdown_closes_control_streams() {
    let server = start_server().await;
    let mut control = ControlChannel::connect(server.addr).await.unwrap();
    assert_eq!(exchange(&mut control, Request::open(8)).await.status, Status::Ok);

    server.shutdown().await;

    let res = tokio::time::timeout(Duration::from_secs(5), control.recv::<Response>())
        .await
        .expect("control stream left open after shutdown");
    assert!(res.is_err());
}

// ---------------------------------------------------------------------------
// Client runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lossless_loopback_run_acks_every_packet() {
    let server = start_server().await;

    // 400 kbit/s at 50 pps: 996 byte payloads every 20 ms.
    let client = Client::new(&client_config(server.addr, 400_000, 50, 2))
        .await
        .unwrap();
    assert_eq!(client.plan().payload_size, 996);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        client.run(std::future::pending::<()>()),
    )
    .await
    .expect("run timed out")
    .expect("run failed")
    .expect("run never reached the transport phase");

    assert!(report.packets_sent >= 95, "sent {}", report.packets_sent);
    assert_eq!(report.packets_acked, report.packets_sent);
    assert_eq!(report.packets_lost(), 0);
    assert_eq!(report.untracked_acks, 0);
    assert_eq!(report.bytes_sent, report.packets_sent * 1000);
    assert!(report.average_latency.is_some());
    assert!(report.max_latency >= report.average_latency);

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_mid_run_still_reports() {
    let server = start_server().await;
    let client = Client::new(&client_config(server.addr, 1_000_000, 100, 30))
        .await
        .unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        client.run(tokio::time::sleep(Duration::from_millis(300))),
    )
    .await
    .expect("interrupted run did not stop")
    .expect("run failed")
    .expect("interrupted before transport phase");

    assert!(report.packets_sent > 0);
    assert!(report.packets_acked <= report.packets_sent);
    assert!(report.elapsed < Duration::from_secs(5));

    server.shutdown().await;
}

#[tokio::test]
async fn oversized_plan_fails_before_io() {
    // Nothing listens here; the error must come from validation.
    let config = ClientConfig {
        address: "127.0.0.1".to_string(),
        port: 1,
        bitrate: 10_000,
        packet_rate: 1000,
        duration: Duration::from_secs(1),
    };
    match Client::new(&config).await {
        Err(UdptestError::Config(ConfigError::PacketTooSmall { bytes: 1 })) => {}
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("construction should fail"),
    }
}

#[tokio::test]
async fn unreachable_server_is_connect_error() {
    // Bind then drop to get a port with nobody listening.
    let port = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };
    let client = Client::new(&ClientConfig {
        port,
        ..ClientConfig::default()
    })
    .await
    .unwrap();

    match client.run(std::future::pending::<()>()).await {
        Err(UdptestError::Connect { .. }) => {}
        other => panic!("unexpected result: {:?}", other.map(|r| r.is_some())),
    }
}

// ---------------------------------------------------------------------------
// Setup errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_on_taken_port_fails_to_bind() {
    let held = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = held.local_addr().unwrap().port();

    let config = ServerConfig {
        address: "127.0.0.1".to_string(),
        port,
    };
    match Server::bind(&config).await {
        Err(UdptestError::Bind { addr, .. }) | Err(UdptestError::Listen { addr, .. }) => {
            assert_eq!(addr.port(), port);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("bound a port that is already listening"),
    }
}

#[tokio::test]
async fn ipv6_only_address_is_rejected() {
    let config = ServerConfig {
        address: "::1".to_string(),
        port: 0,
    };
    match Server::bind(&config).await {
        Err(UdptestError::NoIpv4Address(host)) => assert_eq!(host, "::1"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("server bound an IPv6 address"),
    }

    let config = ClientConfig {
        address: "::1".to_string(),
        ..ClientConfig::default()
    };
    assert!(matches!(
        Client::new(&config).await,
        Err(UdptestError::NoIpv4Address(_))
    ));
}

#[tokio::test]
async fn unresolvable_host_fails_construction() {
    // `.invalid` never resolves.
    let config = ClientConfig {
        address: "udptest.invalid".to_string(),
        ..ClientConfig::default()
    };
    match Client::new(&config).await {
        Err(UdptestError::Resolve { host, .. }) => assert_eq!(host, "udptest.invalid"),
        Err(UdptestError::NoIpv4Address(host)) => assert_eq!(host, "udptest.invalid"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("resolved a reserved name"),
    }

    let config = ServerConfig {
        address: "udptest.invalid".to_string(),
        port: 0,
    };
    assert!(matches!(
        Server::bind(&config).await,
        Err(UdptestError::Resolve { .. }) | Err(UdptestError::NoIpv4Address(_))
    ));
}
