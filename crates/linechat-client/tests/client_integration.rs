//! Client tests against a scripted fake server and against a real relay.

use std::io;
use std::time::Duration;

use linechat_client::infrastructure::network::{
    ChatClient, ClientConfig, ClientError, ClientEvent, ClientState,
};
use linechat_core::{
    decode_message, decode_request, encode_response, ConnectionConfig, ConnectionEvent,
    ConnectionEventKind, ErrorCode, Message, OpCode, Response, TransportError,
};
use linechat_server::infrastructure::network::server::{ChatServer, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Handles inbound connection events until the client emits something.
async fn next_event(
    client: &mut ChatClient,
    events: &mut UnboundedReceiver<ClientEvent>,
) -> ClientEvent {
    timeout(WAIT, async {
        loop {
            if let Ok(event) = events.try_recv() {
                return event;
            }
            let inbound = client
                .next_inbound()
                .await
                .expect("inbound queue closed");
            client.handle_inbound(inbound).await;
        }
    })
    .await
    .expect("no client event in time")
}

async fn next_message(
    client: &mut ChatClient,
    events: &mut UnboundedReceiver<ClientEvent>,
) -> Message {
    match next_event(client, events).await {
        ClientEvent::MessageReceived(message) => message,
        other => panic!("expected a message, got {other:?}"),
    }
}

async fn connected_client(addr: &str) -> (ChatClient, UnboundedReceiver<ClientEvent>) {
    connected_client_with(addr, ClientConfig::default()).await
}

async fn connected_client_with(
    addr: &str,
    config: ClientConfig,
) -> (ChatClient, UnboundedReceiver<ClientEvent>) {
    let (mut client, mut events) = ChatClient::new(config);
    client.initialize(addr).await.unwrap();
    assert!(matches!(
        events.try_recv(),
        Ok(ClientEvent::Connected { .. })
    ));
    assert!(client.run());
    (client, events)
}

async fn fake_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

// ── Against a scripted server ─────────────────────────────────────────────────

#[tokio::test]
async fn test_sent_message_arrives_as_one_request_line() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let (client, _events) = connected_client(&addr).await;
    let (server_side, _) = listener.accept().await.unwrap();
    let mut lines = BufReader::new(server_side).lines();

    // Act
    client.send_message("alice", "hello there").unwrap();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();

    // Assert
    let request = decode_request(&line).unwrap();
    assert_eq!(request.op_code, OpCode::SendMessage);
    let message = decode_message(&request.data).unwrap();
    assert_eq!(message.sender, "alice");
    assert_eq!(message.body, "hello there");
    assert!(message.client_send_time.is_some());
    assert!(message.server_check_time.is_none());
}

#[tokio::test]
async fn test_ok_response_is_delivered_and_error_response_is_dropped() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (mut server_side, _) = listener.accept().await.unwrap();

    let rejected = encode_response(&Response::error(OpCode::None, ErrorCode::BadPacket)).unwrap();
    let relayed = Message::new("bob", "hi all").stamped(chrono::Utc::now());
    let accepted = encode_response(&Response::ok(OpCode::SendMessage, &relayed).unwrap()).unwrap();

    // Act
    server_side
        .write_all(format!("{rejected}\n{accepted}\n").as_bytes())
        .await
        .unwrap();
    let message = next_message(&mut client, &mut events).await;

    // Assert: the rejection produced no event, so the first one is the relay.
    assert_eq!(message, relayed);
}

#[tokio::test]
async fn test_undecodable_response_is_skipped() {
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (mut server_side, _) = listener.accept().await.unwrap();

    let relayed = Message::new("bob", "after garbage");
    let accepted = encode_response(&Response::ok(OpCode::SendMessage, &relayed).unwrap()).unwrap();
    server_side
        .write_all(format!("not json\n{accepted}\n").as_bytes())
        .await
        .unwrap();

    let message = next_message(&mut client, &mut events).await;
    assert_eq!(message.body, "after garbage");
    assert!(client.is_running());
}

#[tokio::test]
async fn test_server_close_emits_disconnected_message_then_event() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (server_side, _) = listener.accept().await.unwrap();

    // Act
    drop(server_side);
    let notice = next_message(&mut client, &mut events).await;
    let last = next_event(&mut client, &mut events).await;

    // Assert
    assert_eq!(notice.sender, "Log");
    assert_eq!(notice.body, "Disconnected");
    assert_eq!(last, ClientEvent::Disconnected);
    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(matches!(
        client.send_message("alice", "late"),
        Err(ClientError::NotRunning)
    ));
}

#[tokio::test]
async fn test_local_close_is_reported_once_and_server_sees_eof() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (server_side, _) = listener.accept().await.unwrap();
    let mut lines = BufReader::new(server_side).lines();

    // Act
    let first = client.close().await;
    let second = client.close().await;

    // Assert
    assert!(first);
    assert!(!second);
    assert!(matches!(
        events.try_recv(),
        Ok(ClientEvent::MessageReceived(m)) if m.body == "Disconnected"
    ));
    assert_eq!(events.try_recv().ok(), Some(ClientEvent::Disconnected));
    assert!(events.try_recv().is_err());
    let eof = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
    assert!(eof.is_none());
}

#[tokio::test]
async fn test_over_long_response_shows_exception_and_keeps_running() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let config = ClientConfig {
        connection: ConnectionConfig {
            max_record_len: 256,
            ..ConnectionConfig::default()
        },
        ..ClientConfig::default()
    };
    let (mut client, mut events) = connected_client_with(&addr, config).await;
    let (mut server_side, _) = listener.accept().await.unwrap();

    let relayed = Message::new("bob", "fits");
    let accepted = encode_response(&Response::ok(OpCode::SendMessage, &relayed).unwrap()).unwrap();
    let too_long = "x".repeat(1000);

    // Act
    server_side
        .write_all(format!("{too_long}\n{accepted}\n").as_bytes())
        .await
        .unwrap();
    let notice = next_message(&mut client, &mut events).await;
    let message = next_message(&mut client, &mut events).await;

    // Assert
    assert_eq!(notice.sender, "Log");
    assert!(
        notice.body.starts_with("Exception thrown : "),
        "got {:?}",
        notice.body
    );
    assert!(notice.body.contains("1001-byte record"), "got {:?}", notice.body);
    assert_eq!(message.body, "fits");
    assert!(client.is_running());
}

#[tokio::test]
async fn test_unclassified_io_fault_shows_exception_then_disconnects() {
    // Arrange
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (_server_side, _) = listener.accept().await.unwrap();
    let fault = ConnectionEvent {
        connection: client.connection_id().unwrap(),
        kind: ConnectionEventKind::Fault(TransportError::from_io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "socket revoked",
        ))),
    };

    // Act
    client.handle_inbound(fault).await;

    // Assert
    let notice = next_message(&mut client, &mut events).await;
    assert_eq!(notice.sender, "Log");
    assert_eq!(notice.body, "Exception thrown : I/O error: socket revoked");
    assert_eq!(
        next_message(&mut client, &mut events).await.body,
        "Disconnected"
    );
    assert_eq!(
        next_event(&mut client, &mut events).await,
        ClientEvent::Disconnected
    );
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails_and_stays_disconnected() {
    // Arrange
    let (listener, addr) = fake_server().await;
    drop(listener);
    let (mut client, mut events) = ChatClient::new(ClientConfig::default());

    // Act
    let result = client.initialize(&addr).await;

    // Assert
    assert!(matches!(result, Err(ClientError::ConnectFailed { .. })));
    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(!client.run());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_connection_from_a_previous_session_is_ignored() {
    // Arrange: a first session that the client closes.
    let (listener, addr) = fake_server().await;
    let (mut client, mut events) = connected_client(&addr).await;
    let (first_side, _) = listener.accept().await.unwrap();
    client.close().await;
    while events.try_recv().is_ok() {}

    // Act: reconnect, then let the old socket die.
    client.initialize(&addr).await.unwrap();
    assert!(client.run());
    let (_second_side, _) = listener.accept().await.unwrap();
    drop(first_side);
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.drain_inbound().await;

    // Assert
    assert!(client.is_running());
    assert!(matches!(
        events.try_recv(),
        Ok(ClientEvent::Connected { .. })
    ));
    assert!(events.try_recv().is_err());
}

// ── Against a real relay ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_clients_chat_through_a_real_server() {
    // Arrange
    let (mut server, _observer) = ChatServer::new(ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    });
    let addr = server.initialize().await.unwrap().to_string();
    server.start_accepting().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let relay = tokio::spawn(async move {
        server
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;
    });

    let (mut alice, mut alice_events) = connected_client(&addr).await;
    let (mut bob, mut bob_events) = connected_client(&addr).await;

    // Bob's own echo means the relay has registered him, and alice before him.
    bob.send_message("bob", "anyone here?").unwrap();
    assert_eq!(next_message(&mut bob, &mut bob_events).await.body, "anyone here?");
    assert_eq!(next_message(&mut alice, &mut alice_events).await.body, "anyone here?");

    // Act
    alice.send_message("alice", "hi bob").unwrap();
    let at_alice = next_message(&mut alice, &mut alice_events).await;
    let at_bob = next_message(&mut bob, &mut bob_events).await;

    // Assert
    assert_eq!(at_alice, at_bob);
    assert_eq!(at_bob.sender, "alice");
    assert_eq!(at_bob.body, "hi bob");
    assert!(at_bob.server_check_time.is_some());

    // Shutting the relay down disconnects both clients.
    stop_tx.send(()).unwrap();
    relay.await.unwrap();
    assert_eq!(
        next_message(&mut bob, &mut bob_events).await.body,
        "Disconnected"
    );
    assert_eq!(
        next_event(&mut bob, &mut bob_events).await,
        ClientEvent::Disconnected
    );
}
