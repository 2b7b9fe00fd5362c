use rally::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, ClientMessage, ServerMessage, Transport, TransportError,
    TransportEvent, encode_client_message, loopback_pair,
};

#[test]
fn test_open_waits_for_accept() {
    let (mut client, server) = loopback_pair();

    client.open("ws://localhost/game?token=abc").unwrap();
    assert!(client.poll_events().is_empty());
    assert!(server.has_pending_open());
    assert_eq!(client.open("ws://again"), Err(TransportError::AlreadyOpen));

    assert!(server.accept());
    assert_eq!(client.poll_events(), vec![TransportEvent::Opened]);
    assert!(server.is_open());
    assert_eq!(server.open_attempts(), 1);
    assert_eq!(
        server.last_url().as_deref(),
        Some("ws://localhost/game?token=abc")
    );
}

#[test]
fn test_send_requires_open_channel() {
    let (mut client, server) = loopback_pair();
    let text = encode_client_message(&ClientMessage::StartGame).unwrap();

    assert_eq!(client.send(text.clone()), Err(TransportError::NotOpen));

    server.set_auto_accept(true);
    client.open("ws://localhost").unwrap();
    client.send(text).unwrap();

    assert_eq!(server.received(), vec![ClientMessage::StartGame]);
    assert!(server.received().is_empty());
}

#[test]
fn test_messages_arrive_in_order() {
    let (mut client, server) = loopback_pair();
    server.set_auto_accept(true);
    client.open("ws://localhost").unwrap();
    client.poll_events();

    server.push(&ServerMessage::ConnectionEstablished { player_number: 1 });
    server.push_raw("garbage");
    server.push(&ServerMessage::Pong { timestamp: 7 });

    let events = client.poll_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], TransportEvent::Message(t) if t.contains("connection_established")));
    assert_eq!(events[1], TransportEvent::Message("garbage".to_string()));
    assert!(matches!(&events[2], TransportEvent::Message(t) if t.contains("pong")));
}

#[test]
fn test_refuse_and_drop_report_close() {
    let (mut client, server) = loopback_pair();

    client.open("ws://localhost").unwrap();
    assert!(server.refuse("connection refused"));
    assert_eq!(
        client.poll_events(),
        vec![TransportEvent::Closed {
            code: CLOSE_ABNORMAL,
            reason: "connection refused".to_string()
        }]
    );

    client.open("ws://localhost").unwrap();
    server.accept();
    server.drop_connection(CLOSE_ABNORMAL, "reset");
    let events = client.poll_events();
    assert_eq!(events.last(), Some(&TransportEvent::Closed {
        code: CLOSE_ABNORMAL,
        reason: "reset".to_string()
    }));
    assert!(!server.is_open());
}

#[test]
fn test_client_close_records_code() {
    let (mut client, server) = loopback_pair();
    server.set_auto_accept(true);
    client.open("ws://localhost").unwrap();

    client.close(CLOSE_NORMAL, "bye");

    assert!(!server.is_open());
    assert_eq!(server.close_codes(), vec![CLOSE_NORMAL]);
    assert_eq!(client.send("x".to_string()), Err(TransportError::NotOpen));
}
