//! Integration tests for the linechat-core protocol codec.
//!
//! These tests drive the public API the way the server and client do: a
//! message is wrapped in a request, relayed as a response, and unwrapped on
//! the far side.

use chrono::{DateTime, Utc};
use linechat_core::{
    decode_message, decode_request, decode_response, encode_request, encode_response, ErrorCode,
    Message, OpCode, ProtocolError, Request, Response,
};

fn at(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).expect("valid timestamp")
}

#[test]
fn test_message_survives_request_then_response_relay() {
    // Arrange – the client side
    let original = Message {
        sender: "alice".into(),
        body: "hi".into(),
        client_send_time: Some(at(1_700_000_000_000)),
        server_check_time: None,
    };
    let line = encode_request(&Request::send_message(&original).unwrap()).unwrap();

    // Act – the server decodes, stamps, and relays
    let request = decode_request(&line).unwrap();
    let relayed = decode_message(&request.data)
        .unwrap()
        .stamped(at(1_700_000_000_500));
    let reply = encode_response(&Response::ok(request.op_code, &relayed).unwrap()).unwrap();

    // Assert – the client decodes the relay
    let response = decode_response(&reply).unwrap();
    assert!(response.is_ok());
    assert_eq!(response.op_code, OpCode::SendMessage);
    let received = decode_message(&response.data).unwrap();
    assert_eq!(received.sender, "alice");
    assert_eq!(received.body, "hi");
    assert_eq!(received.client_send_time, original.client_send_time);
    assert_eq!(received.server_check_time, Some(at(1_700_000_000_500)));
}

#[test]
fn test_request_wire_shape_matches_existing_peers() {
    // Arrange
    let message = Message {
        sender: "alice".into(),
        body: "hi".into(),
        ..Default::default()
    };

    // Act
    let line = encode_request(&Request::send_message(&message).unwrap()).unwrap();

    // Assert
    assert_eq!(
        line,
        r#"{"opCode":1,"data":"{\"Name\":\"alice\",\"Desc\":\"hi\"}"}"#
    );
}

#[test]
fn test_response_from_other_implementation_decodes() {
    // A relay written by a peer that uses the misspelled time field and nulls.
    let line = r#"{"opCode":1,"errorCode":100,"data":"{\"Name\":\"bob\",\"Desc\":\"yo\",\"ClinetSendTime\":\"2024-01-01T00:00:00Z\",\"ServerCheckTime\":null}"}"#;

    let response = decode_response(line).unwrap();
    let message = decode_message(&response.data).unwrap();

    assert_eq!(message.sender, "bob");
    assert_eq!(
        message.client_send_time,
        Some("2024-01-01T00:00:00Z".parse().unwrap())
    );
    assert_eq!(message.server_check_time, None);
}

#[test]
fn test_every_decode_failure_maps_to_an_error_code() {
    let cases: &[(&str, ErrorCode)] = &[
        ("not json at all", ErrorCode::BadPacket),
        (r#"{"opCode":"one"}"#, ErrorCode::BadPacket),
        (r#"{"opCode":0,"data":""}"#, ErrorCode::FieldMissing),
        (r#"{}"#, ErrorCode::FieldMissing),
    ];

    for (record, expected) in cases {
        let err = decode_request(record).unwrap_err();
        assert_eq!(err.error_code(), *expected, "record: {record}");
    }
}

#[test]
fn test_send_message_with_empty_payload_is_null_reference() {
    let request = decode_request(r#"{"opCode":1,"data":""}"#).unwrap();
    let err = decode_message(&request.data).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingPayload));
    assert_eq!(err.error_code(), ErrorCode::NullReference);
}

#[test]
fn test_unicode_body_is_preserved() {
    let message = Message::new("민수", "안녕하세요 👋");
    let line = encode_request(&Request::send_message(&message).unwrap()).unwrap();
    let decoded = decode_message(&decode_request(&line).unwrap().data).unwrap();
    assert_eq!(decoded.sender, "민수");
    assert_eq!(decoded.body, "안녕하세요 👋");
}
