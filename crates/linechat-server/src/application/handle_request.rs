//! HandleRequestUseCase: decides what the server does with one inbound record.
//!
//! The use case is a pure function of the record text and the current time.
//! It never touches a socket; the dispatch context in
//! `infrastructure::network::server` carries out the returned
//! [`RequestOutcome`].
//!
//! # Decision table
//!
//! | Inbound record                      | Outcome                                   |
//! |-------------------------------------|-------------------------------------------|
//! | not a JSON request                  | `BadPacket` reply to the sender only       |
//! | `opCode` is `None` or absent        | `FieldMissing` reply to the sender only    |
//! | `SendMessage`, empty `data`         | `NullReference` reply to the sender only   |
//! | `SendMessage`, malformed `data`     | `BadPacket` reply to the sender only       |
//! | `SendMessage`, well-formed `data`   | stamped `Ok` broadcast to every connection |

use chrono::{DateTime, Utc};
use linechat_core::{
    decode_message, decode_request, ErrorCode, Message, OpCode, ProtocolError, Request, Response,
};
use tracing::debug;

/// What the dispatch context must do with an inbound record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Send `Response` back to the originating connection only.
    Reply(Response),
    /// Enqueue `response` on every registered connection and hand `message`
    /// to the observer.
    Broadcast { response: Response, message: Message },
}

/// Handles one inbound record received at `now`.
pub fn handle_request(record: &str, now: DateTime<Utc>) -> RequestOutcome {
    let request = match decode_request(record) {
        Ok(request) => request,
        Err(e) => return reject(OpCode::None, &e),
    };

    match request.op_code {
        OpCode::SendMessage => relay(request, now),
        OpCode::None => RequestOutcome::Reply(Response::error(OpCode::None, ErrorCode::FieldMissing)),
    }
}

fn relay(request: Request, now: DateTime<Utc>) -> RequestOutcome {
    let message = match decode_message(&request.data) {
        Ok(message) => message.stamped(now),
        Err(e) => return reject(request.op_code, &e),
    };

    match Response::ok(request.op_code, &message) {
        Ok(response) => RequestOutcome::Broadcast { response, message },
        Err(e) => reject(request.op_code, &e),
    }
}

fn reject(op_code: OpCode, error: &ProtocolError) -> RequestOutcome {
    debug!(error = %error, "rejecting request");
    RequestOutcome::Reply(Response::error(op_code, error.error_code()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use linechat_core::{decode_message, encode_request};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap()
    }

    fn send_record(sender: &str, body: &str) -> String {
        encode_request(&Request::send_message(&Message::new(sender, body)).unwrap()).unwrap()
    }

    fn expect_reply(outcome: RequestOutcome) -> Response {
        match outcome {
            RequestOutcome::Reply(response) => response,
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_well_formed_send_message_is_broadcast_with_server_time() {
        // Arrange
        let record = send_record("alice", "hi");

        // Act
        let outcome = handle_request(&record, now());

        // Assert
        let RequestOutcome::Broadcast { response, message } = outcome else {
            panic!("expected broadcast, got {outcome:?}");
        };
        assert_eq!(response.op_code, OpCode::SendMessage);
        assert_eq!(response.error_code, ErrorCode::Ok);
        assert_eq!(message.sender, "alice");
        assert_eq!(message.body, "hi");
        assert_eq!(message.server_check_time, Some(now()));
        assert_eq!(decode_message(&response.data).unwrap(), message);
    }

    #[test]
    fn test_server_time_is_never_before_client_time() {
        let before = Utc::now();
        let record = send_record("alice", "hi");
        let RequestOutcome::Broadcast { message, .. } = handle_request(&record, Utc::now()) else {
            panic!("expected broadcast");
        };
        let sent = message.client_send_time.unwrap();
        let checked = message.server_check_time.unwrap();
        assert!(sent >= before);
        assert!(checked >= sent);
    }

    #[test]
    fn test_non_json_record_gets_bad_packet() {
        let response = expect_reply(handle_request("definitely not json", now()));
        assert_eq!(response.op_code, OpCode::None);
        assert_eq!(response.error_code, ErrorCode::BadPacket);
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_op_code_none_gets_field_missing() {
        let response = expect_reply(handle_request(r#"{"opCode":0,"data":"{}"}"#, now()));
        assert_eq!(response.error_code, ErrorCode::FieldMissing);
    }

    #[test]
    fn test_missing_op_code_gets_field_missing() {
        let response = expect_reply(handle_request(r#"{"data":"{}"}"#, now()));
        assert_eq!(response.error_code, ErrorCode::FieldMissing);
    }

    #[test]
    fn test_empty_payload_gets_null_reference() {
        // Arrange
        let record = r#"{"opCode":1,"data":""}"#;

        // Act
        let response = expect_reply(handle_request(record, now()));

        // Assert
        assert_eq!(response.op_code, OpCode::SendMessage);
        assert_eq!(response.error_code, ErrorCode::NullReference);
    }

    #[test]
    fn test_malformed_payload_gets_bad_packet() {
        let response = expect_reply(handle_request(r#"{"opCode":1,"data":"{oops"}"#, now()));
        assert_eq!(response.op_code, OpCode::SendMessage);
        assert_eq!(response.error_code, ErrorCode::BadPacket);
    }

    #[test]
    fn test_client_supplied_server_time_is_overwritten() {
        // Arrange – a peer that tries to set ServerCheckTime itself
        let data = r#"{"Name":"mallory","Desc":"early","ServerCheckTime":0}"#;
        let record = encode_request(&Request {
            op_code: OpCode::SendMessage,
            data: data.to_string(),
        })
        .unwrap();

        // Act
        let outcome = handle_request(&record, now());

        // Assert
        let RequestOutcome::Broadcast { message, .. } = outcome else {
            panic!("expected broadcast");
        };
        assert_eq!(message.server_check_time, Some(now()));
    }
}
