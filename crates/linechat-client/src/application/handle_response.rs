//! HandleResponseUseCase: interprets one record received from the server.
//!
//! Pure function of the record text, so it is tested without sockets.  The
//! network layer acts on the returned [`ResponseOutcome`].

use linechat_core::{decode_message, decode_response, ErrorCode, Message, OpCode, ProtocolError};

/// What the client should do with an inbound record.
#[derive(Debug)]
pub enum ResponseOutcome {
    /// A relayed chat message to hand to the presentation layer.
    Deliver(Message),
    /// The server answered one of our requests with an error code.
    Rejected { op_code: OpCode, error_code: ErrorCode },
    /// A successful response to an operation that carries nothing to show.
    Ignored(OpCode),
    /// The record could not be decoded.
    Undecodable(ProtocolError),
}

pub fn handle_response(record: &str) -> ResponseOutcome {
    let response = match decode_response(record) {
        Ok(response) => response,
        Err(e) => return ResponseOutcome::Undecodable(e),
    };

    if response.error_code != ErrorCode::Ok {
        return ResponseOutcome::Rejected {
            op_code: response.op_code,
            error_code: response.error_code,
        };
    }

    match response.op_code {
        OpCode::SendMessage => match decode_message(&response.data) {
            Ok(message) => ResponseOutcome::Deliver(message),
            Err(e) => ResponseOutcome::Undecodable(e),
        },
        other => ResponseOutcome::Ignored(other),
    }
}
