//! Terminal rendering of chat messages: `[HH:MM:SS] <Name> Desc`.

use chrono::{DateTime, Local, TimeZone, Utc};
use linechat_core::Message;

/// Formats `message` for display, using local wall-clock time.
///
/// The server's timestamp is preferred; a message the server never stamped
/// shows its send time, and a message with neither shows the current time.
pub fn render_line(message: &Message) -> String {
    render_line_in(message, &Local)
}

/// Same as [`render_line`] in an explicit time zone.
pub fn render_line_in<Tz>(message: &Message, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let at: DateTime<Utc> = message
        .server_check_time
        .or(message.client_send_time)
        .unwrap_or_else(Utc::now);
    format!(
        "[{}] <{}> {}",
        at.with_timezone(tz).format("%H:%M:%S"),
        message.sender,
        message.body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(millis)
    }

    #[test]
    fn test_prefers_server_time() {
        // Arrange – 2023-11-14T22:13:20Z sent, 22:13:21Z stamped
        let message = Message {
            sender: "alice".into(),
            body: "hi".into(),
            client_send_time: at(1_700_000_000_000),
            server_check_time: at(1_700_000_001_000),
        };

        // Act
        let line = render_line_in(&message, &Utc);

        // Assert
        assert_eq!(line, "[22:13:21] <alice> hi");
    }

    #[test]
    fn test_falls_back_to_client_time() {
        let message = Message {
            sender: "bob".into(),
            body: "yo".into(),
            client_send_time: at(1_700_000_000_000),
            server_check_time: None,
        };
        assert_eq!(render_line_in(&message, &Utc), "[22:13:20] <bob> yo");
    }

    #[test]
    fn test_local_rendering_keeps_sender_and_body() {
        let line = render_line(&Message::system("Log", "Disconnected"));
        assert!(line.starts_with('['));
        assert!(line.ends_with("] <Log> Disconnected"));
    }
}
