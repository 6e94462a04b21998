//! STOMP-style text frames.
//!
//! Wire shape: command line, `key:value` header lines, a blank line, the
//! body, and a trailing NUL. Header lookup is first-match, mirroring native
//! header semantics.

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Send,
    Message,
    Error,
    Disconnect,
}

impl Command {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "CONNECT" => Some(Self::Connect),
            "CONNECTED" => Some(Self::Connected),
            "SUBSCRIBE" => Some(Self::Subscribe),
            "SEND" => Some(Self::Send),
            "MESSAGE" => Some(Self::Message),
            "ERROR" => Some(Self::Error),
            "DISCONNECT" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// First header with the given name, if any.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a single frame.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty input, an unknown command, or a header
    /// line without a `:` separator.
    pub fn parse(input: &str) -> Result<Self, FrameError> {
        let input = input.trim_end_matches('\0');
        let (head, body) = match input
            .split_once("\r\n\r\n")
            .or_else(|| input.split_once("\n\n"))
        {
            Some((head, body)) => (head, body),
            None => (input, ""),
        };

        let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));
        let command_line = lines.next().filter(|line| !line.is_empty());
        let Some(command_line) = command_line else {
            return Err(FrameError::Empty);
        };
        let command = Command::parse(command_line)
            .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connect_with_headers() -> Result<(), FrameError> {
        let frame = Frame::parse("CONNECT\nAuthorization:Bearer abc\nheart-beat:0,0\n\n\0")?;
        assert_eq!(frame.command, Command::Connect);
        assert_eq!(frame.header("Authorization"), Some("Bearer abc"));
        assert_eq!(frame.header("heart-beat"), Some("0,0"));
        assert_eq!(frame.header("missing"), None);
        assert_eq!(frame.body, "");
        Ok(())
    }

    #[test]
    fn parse_send_with_body() -> Result<(), FrameError> {
        let frame = Frame::parse("SEND\ndestination:/topic/room.7\n\nhello there\0")?;
        assert_eq!(frame.command, Command::Send);
        assert_eq!(frame.header("destination"), Some("/topic/room.7"));
        assert_eq!(frame.body, "hello there");
        Ok(())
    }

    #[test]
    fn encode_then_parse_round_trips() -> Result<(), FrameError> {
        let frame = Frame::new(Command::Message)
            .with_header("destination", "/topic/room.7")
            .with_header("user-id", "42")
            .with_body("hi");

        assert_eq!(Frame::parse(&frame.encode())?, frame);
        Ok(())
    }

    #[test]
    fn parse_tolerates_crlf() -> Result<(), FrameError> {
        let frame = Frame::parse("DISCONNECT\r\n\r\n")?;
        assert_eq!(frame.command, Command::Disconnect);
        Ok(())
    }

    #[test]
    fn parse_rejects_junk() {
        assert_eq!(Frame::parse(""), Err(FrameError::Empty));
        assert_eq!(Frame::parse("\0"), Err(FrameError::Empty));
        assert_eq!(
            Frame::parse("SHOUT\n\n"),
            Err(FrameError::UnknownCommand("SHOUT".to_string()))
        );
        assert_eq!(
            Frame::parse("CONNECT\nno-separator\n\n"),
            Err(FrameError::MalformedHeader("no-separator".to_string()))
        );
    }
}
