//! Operator Input Parsing
//!
//! Everything the operator types is validated here before it reaches the
//! network layer: the instance selector, the `host,port` pair for a
//! connect, and the menu choice.

use crate::{EXIT_KEYWORD, INSTANCE_PORTS, MIN_PORT};
use std::fmt;
use std::str::FromStr;

/// Maps the instance selector to a listening port.
///
/// `1` and `2` select the well-known ports; anything else must be a literal
/// port number in `1024..=65535`.
///
/// # Example
/// ```
/// use peerchat::console::input::parse_instance;
///
/// assert_eq!(parse_instance("1").unwrap(), 8888);
/// assert_eq!(parse_instance("9000").unwrap(), 9000);
/// assert!(parse_instance("80").is_err());
/// ```
pub fn parse_instance(input: &str) -> Result<u16, InputError> {
    match input.trim() {
        "1" => Ok(INSTANCE_PORTS[0]),
        "2" => Ok(INSTANCE_PORTS[1]),
        other => parse_listen_port(other),
    }
}

/// Parses a port we are allowed to listen on (`1024..=65535`).
pub fn parse_listen_port(input: &str) -> Result<u16, InputError> {
    let input = input.trim();
    let port: i64 = input
        .parse()
        .map_err(|_| InputError::InvalidPort(input.to_string()))?;

    if port < MIN_PORT as i64 || port > u16::MAX as i64 {
        return Err(InputError::PortOutOfRange(port));
    }
    Ok(port as u16)
}

/// Returns true if the line is the reserved exit keyword (any case).
///
/// The line must be exactly the keyword: `" exit"` is an ordinary message.
pub fn is_exit_keyword(line: &str) -> bool {
    line.eq_ignore_ascii_case(EXIT_KEYWORD)
}

/// A peer to dial, entered as `host,port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for PeerAddress {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InputError::InvalidAddress(s.trim().to_string());

        let (host, port) = s.trim().split_once(',').ok_or_else(invalid)?;
        let host = host.trim();
        if host.is_empty() {
            return Err(invalid());
        }

        let port: u16 = port.trim().parse().map_err(|_| invalid())?;
        if port == 0 {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What the operator picked at the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// `c`: dial another peer
    Connect,
    /// `s` (or anything unrecognised, including `exit`): start sending messages
    Send,
    /// `e`: close everything and quit
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        match input.to_ascii_lowercase().as_str() {
            "c" => MenuChoice::Connect,
            "e" => MenuChoice::Exit,
            _ => MenuChoice::Send,
        }
    }
}

/// Malformed operator input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid input '{0}'. Please enter 1, 2, or a valid port number (1024-65535)")]
    InvalidPort(String),

    #[error("Port {0} out of range (1024-65535)")]
    PortOutOfRange(i64),

    #[error("Invalid address format '{0}'. Use IP,Port (e.g., 127.0.0.1,8888)")]
    InvalidAddress(String),

    #[error("Input closed")]
    Closed,

    #[error("Interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_shortcuts() {
        assert_eq!(parse_instance("1"), Ok(8888));
        assert_eq!(parse_instance(" 2 "), Ok(8889));
    }

    #[test]
    fn test_instance_literal_port() {
        assert_eq!(parse_instance("1024"), Ok(1024));
        assert_eq!(parse_instance("65535"), Ok(65535));
        assert_eq!(parse_instance("1023"), Err(InputError::PortOutOfRange(1023)));
        assert_eq!(parse_instance("65536"), Err(InputError::PortOutOfRange(65536)));
        assert_eq!(parse_instance("-5"), Err(InputError::PortOutOfRange(-5)));
        assert_eq!(
            parse_instance("three"),
            Err(InputError::InvalidPort("three".to_string()))
        );
        assert!(parse_instance("").is_err());
    }

    #[test]
    fn test_exit_keyword() {
        assert!(is_exit_keyword("exit"));
        assert!(is_exit_keyword("EXIT"));
        assert!(is_exit_keyword("eXiT"));
        assert!(!is_exit_keyword(" exit "));
        assert!(!is_exit_keyword("exit\r"));
        assert!(!is_exit_keyword("exit now"));
        assert!(!is_exit_keyword("quit"));
    }

    #[test]
    fn test_peer_address() {
        let addr: PeerAddress = "127.0.0.1,8888".parse().unwrap();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 8888);
        assert_eq!(addr.to_string(), "127.0.0.1:8888");

        let spaced: PeerAddress = " localhost , 9000 ".parse().unwrap();
        assert_eq!(spaced.host, "localhost");
        assert_eq!(spaced.port, 9000);
    }

    #[test]
    fn test_peer_address_rejects_malformed() {
        for bad in ["127.0.0.1:8888", "127.0.0.1", ",8888", "host,", "host,abc", "host,0", "host,70000"] {
            assert!(
                matches!(bad.parse::<PeerAddress>(), Err(InputError::InvalidAddress(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_menu_choice() {
        assert_eq!(MenuChoice::parse("c"), MenuChoice::Connect);
        assert_eq!(MenuChoice::parse("C"), MenuChoice::Connect);
        assert_eq!(MenuChoice::parse("e"), MenuChoice::Exit);
        assert_eq!(MenuChoice::parse("E"), MenuChoice::Exit);
        // Only the single letters count
        assert_eq!(MenuChoice::parse("exit"), MenuChoice::Send);
        assert_eq!(MenuChoice::parse(" c"), MenuChoice::Send);
        assert_eq!(MenuChoice::parse("s"), MenuChoice::Send);
        assert_eq!(MenuChoice::parse("whatever"), MenuChoice::Send);
    }
}
