//! Network identity of a remote peer.

use core::fmt;
use std::str::FromStr;

/// Host and port identity of a remote peer.
///
/// The `Display` form (`host:port`) is stable and doubles as the transport's
/// connection key, so every place that identifies a connection must go through
/// [`Endpoint::connection_key`] (or the `Display` impl, which renders the same
/// string).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection key used by transports. Identical to the `Display` form.
    pub fn connection_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when parsing an endpoint from its `host:port` form fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointParseError {
    input: String,
}

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid endpoint {:?}, expected host:port", self.input)
    }
}

impl std::error::Error for EndpointParseError {}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || EndpointParseError {
            input: s.to_string(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(err)?;
        if host.is_empty() {
            return Err(err());
        }
        let port = port.parse::<u16>().map_err(|_| err())?;
        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let endpoint: Endpoint = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 9000);
        assert_eq!(endpoint.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn connection_key_matches_display() {
        let endpoint = Endpoint::new("node-3.cluster.local", 8081);
        assert_eq!(endpoint.connection_key(), endpoint.to_string());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":9000".parse::<Endpoint>().is_err());
        assert!("localhost:notaport".parse::<Endpoint>().is_err());
        assert!("localhost:99999".parse::<Endpoint>().is_err());
    }
}
