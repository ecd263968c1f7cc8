//! Broker address parsing.

use std::fmt;

use crate::bus::BusError;

/// Port of the Artemis STOMP acceptor when none is given.
pub const DEFAULT_PORT: u16 = 61613;

/// Host and port of a STOMP endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parse `tcp://host:port`, `stomp://host:port`, `host:port` or `host`.
    ///
    /// Anything after `?` (acceptor options in Artemis URLs) is ignored.
    pub fn parse(url: &str) -> Result<Self, BusError> {
        let trimmed = url.trim();
        let rest = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "tcp" && scheme != "stomp" {
                    return Err(BusError::ConnectionFailed(format!(
                        "unsupported broker url scheme {:?} in {:?}",
                        scheme, url
                    )));
                }
                rest
            }
            None => trimmed,
        };

        let authority = rest
            .split(['?', '/'])
            .next()
            .unwrap_or_default();

        let parse_port = |port: &str| {
            port.parse::<u16>().map_err(|_| {
                BusError::ConnectionFailed(format!("invalid port {:?} in broker url {:?}", port, url))
            })
        };

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            // IPv6 literal: [addr] or [addr]:port
            let (host, after) = bracketed.split_once(']').ok_or_else(|| {
                BusError::ConnectionFailed(format!("unclosed '[' in broker url {:?}", url))
            })?;
            let port = match after {
                "" => DEFAULT_PORT,
                _ => match after.strip_prefix(':') {
                    Some(port) => parse_port(port)?,
                    None => return Err(BusError::ConnectionFailed(format!(
                        "unexpected {:?} after IPv6 host in broker url {:?}",
                        after, url
                    ))),
                },
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (authority, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(BusError::ConnectionFailed(format!(
                "broker url {:?} has no host",
                url
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
