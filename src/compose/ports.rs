use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortError {
    #[error("port mapping {0:?} is empty")]
    Empty(String),

    #[error("{value:?} in {input:?} is not a port number between 1 and 65535")]
    InvalidPort { input: String, value: String },

    #[error("{0:?} has an invalid host IP")]
    InvalidHostIp(String),

    #[error("{0:?} has an unknown protocol")]
    InvalidProtocol(String),

    #[error("{0:?} has too many ':'-separated parts")]
    TooManyParts(String),

    #[error("published range in {0:?} does not match the container range")]
    RangeMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        PortRange { start: port, end: port }
    }

    pub fn len(&self) -> u32 {
        u32::from(self.end - self.start) + 1
    }

    fn parse(input: &str, text: &str) -> Result<Self, PortError> {
        let invalid = || PortError::InvalidPort {
            input: input.to_string(),
            value: text.to_string(),
        };
        let (start, end) = match text.split_once('-') {
            Some((a, b)) => (parse_port(a).ok_or_else(invalid)?, parse_port(b).ok_or_else(invalid)?),
            None => {
                let port = parse_port(text).ok_or_else(invalid)?;
                (port, port)
            }
        };
        if start > end {
            return Err(invalid());
        }
        Ok(PortRange { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

fn parse_port(text: &str) -> Option<u16> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u16>().ok().filter(|p| *p != 0)
}

/// One entry of a service's `ports:` list in short syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<IpAddr>,
    pub published: Option<PortRange>,
    pub target: PortRange,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Parses `[[IP:]HOST:]CONTAINER[/PROTOCOL]`; IPv6 addresses go in brackets.
    pub fn parse(input: &str) -> Result<Self, PortError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(PortError::Empty(input.to_string()));
        }

        let (text, protocol) = match text.rsplit_once('/') {
            Some((rest, proto)) => {
                let protocol = match proto.to_ascii_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    "sctp" => Protocol::Sctp,
                    _ => return Err(PortError::InvalidProtocol(input.to_string())),
                };
                (rest, protocol)
            }
            None => (text, Protocol::Tcp),
        };

        let (host_ip, ports) = split_host_ip(input, text)?;
        let parts: Vec<&str> = ports.split(':').collect();
        let (published, target) = match parts.as_slice() {
            [target] => (None, *target),
            [published, target] => (Some(*published), *target),
            _ => return Err(PortError::TooManyParts(input.to_string())),
        };

        let target = PortRange::parse(input, target)?;
        let published = match published {
            None | Some("") => None,
            Some(p) => Some(PortRange::parse(input, p)?),
        };
        if let Some(published) = published {
            if target.len() > 1 && published.len() != target.len() {
                return Err(PortError::RangeMismatch(input.to_string()));
            }
        }

        Ok(PortMapping {
            host_ip,
            published,
            target,
            protocol,
        })
    }
}

fn split_host_ip<'a>(input: &str, text: &'a str) -> Result<(Option<IpAddr>, &'a str), PortError> {
    if let Some(rest) = text.strip_prefix('[') {
        let (ip, rest) = rest
            .split_once(']')
            .ok_or_else(|| PortError::InvalidHostIp(input.to_string()))?;
        let ip: IpAddr = ip.parse().map_err(|_| PortError::InvalidHostIp(input.to_string()))?;
        let rest = rest
            .strip_prefix(':')
            .ok_or_else(|| PortError::InvalidHostIp(input.to_string()))?;
        return Ok((Some(ip), rest));
    }

    if text.matches(':').count() == 2 {
        let (ip, rest) = text
            .split_once(':')
            .ok_or_else(|| PortError::InvalidHostIp(input.to_string()))?;
        let ip: IpAddr = ip.parse().map_err(|_| PortError::InvalidHostIp(input.to_string()))?;
        return Ok((Some(ip), rest));
    }

    Ok((None, text))
}

/// Checks a numeric port from the long or bare-number syntax.
pub fn check_port_number(value: u32) -> Result<u16, PortError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| PortError::InvalidPort {
            input: value.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_container() {
        let mapping = PortMapping::parse("8000:8000").unwrap();
        assert_eq!(mapping.published, Some(PortRange::single(8000)));
        assert_eq!(mapping.target, PortRange::single(8000));
        assert_eq!(mapping.protocol, Protocol::Tcp);
        assert_eq!(mapping.host_ip, None);
    }

    #[test]
    fn container_only_and_protocol() {
        let mapping = PortMapping::parse("53/udp").unwrap();
        assert_eq!(mapping.published, None);
        assert_eq!(mapping.protocol, Protocol::Udp);
    }

    #[test]
    fn host_ip_forms() {
        let mapping = PortMapping::parse("127.0.0.1:5432:5432").unwrap();
        assert_eq!(mapping.host_ip, Some("127.0.0.1".parse().unwrap()));

        let mapping = PortMapping::parse("127.0.0.1::5432").unwrap();
        assert_eq!(mapping.published, None);

        let mapping = PortMapping::parse("[::1]:8080:80").unwrap();
        assert_eq!(mapping.host_ip, Some("::1".parse().unwrap()));
        assert_eq!(mapping.published, Some(PortRange::single(8080)));
    }

    #[test]
    fn ranges() {
        let mapping = PortMapping::parse("9000-9002:9000-9002").unwrap();
        assert_eq!(mapping.target.len(), 3);
        assert_eq!(mapping.target.to_string(), "9000-9002");
        assert_eq!(
            PortMapping::parse("9000-9001:9000-9002"),
            Err(PortError::RangeMismatch("9000-9001:9000-9002".to_string()))
        );
        assert!(PortMapping::parse("9002-9000").is_err());
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(matches!(PortMapping::parse("70000:80"), Err(PortError::InvalidPort { .. })));
        assert!(matches!(PortMapping::parse("0:80"), Err(PortError::InvalidPort { .. })));
        assert!(matches!(PortMapping::parse("5432:"), Err(PortError::InvalidPort { .. })));
        assert!(matches!(PortMapping::parse("abc"), Err(PortError::InvalidPort { .. })));
        assert!(matches!(PortMapping::parse("80/http"), Err(PortError::InvalidProtocol(_))));
        assert!(matches!(PortMapping::parse("localhost:80:80"), Err(PortError::InvalidHostIp(_))));
        assert!(matches!(PortMapping::parse("1:2:3:4"), Err(PortError::TooManyParts(_))));
        assert!(matches!(PortMapping::parse(""), Err(PortError::Empty(_))));
    }

    #[test]
    fn numeric_ports() {
        assert_eq!(check_port_number(8000), Ok(8000));
        assert!(check_port_number(0).is_err());
        assert!(check_port_number(65536).is_err());
    }
}
