use std::{error::Error, fmt, io};

pub type Result<T> = std::result::Result<T, PingError>;

#[derive(Debug)]
pub enum PingError {
    /// The destination did not resolve to an IPv4 address.
    Resolve { host: String, source: io::Error },
    /// The raw socket could not be opened or configured.
    Socket(io::Error),
    /// Writing an echo request failed. Fatal for the whole session.
    Send(io::Error),
    InvalidConfig(String),
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve { host, .. } => write!(f, "cannot resolve {}", host),
            Self::Socket(_) => write!(f, "cannot open raw ICMP socket (are you root?)"),
            Self::Send(_) => write!(f, "failed to send echo request"),
            Self::InvalidConfig(message) => write!(f, "invalid configuration: {}", message),
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolve { source, .. } => Some(source),
            Self::Socket(e) | Self::Send(e) => Some(e),
            Self::InvalidConfig(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_invalid_config() {
        let error = PingError::InvalidConfig("size too large".to_string());
        assert_eq!("invalid configuration: size too large", format!("{}", error));
        assert!(error.source().is_none());
    }

    #[test]
    fn send_error_keeps_source() {
        let error = PingError::Send(io::Error::new(io::ErrorKind::Other, "network is down"));
        assert_eq!("failed to send echo request", error.to_string());
        assert_eq!("network is down", error.source().unwrap().to_string());
    }

    #[test]
    fn resolve_error_names_host() {
        let error = PingError::Resolve {
            host: "nowhere.invalid".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!("cannot resolve nowhere.invalid", error.to_string());
        assert!(error.source().is_some());
    }
}
