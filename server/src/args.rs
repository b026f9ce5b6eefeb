use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    ops::Range,
    str::FromStr,
};

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use drafter_core::ServerConfig;
use tokio::net::TcpListener;

const DEFAULT_PORT_RANGE: Range<u16> = 8080..8181;

#[derive(Debug, Parser)]
#[command(name = "drafter-demo", about = "Drafter local development server", long_about = None)]
pub struct Args {
    /// Bind address specification
    ///
    /// Examples:
    ///   --bind :8080                Bind to localhost on port 8080
    ///   --bind :8000-8100           Bind to localhost with port range
    ///   --bind 192.168.1.100:8080   Bind to IP and port
    ///   --bind lan                  Bind to LAN IP with port autodetection
    ///   --bind [::1]:8080           Bind to IPv6 address with port (use brackets)
    ///   (default is localhost with port autodetection)
    #[arg(long, env = "DRAFTER_BIND", default_value_t = BindAddress::default())]
    pub bind: BindAddress,

    /// Site title shown in the header and the browser tab
    #[arg(long, env = "DRAFTER_TITLE")]
    pub title: Option<String>,

    /// Theme name, e.g. default, none, simple, sakura
    #[arg(long, env = "DRAFTER_THEME")]
    pub theme: Option<String>,

    /// Hide the debug panel and the debug frame
    #[arg(long, env = "DRAFTER_NO_DEBUG")]
    pub no_debug: bool,

    /// Do not wrap pages in the site frame
    #[arg(long, env = "DRAFTER_UNFRAMED")]
    pub unframed: bool,
}

impl Args {
    /// Overlay the command line on `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(title) = &self.title {
            config.title.clone_from(title);
        }
        if let Some(theme) = &self.theme {
            config.theme.clone_from(theme);
        }
        config.debug &= !self.no_debug;
        config.framed &= !self.unframed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAddress {
    Ip { ip: IpAddr, port_range: Range<u16> },
    Localhost { port_range: Range<u16> },
    /// First non-loopback address of this machine.
    Lan { port_range: Range<u16> },
}

impl Default for BindAddress {
    fn default() -> Self {
        BindAddress::Localhost {
            port_range: DEFAULT_PORT_RANGE,
        }
    }
}

impl FromStr for BindAddress {
    type Err = anyhow::Error;

    fn from_str(bind: &str) -> Result<Self, Self::Err> {
        if bind == "lan" {
            return Ok(BindAddress::Lan {
                port_range: DEFAULT_PORT_RANGE,
            });
        }
        if let Some(ports) = bind.strip_prefix("lan:") {
            return Ok(BindAddress::Lan {
                port_range: parse_port_range(ports)?,
            });
        }
        if let Some(ports) = bind.strip_prefix(':') {
            return Ok(BindAddress::Localhost {
                port_range: parse_port_range(ports)?,
            });
        }

        if let Some(rest) = bind.strip_prefix('[') {
            let (ip, tail) = rest
                .split_once(']')
                .ok_or_else(|| anyhow!("unclosed bracket in IPv6 address"))?;
            let ip = ip
                .parse::<IpAddr>()
                .with_context(|| format!("invalid IPv6 address: {ip}"))?;
            let port_range = match tail {
                "" => DEFAULT_PORT_RANGE,
                _ => match tail.strip_prefix(':') {
                    Some(ports) => parse_port_range(ports)?,
                    None => bail!("expected ':' after IPv6 address in brackets"),
                },
            };
            return Ok(BindAddress::Ip { ip, port_range });
        }

        if let Some((ip, ports)) = bind.rsplit_once(':')
            && let Ok(ip) = ip.parse::<IpAddr>()
            && let Ok(port_range) = parse_port_range(ports)
        {
            return Ok(BindAddress::Ip { ip, port_range });
        }

        let ip = bind
            .parse::<IpAddr>()
            .map_err(|_| anyhow!("invalid bind address: {bind}"))?;
        Ok(BindAddress::Ip {
            ip,
            port_range: DEFAULT_PORT_RANGE,
        })
    }
}

struct Ports<'a>(&'a Range<u16>);

impl fmt::Display for Ports<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            write!(f, "{}", self.0.start)
        } else {
            write!(f, "{}-{}", self.0.start, self.0.end - 1)
        }
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (host, port_range) = match self {
            BindAddress::Localhost { port_range } => ("localhost".to_string(), port_range),
            BindAddress::Lan { port_range } => ("lan".to_string(), port_range),
            BindAddress::Ip { ip, port_range } if ip.is_ipv6() => (format!("[{ip}]"), port_range),
            BindAddress::Ip { ip, port_range } => (ip.to_string(), port_range),
        };

        match (self, *port_range == DEFAULT_PORT_RANGE) {
            (BindAddress::Ip { ip, .. }, true) => write!(f, "{ip}"),
            (_, true) => f.write_str(&host),
            (BindAddress::Localhost { .. }, false) => write!(f, ":{}", Ports(port_range)),
            (_, false) => write!(f, "{host}:{}", Ports(port_range)),
        }
    }
}

impl BindAddress {
    /// Listen on the first free port of the range.
    pub async fn bind(&self) -> Option<TcpListener> {
        let (ip, port_range) = match self {
            BindAddress::Ip { ip, port_range } => (*ip, port_range),
            BindAddress::Localhost { port_range } => (IpAddr::V4(Ipv4Addr::LOCALHOST), port_range),
            BindAddress::Lan { port_range } => {
                let ip = local_ip_address::local_ip().ok()?;
                if ip.is_loopback() {
                    return None;
                }
                (ip, port_range)
            }
        };

        for port in port_range.clone() {
            if let Ok(listener) = TcpListener::bind(SocketAddr::new(ip, port)).await {
                return Some(listener);
            }
            tracing::debug!("port {port} on {ip} is taken");
        }
        None
    }
}

fn parse_port_range(ports: &str) -> anyhow::Result<Range<u16>> {
    let parse = |port: &str| -> anyhow::Result<u16> {
        port.parse()
            .map_err(|_| anyhow!("invalid port number: {port}"))
    };

    match ports.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start >= end {
                bail!("port range start must be less than end: {start}-{end}");
            }
            Ok(start..end + 1)
        }
        None => {
            let port = parse(ports)?;
            Ok(port..port + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bind: &str) -> BindAddress {
        BindAddress::from_str(bind).unwrap()
    }

    #[test]
    fn test_parse_bind_forms() {
        let loopback: IpAddr = "::1".parse().unwrap();
        let cases = [
            ("lan", BindAddress::Lan { port_range: DEFAULT_PORT_RANGE }),
            ("lan:9000", BindAddress::Lan { port_range: 9000..9001 }),
            (":8000-8100", BindAddress::Localhost { port_range: 8000..8101 }),
            (
                "192.168.1.100:8080",
                BindAddress::Ip {
                    ip: "192.168.1.100".parse().unwrap(),
                    port_range: 8080..8081,
                },
            ),
            (
                "[::1]",
                BindAddress::Ip {
                    ip: loopback,
                    port_range: DEFAULT_PORT_RANGE,
                },
            ),
            (
                "[::1]:8080",
                BindAddress::Ip {
                    ip: loopback,
                    port_range: 8080..8081,
                },
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(parse(input), expected, "parsing {input}");
        }
    }

    #[test]
    fn test_parse_bind_errors() {
        for input in [":8100-8000", "999.999.999.999", "[::1", "[::1]8080", ":http"] {
            assert!(BindAddress::from_str(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["localhost", "lan", "lan:8080", ":8080", ":8000-8100", "10.0.0.1", "10.0.0.1:9000", "[::1]:8080"] {
            let bind = if input == "localhost" {
                BindAddress::default()
            } else {
                parse(input)
            };
            assert_eq!(bind.to_string(), input);
        }
    }

    #[test]
    fn test_args_overlay_config() {
        let args = Args::parse_from(["drafter-demo", "--title", "Bank", "--no-debug", "--theme", "sakura"]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.title, "Bank");
        assert_eq!(config.theme, "sakura");
        assert!(!config.debug);
        assert!(config.framed);
    }
}
