use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use crate::icmp::MAX_PAYLOAD;

#[derive(Parser, Debug)]
#[command(name = "icmp-probe", version, about = "Envia ICMP Echo Request e mede o RTT")]
pub struct PingArgs {
    /// Timeout de cada pedido, em milissegundos.
    #[arg(short = 'w', default_value_t = 1000)]
    pub timeout: u64,

    /// Tamanho do payload, em bytes.
    #[arg(short = 'l', default_value_t = 32,
          value_parser = clap::value_parser!(u16).range(..=MAX_PAYLOAD as i64))]
    pub size: u16,

    /// Número de pedidos.
    #[arg(short = 'n', default_value_t = 4)]
    pub count: u32,

    /// Host ou IPv4 de destino.
    pub target: String,
}

impl PingArgs {
    /// Resolve o destino uma vez; o primeiro endereço IPv4 vence.
    pub fn target_addr(&self) -> Result<Ipv4Addr> {
        if let Ok(ip) = self.target.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        (self.target.as_str(), 0)
            .to_socket_addrs()
            .with_context(|| format!("Não foi possível resolver {}", self.target))?
            .find_map(|sa| match sa.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .with_context(|| format!("{} não tem endereço IPv4", self.target))
    }
}

pub fn parse() -> PingArgs {
    PingArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_parse(args: &[&str]) -> Result<PingArgs, clap::Error> {
        PingArgs::try_parse_from(std::iter::once("icmp-probe").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let args = try_parse(&["127.0.0.1"]).unwrap();
        assert_eq!(args.timeout, 1000);
        assert_eq!(args.size, 32);
        assert_eq!(args.count, 4);
        assert_eq!(args.target, "127.0.0.1");
    }

    #[test]
    fn flags() {
        let args = try_parse(&["-w", "200", "-l", "64", "-n", "10", "10.0.0.1"]).unwrap();
        assert_eq!((args.timeout, args.size, args.count), (200, 64, 10));
        assert_eq!(args.target_addr().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(try_parse(&[]).is_err());
        assert!(try_parse(&["-l", "65508", "127.0.0.1"]).is_err());
        assert!(try_parse(&["-n", "muitos", "127.0.0.1"]).is_err());
    }

    #[test]
    fn unresolvable_host_is_an_error() {
        let args = try_parse(&["no-such-host.invalid"]).unwrap();
        assert!(args.target_addr().is_err());
    }

    #[test]
    fn max_payload_accepted() {
        let args = try_parse(&["-l", "65507", "127.0.0.1"]).unwrap();
        assert_eq!(args.size as usize, MAX_PAYLOAD);
    }
}
