// Criação e configuração de sockets de baixo nível
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::probe::Connection;

/// Socket ICMP RAW conectado a um único destino IPv4.
///
/// As leituras incluem o cabeçalho IPv4 que o kernel põe na frente do ICMP.
/// O prazo é absoluto: cada `send`/`recv` usa só o tempo que ainda resta.
pub struct IcmpSocket {
    sock: Socket,
    peer: Ipv4Addr,
    deadline: Option<Instant>,
}

impl IcmpSocket {
    /// Abre o socket RAW e fixa o destino. Qualquer falha aqui é fatal.
    pub fn connect(dst: Ipv4Addr) -> Result<Self> {
        let sock = Socket::new(
            Domain::IPV4,
            Type::from(libc::SOCK_RAW),
            Some(Protocol::ICMPV4),
        )
        .map_err(open_error)?;

        // Porta 0 é ignorada para ICMP
        let addr = SockAddr::from(SocketAddrV4::new(dst, 0));
        sock.connect(&addr)
            .with_context(|| format!("Falha ao conectar em {dst}"))?;

        Ok(Self {
            sock,
            peer: dst,
            deadline: None,
        })
    }

    pub fn peer(&self) -> Ipv4Addr {
        self.peer
    }
}

impl Connection for IcmpSocket {
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()> {
        self.deadline = Some(deadline);
        Ok(())
    }

    fn send(&mut self, pkt: &[u8]) -> io::Result<usize> {
        self.sock
            .set_write_timeout(remaining(self.deadline, Instant::now())?)?;
        self.sock.send(pkt).map_err(would_block_as_timeout)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sock
            .set_read_timeout(remaining(self.deadline, Instant::now())?)?;
        self.sock.read(buf).map_err(would_block_as_timeout)
    }
}

/// Tempo restante até o prazo. Prazo vencido vira `TimedOut`: um timeout
/// zero no socket significaria bloquear para sempre.
fn remaining(deadline: Option<Instant>, now: Instant) -> io::Result<Option<Duration>> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };
    let left = deadline.saturating_duration_since(now);
    if left.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "prazo esgotado"));
    }
    Ok(Some(left))
}

// SO_RCVTIMEO/SO_SNDTIMEO expirado chega como EAGAIN no Unix
fn would_block_as_timeout(e: io::Error) -> io::Error {
    if e.kind() == io::ErrorKind::WouldBlock {
        io::Error::new(io::ErrorKind::TimedOut, "tempo limite esgotado")
    } else {
        e
    }
}

fn open_error(e: io::Error) -> anyhow::Error {
    let msg = match e.raw_os_error() {
        Some(libc::EPERM) | Some(libc::EACCES) => {
            "Falha ao criar socket RAW. Rode como root ou com CAP_NET_RAW."
        }
        _ => "Falha ao criar socket RAW.",
    };
    anyhow::Error::new(e).context(msg)
}
