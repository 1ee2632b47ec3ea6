use std::io;
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::icmp::{self, EchoRequest};

/// Intervalo fixo entre dois pedidos.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Buffer de recepção: maior datagrama IPv4.
pub const RECV_BUF_LEN: usize = 65535;

/// Conexão ICMP bloqueante com prazo absoluto, no estilo `SetDeadline`.
pub trait Connection {
    /// O prazo vale para todos os `send`/`recv` seguintes.
    fn set_deadline(&mut self, deadline: Instant) -> io::Result<()>;
    fn send(&mut self, pkt: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub payload_size: usize,
    pub count: u32,
    pub ident: u16,
    pub seq: u16,
    pub interval: Duration,
}

impl ProbeConfig {
    /// Identifier = PID do processo (truncado), sequence = 1. Ambos fixos
    /// durante a sessão.
    pub fn new(timeout: Duration, payload_size: usize, count: u32) -> Self {
        Self {
            timeout,
            payload_size,
            count,
            ident: std::process::id() as u16,
            seq: 1,
            interval: PROBE_INTERVAL,
        }
    }
}

/// Falha de uma iteração. Nunca aborta a sessão.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("falha ao enviar: {0}")]
    Send(#[source] io::Error),
    #[error("falha na leitura: {0}")]
    Receive(#[source] io::Error),
    #[error("resposta curta demais ({0} bytes)")]
    ShortReply(usize),
}

/// Dados de uma resposta recebida dentro do prazo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub source: Ipv4Addr,
    pub ttl: u8,
    pub payload_len: usize,
    pub rtt: Duration,
}

#[derive(Debug)]
pub struct ProbeResult {
    /// Índice da iteração, começando em 0.
    pub index: u32,
    pub outcome: Result<Reply, ProbeError>,
}

/// Contadores e RTTs acumulados pela sessão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub sent: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// `Duration::MAX` até o primeiro sucesso.
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub sum_rtt: Duration,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            sent: 0,
            succeeded: 0,
            failed: 0,
            min_rtt: Duration::MAX,
            max_rtt: Duration::ZERO,
            sum_rtt: Duration::ZERO,
        }
    }
}

impl SessionStats {
    pub fn record_success(&mut self, rtt: Duration) {
        self.succeeded += 1;
        self.min_rtt = self.min_rtt.min(rtt);
        self.max_rtt = self.max_rtt.max(rtt);
        self.sum_rtt += rtt;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// `failed / sent * 100`; 0 quando nada foi enviado.
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.failed as f64 / self.sent as f64 * 100.0
    }

    /// Soma dos RTTs dividida por `sent`, não por `succeeded`: falhas puxam a
    /// média para baixo.
    pub fn avg_rtt(&self) -> Duration {
        self.sum_rtt.checked_div(self.sent).unwrap_or_default()
    }
}

/// Laço de pedidos contra um único destino.
pub struct Prober<C> {
    conn: C,
    config: ProbeConfig,
}

impl<C: Connection> Prober<C> {
    pub fn new(conn: C, config: ProbeConfig) -> Self {
        Self { conn, config }
    }

    /// Executa `count` iterações, entregando cada resultado a `on_result`.
    /// Erros de envio/recepção são registrados e contados como perda.
    ///
    /// Só uma resposta recebida é seguida do intervalo; uma falha passa
    /// direto ao próximo pedido.
    pub fn run(&mut self, mut on_result: impl FnMut(&ProbeResult)) -> SessionStats {
        let mut stats = SessionStats::default();
        let mut buf = vec![0u8; RECV_BUF_LEN];

        for index in 0..self.config.count {
            stats.sent += 1;
            let outcome = self.probe_once(&mut buf);
            let replied = outcome.is_ok();
            match &outcome {
                Ok(reply) => stats.record_success(reply.rtt),
                Err(e) => {
                    stats.record_failure();
                    warn!(index, error = %e, "pedido perdido");
                }
            }
            on_result(&ProbeResult { index, outcome });

            // Depois do último não há o que esperar
            if replied && index + 1 < self.config.count {
                thread::sleep(self.config.interval);
            }
        }

        stats
    }

    fn probe_once(&mut self, buf: &mut [u8]) -> Result<Reply, ProbeError> {
        let pkt = EchoRequest::zeroed(self.config.ident, self.config.seq, self.config.payload_size)
            .to_bytes();

        let t0 = Instant::now();
        self.conn
            .set_deadline(t0 + self.config.timeout)
            .map_err(ProbeError::Send)?;
        self.conn.send(&pkt).map_err(ProbeError::Send)?;

        // A primeira leitura conta como resposta, sem conferir ident/seq
        let n = self.conn.recv(buf).map_err(ProbeError::Receive)?;
        let rtt = t0.elapsed();
        debug!(bytes = n, ?rtt, "datagrama recebido");

        let hdr = icmp::parse_reply(&buf[..n]).ok_or(ProbeError::ShortReply(n))?;
        Ok(Reply {
            source: hdr.source,
            ttl: hdr.ttl,
            payload_len: hdr.payload_len,
            rtt,
        })
    }
}
