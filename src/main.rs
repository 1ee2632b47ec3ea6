// Tratamento de erros ergonômico
use anyhow::Result;

// Logs estruturados em stderr
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::net::Ipv4Addr;
use std::time::Duration;

// Módulos locais
mod args;
mod checksum;
mod icmp;
mod probe;
mod socket;

use args::PingArgs;
use probe::{ProbeConfig, ProbeResult, Prober, SessionStats};
use socket::IcmpSocket;

/// Envia `-n` Echo Requests ao destino e imprime as estatísticas.
/// Requer privilégio para abrir socket RAW (root ou CAP_NET_RAW).
fn main() -> Result<()> {
    init_logging();

    let args = args::parse();

    // Falha aqui encerra o processo antes de qualquer pedido
    let sock = open_target(&args)?;
    let peer = sock.peer();

    println!(
        "PING {} ({}): {} bytes de dados",
        args.target, peer, args.size
    );
    info!(%peer, timeout_ms = args.timeout, count = args.count, "iniciando sessão");

    let config = ProbeConfig::new(
        Duration::from_millis(args.timeout),
        args.size as usize,
        args.count,
    );
    let stats = Prober::new(sock, config).run(print_result);

    print_summary(peer, &stats);
    Ok(())
}

/// Resolve o destino e abre o socket RAW conectado a ele.
fn open_target(args: &PingArgs) -> Result<IcmpSocket> {
    let dst = args.target_addr()?;
    IcmpSocket::connect(dst)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Falhas já saem no log do laço
fn print_result(result: &ProbeResult) {
    if let Ok(reply) = &result.outcome {
        println!(
            "Resposta de {}: seq={} bytes={} tempo={} ms TTL={}",
            reply.source,
            result.index,
            reply.payload_len,
            fmt_ms(reply.rtt),
            reply.ttl
        );
    }
}

fn print_summary(peer: Ipv4Addr, stats: &SessionStats) {
    print!("{}", summary(peer, stats));
}

fn summary(peer: Ipv4Addr, stats: &SessionStats) -> String {
    format!(
        "\n--- estatísticas de ping para {} ---\n\
         {} pacotes transmitidos, {} recebidos, {} perdidos ({:.2}% de perda)\n\
         rtt mín/máx/média = {}/{}/{} ms\n",
        peer,
        stats.sent,
        stats.succeeded,
        stats.failed,
        stats.loss_percent(),
        fmt_ms(stats.min_rtt),
        fmt_ms(stats.max_rtt),
        fmt_ms(stats.avg_rtt())
    )
}

/// Milissegundos com três casas; o mínimo ainda sem resposta vira `-`.
fn fmt_ms(d: Duration) -> String {
    if d == Duration::MAX {
        return "-".to_string();
    }
    format!("{:.3}", d.as_secs_f64() * 1000.0)
}
