use std::net::Ipv4Addr;

use crate::checksum::checksum;

/// Tipo ICMP de Echo Request.
pub const ECHO_REQUEST: u8 = 8;

/// Cabeçalho ICMP de Echo: type, code, checksum, identifier, sequence.
pub const ICMP_HEADER_LEN: usize = 8;

/// Cabeçalho IPv4 sem opções.
pub const IPV4_HEADER_LEN: usize = 20;

/// Maior payload que cabe num datagrama IPv4 (65535 - 20 - 8).
pub const MAX_PAYLOAD: usize = 65535 - IPV4_HEADER_LEN - ICMP_HEADER_LEN;

/// Um Echo Request (type=8, code=0) antes da serialização.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    pub ident: u16,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl EchoRequest {
    /// Echo Request com payload zerado de `size` bytes.
    pub fn zeroed(ident: u16, seq: u16, size: usize) -> Self {
        Self {
            ident,
            seq,
            payload: vec![0; size],
        }
    }

    /// Serializa cabeçalho + payload e grava o checksum nos bytes 2..4.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pkt = vec![0u8; ICMP_HEADER_LEN + self.payload.len()];
        pkt[0] = ECHO_REQUEST;
        // pkt[1] (code) e pkt[2..4] (checksum) ficam zerados para a soma
        pkt[4..6].copy_from_slice(&self.ident.to_be_bytes());
        pkt[6..8].copy_from_slice(&self.seq.to_be_bytes());
        pkt[ICMP_HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = checksum(&pkt);
        pkt[2..4].copy_from_slice(&csum.to_be_bytes());
        pkt
    }
}

/// Campos lidos de uma resposta crua (cabeçalho IPv4 + ICMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub source: Ipv4Addr,
    pub ttl: u8,
    /// Bytes lidos menos 28 (IPv4 sem opções + cabeçalho ICMP).
    pub payload_len: usize,
}

/// Extrai TTL (byte 8) e origem (bytes 12..16) do cabeçalho IPv4 que o SO
/// entrega na frente do ICMP. Devolve `None` se não houver cabeçalho IPv4
/// completo.
///
/// Não confere type, identifier nem sequence da resposta.
pub fn parse_reply(buf: &[u8]) -> Option<ReplyHeader> {
    if buf.len() < IPV4_HEADER_LEN {
        return None;
    }
    Some(ReplyHeader {
        source: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
        ttl: buf[8],
        payload_len: buf.len().saturating_sub(IPV4_HEADER_LEN + ICMP_HEADER_LEN),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let pkt = EchoRequest::zeroed(0xABCD, 0x0102, 32).to_bytes();
        assert_eq!(pkt.len(), ICMP_HEADER_LEN + 32);
        assert_eq!(pkt[0], 8);
        assert_eq!(pkt[1], 0);
        assert_eq!(&pkt[4..6], &[0xAB, 0xCD]);
        assert_eq!(&pkt[6..8], &[0x01, 0x02]);
        assert!(pkt[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn checksum_matches_zeroed_field() {
        let pkt = EchoRequest::zeroed(1, 1, 32).to_bytes();
        let mut zeroed = pkt.clone();
        zeroed[2] = 0;
        zeroed[3] = 0;
        assert_eq!(u16::from_be_bytes([pkt[2], pkt[3]]), checksum(&zeroed));
        assert_eq!(checksum(&pkt), 0);
    }

    #[test]
    fn known_checksum_value() {
        // 0x0800 + 0x0001 + 0x0001 = 0x0802 -> !0x0802
        let pkt = EchoRequest::zeroed(1, 1, 0).to_bytes();
        assert_eq!(pkt, vec![8, 0, 0xF7, 0xFD, 0, 1, 0, 1]);
    }

    #[test]
    fn odd_payload_verifies() {
        let pkt = EchoRequest {
            ident: 7,
            seq: 9,
            payload: b"abc".to_vec(),
        }
        .to_bytes();
        assert_eq!(pkt.len(), 11);
        assert_eq!(checksum(&pkt), 0);
    }

    fn reply(payload: usize) -> Vec<u8> {
        let mut buf = vec![0u8; IPV4_HEADER_LEN + ICMP_HEADER_LEN + payload];
        buf[0] = 0x45;
        buf[8] = 64;
        buf[12..16].copy_from_slice(&[127, 0, 0, 1]);
        buf
    }

    #[test]
    fn parses_ttl_and_source() {
        let hdr = parse_reply(&reply(32)).unwrap();
        assert_eq!(hdr.source, Ipv4Addr::LOCALHOST);
        assert_eq!(hdr.ttl, 64);
        assert_eq!(hdr.payload_len, 32);
    }

    #[test]
    fn short_reads() {
        assert_eq!(parse_reply(&[0u8; 19]), None);
        // Cabeçalho IPv4 sem ICMP completo: payload não fica negativo
        assert_eq!(parse_reply(&reply(0)[..24]).unwrap().payload_len, 0);
    }
}
