/// Checksum da Internet (RFC 1071) usado no cabeçalho ICMP.
///
/// Soma palavras de 16 bits big-endian em complemento de um. Um byte final
/// ímpar entra como byte alto de uma palavra virtual com byte baixo zero.
pub fn checksum(mut data: &[u8]) -> u16 {
    !fold(sum_words(&mut data))
}

/// Soma as palavras e devolve o acumulador de 32 bits sem dobrar os carries.
fn sum_words(data: &mut &[u8]) -> u32 {
    let mut sum: u32 = 0;
    while data.len() >= 2 {
        sum = sum.wrapping_add(u16::from_be_bytes([data[0], data[1]]) as u32);
        *data = &data[2..];
    }
    if let Some(&last) = data.first() {
        sum = sum.wrapping_add((last as u32) << 8);
    }
    sum
}

/// Dobra os carries (bits 16+) de volta nos 16 bits baixos.
fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}
