//! Internet checksum (RFC 1071).

/// Computes the one's complement sum of `data` and returns its complement.
///
/// Words are formed as `data[i + 1] << 8 | data[i]`, so the result is meant to
/// be stored low byte first (see [`write_checksum`]). A trailing odd byte is
/// added on its own.
pub fn checksum(data: &[u8]) -> u16 {
    !fold(sum_words(data))
}

/// Returns true if `data` (checksum field included) sums to `0xFFFF`.
pub fn verify_checksum(data: &[u8]) -> bool {
    fold(sum_words(data)) == 0xFFFF
}

/// Stores `checksum` into bytes 2..4 of an ICMP header.
///
/// The bytes are XOR-ed in rather than assigned, which is the same thing on a
/// zeroed field and keeps re-keying an already checksummed buffer correct.
pub(crate) fn write_checksum(packet: &mut [u8], checksum: u16) {
    packet[2] ^= (checksum & 0xff) as u8;
    packet[3] ^= (checksum >> 8) as u8;
}

fn sum_words(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks
        .by_ref()
        .fold(0u32, |acc, w| acc.wrapping_add((u32::from(w[1]) << 8) | u32::from(w[0])));
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add(u32::from(*last));
    }
    sum
}

// Two rounds are enough to bring any 32-bit accumulator into 16 bits.
fn fold(sum: u32) -> u16 {
    let sum = (sum >> 16) + (sum & 0xffff);
    (sum + (sum >> 16)) as u16
}
