//! SNTP (RFC 4330) client packet encoding

/// Standard NTP server port.
pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
const NTP_TO_UNIX_SECS: u64 = 2_208_988_800;

/// LI = 0, VN = 4, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0b00_100_011;
const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;
const TRANSMIT_TIMESTAMP: usize = 40;

/// A client request with every field but the header left zero.
pub fn request_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Extract the server transmit time as Unix seconds.
///
/// Returns `None` for short packets, non-server replies, kiss-of-death
/// (stratum 0) replies and zero timestamps.
pub fn parse_unix_seconds(reply: &[u8]) -> Option<u64> {
    if reply.len() < PACKET_LEN {
        return None;
    }
    let mode = reply[0] & 0b111;
    let stratum = reply[1];
    if !matches!(mode, MODE_SERVER | MODE_BROADCAST) || stratum == 0 {
        return None;
    }

    let seconds = u32::from_be_bytes([
        reply[TRANSMIT_TIMESTAMP],
        reply[TRANSMIT_TIMESTAMP + 1],
        reply[TRANSMIT_TIMESTAMP + 2],
        reply[TRANSMIT_TIMESTAMP + 3],
    ]);
    if seconds == 0 {
        return None;
    }
    // Era 1 starts in 2036; timestamps below the Unix epoch belong to it
    let ntp_seconds = if u64::from(seconds) < NTP_TO_UNIX_SECS {
        u64::from(seconds) + (1 << 32)
    } else {
        u64::from(seconds)
    };
    Some(ntp_seconds - NTP_TO_UNIX_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(mode: u8, stratum: u8, seconds: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = 0b00_100_000 | mode;
        packet[1] = stratum;
        packet[TRANSMIT_TIMESTAMP..TRANSMIT_TIMESTAMP + 4].copy_from_slice(&seconds.to_be_bytes());
        packet
    }

    #[test]
    fn test_request_packet_header() {
        let packet = request_packet();
        assert_eq!(packet[0] >> 6, 0);
        assert_eq!((packet[0] >> 3) & 0b111, 4);
        assert_eq!(packet[0] & 0b111, 3);
        assert!(packet[1..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_parse_server_reply() {
        // 2024-03-10T12:00:00Z
        let ntp = (1_710_072_000u64 + NTP_TO_UNIX_SECS) as u32;
        assert_eq!(
            parse_unix_seconds(&reply(MODE_SERVER, 2, ntp)),
            Some(1_710_072_000)
        );
    }

    #[test]
    fn test_parse_era_one() {
        // 2040-01-01T00:00:00Z wraps the 32-bit seconds field
        let unix = 2_208_988_800u64;
        let ntp = (unix + NTP_TO_UNIX_SECS - (1 << 32)) as u32;
        assert_eq!(parse_unix_seconds(&reply(MODE_SERVER, 1, ntp)), Some(unix));
    }

    #[test]
    fn test_rejects_bad_replies() {
        let ntp = (1_710_072_000u64 + NTP_TO_UNIX_SECS) as u32;
        assert_eq!(parse_unix_seconds(&reply(MODE_SERVER, 0, ntp)), None);
        assert_eq!(parse_unix_seconds(&reply(3, 2, ntp)), None);
        assert_eq!(parse_unix_seconds(&reply(MODE_SERVER, 2, 0)), None);
        assert_eq!(parse_unix_seconds(&reply(MODE_SERVER, 2, ntp)[..40]), None);
    }
}
