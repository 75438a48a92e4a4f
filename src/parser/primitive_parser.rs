use nom::bytes::complete::take;
use nom::combinator::map;
use nom::number::complete::{
    be_f32, be_f64, be_i16, be_i32, be_i64, be_u16, be_u24, be_u32, be_u64, le_u8,
};
use nom::{IResult, Parser};

// Big-endian primitives cover the PSARC table of contents; the little-endian
// side of the SNG payload uses `nom::number::complete::le_*` directly.

/// Parse unsigned byte
pub fn parse_u8(i: &[u8]) -> IResult<&[u8], u8> {
    le_u8(i)
}

/// Parse big-endian unsigned short
pub fn parse_be_u16(i: &[u8]) -> IResult<&[u8], u16> {
    be_u16(i)
}

/// Parse big-endian unsigned 24-bit integer
pub fn parse_be_u24(i: &[u8]) -> IResult<&[u8], u32> {
    be_u24(i)
}

/// Parse big-endian unsigned 32
pub fn parse_be_u32(i: &[u8]) -> IResult<&[u8], u32> {
    be_u32(i)
}

/// Parse big-endian unsigned 40-bit integer, most significant byte first.
pub fn parse_be_u40(i: &[u8]) -> IResult<&[u8], u64> {
    map(take(5usize), |bytes: &[u8]| {
        bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    })
    .parse(i)
}

/// Parse big-endian unsigned 64
pub fn parse_be_u64(i: &[u8]) -> IResult<&[u8], u64> {
    be_u64(i)
}

/// Parse big-endian signed short
pub fn parse_be_i16(i: &[u8]) -> IResult<&[u8], i16> {
    be_i16(i)
}

/// Parse big-endian signed 32
pub fn parse_be_i32(i: &[u8]) -> IResult<&[u8], i32> {
    be_i32(i)
}

/// Parse big-endian signed 64
pub fn parse_be_i64(i: &[u8]) -> IResult<&[u8], i64> {
    be_i64(i)
}

/// Parse big-endian float
pub fn parse_be_f32(i: &[u8]) -> IResult<&[u8], f32> {
    be_f32(i)
}

/// Parse big-endian double
pub fn parse_be_f64(i: &[u8]) -> IResult<&[u8], f64> {
    be_f64(i)
}

/// Parse a fixed-size byte run
pub fn parse_bytes(len: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], &[u8]> {
    move |i| take(len)(i)
}

/// Skip `n` bytes.
pub fn skip(i: &[u8], n: usize) -> &[u8] {
    if i.len() <= n {
        return &i[i.len()..];
    }
    &i[n..]
}

/// Parse a fixed-length null-padded ASCII string field, decoding up to the
/// first null byte.
pub fn parse_fixed_string(len: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], String> {
    move |i: &[u8]| {
        let (rest, field) = take(len)(i)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok((rest, String::from_utf8_lossy(&field[..end]).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // in-test encoder for round-trip checks
    fn encode_be(value: u64, width: usize) -> Vec<u8> {
        (0..width)
            .rev()
            .map(|shift| ((value >> (shift * 8)) & 0xFF) as u8)
            .collect()
    }

    #[test]
    fn test_be_round_trips() {
        let data = encode_be(0xABCD, 2);
        assert_eq!(parse_be_u16(&data).unwrap().1, 0xABCD);

        let data = encode_be(0x01_02_03, 3);
        assert_eq!(parse_be_u24(&data).unwrap().1, 0x01_02_03);

        let data = encode_be(0xDEAD_BEEF, 4);
        assert_eq!(parse_be_u32(&data).unwrap().1, 0xDEAD_BEEF);

        let data = encode_be(0x12_3456_789A, 5);
        assert_eq!(parse_be_u40(&data).unwrap().1, 0x12_3456_789A);

        let data = encode_be(0x0102_0304_0506_0708, 8);
        assert_eq!(parse_be_u64(&data).unwrap().1, 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_be_u40_msb_first() {
        let data = [0xFF, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(parse_be_u40(&data).unwrap().1, 0xFF_0000_0001);
    }

    #[test]
    fn test_eof_mid_read() {
        let data = [0x01, 0x02, 0x03];
        assert!(parse_be_u32(&data).is_err());
        assert!(parse_be_u40(&data).is_err());
    }

    #[test]
    fn test_skip_advances() {
        let data = [0u8; 10];
        let rest = skip(&data, 4);
        assert_eq!(rest.len(), 6);
        let rest = skip(rest, 100);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_fixed_string_stops_at_null() {
        let data = b"Lead\0\0\0\0rest";
        let (rest, s) = parse_fixed_string(8)(data).unwrap();
        assert_eq!(s, "Lead");
        assert_eq!(rest, b"rest");
    }
}
