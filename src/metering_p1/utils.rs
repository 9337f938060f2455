use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref CRC_PATTERN: Regex = Regex::new(r"^[0-9A-Z]{4}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentification {
    pub manufacturer: String,
    /// The fifth header character is the baud rate / protocol marker (`5` for DSMR 4+)
    pub protocol_marker: Option<char>,
    pub identification: String,
}

/// Parses the CRC trailer text. Anything but four characters of `[0-9A-Z]` that also form a
/// hex number is rejected.
pub fn parse_crc_text(text: &str) -> Option<u16> {
    if !CRC_PATTERN.is_match(text) {
        return None;
    }
    return u16::from_str_radix(text, 16).ok();
}

pub fn parse_identification_line(header: &str) -> Option<DeviceIdentification> {
    // Example formats:
    // ISk5\2MT382-1000
    // FLU5\253769484_A
    // KFM5KAIFA-METER
    let header = header.strip_prefix('/').unwrap_or(header).trim();

    if header.len() < 3 || !header.is_char_boundary(3) {
        return None;
    }

    let manufacturer = header[..3].to_uppercase();
    let protocol_marker = header[3..].chars().next();
    let identification = header[3..]
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches('\\')
        .to_string();

    debug!("Parsed identification - Manufacturer: {}, ID: {}", manufacturer, identification);

    Some(DeviceIdentification {
        manufacturer,
        protocol_marker,
        identification,
    })
}

pub fn extract_numeric_value(value_str: &str) -> Option<f64> {
    // "000123.456" or "123.456*kWh"
    let cleaned = value_str
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect::<String>();

    cleaned.parse::<f64>().ok()
}

pub fn extract_unit(value_str: &str) -> Option<String> {
    let star_pos = value_str.rfind('*')?;
    let unit = value_str[star_pos + 1..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '/')
        .collect::<String>();
    if unit.is_empty() {
        None
    } else {
        Some(unit)
    }
}

/// DSMR timestamps are `YYMMDDhhmmssX` in local time where `X` is `S` (summer) or `W` (winter).
/// Returns the local time and whether daylight saving time was active.
pub fn parse_timestamp(value_str: &str) -> Option<(NaiveDateTime, bool)> {
    if value_str.len() != 13 || !value_str.is_char_boundary(12) {
        return None;
    }
    let (digits, dst_flag) = value_str.split_at(12);
    let summer = match dst_flag {
        "S" => true,
        "W" => false,
        _ => return None,
    };
    let ts = NaiveDateTime::parse_from_str(digits, "%y%m%d%H%M%S").ok()?;
    Some((ts, summer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_crc_text() {
        assert_eq!(parse_crc_text("7399"), Some(0x7399));
        assert_eq!(parse_crc_text("C7C1"), Some(0xC7C1));
        assert_eq!(parse_crc_text("c7c1"), None);
        assert_eq!(parse_crc_text("C7C"), None);
        assert_eq!(parse_crc_text("C7C1 "), None);
        assert_eq!(parse_crc_text("ZZZZ"), None);
        assert_eq!(parse_crc_text(""), None);
    }

    #[test]
    fn test_parse_identification_line() {
        let id = parse_identification_line("ISk5\\2MT382-1000").unwrap();
        assert_eq!(id.manufacturer, "ISK");
        assert_eq!(id.protocol_marker, Some('5'));
        assert_eq!(id.identification, "2MT382-1000");

        let id = parse_identification_line("/FLU5\\253769484_A").unwrap();
        assert_eq!(id.manufacturer, "FLU");
        assert_eq!(id.identification, "253769484_A");

        assert!(parse_identification_line("AB").is_none());
    }

    #[test]
    fn test_extract_numeric_value() {
        assert_eq!(extract_numeric_value("000123.456"), Some(123.456));
        assert_eq!(extract_numeric_value("123.456*kWh"), Some(123.456));
        assert_eq!(extract_numeric_value("-12.34"), Some(-12.34));
        assert_eq!(extract_numeric_value("abc"), None);
    }

    #[test]
    fn test_extract_unit() {
        assert_eq!(extract_unit("123.456*kWh"), Some("kWh".to_string()));
        assert_eq!(extract_unit("00112.384*m3"), Some("m3".to_string()));
        assert_eq!(extract_unit("0000000240*s"), Some("s".to_string()));
        assert_eq!(extract_unit("123.456"), None);
        assert_eq!(extract_unit("123*"), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let (ts, summer) = parse_timestamp("200512135409S").unwrap();
        assert!(summer);
        assert_eq!(ts.year(), 2020);
        assert_eq!(ts.month(), 5);
        assert_eq!(ts.day(), 12);
        assert_eq!(ts.hour(), 13);
        assert_eq!(ts.second(), 9);

        let (_, summer) = parse_timestamp("101209113020W").unwrap();
        assert!(!summer);

        assert!(parse_timestamp("101209113020X").is_none());
        assert!(parse_timestamp("1012091130W").is_none());
    }
}
