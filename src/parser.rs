// src/parser.rs
//! Decoder for the device line protocol:
//! `bootTime,v0,..,v10,[ledIndex],intensity;`

use crate::types::{Reading, CHANNEL_COUNT};

/// Marker the firmware appends to every line.
pub const LINE_TERMINATOR: char = ';';

const MIN_FIELDS: usize = CHANNEL_COUNT + 3;

/// Parses one raw device line. Malformed lines yield `None`.
pub fn parse_line(line: &str) -> Option<Reading> {
    let clean = line.trim();
    let clean = clean.strip_suffix(LINE_TERMINATOR).unwrap_or(clean);
    let fields: Vec<&str> = clean.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let mut readings = [0i64; CHANNEL_COUNT];
    for (slot, field) in readings.iter_mut().zip(&fields[1..=CHANNEL_COUNT]) {
        *slot = field.trim().parse().ok()?;
    }

    let led_field = fields[CHANNEL_COUNT + 1].trim();
    let led_field = led_field.strip_prefix('[').unwrap_or(led_field);
    let led_field = led_field.strip_suffix(']').unwrap_or(led_field);
    let led_index = led_field.trim().parse().ok()?;
    let intensity = fields[CHANNEL_COUNT + 2].trim().parse().ok()?;

    Some(Reading {
        boot_time: fields[0].to_string(),
        readings,
        led_index,
        intensity,
        raw: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "00-00-04.094,0,0,0,1,0,0,0,0,0,1,167,[0],1000;";

    #[test]
    fn parses_reference_line() {
        let reading = parse_line(SAMPLE).unwrap();
        assert_eq!(reading.boot_time, "00-00-04.094");
        assert_eq!(reading.readings, [0, 0, 0, 1, 0, 0, 0, 0, 0, 1, 167]);
        assert_eq!(reading.led_index, 0);
        assert_eq!(reading.intensity, 1000);
        assert_eq!(reading.raw, SAMPLE);
    }

    #[test]
    fn rejects_garbage_and_short_lines() {
        assert!(parse_line("garbage").is_none());
        assert!(parse_line("").is_none());
        // 13 fields
        assert!(parse_line("00-00-04.094,0,0,0,1,0,0,0,0,0,1,167,[0];").is_none());
    }

    #[test]
    fn rejects_non_numeric_channel() {
        assert!(parse_line("00-00-04.094,0,0,x,1,0,0,0,0,0,1,167,[0],1000;").is_none());
        assert!(parse_line("00-00-04.094,0,0,0,1,0,0,0,0,0,1,167,[a],1000;").is_none());
        assert!(parse_line("00-00-04.094,0,0,0,1,0,0,0,0,0,1,167,[0],-5;").is_none());
    }

    #[test]
    fn accepts_extra_fields_and_missing_terminator() {
        let reading = parse_line("t0,1,2,3,4,5,6,7,8,9,10,11,12,13,99\r\n").unwrap();
        assert_eq!(reading.readings, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(reading.led_index, 12);
        assert_eq!(reading.intensity, 13);
    }

    #[test]
    fn every_short_prefix_is_rejected() {
        let fields: Vec<&str> = SAMPLE.trim_end_matches(';').split(',').collect();
        for n in 1..MIN_FIELDS {
            let line = fields[..n].join(",");
            assert!(parse_line(&line).is_none(), "{n} fields should be rejected");
        }
    }
}
