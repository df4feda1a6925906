//! Gauge readings for playback, parsed from a local export of the station
//! table. Fetching the table is left to the caller.
//!
//! Column detection: the first header containing `datum` holds timestamps and
//! the first header containing `cm` holds the level (both case-insensitive).
//! Timestamps are day-first. Fields may be double-quoted, so a quoted
//! decimal comma survives a comma delimiter. Rows that fail to parse or whose
//! field count differs from the header's are dropped and the rest sorted by
//! time.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GaugeError;
use crate::risk::RiskClass;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeReading {
    pub time: NaiveDateTime,
    pub level_cm: f64,
}

impl GaugeReading {
    pub fn risk(&self) -> RiskClass {
        RiskClass::classify(self.level_cm)
    }
}

/// Time-ordered, non-empty gauge readings.
#[derive(Debug, Clone)]
pub struct GaugeSeries {
    readings: Vec<GaugeReading>,
}

const DATETIME_FORMATS: [&str; 6] = [
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];
const DATE_FORMATS: [&str; 3] = ["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y"];

impl GaugeSeries {
    /// Sort and wrap readings; an empty list is an error.
    pub fn new(mut readings: Vec<GaugeReading>) -> Result<Self, GaugeError> {
        if readings.is_empty() {
            return Err(GaugeError::NoReadings);
        }
        readings.sort_by_key(|r| r.time);
        Ok(Self { readings })
    }

    pub fn load(path: &Path) -> Result<Self, GaugeError> {
        let text = fs::read_to_string(path).map_err(|source| GaugeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let series = Self::parse_table(&text)?;
        info!(
            path = %path.display(),
            readings = series.len(),
            first = %series.first().time,
            last = %series.latest().time,
            "loaded gauge series"
        );
        Ok(series)
    }

    /// Parse a delimited table (`,`, `;` or tab) with a header row.
    pub fn parse_table(text: &str) -> Result<Self, GaugeError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or(GaugeError::MissingHeader)?;
        let delimiter = detect_delimiter(header);
        let columns: Vec<String> = split_row(header, delimiter)
            .into_iter()
            .map(|c| c.trim().trim_matches('"').to_string())
            .collect();

        let time_col = columns
            .iter()
            .position(|c| c.to_lowercase().contains("datum"))
            .ok_or(GaugeError::MissingColumn("datum"))?;
        let level_col = columns
            .iter()
            .position(|c| c.to_lowercase().contains("cm"))
            .ok_or(GaugeError::MissingColumn("cm"))?;

        let mut readings = Vec::new();
        let mut dropped = 0usize;
        let mut misaligned = 0usize;
        for line in lines {
            let fields = split_row(line, delimiter);
            if fields.len() != columns.len() {
                misaligned += 1;
                continue;
            }
            let time = fields.get(time_col).and_then(|f| parse_timestamp(f));
            let level = fields.get(level_col).and_then(|f| parse_level(f));
            match (time, level) {
                (Some(time), Some(level_cm)) => readings.push(GaugeReading { time, level_cm }),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "skipped gauge rows with unreadable timestamp or level");
        }
        if misaligned > 0 {
            warn!(misaligned, columns = columns.len(), "skipped gauge rows with a different field count than the header");
        }
        Self::new(readings)
    }

    pub fn readings(&self) -> &[GaugeReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn first(&self) -> &GaugeReading {
        &self.readings[0]
    }

    /// Most recent reading; the default playback position.
    pub fn latest(&self) -> &GaugeReading {
        &self.readings[self.readings.len() - 1]
    }

    /// Reading at playback position `index` (0 = oldest).
    pub fn at(&self, index: usize) -> Result<&GaugeReading, GaugeError> {
        self.readings
            .get(index)
            .ok_or(GaugeError::IndexOutOfRange { index, len: self.readings.len() })
    }

    /// Latest reading taken at or before `time`.
    pub fn at_or_before(&self, time: NaiveDateTime) -> Option<&GaugeReading> {
        let idx = self.readings.partition_point(|r| r.time <= time);
        idx.checked_sub(1).map(|i| &self.readings[i])
    }
}

fn detect_delimiter(header: &str) -> char {
    [';', '\t', ',']
        .into_iter()
        .max_by_key(|&d| header.matches(d).count())
        .filter(|&d| header.contains(d))
        .unwrap_or(',')
}

/// Split on `delimiter` outside double quotes. Quotes stay in the fields and
/// are trimmed by the field parsers.
fn split_row(line: &str, delimiter: char) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, ch) in line.char_indices() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == delimiter && !quoted {
            fields.push(&line[start..i]);
            start = i + ch.len_utf8();
        }
    }
    fields.push(&line[start..]);
    fields
}

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    let field = field.trim().trim_matches('"');
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(field, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(field, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_level(field: &str) -> Option<f64> {
    let cleaned = field.trim().trim_matches('"').replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
Datum;Vodostaj (cm);Pretok (m3/s)
03.02.2026 12:00;412;1,5
01.02.2026 12:00;398,5;1,2
02.02.2026 12:00;n/a;1,3
02.02.2026 18:30;405;1,4
garbage;400;1,0
";

    #[test]
    fn parses_sorts_and_drops_bad_rows() {
        let series = GaugeSeries::parse_table(TABLE).unwrap();
        assert_eq!(series.len(), 3);
        let levels: Vec<f64> = series.readings().iter().map(|r| r.level_cm).collect();
        assert_eq!(levels, vec![398.5, 405.0, 412.0]);
        assert_eq!(series.latest().level_cm, 412.0);
        assert_eq!(series.first().time.to_string(), "2026-02-01 12:00:00");
    }

    #[test]
    fn quoted_decimal_comma_survives_comma_delimiter() {
        let text = "Datum,Vodostaj (cm)\n\
01.02.2026 12:00,\"398,5\"\n\
02.02.2026 12:00,401,5\n\
03.02.2026 12:00,\"412\"\n";
        let series = GaugeSeries::parse_table(text).unwrap();
        let levels: Vec<f64> = series.readings().iter().map(|r| r.level_cm).collect();
        // The unquoted "401,5" splits into three fields and is dropped, not truncated.
        assert_eq!(levels, vec![398.5, 412.0]);
    }

    #[test]
    fn split_row_respects_quotes() {
        assert_eq!(split_row("a,\"b,c\",d", ','), vec!["a", "\"b,c\"", "d"]);
        assert_eq!(split_row("a;b,c;", ';'), vec!["a", "b,c", ""]);
    }

    #[test]
    fn column_detection_is_case_insensitive() {
        let text = "ura,DATUM,Nivo CM\nx,05/01/2026 08:15,300\n";
        let series = GaugeSeries::parse_table(text).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest().level_cm, 300.0);
    }

    #[test]
    fn missing_level_column_is_an_error() {
        let err = GaugeSeries::parse_table("Datum;Pretok\n01.01.2026;1\n").unwrap_err();
        assert!(matches!(err, GaugeError::MissingColumn("cm")));
    }

    #[test]
    fn all_rows_bad_is_an_error() {
        let err = GaugeSeries::parse_table("Datum;cm\nfoo;bar\n").unwrap_err();
        assert!(matches!(err, GaugeError::NoReadings));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(GaugeSeries::parse_table("\n\n"), Err(GaugeError::MissingHeader)));
    }

    #[test]
    fn playback_index_and_time_lookup() {
        let series = GaugeSeries::parse_table(TABLE).unwrap();
        assert_eq!(series.at(1).unwrap().level_cm, 405.0);
        assert!(matches!(series.at(3), Err(GaugeError::IndexOutOfRange { index: 3, len: 3 })));

        let t = NaiveDateTime::parse_from_str("02.02.2026 20:00", "%d.%m.%Y %H:%M").unwrap();
        assert_eq!(series.at_or_before(t).unwrap().level_cm, 405.0);
        let early = NaiveDateTime::parse_from_str("01.01.2020 00:00", "%d.%m.%Y %H:%M").unwrap();
        assert!(series.at_or_before(early).is_none());
    }

    #[test]
    fn readings_carry_risk() {
        let series = GaugeSeries::parse_table(TABLE).unwrap();
        assert_eq!(series.latest().risk(), RiskClass::Elevated);
    }
}
