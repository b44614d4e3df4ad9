/// One captured line with its wall-clock arrival time.
pub struct Record {
    pub timestamp_ms: i64, // milliseconds since Unix epoch
    pub raw_line: String,  // decoded and trimmed sensor output
}

/// Delimiter the sensor firmware puts between label and payload.
pub const FIELD_DELIMITER: &str = ": ";

impl Record {
    pub fn new(timestamp_ms: i64, raw_line: String) -> Self {
        Record { timestamp_ms, raw_line }
    }

    /// Console echo, `"<timestamp>: <line>"`.
    pub fn console_line(&self) -> String {
        format!("{}: {}", self.timestamp_ms, self.raw_line)
    }

    /// CSV projection: the timestamp followed by the line split on every
    /// occurrence of the delimiter. The tail is variable-width; a payload
    /// containing the delimiter widens the row rather than being re-joined.
    pub fn csv_fields(&self) -> Vec<String> {
        let mut fields = vec![self.timestamp_ms.to_string()];
        fields.extend(self.raw_line.split(FIELD_DELIMITER).map(str::to_string));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_line_splits_into_fields() {
        let record = Record::new(1700000000123, "1234: TempSensor: 23.5".to_string());
        assert_eq!(
            record.csv_fields(),
            vec!["1700000000123", "1234", "TempSensor", "23.5"]
        );
    }

    #[test]
    fn test_line_without_delimiter_is_single_field() {
        let record = Record::new(42, "READY".to_string());
        assert_eq!(record.csv_fields(), vec!["42", "READY"]);
    }

    #[test]
    fn test_field_count_tracks_delimiter_occurrences() {
        let line = "a: b: c: d";
        let occurrences = line.matches(FIELD_DELIMITER).count();
        let record = Record::new(0, line.to_string());
        assert_eq!(record.csv_fields().len(), 1 + occurrences + 1);
    }

    #[test]
    fn test_colon_without_space_does_not_split() {
        let record = Record::new(7, "GPS,51.5:0.1".to_string());
        assert_eq!(record.csv_fields(), vec!["7", "GPS,51.5:0.1"]);
    }

    #[test]
    fn test_console_line_format() {
        let record = Record::new(99, "READY".to_string());
        assert_eq!(record.console_line(), "99: READY");
    }
}
