//! Interchange formats
//!
//! Plain-text tag lists and the two-column translation CSV
//! (`English Tag`, `日本語説明`) exchanged with spreadsheet tools.

use thiserror::Error;
use tracing::debug;

use crate::dictionary::Dictionary;

pub const COLUMN_ENGLISH: &str = "English Tag";
pub const COLUMN_JAPANESE: &str = "日本語説明";

/// Byte order mark so spreadsheet tools detect UTF-8
const BOM: char = '\u{feff}';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterchangeError {
    #[error("CSV is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("CSV has an unterminated quoted field starting on line {0}")]
    UnterminatedQuote(usize),
    #[error("CSV is empty")]
    Empty,
}

impl serde::Serialize for InterchangeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Split raw tag text on commas and newlines, trimming and dropping empties
pub fn parse_tag_list(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every tag as an `English Tag,日本語説明` row, in store order
pub fn export_pairs_csv(dictionary: &Dictionary) -> String {
    let mut out = String::new();
    out.push(BOM);
    push_record(&mut out, COLUMN_ENGLISH, COLUMN_JAPANESE);
    for (en, ja) in dictionary.all_pairs() {
        push_record(&mut out, en, ja);
    }
    out
}

/// Parse translated pairs. Column order is free; other columns are ignored.
pub fn parse_pairs_csv(text: &str) -> Result<Vec<(String, String)>, InterchangeError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut records = parse_records(text)?.into_iter();

    let header = records.next().ok_or(InterchangeError::Empty)?;
    let column = |name: &'static str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(InterchangeError::MissingColumn(name))
    };
    let en_index = column(COLUMN_ENGLISH)?;
    let ja_index = column(COLUMN_JAPANESE)?;

    let pairs: Vec<(String, String)> = records
        .filter_map(|record| {
            let en = record.get(en_index)?.trim();
            if en.is_empty() {
                return None;
            }
            let ja = record.get(ja_index).map(|s| s.trim()).unwrap_or_default();
            Some((en.to_string(), ja.to_string()))
        })
        .collect();

    debug!(rows = pairs.len(), "Translation CSV parsed");
    Ok(pairs)
}

/// English names of untranslated tags, one per line
pub fn render_untranslated(dictionary: &Dictionary) -> String {
    dictionary
        .untranslated()
        .iter()
        .map(|t| t.en.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_record(out: &mut String, en: &str, ja: &str) {
    push_field(out, en);
    out.push(',');
    push_field(out, ja);
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// RFC 4180 records; accepts `\n` or `\r\n` line endings
fn parse_records(text: &str) -> Result<Vec<Vec<String>>, InterchangeError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                finish_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(InterchangeError::UnterminatedQuote(quote_line));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        finish_record(&mut records, record);
    }
    Ok(records)
}

/// Blank lines carry no record
fn finish_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.len() == 1 && record[0].is_empty() {
        return;
    }
    records.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::fixture;

    #[test]
    fn test_parse_tag_list() {
        let tags = parse_tag_list("1girl, blue hair\n\n smile ,,\r\nlooking at viewer");
        assert_eq!(tags, vec!["1girl", "blue hair", "smile", "looking at viewer"]);
        assert!(parse_tag_list(" , \n").is_empty());
    }

    #[test]
    fn test_export_pairs_csv() {
        let mut dict = fixture();
        dict.add_or_update("pose", "hands, up", "手を\"上げる\"").unwrap();

        let csv = export_pairs_csv(&dict);
        assert!(csv.starts_with("\u{feff}English Tag,日本語説明\n1girl,少女一人\n"));
        assert!(csv.ends_with("\"hands, up\",\"手を\"\"上げる\"\"\"\n"));
        assert_eq!(csv.lines().count(), dict.tag_count() + 1);
    }

    #[test]
    fn test_exported_csv_parses_back() {
        let mut dict = fixture();
        dict.add_or_update("pose", "hands, up", "手を\"上げる\"\n両手").unwrap();

        let pairs = parse_pairs_csv(&export_pairs_csv(&dict)).unwrap();
        assert_eq!(pairs.len(), dict.tag_count());
        assert_eq!(
            pairs.last().unwrap(),
            &("hands, up".to_string(), "手を\"上げる\"\n両手".to_string())
        );
    }

    #[test]
    fn test_parse_pairs_csv_column_order_and_extras() {
        let text = "id,日本語説明,English Tag\r\n1, 笑顔 ,smile\r\n2,,frown\r\n\r\n3,空,\r\n";
        let pairs = parse_pairs_csv(text).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("smile".to_string(), "笑顔".to_string()),
                ("frown".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_pairs_csv_short_rows() {
        let pairs = parse_pairs_csv("English Tag,日本語説明\nsmile").unwrap();
        assert_eq!(pairs, vec![("smile".to_string(), String::new())]);
    }

    #[test]
    fn test_parse_pairs_csv_errors() {
        assert_eq!(
            parse_pairs_csv("English Tag,Japanese\nsmile,笑顔"),
            Err(InterchangeError::MissingColumn(COLUMN_JAPANESE))
        );
        assert_eq!(parse_pairs_csv(""), Err(InterchangeError::Empty));
        assert_eq!(
            parse_pairs_csv("English Tag,日本語説明\n\"smile,笑顔\n"),
            Err(InterchangeError::UnterminatedQuote(2))
        );
    }

    #[test]
    fn test_render_untranslated() {
        let mut dict = fixture();
        assert_eq!(render_untranslated(&dict), "");
        dict.add_or_update("pose", "standing", "").unwrap();
        dict.add_or_update("pose", "sitting", "説明なし").unwrap();
        assert_eq!(render_untranslated(&dict), "standing\nsitting");
    }
}
