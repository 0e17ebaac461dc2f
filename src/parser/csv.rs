use tracing::debug;

use crate::error::FormatError;
use crate::model::Message;

/// Minimum columns per record: authorId, author, date, content.
const MIN_COLUMNS: usize = 4;

/// Parse a chat CSV export into message records, in input order.
///
/// Record ids are `msg-<index>` over the retained (non-blank) records of this
/// call only. Fails on the first record with fewer than four columns.
pub fn parse(text: &str) -> Result<Vec<Message>, FormatError> {
    let normalized = text.replace("\r\n", "\n");
    let records = split_records(&normalized);

    let messages = records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(records = messages.len(), "parsed CSV export");
    Ok(messages)
}

/// Split on newlines that sit outside quotes. Every `"` flips the quote state,
/// so an odd quote count before a newline keeps that newline in the record.
fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut inside_quotes = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '"' => inside_quotes = !inside_quotes,
            '\n' if !inside_quotes => {
                push_record(&mut records, &text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_record(&mut records, &text[start..]);

    records
}

fn push_record<'a>(records: &mut Vec<&'a str>, record: &'a str) {
    if !record.trim().is_empty() {
        records.push(record);
    }
}

/// Split one record on commas outside quotes. Quote characters are dropped,
/// except a doubled quote inside a quoted span, which is kept as `""` and
/// collapsed per column once the record is split.
fn split_fields(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut inside_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if inside_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push_str("\"\"");
            }
            '"' => inside_quotes = !inside_quotes,
            ',' if !inside_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}

fn parse_record(index: usize, record: &str) -> Result<Message, FormatError> {
    let fields = split_fields(record);
    if fields.len() < MIN_COLUMNS {
        return Err(FormatError {
            line: index + 1,
            raw: record.to_string(),
        });
    }

    let content = fields[MIN_COLUMNS - 1..].join(",");

    Ok(Message {
        id: format!("msg-{}", index),
        author_id: unescape(&fields[0]),
        author: unescape(fields[1].trim()),
        date: unescape(fields[2].trim()),
        content: clean_content(&content),
    })
}

fn unescape(field: &str) -> String {
    field.replace("\"\"", "\"")
}

fn clean_content(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unwrapped.replace("\"\"", "\"").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_record_per_line_in_order() {
        let csv = " 42,  alice ,2024-01-01T10:00:00, hello\n7,bob, 2024-01-02 ,world \n";
        let msgs = parse(csv).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].id, "msg-0");
        assert_eq!(msgs[1].id, "msg-1");
        assert_eq!(msgs[0].author_id, " 42");
        assert_eq!(msgs[0].author, "alice");
        assert_eq!(msgs[0].date, "2024-01-01T10:00:00");
        assert_eq!(msgs[0].content, "hello");
        assert_eq!(msgs[1].date, "2024-01-02");
        assert_eq!(msgs[1].content, "world");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = "\n1,a,d,x\n   \n\n2,b,d,y\n\n";
        let msgs = parse(csv).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].id, "msg-1");
        assert_eq!(msgs[1].content, "y");
    }

    #[test]
    fn quoted_content_with_commas_and_doubled_quotes() {
        let csv = "1,alice,2024-01-01,\"hi, \"\"there\"\"\"";
        let msgs = parse(csv).unwrap();
        assert_eq!(msgs[0].content, "hi, \"there\"");
    }

    #[test]
    fn unquoted_commas_rejoin_into_content() {
        let msgs = parse("1,a,d,one, two,three").unwrap();
        assert_eq!(msgs[0].content, "one, two,three");
    }

    #[test]
    fn newline_inside_quotes_stays_in_record() {
        let csv = "1,a,d,first\n2,b,d,\"multi\nline\"\n3,c,d,last";
        let msgs = parse(csv).unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].content, "multi\nline");
        assert_eq!(msgs[2].id, "msg-2");
        assert_eq!(msgs[2].content, "last");
    }

    #[test]
    fn unbalanced_quote_swallows_following_lines() {
        let csv = "1,a,d,\"open\n2,b,d,x";
        let msgs = parse(csv).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "open\n2,b,d,x");
    }

    #[test]
    fn crlf_is_normalized() {
        let msgs = parse("1,a,d,x\r\n2,b,d,\"y\r\nz\"\r\n").unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "x");
        assert_eq!(msgs[1].content, "y\nz");
    }

    #[test]
    fn short_record_reports_its_line() {
        let csv = "1,a,d,x\n2,b,d,y\n3,c\n4,d,d,z\n5,e,d,w";
        let err = parse(csv).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.raw, "3,c");
        assert_eq!(err.to_string(), "invalid CSV format at line 3: missing columns");
    }

    #[test]
    fn error_line_counts_retained_records() {
        let csv = "1,a,d,x\n\n\nbad,row\n";
        assert_eq!(parse(csv).unwrap_err().line, 2);
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n \r\n").unwrap().is_empty());
    }

    #[test]
    fn doubled_quotes_collapse_in_every_column() {
        let msgs = parse("\"7\"\"\",\"The \"\"Boss\"\"\",\"2024-01-01\",x").unwrap();
        assert_eq!(msgs[0].author_id, "7\"");
        assert_eq!(msgs[0].author, "The \"Boss\"");
        assert_eq!(msgs[0].date, "2024-01-01");
        assert_eq!(msgs[0].content, "x");
    }
}
