//! Delimited text decoding.
//!
//! Turns the raw contents of a states or transitions file into rows of
//! cells. Fields may be quoted with `"`; a doubled `""` inside a quoted
//! field is a literal quote. Rows end at `\n`, `\r\n` or `\r`.

/// Decode delimited text into rows of cells.
///
/// A trailing line break does not produce an extra row.
pub fn decode(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            c if c == delimiter => {
                row.push(std::mem::take(&mut field));
                at_field_start = true;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                at_field_start = true;
            }
            c => {
                field.push(c);
                at_field_start = false;
            }
        }
    }

    if !field.is_empty() || !row.is_empty() || !at_field_start {
        row.push(field);
        rows.push(row);
    }
    rows
}
