//! Comma-separated fields with optional double quotes.

/// Splits one line into trimmed fields.
///
/// A field wrapped in double quotes keeps commas and surrounding spaces;
/// the quotes themselves are dropped. Returns an empty list for a blank
/// line.
pub(crate) fn fields(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                field.push(c);
            }
            // skip to the separator
            for c in chars.by_ref() {
                if c == ',' {
                    break;
                }
            }
            out.push(field);
        } else {
            let mut ended = true;
            for c in chars.by_ref() {
                if c == ',' {
                    ended = false;
                    break;
                }
                field.push(c);
            }
            out.push(field.trim_end().to_string());
            if ended {
                break;
            }
            continue;
        }
        if chars.peek().is_none() {
            break;
        }
    }
    out
}

/// Parses a number field, accepting surrounding blanks.
pub(crate) fn number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Returns true for lines that carry no data.
pub(crate) fn is_skippable(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}
