/// Splits raw post text into its first line (without the line break) and
/// everything after it.
pub fn split_leading_line(raw: &str) -> (&str, &str) {
    match raw.find('\n') {
        Some(pos) => (&raw[..pos], &raw[pos + 1..]),
        None => (raw, ""),
    }
}

/// Escapes every `_` that could open or close emphasis, leaving code, math,
/// inline HTML and autolink literals untouched.
pub fn escape_underscores(md_text: &str) -> String {
    let mut res = String::with_capacity(md_text.len());
    let mut fence: Option<(char, usize)> = None;
    let mut prev_blank = true;
    let mut in_indented_code = false;

    for line in md_text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let blank = trimmed.trim_end().is_empty();

        if let Some((marker, len)) = fence {
            res.push_str(line);
            if is_closing_fence(trimmed, marker, len) {
                fence = None;
            }
            prev_blank = blank;
            continue;
        }

        if let Some(opening) = opening_fence(trimmed) {
            fence = Some(opening);
            res.push_str(line);
            prev_blank = blank;
            continue;
        }

        let indented = line.starts_with("    ") || line.starts_with('\t');
        in_indented_code = indented && !blank && (prev_blank || in_indented_code);
        if in_indented_code {
            res.push_str(line);
        } else {
            escape_inline(line, &mut res);
        }
        prev_blank = blank;
    }

    res
}

fn opening_fence(trimmed: &str) -> Option<(char, usize)> {
    let marker = trimmed.chars().next()?;
    let min_len = match marker {
        '`' | '~' => 3,
        '$' => 2,
        _ => return None,
    };

    let len = trimmed.chars().take_while(|&c| c == marker).count();
    if len < min_len {
        return None;
    }

    // The info string of a backtick or dollar fence cannot repeat the marker
    let info = &trimmed[len..];
    if marker != '~' && info.contains(marker) {
        return None;
    }

    Some((marker, len))
}

fn is_closing_fence(trimmed: &str, marker: char, len: usize) -> bool {
    let trimmed = trimmed.trim_end();
    trimmed.len() >= len && trimmed.chars().all(|c| c == marker)
}

fn escape_inline(line: &str, res: &mut String) {
    let line_start = res.len();
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        let at_boundary = res.len() == line_start
            || res.ends_with(|x: char| x.is_whitespace() || matches!(x, '*' | '_' | '~' | '('));
        if at_boundary {
            if let Some(len) = autolink_len(rest) {
                res.push_str(&rest[..len]);
                rest = &rest[len..];
                continue;
            }
        }

        match c {
            '\\' => {
                let len: usize = rest.chars().take(2).map(char::len_utf8).sum();
                res.push_str(&rest[..len]);
                rest = &rest[len..];
            }
            '`' | '$' => {
                let run = rest.chars().take_while(|&x| x == c).count();
                match find_run(&rest[run..], c, run) {
                    Some(end) => {
                        let span = run + end + run;
                        res.push_str(&rest[..span]);
                        rest = &rest[span..];
                    }
                    None => {
                        res.push_str(&rest[..run]);
                        rest = &rest[run..];
                    }
                }
            }
            '<' => {
                let is_tag = rest[1..].starts_with(|x: char| x.is_ascii_alphabetic() || x == '/');
                match rest.find('>') {
                    Some(end) if is_tag => {
                        res.push_str(&rest[..=end]);
                        rest = &rest[end + 1..];
                    }
                    _ => {
                        res.push('<');
                        rest = &rest[1..];
                    }
                }
            }
            '_' => {
                res.push_str("\\_");
                rest = &rest[1..];
            }
            _ => {
                res.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

/// Length of a bare URL or email address at the start of `text`. The link
/// runs up to the next whitespace or `<`.
fn autolink_len(text: &str) -> Option<usize> {
    let end = text.find(|c: char| c.is_whitespace() || c == '<').unwrap_or(text.len());
    let token = &text[..end];

    let head = token.get(..8).unwrap_or(token).to_ascii_lowercase();
    if ["http://", "https://", "www."].iter().any(|prefix| head.starts_with(prefix)) {
        return Some(end);
    }

    let (local, domain) = token.split_once('@')?;
    let local_ok = !local.is_empty()
        && local.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'));
    (local_ok && domain.contains('.')).then_some(end)
}

/// Byte offset of the next run of exactly `len` markers.
fn find_run(text: &str, marker: char, len: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let marker = marker as u8;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == marker {
            let start = i;
            while i < bytes.len() && bytes[i] == marker {
                i += 1;
            }
            if i - start == len {
                return Some(start);
            }
        } else {
            i += 1;
        }
    }

    None
}
