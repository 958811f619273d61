//! Text Filter
//!
//! Model output routinely contains stage directions in brackets and
//! mismatched quote fragments from truncation; speaking them degrades the
//! experience. The filter removes them symmetrically so prosody survives:
//! content between matched quotes is kept, orphans are deleted.

/// Characters swept when they appear outside matched-quote ranges
const SWEEP_SET: &[char] = &['\'', '“', '”', '(', ')', '（', '）', '～', '~'];

/// Quote-family characters; a result consisting only of these is unspeakable
const QUOTE_FAMILY: &[char] = &['"', '“', '”', '\'', '‘', '’'];

fn is_open_bracket(c: char) -> bool {
    c == '(' || c == '（'
}

fn is_close_bracket(c: char) -> bool {
    c == ')' || c == '）'
}

fn brackets_pair(open: char, close: char) -> bool {
    (open == '(' && close == ')') || (open == '（' && close == '）')
}

/// Filter raw model text into its speakable form
///
/// Contract:
/// 1. paired same-family brackets are removed, content included
/// 2. quotes are balanced with a stack; unmatched openings and closings are
///    deleted, content between matched pairs is retained
/// 3. outside matched-quote ranges, isolated symbols from the sweep set are
///    deleted, and ellipses at the absolute start or end are dropped
///    (medial ellipses stay verbatim)
/// 4. surrounding whitespace is trimmed
/// 5. an empty or quote-only result is `None`
///
/// The filter is idempotent: `filter(filter(x)) == filter(x)`.
pub fn filter(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut delete = vec![false; chars.len()];

    // Paired brackets, innermost first via the stack.
    let mut bracket_stack: Vec<(usize, char)> = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        if is_open_bracket(c) {
            bracket_stack.push((i, c));
        } else if is_close_bracket(c) {
            if let Some(&(start, open)) = bracket_stack.last() {
                if brackets_pair(open, c) {
                    bracket_stack.pop();
                    for slot in &mut delete[start..=i] {
                        *slot = true;
                    }
                }
                // Mixed-family close stays put; the sweep removes it.
            }
        }
    }

    // Quote balancing. Straight quotes toggle against their own kind; curly
    // quotes must close the matching opener on top of the stack.
    let mut quote_stack: Vec<(usize, char)> = Vec::new();
    let mut matched_ranges: Vec<(usize, usize)> = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        if delete[i] {
            continue;
        }
        match c {
            '"' | '\'' => {
                if quote_stack.last().map(|&(_, q)| q) == Some(c) {
                    let (start, _) = quote_stack.pop().expect("non-empty quote stack");
                    matched_ranges.push((start, i));
                } else {
                    quote_stack.push((i, c));
                }
            }
            '“' | '‘' => quote_stack.push((i, c)),
            '”' | '’' => {
                let opener = if c == '”' { '“' } else { '‘' };
                if quote_stack.last().map(|&(_, q)| q) == Some(opener) {
                    let (start, _) = quote_stack.pop().expect("non-empty quote stack");
                    matched_ranges.push((start, i));
                } else {
                    delete[i] = true;
                }
            }
            _ => {}
        }
    }
    for (i, _) in quote_stack {
        delete[i] = true;
    }

    // Symbol sweep outside matched-quote ranges.
    let in_matched = |i: usize| matched_ranges.iter().any(|&(s, e)| i >= s && i <= e);
    for (i, &c) in chars.iter().enumerate() {
        if !delete[i] && !in_matched(i) && SWEEP_SET.contains(&c) {
            delete[i] = true;
        }
    }

    // Rebuild, collapsing space runs opened up by deletions.
    let mut result = String::with_capacity(raw.len());
    for (i, &c) in chars.iter().enumerate() {
        if delete[i] {
            continue;
        }
        if c == ' ' && result.ends_with(' ') {
            continue;
        }
        result.push(c);
    }

    let result = trim_boundary_ellipses(result.trim());
    let result = result.trim();

    if result.is_empty() || result.chars().all(|c| QUOTE_FAMILY.contains(&c)) {
        return None;
    }
    Some(result.to_string())
}

/// Drop `…` / `...` runs at the absolute start or end of the string
fn trim_boundary_ellipses(s: &str) -> String {
    let mut s = s.to_string();
    loop {
        let t = s.trim_start();
        if t.starts_with('…') {
            s = t.trim_start_matches('…').to_string();
        } else if t.starts_with("...") {
            s = t.trim_start_matches('.').to_string();
        } else {
            break;
        }
    }
    loop {
        let t = s.trim_end();
        if t.ends_with('…') {
            s = t.trim_end_matches('…').to_string();
        } else if t.ends_with("...") {
            s = t.trim_end_matches('.').to_string();
        } else {
            break;
        }
    }
    s
}

/// Tail cleanup for the stop-requested path
///
/// Deletes bracketed stage directions and curly double quotes, trims, and
/// returns `None` when nothing speakable remains.
pub fn remove_parentheses(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut delete = vec![false; chars.len()];
    let mut stack: Vec<(usize, char)> = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        if is_open_bracket(c) {
            stack.push((i, c));
        } else if is_close_bracket(c) {
            if let Some(&(start, open)) = stack.last() {
                if brackets_pair(open, c) {
                    stack.pop();
                    for slot in &mut delete[start..=i] {
                        *slot = true;
                    }
                }
            }
        }
    }

    let cleaned: String = chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| !delete[i] && c != '“' && c != '”')
        .map(|(_, &c)| c)
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_removal() {
        assert_eq!(filter("你好（挥手）世界").as_deref(), Some("你好世界"));
        assert_eq!(filter("hi (waves) there").as_deref(), Some("hi there"));
    }

    #[test]
    fn test_nested_brackets() {
        assert_eq!(filter("a(b(c)d)e").as_deref(), Some("ae"));
    }

    #[test]
    fn test_mixed_family_brackets_swept() {
        // A mixed pair never matches; the stray symbols are swept instead.
        assert_eq!(filter("a(b）c").as_deref(), Some("abc"));
    }

    #[test]
    fn test_matched_quotes_kept() {
        assert_eq!(
            filter(r#"He said "hi world" now."#).as_deref(),
            Some(r#"He said "hi world" now."#)
        );
        assert_eq!(filter("她说“你好”啊").as_deref(), Some("她说“你好”啊"));
    }

    #[test]
    fn test_orphan_quote_deleted() {
        assert_eq!(
            filter(r#"Orphan " quote here."#).as_deref(),
            Some("Orphan quote here.")
        );
        assert_eq!(filter("结尾”孤引号").as_deref(), Some("结尾孤引号"));
    }

    #[test]
    fn test_symbol_sweep() {
        assert_eq!(filter("好的～没问题~").as_deref(), Some("好的没问题"));
        assert_eq!(filter("遗留)括号(碎片").as_deref(), Some("遗留括号碎片"));
    }

    #[test]
    fn test_boundary_ellipses_dropped_medial_kept() {
        assert_eq!(filter("...think").as_deref(), Some("think"));
        assert_eq!(filter("think...").as_deref(), Some("think"));
        assert_eq!(filter("……嗯……").as_deref(), Some("嗯"));
        assert_eq!(filter("Wait... ok").as_deref(), Some("Wait... ok"));
    }

    #[test]
    fn test_empty_and_quote_only_results() {
        assert_eq!(filter(""), None);
        assert_eq!(filter("（全是动作）"), None);
        assert_eq!(filter("“”"), None);
        assert_eq!(filter("   "), None);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "你好（挥手）世界",
            r#"He said "hi world" now."#,
            r#"Orphan " quote here."#,
            "Wait... ok",
            "...maybe...",
            "好的～没问题~",
        ];
        for input in inputs {
            let once = filter(input);
            let twice = once.as_deref().and_then(filter);
            assert_eq!(once, twice, "filter not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_remove_parentheses() {
        assert_eq!(
            remove_parentheses("最后（叉腰）一句“话”").as_deref(),
            Some("最后一句话")
        );
        assert_eq!(remove_parentheses("（全删）"), None);
        assert_eq!(remove_parentheses(""), None);
    }
}
