//! Parser for the LLM response.
//!
//! The model is asked for three labelled sections but is not trusted to
//! produce them. Parsing runs a small line-oriented state machine and
//! degrades to a raw-text fallback; it never fails.

const FALLBACK_SUMMARY_LIMIT: usize = 500;

/// Sections recovered from a response. Missing sections are empty.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedSections {
    pub summary: String,
    pub high_priority: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Seeking,
    InSummary,
    InPriority,
    InRecommendations,
}

pub fn parse(raw: &str) -> ParsedSections {
    let mut state = ParserState::Seeking;
    let mut saw_header = false;
    let mut sections = ParsedSections::default();
    let mut summary_lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(next) = classify_header(line) {
            state = next;
            saw_header = true;
            continue;
        }

        let item = list_item(line);
        match state {
            // Free prose before any header still belongs to the summary.
            ParserState::Seeking | ParserState::InSummary => {
                summary_lines.push(item.unwrap_or(line).to_string());
            }
            // List sections collect only marked items; stray prose inside
            // them accumulates into the summary instead.
            ParserState::InPriority => match item {
                Some(item) => sections.high_priority.push(item.to_string()),
                None => summary_lines.push(line.to_string()),
            },
            ParserState::InRecommendations => match item {
                Some(item) => sections.recommendations.push(item.to_string()),
                None => summary_lines.push(line.to_string()),
            },
        }
    }

    if !saw_header {
        // The model ignored the format entirely; keep the head of the raw
        // text so the report still says something.
        sections.summary = raw.trim().chars().take(FALLBACK_SUMMARY_LIMIT).collect();
        sections.high_priority.clear();
        sections.recommendations.clear();
        return sections;
    }

    sections.summary = summary_lines.join(" ");
    sections
}

/// Recognize a section header line, tolerating `#`/`**` decoration and
/// arbitrary casing. Long lines are prose, not headers.
fn classify_header(line: &str) -> Option<ParserState> {
    let bare = line
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .to_lowercase();
    if bare.len() > 40 {
        return None;
    }

    if bare.contains("summary") || bare.contains("overview") {
        Some(ParserState::InSummary)
    } else if bare.contains("priority") {
        Some(ParserState::InPriority)
    } else if bare.contains("recommendation") {
        Some(ParserState::InRecommendations)
    } else {
        None
    }
}

/// The line's content if it carries a `-`, `*`, or `N.` list marker.
fn list_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return Some(rest.trim());
        }
    }
    None
}
