//! Post-processing of raw model output

/// Meta-commentary openings stripped from answers (case-insensitive match)
const THROAT_CLEARING_PREFIXES: &[&str] = &[
    "based on the provided sources,",
    "based on the provided sources",
    "based on the sources,",
    "based on the sources",
    "based on the information provided,",
    "according to the sources,",
    "according to the sources",
    "according to the provided information,",
    "op basis van de bronnen,",
    "op basis van de aangeleverde bronnen,",
    "volgens de bronnen,",
    "volgens de beschikbare informatie,",
];

/// Bullet glyphs normalized to `- `
const BULLET_GLYPHS: &[&str] = &["* ", "• ", "+ ", "– "];

/// Clean up a raw model answer
///
/// Trims, strips throat-clearing openings, normalizes bullet markers to one
/// glyph, and inserts a blank line before a bullet run that directly follows
/// sentence-ending punctuation.
pub fn clean_answer(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    let lowered = text.to_lowercase();
    for prefix in THROAT_CLEARING_PREFIXES {
        if lowered.starts_with(prefix) {
            text = text[prefix.len()..].trim_start().to_string();
            text = capitalize_first(&text);
            break;
        }
    }

    let lines: Vec<String> = text.lines().map(normalize_bullet).collect();

    let mut output: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let is_bullet = line.trim_start().starts_with("- ");
        if is_bullet {
            if let Some(prev) = output.last() {
                let prev_trimmed = prev.trim_end();
                let prev_is_bullet = prev.trim_start().starts_with("- ");
                if !prev_trimmed.is_empty()
                    && !prev_is_bullet
                    && prev_trimmed.ends_with(['.', '!', '?', ':'])
                {
                    output.push(String::new());
                }
            }
        }
        output.push(line);
    }

    output.join("\n").trim().to_string()
}

fn normalize_bullet(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent_len = line.len() - trimmed.len();
    for glyph in BULLET_GLYPHS {
        if let Some(rest) = trimmed.strip_prefix(glyph) {
            return format!("{}- {}", &line[..indent_len], rest);
        }
    }
    line.to_string()
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_throat_clearing() {
        let cleaned = clean_answer("Based on the provided sources, the store opens at 9:00.");
        assert_eq!(cleaned, "The store opens at 9:00.");
    }

    #[test]
    fn test_strips_dutch_throat_clearing() {
        let cleaned = clean_answer("Op basis van de bronnen, wij zijn open op maandag.");
        assert_eq!(cleaned, "Wij zijn open op maandag.");
    }

    #[test]
    fn test_normalizes_bullets() {
        let cleaned = clean_answer("Options:\n\n* First\n• Second\n+ Third");
        assert_eq!(cleaned, "Options:\n\n- First\n- Second\n- Third");
    }

    #[test]
    fn test_inserts_blank_line_before_bullets() {
        let cleaned = clean_answer("We offer three plans.\n- Basic\n- Pro\n- Enterprise");
        assert_eq!(cleaned, "We offer three plans.\n\n- Basic\n- Pro\n- Enterprise");
    }

    #[test]
    fn test_plain_answer_untouched() {
        let cleaned = clean_answer("  The store opens at 9:00.  ");
        assert_eq!(cleaned, "The store opens at 9:00.");
    }
}
