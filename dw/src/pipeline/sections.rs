//! Markdown heading checks for generated and updated documents

/// A markdown ATX heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

/// ATX headings outside fenced code blocks, in document order
pub fn markdown_headings(content: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut in_fence = false;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || line.len() - trimmed.len() > 3 {
            continue;
        }

        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if !(1..=6).contains(&level) {
            continue;
        }
        let rest = &trimmed[level..];
        if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
            continue;
        }
        let text = rest.trim().trim_end_matches('#').trim();
        if !text.is_empty() {
            headings.push(Heading {
                level,
                text: text.to_string(),
            });
        }
    }
    headings
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Check `content` has a heading for every required section and that the
/// terminal sections close the document
pub fn check_required_sections(content: &str, required: &[&str], terminal: &[&str]) -> Result<(), String> {
    let headings = markdown_headings(content);
    let position = |name: &str| {
        let wanted = normalize(name);
        headings.iter().position(|h| normalize(&h.text) == wanted)
    };

    let missing: Vec<&str> = required.iter().copied().filter(|s| position(*s).is_none()).collect();
    if !missing.is_empty() {
        return Err(format!("missing required section heading(s): {}", missing.join(", ")));
    }

    let Some(first_terminal) = terminal.iter().filter_map(|s| position(*s)).min() else {
        return Ok(());
    };
    let terminal_names: Vec<String> = terminal.iter().map(|s| normalize(s)).collect();
    let boundary = headings[first_terminal].level;

    let trailing = headings[first_terminal..]
        .iter()
        .filter(|h| h.level <= boundary)
        .find(|h| !terminal_names.contains(&normalize(&h.text)));
    match trailing {
        Some(h) => Err(format!(
            "section '{}' appears after {}, which must come last",
            h.text,
            terminal.join(", ")
        )),
        None => Ok(()),
    }
}

/// Second-level headings of an existing document
pub fn section_headings(content: &str) -> Vec<String> {
    markdown_headings(content)
        .into_iter()
        .filter(|h| h.level == 2)
        .map(|h| h.text)
        .collect()
}

/// Check an update kept every second-level section of the original
pub fn check_preserved_sections(original: &str, updated: &str) -> Result<(), String> {
    let kept: Vec<String> = markdown_headings(updated).iter().map(|h| normalize(&h.text)).collect();
    let dropped: Vec<String> = section_headings(original)
        .into_iter()
        .filter(|s| !kept.contains(&normalize(s)))
        .collect();
    if dropped.is_empty() {
        Ok(())
    } else {
        Err(format!("update dropped existing section(s): {}", dropped.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICKSTART: &str = "# Auth Quickstart\n\n## Prerequisites\n\nA key.\n\n## Procedure\n\n### Step 1\n\n```bash\n# not a heading\n```\n\n## Next Steps\n\nRead more.\n";

    #[test]
    fn test_markdown_headings_skip_code_and_hashtags() {
        let headings = markdown_headings("#notaheading\n# Title #\n```\n## inside\n```\n    ## indented code\n## Real");
        let texts: Vec<&str> = headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Title", "Real"]);
        assert_eq!(headings[1].level, 2);
    }

    #[test]
    fn test_required_sections_satisfied() {
        let result = check_required_sections(QUICKSTART, &["Prerequisites", "Procedure", "Next Steps"], &["Next Steps"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_required_sections_case_insensitive() {
        let content = "## prerequisites\n## PROCEDURE\n## Next  steps";
        assert!(check_required_sections(content, &["Prerequisites", "Procedure", "Next Steps"], &["Next Steps"]).is_ok());
    }

    #[test]
    fn test_missing_section_reported() {
        let content = "# T\n## Procedure\n## Next Steps";
        let err = check_required_sections(content, &["Prerequisites", "Procedure", "Next Steps"], &["Next Steps"])
            .unwrap_err();
        assert!(err.contains("Prerequisites"));
    }

    #[test]
    fn test_terminal_section_must_be_last() {
        let content = "# T\n## Prerequisites\n## Next Steps\n## Procedure";
        let err = check_required_sections(content, &["Prerequisites", "Procedure", "Next Steps"], &["Next Steps"])
            .unwrap_err();
        assert!(err.contains("Procedure"));
    }

    #[test]
    fn test_subsections_under_terminal_are_allowed() {
        let content = "# T\n## Procedure\n## Next Steps\n### Further reading";
        assert!(check_required_sections(content, &["Procedure", "Next Steps"], &["Next Steps"]).is_ok());
    }

    #[test]
    fn test_preserved_sections() {
        let original = "# API Auth\n## Overview\n## Tokens\n";
        assert!(check_preserved_sections(original, "# API Auth\n## Overview\n## Tokens\n## Refresh\n").is_ok());

        let err = check_preserved_sections(original, "# API Auth\n## Overview\n").unwrap_err();
        assert!(err.contains("Tokens"));
        assert_eq!(section_headings(original), vec!["Overview", "Tokens"]);
    }
}
