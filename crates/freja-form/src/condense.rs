// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Markdown body condensation for prompt context.
//!
//! Long form bodies blow up the system prompt, so bodies over a line
//! threshold are reduced to the sections a model actually needs: tool
//! descriptions, the field summary, and filling instructions.  When none of
//! those headings exist, the head and tail of the body are kept around an
//! elision marker.

use regex::Regex;

/// Heading patterns (case-insensitive) whose sections survive condensation.
const SECTION_PATTERNS: &[&str] = &[
    r"(?i)tool",
    r"(?i)field",
    r"(?i)instruction",
    r"(?i)rule",
    r"(?i)summary",
];

/// Condense a markdown body for prompt injection.
///
/// Bodies at or under `threshold` lines pass through unchanged.  Longer
/// bodies keep only the sections whose headings match the closed pattern
/// set; if no heading matches, the first and last `keep` lines are joined
/// around an `[...]` marker.
pub fn condense(body: &str, threshold: usize, keep: usize) -> String {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() <= threshold {
        return body.to_string();
    }

    let sections = matching_sections(&lines);
    if !sections.is_empty() {
        return sections.join("\n\n");
    }

    // Fallback: head + tail with an elision marker.
    let keep = keep.min(lines.len() / 2);
    let head = lines[..keep].join("\n");
    let tail = lines[lines.len() - keep..].join("\n");
    format!("{head}\n\n[...]\n\n{tail}")
}

/// Split the body at markdown headings and collect the sections whose
/// heading text matches one of the retained patterns.
fn matching_sections(lines: &[&str]) -> Vec<String> {
    let heading = Regex::new(r"^#{1,6}\s+(.*)$").unwrap();
    let patterns: Vec<Regex> = SECTION_PATTERNS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();

    let mut sections = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in lines {
        if let Some(caps) = heading.captures(line) {
            if let Some(section) = current.take() {
                sections.push(section.join("\n").trim().to_string());
            }
            let text = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if patterns.iter().any(|p| p.is_match(text)) {
                current = Some(vec![line]);
            }
        } else if let Some(section) = current.as_mut() {
            section.push(line);
        }
    }
    if let Some(section) = current.take() {
        sections.push(section.join("\n").trim().to_string());
    }

    sections.retain(|s| !s.is_empty());
    sections
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_body_passes_through() {
        let body = "# Title\n\nShort body.";
        assert_eq!(condense(body, 120, 40), body);
    }

    #[test]
    fn long_body_keeps_matching_sections() {
        let mut body = String::from("# My Form\n\n");
        body.push_str(&"filler line\n".repeat(100));
        body.push_str("## Available Tools\n- get_data: fetch stuff\n\n");
        body.push_str("## Field Summary Table\n| id | type |\n\n");
        body.push_str("## History\nirrelevant trivia\n");

        let out = condense(&body, 50, 10);
        assert!(out.contains("Available Tools"));
        assert!(out.contains("Field Summary Table"));
        assert!(!out.contains("irrelevant trivia"));
        assert!(!out.contains("filler line"));
    }

    #[test]
    fn instructions_sections_survive() {
        let mut body = String::new();
        body.push_str(&"x\n".repeat(60));
        body.push_str("### Filling Instructions\nAsk politely.\n");
        let out = condense(&body, 50, 10);
        assert!(out.contains("Ask politely."));
    }

    #[test]
    fn fallback_keeps_head_and_tail_with_marker() {
        let body: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let out = condense(&body, 50, 10);
        assert!(out.contains("line 0"));
        assert!(out.contains("line 99"));
        assert!(out.contains("[...]"));
        assert!(!out.contains("line 50"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let body: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let out = condense(body.trim_end(), 50, 10);
        assert_eq!(out, body.trim_end());
    }
}
