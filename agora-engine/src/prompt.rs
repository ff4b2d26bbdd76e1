//! XML-tagged prompt construction.
//!
//! Every prompt the engine sends is built from tagged sections so that
//! user-controlled content (topics, personas, transcript text) sits
//! inside structural boundaries instead of becoming instructions. All
//! user-controlled strings pass through [`xml_escape`] before embedding;
//! section scaffolding stays unescaped so the model can parse it.

use std::sync::LazyLock;

use regex::Regex;

/// Escape XML-special characters in user-controlled content.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap content in a block tag with newlines.
pub(crate) fn xml_tag(name: &str, content: &str) -> String {
    format!("<{name}>\n{content}\n</{name}>")
}

/// Wrap content in an inline tag.
pub(crate) fn xml_inline(name: &str, content: &str) -> String {
    format!("<{name}>{content}</{name}>")
}

static PERSONA_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<persona[\s>]").expect("valid regex"));

/// Whether a persona prompt already carries XML structure.
fn has_xml_structure(text: &str) -> bool {
    PERSONA_TAG.is_match(text)
}

static RULES_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*?)\n\s*Rules:\s*\n(.*)$").expect("valid regex"));

/// Wrap a plain-text persona in `<persona>` tags (wrap-on-read for
/// prompts authored before the XML format). Prompts that already contain
/// a `<persona>` tag pass through untouched. A trailing `Rules:` section
/// becomes individual `<rule>` items.
pub(crate) fn wrap_persona(prompt: &str) -> String {
    if has_xml_structure(prompt) {
        return prompt.to_string();
    }

    let trimmed = prompt.trim();

    if let Some(captures) = RULES_SECTION.captures(trimmed) {
        let instructions = captures[1].trim().to_string();
        let rule_items: Vec<String> = captures[2]
            .lines()
            .map(|line| {
                let line = line.trim_start();
                line.strip_prefix('-').unwrap_or(line).trim()
            })
            .filter(|line| !line.is_empty())
            .map(|line| xml_inline("rule", line))
            .collect();

        let mut parts = vec![xml_tag("instructions", &instructions)];
        if !rule_items.is_empty() {
            parts.push(xml_tag("rules", &rule_items.join("\n")));
        }
        return xml_tag("persona", &parts.join("\n"));
    }

    xml_tag("persona", &xml_tag("instructions", trimmed))
}

/// Inputs for the per-turn system message.
pub(crate) struct SystemPromptParts<'a> {
    /// Safety preamble.
    pub safety: &'a str,
    /// Agent persona, plain text or already-tagged.
    pub persona: &'a str,
    /// Response format directive.
    pub format: &'a str,
}

/// System message: safety preamble, persona, format directive.
pub(crate) fn build_system_message(parts: &SystemPromptParts<'_>) -> String {
    [
        xml_tag("safety", parts.safety.trim()),
        wrap_persona(parts.persona),
        xml_tag("format", parts.format.trim()),
    ]
    .join("\n\n")
}

/// Inputs for the per-turn user message.
pub(crate) struct UserPromptParts<'a> {
    /// Debate topic, when one was supplied.
    pub topic: Option<&'a str>,
    /// Length label shown to the model.
    pub length_label: &'a str,
    /// Length guidance.
    pub length_hint: &'a str,
    /// Format label.
    pub format_label: &'a str,
    /// Format guidance.
    pub format_hint: &'a str,
    /// Transcript lines (`"{name}: {text}"`), possibly truncated.
    pub history: &'a [String],
    /// The agent asked to speak.
    pub agent_name: &'a str,
    /// First turn of the bout.
    pub is_opening: bool,
}

/// User message: context block, then either the opening instruction or
/// the escaped transcript plus a respond instruction.
pub(crate) fn build_user_message(parts: &UserPromptParts<'_>) -> String {
    let mut context_lines = Vec::new();
    if let Some(topic) = parts.topic {
        context_lines.push(xml_inline("topic", &xml_escape(topic)));
    }
    context_lines.push(xml_inline(
        "response-length",
        &format!(
            "{} ({})",
            xml_escape(parts.length_label),
            xml_escape(parts.length_hint)
        ),
    ));
    context_lines.push(xml_inline(
        "response-format",
        &format!(
            "{} ({})",
            xml_escape(parts.format_label),
            xml_escape(parts.format_hint)
        ),
    ));

    let mut sections = vec![xml_tag("context", &context_lines.join("\n"))];

    if parts.is_opening {
        sections.push(xml_tag(
            "instruction",
            &format!(
                "Open the debate in character as {}.",
                xml_escape(parts.agent_name)
            ),
        ));
    } else {
        let transcript: Vec<String> = parts.history.iter().map(|line| xml_escape(line)).collect();
        sections.push(xml_tag("transcript", &transcript.join("\n")));
        sections.push(xml_tag(
            "instruction",
            &format!(
                "Respond in character as {}.",
                xml_escape(parts.agent_name)
            ),
        ));
    }

    sections.join("\n\n")
}

/// User-role prompt for share-line generation. The transcript tail is
/// user-generated content and gets escaped.
pub(crate) fn build_share_prompt(clipped_transcript: &str) -> String {
    let rules = [
        "Captures the most absurd/funny/surprising moment",
        "Makes someone want to click the link",
        "Sounds like a human wrote it (not corporate)",
    ];
    let rule_lines: Vec<String> = rules.iter().map(|r| xml_inline("rule", r)).collect();

    [
        xml_tag(
            "task",
            "You just witnessed an AI bout. Write a single tweet-length line (max 140 chars).",
        ),
        xml_tag("rules", &rule_lines.join("\n")),
        xml_tag("transcript", &xml_escape(clipped_transcript)),
    ]
    .join("\n\n")
}
