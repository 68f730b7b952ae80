//! Instruction text handed to the completion provider.
//!
//! The system instruction pins down the rewriting task and the required
//! output shape; the user instruction embeds the raw draft together with the
//! resolved option values.

use crate::options::EnhanceOptions;

/// Fixed system instruction describing the enhancement task.
pub fn system_instruction() -> String {
    [
        "You are an expert prompt engineer.",
        "Rewrite user prompts to be clearer, more complete, and directly usable.",
        "Return ONLY the enhanced prompt in a fenced ```markdown code block.",
        "Use sections: Goal, Context, Constraints, Output format, Steps, Style, Variables.",
        "Reflect tone/length/audience/platform if provided; never invent facts; use {{VARIABLE}} when missing.",
    ]
    .join(" ")
}

/// User instruction embedding the raw draft and the resolved options.
pub fn user_instruction(prompt: &str, options: &EnhanceOptions) -> String {
    let mut text = format!(
        "User prompt to enhance:\n\n{prompt}\n\nOptions:\nTone: {}\nLength: {}\nAudience: {}\nPlatform: {}",
        options.tone(),
        options.length(),
        options.audience(),
        options.platform(),
    );
    if let Some(extra) = options.extra.as_deref().filter(|notes| !notes.is_empty()) {
        text.push_str("\nNotes: ");
        text.push_str(extra);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_names_required_sections() {
        let system = system_instruction();
        for section in [
            "Goal",
            "Context",
            "Constraints",
            "Output format",
            "Steps",
            "Style",
            "Variables",
        ] {
            assert!(system.contains(section), "missing section {section}");
        }
        assert!(system.contains("```markdown"));
        assert!(system.contains("{{VARIABLE}}"));
    }

    #[test]
    fn user_instruction_embeds_draft_and_defaults() {
        let text = user_instruction("write me a haiku", &EnhanceOptions::default());
        assert!(text.contains("write me a haiku"));
        assert!(text.contains("Tone: default"));
        assert!(text.contains("Length: concise"));
        assert!(text.contains("Audience: general"));
        assert!(text.contains("Platform: any"));
        assert!(!text.contains("Notes:"));
    }

    #[test]
    fn user_instruction_appends_notes_when_present() {
        let options = EnhanceOptions {
            extra: Some("keep it under 100 words".into()),
            ..Default::default()
        };
        let text = user_instruction("draft", &options);
        assert!(text.ends_with("Notes: keep it under 100 words"));
    }
}
