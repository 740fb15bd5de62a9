//! Prompt templating for the "new bot" form.

pub const NAME_TOKEN: &str = "{bot name}";
pub const DESCRIPTION_TOKEN: &str = "{bot description}";
pub const DEFAULT_TEMPLATE: &str = "I'm {bot name}, {bot description}. How can I help you?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub name: String,
    pub description: String,
    pub template: String,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

fn fill(template: &str, token: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        template.to_string()
    } else {
        template.replace(token, value)
    }
}

impl ProfileDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> String {
        self.name = name.to_string();
        self.render_prompt()
    }

    pub fn set_description(&mut self, description: &str) -> String {
        self.description = description.to_string();
        self.render_prompt()
    }

    /// Empty fields leave their token in place.
    pub fn render_prompt(&self) -> String {
        let prompt = fill(&self.template, NAME_TOKEN, &self.name);
        fill(&prompt, DESCRIPTION_TOKEN, &self.description)
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.description.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_tokens_as_fields_change() {
        let mut draft = ProfileDraft::new();
        assert_eq!(
            draft.set_name("Eliza"),
            "I'm Eliza, {bot description}. How can I help you?"
        );
        assert_eq!(
            draft.set_description("a psychotherapist bot"),
            "I'm Eliza, a psychotherapist bot. How can I help you?"
        );
        assert!(draft.is_complete());
    }

    #[test]
    fn renaming_replaces_the_previous_value() {
        let mut draft = ProfileDraft::new();
        draft.set_name("Eliza");
        assert_eq!(
            draft.set_name("Alice"),
            "I'm Alice, {bot description}. How can I help you?"
        );
        assert_eq!(draft.set_name("  "), DEFAULT_TEMPLATE);
        assert!(!draft.is_complete());
    }

    #[test]
    fn custom_template_without_tokens_is_left_alone() {
        let draft = ProfileDraft {
            name: "Bob".into(),
            description: "a builder".into(),
            template: "You are helpful.".into(),
        };
        assert_eq!(draft.render_prompt(), "You are helpful.");
    }
}
