use serde::{Deserialize, Serialize};

/// One inbound prompt-completion request. Created per call, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(rename = "systemPrompt", default)]
    pub system_prompt: Option<String>,
    #[serde(rename = "userMessage")]
    pub user_message: String,
}

impl CompletionRequest {
    /// Combined prompt sent to every provider: the system prompt, when
    /// non-empty, is prepended to the user message with a fixed separator.
    pub fn combined_prompt(&self) -> String {
        match self.system_prompt.as_deref() {
            Some(system) if !system.is_empty() => {
                format!("{}\n\nUser: {}", system, self.user_message)
            }
            _ => self.user_message.clone(),
        }
    }
}

/// The resolved race: which provider answered first, and with what text.
#[derive(Debug, Clone)]
pub struct RaceWin {
    pub provider: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_prompt_with_system_prompt() {
        let req = CompletionRequest {
            system_prompt: Some("You are terse.".to_string()),
            user_message: "Say hi".to_string(),
        };
        assert_eq!(req.combined_prompt(), "You are terse.\n\nUser: Say hi");
    }

    #[test]
    fn test_combined_prompt_without_system_prompt() {
        let req = CompletionRequest {
            system_prompt: None,
            user_message: "Say hi".to_string(),
        };
        assert_eq!(req.combined_prompt(), "Say hi");
    }

    #[test]
    fn test_combined_prompt_with_empty_system_prompt() {
        let req = CompletionRequest {
            system_prompt: Some(String::new()),
            user_message: "Say hi".to_string(),
        };
        assert_eq!(req.combined_prompt(), "Say hi");
    }

    #[test]
    fn test_wire_field_names() {
        let req: CompletionRequest =
            serde_json::from_str(r#"{"systemPrompt":"sys","userMessage":"msg"}"#).unwrap();
        assert_eq!(req.system_prompt.as_deref(), Some("sys"));
        assert_eq!(req.user_message, "msg");
    }

    #[test]
    fn test_system_prompt_is_optional_on_the_wire() {
        let req: CompletionRequest = serde_json::from_str(r#"{"userMessage":"msg"}"#).unwrap();
        assert!(req.system_prompt.is_none());
    }
}
