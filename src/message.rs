use serde::{Deserialize, Serialize};

/// A role-tagged chat turn threaded through a flow run.
///
/// Messages are the primary payload moving between node executors: the input
/// node seeds one from the run prompt, message nodes append rendered turns,
/// and the chat node both consumes a window of them and appends the assistant
/// reply.
///
/// # Examples
///
/// ```
/// use flowrun::message::Message;
///
/// let user = Message::user("안녕");
/// let reply = Message::assistant("안녕하세요!");
///
/// assert!(user.has_role(Message::USER));
/// assert_eq!(reply.content, "안녕하세요!");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender role, usually one of the constants on [`Message`].
    pub role: String,
    /// Text content of the turn.
    pub content: String,
}

impl Message {
    /// User input role.
    pub const USER: &'static str = "user";
    /// Assistant reply role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction role.
    pub const SYSTEM: &'static str = "system";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convenience_constructors_set_roles() {
        assert_eq!(Message::user("hi").role, Message::USER);
        assert_eq!(Message::assistant("hi").role, Message::ASSISTANT);
        assert_eq!(Message::system("hi").role, Message::SYSTEM);
        assert_eq!(Message::new("function", "r").role, "function");
    }

    #[test]
    fn role_check() {
        let msg = Message::user("hello");
        assert!(msg.has_role(Message::USER));
        assert!(!msg.has_role(Message::ASSISTANT));
    }

    #[test]
    fn serde_round_trip() {
        let original = Message::assistant("결과");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }
}
