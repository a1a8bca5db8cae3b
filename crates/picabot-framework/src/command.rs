//! Command registry and command-line parsing.

use std::collections::HashMap;

use picabot_core::RegistrationError;

use crate::handler::BoxedCommandHandler;
use crate::split::{ArgSplit, split_args};

/// A command name and its arguments, cut out of a message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The token right after the prefix.
    pub name: String,
    /// The tokenized remainder.
    pub args: Vec<String>,
}

/// Parses `text` as a command invocation.
///
/// Returns `None` unless `text` starts with `prefix` immediately followed by
/// a non-whitespace token. Whether the token is bound is not checked here.
pub fn parse_invocation(text: &str, prefix: &str, mode: ArgSplit) -> Option<CommandInvocation> {
    let rest = text.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (name, remainder) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    Some(CommandInvocation {
        name: name.to_string(),
        args: split_args(remainder, mode),
    })
}

/// Maps command names to their single handler.
///
/// Registering a name twice is rejected; the first binding stays in place.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, BoxedCommandHandler>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: BoxedCommandHandler,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(RegistrationError::InvalidCommandName { name });
        }
        if self.commands.contains_key(&name) {
            return Err(RegistrationError::DuplicateCommand { name });
        }
        self.commands.insert(name, handler);
        Ok(())
    }

    /// Looks up the handler bound to `name`.
    pub fn get(&self, name: &str) -> Option<BoxedCommandHandler> {
        self.commands.get(name).cloned()
    }

    /// Returns `true` if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of bound commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picabot_core::Message;
    use std::sync::Arc;

    fn noop() -> BoxedCommandHandler {
        Arc::new(|_msg: Arc<Message>, _args: Vec<String>| async {})
    }

    #[test]
    fn test_parse_invocation() {
        assert_eq!(
            parse_invocation("!hello", "!", ArgSplit::Whitespace),
            Some(CommandInvocation {
                name: "hello".into(),
                args: vec![],
            })
        );
        assert_eq!(
            parse_invocation("!roll 2 d6", "!", ArgSplit::Whitespace),
            Some(CommandInvocation {
                name: "roll".into(),
                args: vec!["2".into(), "d6".into()],
            })
        );
    }

    #[test]
    fn test_parse_invocation_multi_char_prefix() {
        let inv = parse_invocation("::ping now", "::", ArgSplit::Whitespace).unwrap();
        assert_eq!(inv.name, "ping");
        assert_eq!(inv.args, vec!["now"]);
    }

    #[test]
    fn test_parse_invocation_rejects_non_commands() {
        assert_eq!(parse_invocation("hello", "!", ArgSplit::Whitespace), None);
        assert_eq!(parse_invocation("!", "!", ArgSplit::Whitespace), None);
        assert_eq!(parse_invocation("! hello", "!", ArgSplit::Whitespace), None);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CommandRegistry::new();
        registry.register("hello", noop()).unwrap();

        let err = registry.register("hello", noop()).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateCommand {
                name: "hello".into()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_invalid_names() {
        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.register("", noop()),
            Err(RegistrationError::InvalidCommandName { .. })
        ));
        assert!(matches!(
            registry.register("two words", noop()),
            Err(RegistrationError::InvalidCommandName { .. })
        ));
        assert!(registry.is_empty());
    }
}
