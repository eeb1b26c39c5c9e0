//! Built-in string actions for declarative pipelines.

use crate::domain::TaskError;

/// A string transformation a pipeline task can perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Pass the input through unchanged
    Identity,

    /// Ignore the input and produce a fixed value
    Constant(String),

    Uppercase,

    Lowercase,

    /// "Number of chars: N"
    CountChars,

    /// Replace every occurrence of `from` with `to` (case-sensitive)
    Replace { from: String, to: String },

    /// Substitute the input for every `{input}` in the template
    Format { template: String },

    /// Always fail with the given message
    Fail { message: String },
}

impl Action {
    /// Apply the action to an input value
    pub fn apply(&self, input: &str) -> Result<String, TaskError> {
        match self {
            Self::Identity => Ok(input.to_string()),
            Self::Constant(value) => Ok(value.clone()),
            Self::Uppercase => Ok(input.to_uppercase()),
            Self::Lowercase => Ok(input.to_lowercase()),
            Self::CountChars => Ok(format!("Number of chars: {}", input.chars().count())),
            Self::Replace { from, to } => Ok(input.replace(from.as_str(), to)),
            Self::Format { template } => Ok(template.replace("{input}", input)),
            Self::Fail { message } => Err(TaskError::failed(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_chars() {
        assert_eq!(
            Action::CountChars.apply("HI THERE").unwrap(),
            "Number of chars: 8"
        );
    }

    #[test]
    fn test_replace_is_case_sensitive() {
        let action = Action::Replace {
            from: "E".to_string(),
            to: "e".to_string(),
        };
        assert_eq!(action.apply("HI THERE").unwrap(), "HI THeRe");
        assert_eq!(action.apply("here").unwrap(), "here");
    }

    #[test]
    fn test_format_and_constant() {
        let action = Action::Format {
            template: "Third result for: {input}".to_string(),
        };
        assert_eq!(action.apply("HI").unwrap(), "Third result for: HI");
        assert_eq!(
            Action::Constant("Hi there".to_string()).apply("ignored").unwrap(),
            "Hi there"
        );
    }

    #[test]
    fn test_fail() {
        let action = Action::Fail {
            message: "server unreachable".to_string(),
        };
        assert_eq!(
            action.apply("x"),
            Err(TaskError::Failed("server unreachable".to_string()))
        );
    }
}
