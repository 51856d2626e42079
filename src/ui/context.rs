//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// Environment variables that indicate a CI runner
const CI_VARS: [&str; 9] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// UI context that determines output behavior
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::detect_interactive(),
        }
    }

    /// Plain output regardless of the terminal
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Whether to use cliclack styling
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    fn detect_interactive() -> bool {
        if !std::io::stdout().is_terminal() {
            return false;
        }

        !CI_VARS.iter().any(|var| std::env::var_os(var).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.use_fancy_output());
    }
}
