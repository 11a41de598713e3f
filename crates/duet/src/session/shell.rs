// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell family detection and the prompt-hook preamble.
//!
//! The preamble installs a hook that prints OSC-7 (`ESC ] 7 ;
//! file://<host><path> BEL`) before every prompt, then clears the screen so
//! the setup line is invisible. Working-directory tracking relies solely on
//! that sequence — `cd` commands are never parsed.

/// Supported shell families for prompt-hook installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Unknown,
}

impl ShellFamily {
    /// Classify a shell by the basename of its path.
    pub fn detect(shell_path: &str) -> Self {
        let base = shell_path.rsplit('/').next().unwrap_or(shell_path);
        let base = base.strip_suffix(".exe").unwrap_or(base);
        match base {
            "bash" | "sh" => Self::Bash,
            "zsh" => Self::Zsh,
            "fish" => Self::Fish,
            "pwsh" | "powershell" => Self::PowerShell,
            _ => Self::Unknown,
        }
    }
}

/// One-line setup command for the given family, ending with a screen clear
/// and a carriage return. `None` when the family is unknown — cwd tracking
/// then degrades to reporting the last-known value.
pub fn integration_preamble(family: ShellFamily) -> Option<String> {
    let line = match family {
        ShellFamily::Bash => concat!(
            r#"PROMPT_COMMAND='printf "\033]7;file://%s%s\007" "$HOSTNAME" "$PWD"'"#,
            "${PROMPT_COMMAND:+;$PROMPT_COMMAND}; clear",
        )
        .to_owned(),
        ShellFamily::Zsh => concat!(
            r#"precmd() { printf "\033]7;file://%s%s\007" "$HOST" "$PWD" }"#,
            "; clear",
        )
        .to_owned(),
        ShellFamily::Fish => concat!(
            r#"function __osc7 --on-event fish_prompt; printf "\033]7;file://%s%s\007" (hostname) "$PWD"; end"#,
            "; clear",
        )
        .to_owned(),
        ShellFamily::PowerShell => concat!(
            r#"function prompt { $p = $PWD.Path -replace '\\','/'; "#,
            r#"Write-Host -NoNewline ("$([char]27)]7;file://" + $env:COMPUTERNAME + $p + "$([char]7)"); "#,
            r#""PS $PWD> " }; cls"#,
        )
        .to_owned(),
        ShellFamily::Unknown => return None,
    };
    Some(format!("{line}\r"))
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
