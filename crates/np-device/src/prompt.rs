//! CLI prompt detection and output cleanup.
//!
//! Devices answer every line with a block of text followed by a prompt such
//! as `R1#` or `R1(config-if)#`. These helpers find that prompt, strip the
//! echoed command and the trailing prompt from a response, and spot the
//! `%`-prefixed error lines network operating systems print for rejected
//! input.

use regex::Regex;
use std::sync::LazyLock;

/// `hostname[(mode)]` followed by `>` or `#`.
static PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-:/@]+(?:\([\w.\-/:]+\))?[>#]\s*$").unwrap());

/// ANSI escape sequences (cursor movement, colours).
static ANSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

/// Interactive confirmations printed by save/copy commands.
static CONFIRM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\[confirm\]|\[y/n\]|\[yes/no\]|filename \[[^\]]*\]\?)\s*$").unwrap()
});

/// Line prefixes that mark rejected input.
const ERROR_MARKERS: &[&str] = &[
    "% Invalid",
    "% Incomplete",
    "% Ambiguous",
    "% Unknown",
    "% Unrecognized",
    "% Bad",
    "% Error",
    "% Cannot",
];

/// Strip ANSI escapes and normalize line endings to `\n`.
pub fn normalize(raw: &str) -> String {
    let text = ANSI.replace_all(raw, "");
    text.replace("\r\n", "\n").replace('\r', "")
}

/// The prompt at the end of `text`, if the device is waiting for input.
///
/// Only the final line counts; a prompt followed by more output is not a
/// prompt anymore.
pub fn trailing_prompt(text: &str) -> Option<&str> {
    let last = text.rsplit('\n').next()?.trim_end();
    if PROMPT.is_match(last) { Some(last) } else { None }
}

/// Whether a prompt belongs to configuration mode (`R1(config)#`).
pub fn is_config_prompt(prompt: &str) -> bool {
    prompt.contains("(config")
}

/// Whether the device is asking for confirmation (`[confirm]`, `[y/n]`).
pub fn needs_confirmation(text: &str) -> bool {
    text.rsplit('\n')
        .next()
        .is_some_and(|last| CONFIRM.is_match(last.trim_end()))
}

/// Remove the echoed command and the trailing prompt from a response.
pub fn clean_output(raw: &str, command: &str) -> String {
    let text = normalize(raw);
    let mut lines: Vec<&str> = text.split('\n').collect();

    let command = command.trim();
    if !command.is_empty()
        && lines
            .first()
            .is_some_and(|first| first.trim_end().ends_with(command))
    {
        lines.remove(0);
    }

    if lines
        .last()
        .is_some_and(|last| PROMPT.is_match(last.trim_end()))
    {
        lines.pop();
    }

    lines
        .join("\n")
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

/// First line of `output` that reports rejected input, if any.
pub fn detect_error(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| {
        ERROR_MARKERS
            .iter()
            .any(|marker| line.starts_with(marker))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_exec_and_config_prompts() {
        assert_eq!(trailing_prompt("Building...\nR1#"), Some("R1#"));
        assert_eq!(trailing_prompt("R1>"), Some("R1>"));
        assert_eq!(
            trailing_prompt("\nR1(config-if)# "),
            Some("R1(config-if)#")
        );
        assert_eq!(
            trailing_prompt("leaf-01.lab(config-if-Et1)#"),
            Some("leaf-01.lab(config-if-Et1)#")
        );
    }

    #[test]
    fn output_without_prompt() {
        assert_eq!(trailing_prompt("Cisco IOS XE Software, Version 17.03.04a"), None);
        assert_eq!(trailing_prompt("R1#\nmore output"), None);
        assert_eq!(trailing_prompt("R1#\n"), None);
        assert_eq!(trailing_prompt(""), None);
    }

    #[test]
    fn config_prompt() {
        assert!(is_config_prompt("R1(config)#"));
        assert!(is_config_prompt("R1(config-router)#"));
        assert!(!is_config_prompt("R1#"));
    }

    #[test]
    fn normalize_strips_ansi_and_carriage_returns() {
        let raw = "\x1b[?25lline one\r\nline two\r\r\nR1#";
        assert_eq!(normalize(raw), "line one\nline two\nR1#");
    }

    #[test]
    fn clean_output_strips_echo_and_prompt() {
        let raw = "show clock\r\n*10:21:07.123 UTC Mon Oct 19 2026\r\nR1#";
        assert_eq!(
            clean_output(raw, "show clock"),
            "*10:21:07.123 UTC Mon Oct 19 2026"
        );
    }

    #[test]
    fn clean_output_handles_redrawn_prompt_echo() {
        let raw = "R1#show ip interface brief\nInterface  IP-Address\nGi1        10.0.0.1\nR1#";
        assert_eq!(
            clean_output(raw, "show ip interface brief"),
            "Interface  IP-Address\nGi1        10.0.0.1"
        );
    }

    #[test]
    fn clean_output_keeps_unrelated_first_line() {
        let raw = "Building configuration...\n[OK]\nR1#";
        assert_eq!(
            clean_output(raw, "write memory"),
            "Building configuration...\n[OK]"
        );
    }

    #[test]
    fn detects_invalid_input() {
        let out = "show bogus\n        ^\n% Invalid input detected at '^' marker.\n";
        assert_eq!(
            detect_error(out),
            Some("% Invalid input detected at '^' marker.")
        );
        assert_eq!(detect_error("% Incomplete command."), Some("% Incomplete command."));
    }

    #[test]
    fn normal_output_has_no_error() {
        assert!(detect_error("Interface Loopback1 is up, line protocol is up").is_none());
        assert!(detect_error("").is_none());
    }

    #[test]
    fn confirmation_prompts() {
        assert!(needs_confirmation("Overwrite the previous NVRAM configuration?[confirm]"));
        assert!(needs_confirmation("Destination filename [startup-config]?"));
        assert!(needs_confirmation("Proceed? [y/n] "));
        assert!(!needs_confirmation("Building configuration...\n[OK]\nR1#"));
    }
}
