// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Guards any future tool surface that might hand a string to a shell. No
//! built-in tool in this runtime executes a shell command today, but the
//! validator is ambient infrastructure: the moment one does, it must not be
//! able to smuggle shell metacharacters through tool arguments.
use thiserror::Error;

const FORBIDDEN_CHARS: &[char] = &[
    '|', '&', ';', '$', '`', '"', '\'', '<', '>', '(', ')', '{', '}', '[', ']', '*', '~', '#',
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("prompt contains disallowed character {0:?}")]
pub struct InvalidPrompt(pub char);

/// Reject strings containing shell metacharacters or control bytes
/// (`\n \r \t` and NUL).
pub fn validate_prompt(s: &str) -> Result<(), InvalidPrompt> {
    for c in s.chars() {
        if FORBIDDEN_CHARS.contains(&c) || c == '\n' || c == '\r' || c == '\t' || c == '\0' {
            return Err(InvalidPrompt(c));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_valid() {
        assert!(validate_prompt("find files named config in /etc").is_ok());
    }

    #[test]
    fn pipe_character_is_rejected() {
        assert_eq!(validate_prompt("ls | rm -rf /"), Err(InvalidPrompt('|')));
    }

    #[test]
    fn each_forbidden_char_is_individually_rejected() {
        for &c in FORBIDDEN_CHARS {
            let s = format!("a{c}b");
            assert_eq!(validate_prompt(&s), Err(InvalidPrompt(c)), "char {c:?} should be rejected");
        }
    }

    #[test]
    fn newline_is_rejected() {
        assert_eq!(validate_prompt("line one\nline two"), Err(InvalidPrompt('\n')));
    }

    #[test]
    fn nul_byte_is_rejected() {
        assert_eq!(validate_prompt("a\0b"), Err(InvalidPrompt('\0')));
    }
}
