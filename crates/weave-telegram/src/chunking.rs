// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Splits outbound text into chunks Telegram's `sendMessage` will accept.

/// Telegram's per-message limit, in Unicode scalar values (not bytes, not
/// UTF-16 code units, not grapheme clusters).
pub const MAX_MESSAGE_SCALARS: usize = 4096;

/// Split `text` into chunks of at most [`MAX_MESSAGE_SCALARS`] Unicode
/// scalars each. Splitting on `char` boundaries means a chunk boundary can
/// never land inside a multi-byte codepoint — `char` already is one scalar
/// value, so this holds regardless of how many UTF-8 bytes it encodes to.
/// An empty input produces no chunks.
pub fn split_into_chunks(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.chars()
        .collect::<Vec<char>>()
        .chunks(MAX_MESSAGE_SCALARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
