//! Live hex input normalization for the send line
//!
//! Every edit is rewritten into canonical `HH HH HH` groups: non-hex
//! characters are dropped, lowercase digits are uppercased and a single space
//! separates each pair.

use std::cell::Cell;

/// Text buffer the filter observes and rewrites
pub trait Editable {
    /// Current content
    fn text(&self) -> String;

    /// Replace the whole content.
    ///
    /// Implementations may notify their change listeners synchronously, which
    /// can call back into [`HexInputFilter::after_text_changed`].
    fn replace(&mut self, text: &str);
}

/// Rewrites user edits into grouped uppercase hex
#[derive(Debug, Default)]
pub struct HexInputFilter {
    enabled: Cell<bool>,
    rewriting: Cell<bool>,
}

impl HexInputFilter {
    /// Create a disabled filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn normalization on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Whether normalization is on
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Canonical grouped form of `input`
    pub fn normalize(input: &str) -> String {
        let digits: Vec<char> = input
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let mut out = String::with_capacity(digits.len() * 3 / 2);
        for (i, pair) in digits.chunks(2).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.extend(pair);
        }
        out
    }

    /// React to an edit of `editable`.
    ///
    /// Returns true when the content was rewritten. Calls made while the
    /// filter's own rewrite is in progress are ignored.
    pub fn after_text_changed(&self, editable: &mut dyn Editable) -> bool {
        if !self.enabled.get() || self.rewriting.get() {
            return false;
        }

        let current = editable.text();
        let normalized = Self::normalize(&current);
        if normalized == current {
            return false;
        }

        self.rewriting.set(true);
        editable.replace(&normalized);
        self.rewriting.set(false);
        true
    }
}
