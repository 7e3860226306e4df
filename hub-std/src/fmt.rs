use std::fmt;

/// Displays a [`std::time::Duration`] in whole milliseconds, e.g. `152ms`.
pub struct DisplayMs(pub std::time::Duration);

impl fmt::Display for DisplayMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0.as_millis())
    }
}

/// Displays at most the first `N` chars of a string followed by `...`, e.g.
/// for abbreviating long node pubkeys.
pub struct DisplayPrefix<'a, const N: usize>(pub &'a str);

impl<const N: usize> fmt::Display for DisplayPrefix<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        match s.char_indices().nth(N) {
            Some((idx, _)) => write!(f, "{}...", &s[..idx]),
            None => write!(f, "{s}"),
        }
    }
}
