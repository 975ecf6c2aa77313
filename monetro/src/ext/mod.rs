/// Quoting operation on protocol fields.
pub trait StrExt {
    /// Strip one pair of enclosing `'` or `"`.
    ///
    /// Returns [`None`] if the string is not quoted.
    fn strip_quotes(&self) -> Option<&str>;

    /// Same as [`strip_quotes`][StrExt::strip_quotes], returns self when not quoted.
    fn unquoted(&self) -> &str;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl StrExt for str {
    fn strip_quotes(&self) -> Option<&str> {
        let bytes = self.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(b'\''), Some(b'\'')) | (Some(b'"'), Some(b'"')) if bytes.len() >= 2 => {
                Some(&self[1..self.len() - 1])
            }
            _ => None,
        }
    }

    fn unquoted(&self) -> &str {
        self.strip_quotes().unwrap_or(self)
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
