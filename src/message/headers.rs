use std::fmt::Write as _;

/// Insertion-ordered, case-insensitive, multi-valued header map.
///
/// Names are stored lowercased; each name keeps its values in insertion
/// order, and names themselves stay in first-insertion order. Repeated
/// headers (multiple `Set-Cookie` lines) accumulate under one name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First stored value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All stored values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.entry(name).map(Vec::as_slice)
    }

    /// Replace all values for `name` with the single `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => {
                values.clear();
                values.push(value);
            }
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Append `value` to the list for `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Remove `name` and all of its values.
    pub fn remove(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        self.entries.retain(|(n, _)| *n != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs, one pair per stored value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(n, vs)| vs.iter().map(move |v| (n.as_str(), v.as_str())))
    }

    /// Parse a block of `name: value` lines. Each line splits on the first
    /// `:`; name and value are trimmed and the value pushed under the
    /// lowercased name. A line with no `:` stores an empty value under the
    /// whole trimmed line.
    pub fn parse_block(&mut self, block: &str) {
        for line in block.split("\r\n") {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.find(':') {
                Some(idx) => {
                    self.add(line[..idx].trim(), line[idx + 1..].trim());
                }
                None => self.add(line, ""),
            }
        }
    }

    /// Render as wire lines, one `name: value\r\n` per stored value.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.iter() {
            let _ = write!(out, "{name}: {value}\r\n");
        }
        out
    }

    fn entry(&self, name: &str) -> Option<&Vec<String>> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, vs)| vs)
    }
}
