/// One header line: the name exactly as it appeared on the wire, plus its
/// value with surrounding whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Insertion-ordered, case-insensitive, multi-valued header map.
///
/// Entries keep the order they were added in, so a response serializes
/// exactly the way it was built. Lookups compare names ASCII
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// First value recorded under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Appends an entry, keeping any existing ones with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header { name: name.into(), value: value.into() });
    }

    /// Replaces every entry named `name` with a single one holding `value`.
    /// The replacement takes the position of the first match.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|h| h.name.eq_ignore_ascii_case(&name)) {
            Some(first) => {
                self.entries[first] = Header { name, value };
                let keep = self.entries[first].name.clone();
                let mut index = first + 1;
                while index < self.entries.len() {
                    if self.entries[index].name.eq_ignore_ascii_case(&keep) {
                        self.entries.remove(index);
                    } else {
                        index += 1;
                    }
                }
            }
            None => self.entries.push(Header { name, value }),
        }
    }

    /// Replaces every entry named `name` with one comma-joined value list.
    pub fn set_multi(&mut self, name: impl Into<String>, values: &[String]) {
        self.set(name, values.join(", "));
    }

    /// Every value recorded under `name`, comma-split and trimmed, in order.
    /// `Connection: keep-alive, close` yields `["keep-alive", "close"]`.
    pub fn multi_values(&self, name: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .flat_map(|h| h.value.split(','))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
