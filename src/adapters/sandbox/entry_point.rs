use regex::Regex;

/// Static check for a function definition before anything is executed.
#[derive(Debug, Clone)]
pub struct EntryPointLocator {
    name: String,
    pattern: Regex,
}

impl EntryPointLocator {
    pub fn new(name: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+{}[ \t]*\(", regex::escape(name)))?;
        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when `code` contains a `def <name>(` line.
    pub fn is_defined(&self, code: &str) -> bool {
        self.pattern.is_match(code)
    }
}
