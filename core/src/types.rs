use std::fmt::Display;

/// Generated SQL statement text.
#[derive(Debug, Clone)]
pub struct Sql(String);

impl From<String> for Sql {
    fn from(value: String) -> Self {
        Sql(value)
    }
}

impl Display for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sql {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Sql {
    pub fn new(value: String) -> Self {
        Sql(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
