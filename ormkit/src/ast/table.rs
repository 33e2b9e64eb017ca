use super::Column;

/// A table reference, optionally schema-qualified and aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub database: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// The name a column/join clause should qualify itself with: the alias
    /// if present, else the bare table name.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn column(&self, name: impl Into<String>) -> Column {
        Column::new(name).table(self.clone())
    }
}

impl From<&str> for Table {
    fn from(name: &str) -> Self {
        Table::new(name)
    }
}

impl From<String> for Table {
    fn from(name: String) -> Self {
        Table::new(name)
    }
}

impl From<&Table> for Table {
    fn from(t: &Table) -> Self {
        t.clone()
    }
}

impl From<(&str, &str)> for Table {
    fn from((database, name): (&str, &str)) -> Self {
        Table::new(name).database(database)
    }
}
