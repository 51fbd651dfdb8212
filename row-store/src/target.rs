//! Table targets and the allow-list that guards which ones may be touched.
//!
//! Table and column names end up inside PostgREST URLs, so each one must be a
//! plain SQL identifier. A request may only name a target tuple that was
//! configured ahead of time.

use std::fmt;

use crate::errors::StoreError;

/// Postgres truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENT_LEN: usize = 63;

/// Validated `(table, id column, text column, embedding column)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableTarget {
    table: String,
    id_column: String,
    text_column: String,
    embed_column: String,
}

impl TableTarget {
    /// Validates every name and builds the target.
    ///
    /// # Errors
    /// [`StoreError::InvalidIdentifier`] if any name is empty, too long, or
    /// contains anything other than ASCII letters, digits and `_`.
    pub fn new(
        table: impl Into<String>,
        id_column: impl Into<String>,
        text_column: impl Into<String>,
        embed_column: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let target = Self {
            table: table.into(),
            id_column: id_column.into(),
            text_column: text_column.into(),
            embed_column: embed_column.into(),
        };
        for name in [
            &target.table,
            &target.id_column,
            &target.text_column,
            &target.embed_column,
        ] {
            validate_identifier(name)?;
        }
        Ok(target)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn text_column(&self) -> &str {
        &self.text_column
    }

    pub fn embed_column(&self) -> &str {
        &self.embed_column
    }

    /// Compares against unvalidated names without allocating a target.
    pub fn matches(&self, table: &str, id_column: &str, text_column: &str, embed_column: &str) -> bool {
        self.table == table
            && self.id_column == id_column
            && self.text_column == text_column
            && self.embed_column == embed_column
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.table, self.id_column, self.text_column, self.embed_column
        )
    }
}

/// Checks that `name` is a plain, unquoted SQL identifier.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidIdentifier {
        value: name.to_owned(),
        reason,
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("must not be empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("must start with a letter or '_'"));
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ASCII letters, digits and '_' are allowed"));
    }
    if name.len() > MAX_IDENT_LEN {
        return Err(invalid("longer than 63 bytes"));
    }
    Ok(())
}

/// Fixed set of targets a caller may ask to backfill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAllowList {
    targets: Vec<TableTarget>,
}

impl TargetAllowList {
    /// Parses `table:id:text:embed` entries separated by commas.
    ///
    /// Whitespace around entries and names is ignored; empty entries are
    /// skipped.
    ///
    /// # Errors
    /// - [`StoreError::InvalidFormat`] if an entry does not have four parts or
    ///   the list ends up empty
    /// - [`StoreError::InvalidIdentifier`] if a name fails validation
    pub fn parse(var: &'static str, raw: &str) -> Result<Self, StoreError> {
        let mut targets = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [table, id, text, embed] = parts.as_slice() else {
                return Err(StoreError::InvalidFormat {
                    var,
                    reason: format!("expected table:id_column:text_column:embed_column, got '{entry}'"),
                });
            };
            let target = TableTarget::new(*table, *id, *text, *embed)?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if targets.is_empty() {
            return Err(StoreError::InvalidFormat {
                var,
                reason: "no targets configured".into(),
            });
        }
        Ok(Self { targets })
    }

    /// Returns the allowed target equal to the given names, if any.
    pub fn find(
        &self,
        table: &str,
        id_column: &str,
        text_column: &str,
        embed_column: &str,
    ) -> Option<&TableTarget> {
        self.targets
            .iter()
            .find(|t| t.matches(table, id_column, text_column, embed_column))
    }

    pub fn targets(&self) -> &[TableTarget] {
        &self.targets
    }
}
