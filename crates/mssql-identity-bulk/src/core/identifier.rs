//! Identifier validation and quoting for generated SQL Server batches.
//!
//! Table and column names cannot be passed as statement parameters, and the
//! staging batches must run as plain batches (parameterized statements run
//! inside `sp_executesql`, which drops session temp tables on return). Every
//! name embedded in generated SQL therefore goes through this module:
//!
//! 1. Validate identifiers for suspicious patterns (null bytes, excessive length)
//! 2. Bracket-quote identifiers, doubling any closing bracket
//! 3. Emit string literals as `N'...'`, doubling any single quote

use crate::error::{BulkCopyError, Result};

/// SQL Server identifier limit (sysname).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Longest stem kept for a temp table name. SQL Server caps local temp
/// table names at 116 characters including the `#` and suffix.
const MAX_TEMP_STEM_LENGTH: usize = 100;

/// Suffix of the holding table that receives the bulk copy.
pub const HOLDING_SUFFIX: &str = "TB";

/// Suffix of the retrieval table that captures generated identities.
pub const RETRIEVAL_SUFFIX: &str = "TR";

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding 128 characters
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BulkCopyError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(BulkCopyError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(BulkCopyError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// ```
/// use mssql_identity_bulk::core::identifier::quote_mssql;
///
/// assert_eq!(quote_mssql("users").unwrap(), "[users]");
/// assert_eq!(quote_mssql("table]name").unwrap(), "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Render a Unicode string literal.
pub fn sql_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// A one- to three-part object name (`[database.][schema.]object`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    parts: Vec<String>,
}

impl ObjectName {
    /// Parse a possibly bracket-quoted, dot-separated object name.
    ///
    /// `dbo.Widget`, `[dbo].[Widget]` and `[odd.name]` are all accepted;
    /// inside brackets `]]` stands for a literal `]`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = input.chars().peekable();
        let mut quoted_part = false;

        while let Some(c) = chars.next() {
            match c {
                '[' if current.is_empty() && !quoted_part => {
                    quoted_part = true;
                    loop {
                        match chars.next() {
                            Some(']') if chars.peek() == Some(&']') => {
                                chars.next();
                                current.push(']');
                            }
                            Some(']') => break,
                            Some(other) => current.push(other),
                            None => {
                                return Err(BulkCopyError::Config(format!(
                                    "Unterminated bracket in object name {:?}",
                                    input
                                )))
                            }
                        }
                    }
                }
                '.' => {
                    parts.push(std::mem::take(&mut current));
                    quoted_part = false;
                }
                _ if quoted_part => {
                    return Err(BulkCopyError::Config(format!(
                        "Unexpected {:?} after quoted part in object name {:?}",
                        c, input
                    )));
                }
                _ => current.push(c),
            }
        }
        parts.push(current);

        if parts.len() > 3 {
            return Err(BulkCopyError::Config(format!(
                "Object name {:?} has more than three parts",
                input
            )));
        }
        for part in &parts {
            validate_identifier(part)?;
        }

        Ok(Self { parts })
    }

    /// The unqualified object name.
    pub fn object(&self) -> &str {
        // parse guarantees at least one part
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Name parts from outermost to innermost.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Bracket-quoted, dot-joined form, e.g. `[dbo].[Widget]`.
    pub fn quoted(&self) -> String {
        self.parts
            .iter()
            .map(|p| format!("[{}]", p.replace(']', "]]")))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A session-scoped (`#`) temporary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempTable {
    name: String,
}

impl TempTable {
    /// Derive a temp table name from a stem plus a fixed suffix.
    ///
    /// Characters outside `[A-Za-z0-9_]` become `_` so the name needs no
    /// escaping anywhere it is embedded.
    pub fn derive(stem: &str, suffix: &str) -> Self {
        let cleaned: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_TEMP_STEM_LENGTH)
            .collect();
        Self {
            name: format!("#{}{}", cleaned, suffix),
        }
    }

    /// Holding and retrieval tables for a stem.
    pub fn pair(stem: &str) -> (Self, Self) {
        (
            Self::derive(stem, HOLDING_SUFFIX),
            Self::derive(stem, RETRIEVAL_SUFFIX),
        )
    }

    /// Raw name including the leading `#`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bracket-quoted name.
    pub fn quoted(&self) -> String {
        format!("[{}]", self.name)
    }

    /// Drop statement that succeeds whether or not the table exists.
    pub fn drop_if_exists(&self) -> String {
        format!(
            "IF OBJECT_ID(N'tempdb..{}', N'U') IS NOT NULL DROP TABLE {};",
            self.name,
            self.quoted()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("Widget").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_mssql() {
        assert_eq!(quote_mssql("Qty").unwrap(), "[Qty]");
        assert_eq!(quote_mssql("a]; DROP TABLE x--").unwrap(), "[a]]; DROP TABLE x--]");
    }

    #[test]
    fn test_sql_literal() {
        assert_eq!(sql_literal("Widget"), "N'Widget'");
        assert_eq!(sql_literal("O'Brien"), "N'O''Brien'");
    }

    #[test]
    fn test_parse_object_name() {
        let name = ObjectName::parse("Widget").unwrap();
        assert_eq!(name.object(), "Widget");
        assert_eq!(name.quoted(), "[Widget]");

        let name = ObjectName::parse("dbo.Widget").unwrap();
        assert_eq!(name.parts(), ["dbo", "Widget"]);
        assert_eq!(name.quoted(), "[dbo].[Widget]");

        let name = ObjectName::parse("[inv].[dbo].[odd.name]]x]").unwrap();
        assert_eq!(name.parts(), ["inv", "dbo", "odd.name]x"]);
        assert_eq!(name.quoted(), "[inv].[dbo].[odd.name]]x]");
    }

    #[test]
    fn test_parse_object_name_rejects() {
        assert!(ObjectName::parse("").is_err());
        assert!(ObjectName::parse("dbo.").is_err());
        assert!(ObjectName::parse("a.b.c.d").is_err());
        assert!(ObjectName::parse("[dbo").is_err());
        assert!(ObjectName::parse("[dbo]x.Widget").is_err());
    }

    #[test]
    fn test_temp_table_names() {
        let (holding, retrieval) = TempTable::pair("Widget");
        assert_eq!(holding.name(), "#WidgetTB");
        assert_eq!(retrieval.name(), "#WidgetTR");
        assert_eq!(holding.quoted(), "[#WidgetTB]");

        let odd = TempTable::derive("Order Lines'; --", HOLDING_SUFFIX);
        assert_eq!(odd.name(), "#Order_Lines_____TB");

        let long = TempTable::derive(&"w".repeat(300), RETRIEVAL_SUFFIX);
        assert_eq!(long.name().len(), 1 + MAX_TEMP_STEM_LENGTH + 2);
    }

    #[test]
    fn test_drop_if_exists() {
        let table = TempTable::derive("Widget", HOLDING_SUFFIX);
        assert_eq!(
            table.drop_if_exists(),
            "IF OBJECT_ID(N'tempdb..#WidgetTB', N'U') IS NOT NULL DROP TABLE [#WidgetTB];"
        );
    }
}
