//! Index expression parser and builder.
//!
//! Collections keep their indexes as raw `CREATE INDEX` expressions. This
//! module parses them into an [`IndexDescriptor`] so the engine can retarget
//! them at the current table name, and re-serializes them to SQL.

use std::collections::HashSet;
use std::sync::LazyLock;

use oxide_collections::Collection;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dialect::quote_identifier;
use crate::error::{ValidationError, ValidationErrors};
use crate::operations::TableOperation;

static INDEX_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*create\s+(unique\s+)?index\s+(if\s+not\s+exists\s+)?(\S+?)\s+on\s+([^\s(]+)\s*\((.*)$",
    )
    .expect("valid index regex")
});

static INDEX_COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(.+?)(?:\s+collate\s+(\w+))?(?:\s+(asc|desc))?$")
        .expect("valid index column regex")
});

static WHERE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^where\s+(.+?)\s*;?\s*$").expect("valid where regex"));

/// One indexed column or expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name or expression.
    pub name: String,
    /// Optional collating sequence.
    pub collate: Option<String>,
    /// Optional `ASC`/`DESC` sort order (upper case).
    pub sort: Option<String>,
}

impl IndexColumn {
    /// Creates a plain column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns whether the column is an expression rather than a name.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        self.name.contains('(') || self.name.contains(' ')
    }
}

/// Parsed form of a `CREATE INDEX` expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub unique: bool,
    pub if_not_exists: bool,
    pub schema_name: Option<String>,
    pub index_name: String,
    pub table_name: String,
    pub columns: Vec<IndexColumn>,
    /// Partial index condition.
    pub condition: Option<String>,
}

impl IndexDescriptor {
    /// Creates an index on `table` over plain `columns`.
    pub fn new(name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            index_name: name.into(),
            table_name: table.into(),
            columns: columns.iter().map(|c| IndexColumn::new(*c)).collect(),
            ..Self::default()
        }
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a partial index condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Parses a raw index expression.
    ///
    /// Never fails: an expression that doesn't have the expected shape yields
    /// a descriptor for which [`is_valid`](Self::is_valid) returns `false`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let Some(caps) = INDEX_HEAD_RE.captures(raw) else {
            return Self::default();
        };

        let Some((columns_part, rest)) = split_closing_paren(&caps[5]) else {
            return Self::default();
        };

        let rest = rest.trim();
        let condition = if rest.is_empty() || rest == ";" {
            None
        } else if let Some(where_caps) = WHERE_RE.captures(rest) {
            Some(where_caps[1].to_string())
        } else {
            return Self::default();
        };

        let (schema_name, index_name) = match caps[3].split_once('.') {
            Some((schema, name)) => (Some(trim_identifier(schema)), trim_identifier(name)),
            None => (None, trim_identifier(&caps[3])),
        };

        let columns = split_top_level(columns_part)
            .into_iter()
            .filter_map(|part| parse_column(&part))
            .collect();

        Self {
            unique: caps.get(1).is_some(),
            if_not_exists: caps.get(2).is_some(),
            schema_name,
            index_name,
            table_name: trim_identifier(&caps[4]),
            columns,
            condition,
        }
    }

    /// Returns whether the descriptor has a name, a table and at least one column.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.index_name.is_empty() && !self.table_name.is_empty() && !self.columns.is_empty()
    }

    /// Builds the `CREATE INDEX` statement.
    ///
    /// Returns an empty string for an invalid descriptor.
    #[must_use]
    pub fn build(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }

        let mut sql = String::from("CREATE ");
        if self.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        if let Some(schema) = &self.schema_name {
            sql.push_str(&quote_identifier(schema));
            sql.push('.');
        }
        sql.push_str(&quote_identifier(&self.index_name));
        sql.push_str(" ON ");
        sql.push_str(&quote_identifier(&self.table_name));
        sql.push_str(" (");

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let mut part = if col.is_expression() {
                    col.name.clone()
                } else {
                    quote_identifier(&col.name)
                };
                if let Some(collate) = &col.collate {
                    part.push_str(" COLLATE ");
                    part.push_str(collate);
                }
                if let Some(sort) = &col.sort {
                    part.push(' ');
                    part.push_str(sort);
                }
                part
            })
            .collect();
        sql.push_str(&columns.join(", "));
        sql.push(')');

        if let Some(condition) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }

        sql
    }
}

/// Plans the (re)creation of every index of `collection`.
///
/// All valid index names are dropped first (`IF EXISTS`), so the same list
/// can be applied any number of times. Each parsed index is retargeted at the
/// collection's current table name. Unparseable expressions and repeated
/// index names are skipped and reported by their position in the list.
#[must_use]
pub fn build_indexes(collection: &Collection) -> (Vec<TableOperation>, ValidationErrors) {
    let mut errors = ValidationErrors::new();
    if collection.is_view() {
        return (Vec::new(), errors);
    }

    let parsed: Vec<IndexDescriptor> = collection
        .indexes
        .iter()
        .map(|raw| {
            let mut index = IndexDescriptor::parse(raw);
            index.table_name.clone_from(&collection.name);
            index
        })
        .collect();

    let mut dropped = HashSet::new();
    let mut operations: Vec<TableOperation> = parsed
        .iter()
        .filter(|index| index.is_valid() && dropped.insert(index.index_name.to_lowercase()))
        .map(|index| TableOperation::drop_index(&index.index_name))
        .collect();

    let mut seen = HashSet::new();
    for (position, index) in parsed.into_iter().enumerate() {
        if !index.is_valid() {
            errors.add(
                position,
                ValidationError::new(
                    ValidationError::INVALID_INDEX,
                    "Invalid CREATE INDEX expression.",
                ),
            );
            continue;
        }

        if !seen.insert(index.index_name.to_lowercase()) {
            errors.add(
                position,
                ValidationError::new(
                    ValidationError::DUPLICATED_INDEX,
                    format!("Duplicated index name {}.", index.index_name),
                ),
            );
            continue;
        }

        operations.push(TableOperation::CreateIndex {
            position: Some(position),
            index,
        });
    }

    (operations, errors)
}

fn parse_column(part: &str) -> Option<IndexColumn> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }
    let caps = INDEX_COLUMN_RE.captures(part)?;
    let name = caps[1].trim();
    let column = IndexColumn {
        name: if name.contains('(') || name.contains(' ') {
            name.to_string()
        } else {
            trim_identifier(name)
        },
        collate: caps.get(2).map(|m| m.as_str().to_string()),
        sort: caps.get(3).map(|m| m.as_str().to_uppercase()),
    };
    (!column.name.is_empty()).then_some(column)
}

/// Strips identifier quotes (`"x"`, `` `x` ``, `[x]`, `'x'`).
fn trim_identifier(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '`' | '\'' | '[' | ']'))
        .to_string()
}

/// Splits `input` at the `)` closing an already opened `(`, honouring nested
/// parentheses and quoted sections.
fn split_closing_paren(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') if depth == 0 => return Some((&input[..i], &input[i + 1..])),
            (None, ')') => depth -= 1,
            _ => {}
        }
    }

    None
}

/// Splits a column list on top level commas.
fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let idx = IndexDescriptor::parse("CREATE INDEX idx_title ON posts (title)");
        assert!(idx.is_valid());
        assert!(!idx.unique);
        assert_eq!(idx.index_name, "idx_title");
        assert_eq!(idx.table_name, "posts");
        assert_eq!(idx.columns, vec![IndexColumn::new("title")]);
        assert_eq!(idx.condition, None);
    }

    #[test]
    fn test_parse_full() {
        let idx = IndexDescriptor::parse(
            "create unique index if not exists main.`idx_x` on [posts] \
             (\"title\" collate nocase desc, lower(body), created ASC) where status != 'draft';",
        );
        assert!(idx.is_valid());
        assert!(idx.unique);
        assert!(idx.if_not_exists);
        assert_eq!(idx.schema_name.as_deref(), Some("main"));
        assert_eq!(idx.index_name, "idx_x");
        assert_eq!(idx.table_name, "posts");
        assert_eq!(idx.columns.len(), 3);
        assert_eq!(idx.columns[0].collate.as_deref(), Some("nocase"));
        assert_eq!(idx.columns[0].sort.as_deref(), Some("DESC"));
        assert_eq!(idx.columns[1].name, "lower(body)");
        assert!(idx.columns[1].is_expression());
        assert_eq!(idx.columns[2].sort.as_deref(), Some("ASC"));
        assert_eq!(idx.condition.as_deref(), Some("status != 'draft'"));
    }

    #[test]
    fn test_parse_condition_with_parens() {
        let idx = IndexDescriptor::parse(
            "CREATE INDEX idx_a ON t (a, coalesce(b, '')) WHERE (a > 1 AND b != '')",
        );
        assert!(idx.is_valid());
        assert_eq!(idx.columns.len(), 2);
        assert_eq!(idx.condition.as_deref(), Some("(a > 1 AND b != '')"));
    }

    #[test]
    fn test_parse_invalid() {
        for raw in [
            "",
            "invalid",
            "CREATE INDEX ON posts (title)",
            "CREATE INDEX idx ON posts",
            "CREATE INDEX idx ON posts ()",
            "CREATE INDEX idx ON posts (title",
            "CREATE INDEX idx ON posts (title) garbage",
            "CREATE TABLE posts (title)",
        ] {
            assert!(!IndexDescriptor::parse(raw).is_valid(), "{raw:?} should be invalid");
        }
    }

    #[test]
    fn test_build() {
        let mut idx = IndexDescriptor::parse(
            "CREATE UNIQUE INDEX idx_title ON old_posts (title COLLATE NOCASE, lower(body) DESC) WHERE title != ''",
        );
        idx.table_name = "posts".to_string();

        assert_eq!(
            idx.build(),
            "CREATE UNIQUE INDEX \"idx_title\" ON \"posts\" (\"title\" COLLATE NOCASE, lower(body) DESC) WHERE title != ''"
        );
    }

    #[test]
    fn test_build_invalid_is_empty() {
        assert_eq!(IndexDescriptor::parse("nope").build(), "");
    }

    #[test]
    fn test_build_indexes_retargets_table() {
        let mut posts = Collection::new("posts0", "articles")
            .index("CREATE INDEX idx_title ON posts (title)");
        posts.indexes.push("CREATE UNIQUE INDEX idx_slug ON whatever (slug)".to_string());

        let (ops, errors) = build_indexes(&posts);
        assert!(errors.is_empty());
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], TableOperation::drop_index("idx_title"));
        assert_eq!(ops[1], TableOperation::drop_index("idx_slug"));
        for op in &ops[2..] {
            let TableOperation::CreateIndex { index, .. } = op else {
                panic!("expected create index, got {op:?}");
            };
            assert_eq!(index.table_name, "articles");
        }
    }

    #[test]
    fn test_build_indexes_reports_by_position() {
        let posts = Collection::new("posts0", "posts")
            .index("CREATE INDEX idx_a ON posts (a)")
            .index("CREATE INDEX broken")
            .index("CREATE INDEX idx_b ON posts (b)")
            .index("CREATE INDEX IDX_A ON posts (c)");

        let (ops, errors) = build_indexes(&posts);
        assert_eq!(errors.positions(), vec![1, 3]);
        assert_eq!(
            errors.get(1).unwrap().code,
            ValidationError::INVALID_INDEX
        );
        assert_eq!(
            errors.get(3).unwrap().code,
            ValidationError::DUPLICATED_INDEX
        );

        let created: Vec<Option<usize>> = ops
            .iter()
            .filter_map(|op| match op {
                TableOperation::CreateIndex { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![Some(0), Some(2)]);
    }

    #[test]
    fn test_build_indexes_view() {
        let view = Collection::new("v0", "v")
            .with_type(oxide_collections::CollectionType::View)
            .index("CREATE INDEX idx_a ON v (a)");
        let (ops, errors) = build_indexes(&view);
        assert!(ops.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_build_reparses_to_same_descriptor() {
        let idx = IndexDescriptor::new("idx_email", "users", &["email"])
            .unique()
            .condition("email != ''");
        assert_eq!(IndexDescriptor::parse(&idx.build()), idx);
    }
}
