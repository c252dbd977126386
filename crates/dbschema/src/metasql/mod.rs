//! Externalized metadata queries.
//!
//! Each dialect keeps its introspection SQL in a text file compiled into the
//! binary. A file holds blocks separated by dashed lines; each block starts
//! with `--KEY description`. Queries are addressed by (file, key).
//!
//! Templates support just enough substitution to parameterize them:
//! `{{name}}` is replaced by the value of `name`, and
//! `{{#if name}} ... {{/if}}` keeps its body only when `name` is non-empty.
//! Values substituted here are placeholder lists, never user data.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DbError, Result};

/// Metadata query file of one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaFile {
    Mysql,
    Mssql,
}

impl MetaFile {
    pub fn path(&self) -> &'static str {
        match self {
            MetaFile::Mysql => "metasql/mysql_meta.sql",
            MetaFile::Mssql => "metasql/mssql_meta.sql",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            MetaFile::Mysql => include_str!("mysql_meta.sql"),
            MetaFile::Mssql => include_str!("mssql_meta.sql"),
        }
    }
}

static QUERIES: LazyLock<HashMap<MetaFile, HashMap<String, String>>> = LazyLock::new(|| {
    [MetaFile::Mysql, MetaFile::Mssql]
        .into_iter()
        .map(|f| (f, parse_blocks(f.source())))
        .collect()
});

static IF_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{#if\s+(\w+)\s*\}\}(.*?)\{\{/if\}\}").expect("valid if-block pattern")
});

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid variable pattern"));

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

/// Split a query file into key → SQL.
fn parse_blocks(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut key: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    let mut flush = |key: &mut Option<String>, body: &mut Vec<&str>| {
        if let Some(k) = key.take() {
            out.insert(k, body.join("\n").trim().to_string());
        }
        body.clear();
    };

    for line in text.lines() {
        if is_separator(line) {
            flush(&mut key, &mut body);
            continue;
        }
        if key.is_none() {
            if let Some(header) = line.trim().strip_prefix("--") {
                if let Some(k) = header.split_whitespace().next() {
                    key = Some(k.to_string());
                }
            }
            continue;
        }
        body.push(line);
    }
    flush(&mut key, &mut body);
    out
}

/// Look up a query by key.
pub fn get_sql(file: MetaFile, key: &str) -> Result<&'static str> {
    QUERIES
        .get(&file)
        .and_then(|m| m.get(key))
        .map(String::as_str)
        .ok_or_else(|| DbError::MetaSql {
            file: file.path().to_string(),
            key: key.to_string(),
        })
}

/// Render a template with the given variables.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let lookup = |name: &str| -> &str {
        vars.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .unwrap_or("")
    };

    let conditioned = IF_BLOCK.replace_all(template, |caps: &regex::Captures<'_>| {
        if lookup(&caps[1]).is_empty() {
            String::new()
        } else {
            caps[2].to_string()
        }
    });

    VARIABLE
        .replace_all(&conditioned, |caps: &regex::Captures<'_>| lookup(&caps[1]).to_string())
        .into_owned()
}

/// Look up and render in one step.
pub fn get_rendered(file: MetaFile, key: &str, vars: &[(&str, &str)]) -> Result<String> {
    Ok(render(get_sql(file, key)?, vars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks() {
        let text = "--A first\nSELECT 1\n-----\n--B second one\nSELECT 2\nFROM t\n";
        let blocks = parse_blocks(text);
        assert_eq!(blocks["A"], "SELECT 1");
        assert_eq!(blocks["B"], "SELECT 2\nFROM t");
    }

    #[test]
    fn test_all_keys_present() {
        for key in ["MYSQL_DBS", "MYSQL_TABLE_INFO", "MYSQL_INDEX_INFO", "MYSQL_COLUMN_MA"] {
            assert!(get_sql(MetaFile::Mysql, key).is_ok(), "{}", key);
        }
        for key in [
            "MSSQL_DBS",
            "MSSQL_DB_SCHEMAS",
            "MSSQL_TABLE_INFO",
            "MSSQL_COLUMN_MA",
            "MSSQL_INDEX_INFO",
        ] {
            assert!(get_sql(MetaFile::Mssql, key).is_ok(), "{}", key);
        }
    }

    #[test]
    fn test_unknown_key() {
        let err = get_sql(MetaFile::Mysql, "NOPE").unwrap_err();
        assert!(matches!(err, DbError::MetaSql { ref key, .. } if key == "NOPE"));
    }

    #[test]
    fn test_render_if_block() {
        let tpl = "SELECT * FROM t WHERE a = 1{{#if names}} AND n IN ({{names}}){{/if}}";
        assert_eq!(render(tpl, &[]), "SELECT * FROM t WHERE a = 1");
        assert_eq!(
            render(tpl, &[("names", "?, ?")]),
            "SELECT * FROM t WHERE a = 1 AND n IN (?, ?)"
        );
    }

    #[test]
    fn test_rendered_table_info_without_names() {
        let sql = get_rendered(MetaFile::Mysql, "MYSQL_TABLE_INFO", &[]).unwrap();
        assert!(!sql.contains("{{"));
        assert!(!sql.contains("table_name IN"));
    }
}
