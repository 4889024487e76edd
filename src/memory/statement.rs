use std::sync::LazyLock;

use regex::Regex;

use crate::error::SqlSessionError;
use crate::types::RowValues;

/// MySQL's "syntax error" code, reported for anything the parser does not understand.
pub(crate) const UNSUPPORTED_STATEMENT: i32 = 1064;

const OPERAND: &str = r"(\?|'(?:[^']|'')*'|-?\d+(?:\.\d+)?|null|now\(\))";

static INSERT_SET: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*insert\s+into\s+`?(\w+)`?\s+set\s+(.+?)\s*;?\s*$")
});
static INSERT_VALUES: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*insert\s+into\s+`?(\w+)`?\s*\(([^)]*)\)\s*values\s*\((.*)\)\s*;?\s*$")
});
static SELECT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*select\s+\*\s+from\s+`?(\w+)`?(?:\s+where\s+(.+?))?(?:\s+limit\s+(\d+))?\s*;?\s*$")
});
static UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*update\s+`?(\w+)`?\s+set\s+(.+?)\s+where\s+(.+?)\s*;?\s*$")
});
static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\s*delete\s+from\s+`?(\w+)`?(?:\s+where\s+(.+?))?\s*;?\s*$")
});
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^\s*`?(\w+)`?\s*=\s*{OPERAND}\s*$")));
static COMPARE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(r"^\s*`?(\w+)`?\s*(<=|>=|<>|!=|=|<|>)\s*{OPERAND}\s*$"))
});
static LIKE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^\s*`?(\w+)`?\s+like\s+{OPERAND}\s*$")));
static IN_LIST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*`?(\w+)`?\s+in\s*\((.*)\)\s*$"));
static BARE_OPERAND: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^\s*{OPERAND}\s*$")));
static COLUMN: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*`?(\w+)`?\s*$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?is){pattern}")).expect("memory backend pattern")
}

/// A value position in a statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// `?`, filled from the bind values in text order.
    Param,
    Value(RowValues),
    /// `now()`
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        operand: Operand,
    },
    Like {
        column: String,
        operand: Operand,
    },
    In {
        column: String,
        operands: Vec<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedStatement {
    Insert {
        table: String,
        assignments: Vec<(String, Operand)>,
    },
    Select {
        table: String,
        condition: Option<Condition>,
        limit: Option<usize>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        condition: Condition,
    },
    Delete {
        table: String,
        condition: Option<Condition>,
    },
}

impl ParsedStatement {
    pub(crate) fn parse(sql: &str) -> Result<Self, SqlSessionError> {
        if let Some(caps) = INSERT_SET.captures(sql) {
            return Ok(ParsedStatement::Insert {
                table: caps[1].to_string(),
                assignments: parse_assignments(&caps[2], sql)?,
            });
        }
        if let Some(caps) = INSERT_VALUES.captures(sql) {
            let columns = split_top_level(&caps[2])
                .into_iter()
                .map(|c| {
                    COLUMN
                        .captures(c)
                        .map(|caps| caps[1].to_string())
                        .ok_or_else(|| unsupported(sql))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let operands = parse_operands(&caps[3], sql)?;
            if columns.len() != operands.len() {
                return Err(SqlSessionError::query(
                    1136,
                    "Column count doesn't match value count",
                ));
            }
            return Ok(ParsedStatement::Insert {
                table: caps[1].to_string(),
                assignments: columns.into_iter().zip(operands).collect(),
            });
        }
        if let Some(caps) = SELECT.captures(sql) {
            let condition = caps
                .get(2)
                .map(|m| parse_condition(m.as_str(), sql))
                .transpose()?;
            let limit = caps
                .get(3)
                .map(|m| m.as_str().parse::<usize>().map_err(|_| unsupported(sql)))
                .transpose()?;
            return Ok(ParsedStatement::Select {
                table: caps[1].to_string(),
                condition,
                limit,
            });
        }
        if let Some(caps) = UPDATE.captures(sql) {
            return Ok(ParsedStatement::Update {
                table: caps[1].to_string(),
                assignments: parse_assignments(&caps[2], sql)?,
                condition: parse_condition(&caps[3], sql)?,
            });
        }
        if let Some(caps) = DELETE.captures(sql) {
            let condition = caps
                .get(2)
                .map(|m| parse_condition(m.as_str(), sql))
                .transpose()?;
            return Ok(ParsedStatement::Delete {
                table: caps[1].to_string(),
                condition,
            });
        }
        Err(unsupported(sql))
    }

    /// Number of `?` operands, i.e. bind values the statement expects.
    pub(crate) fn param_count(&self) -> usize {
        match self {
            ParsedStatement::Insert { assignments, .. } => assignment_params(assignments),
            ParsedStatement::Select { condition, .. } | ParsedStatement::Delete { condition, .. } => {
                condition.as_ref().map_or(0, Condition::param_count)
            }
            ParsedStatement::Update {
                assignments,
                condition,
                ..
            } => assignment_params(assignments) + condition.param_count(),
        }
    }
}

fn assignment_params(assignments: &[(String, Operand)]) -> usize {
    assignments
        .iter()
        .filter(|(_, op)| *op == Operand::Param)
        .count()
}

impl Condition {
    fn param_count(&self) -> usize {
        match self {
            Condition::Compare { operand, .. } | Condition::Like { operand, .. } => {
                usize::from(*operand == Operand::Param)
            }
            Condition::In { operands, .. } => {
                operands.iter().filter(|op| **op == Operand::Param).count()
            }
        }
    }
}

fn unsupported(sql: &str) -> SqlSessionError {
    SqlSessionError::query(
        UNSUPPORTED_STATEMENT,
        format!("unsupported statement for the in-memory backend: {}", sql.trim()),
    )
}

fn parse_assignments(clause: &str, sql: &str) -> Result<Vec<(String, Operand)>, SqlSessionError> {
    split_top_level(clause)
        .into_iter()
        .map(|part| {
            let caps = ASSIGNMENT.captures(part).ok_or_else(|| unsupported(sql))?;
            Ok((caps[1].to_string(), parse_operand(&caps[2])))
        })
        .collect()
}

fn parse_operands(list: &str, sql: &str) -> Result<Vec<Operand>, SqlSessionError> {
    split_top_level(list)
        .into_iter()
        .map(|part| {
            BARE_OPERAND
                .captures(part)
                .map(|caps| parse_operand(&caps[1]))
                .ok_or_else(|| unsupported(sql))
        })
        .collect()
}

fn parse_condition(clause: &str, sql: &str) -> Result<Condition, SqlSessionError> {
    if let Some(caps) = COMPARE.captures(clause) {
        let op = match &caps[2] {
            "=" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::NotEq,
            "<" => CompareOp::Lt,
            ">" => CompareOp::Gt,
            "<=" => CompareOp::LtEq,
            _ => CompareOp::GtEq,
        };
        return Ok(Condition::Compare {
            column: caps[1].to_string(),
            op,
            operand: parse_operand(&caps[3]),
        });
    }
    if let Some(caps) = LIKE.captures(clause) {
        return Ok(Condition::Like {
            column: caps[1].to_string(),
            operand: parse_operand(&caps[2]),
        });
    }
    if let Some(caps) = IN_LIST.captures(clause) {
        return Ok(Condition::In {
            column: caps[1].to_string(),
            operands: parse_operands(&caps[2], sql)?,
        });
    }
    Err(unsupported(sql))
}

fn parse_operand(token: &str) -> Operand {
    let token = token.trim();
    if token == "?" {
        Operand::Param
    } else if token.eq_ignore_ascii_case("now()") {
        Operand::Now
    } else if token.eq_ignore_ascii_case("null") {
        Operand::Value(RowValues::Null)
    } else if let Some(quoted) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Operand::Value(RowValues::Text(quoted.replace("''", "'")))
    } else if let Ok(i) = token.parse::<i64>() {
        Operand::Value(RowValues::Int(i))
    } else if let Ok(f) = token.parse::<f64>() {
        Operand::Value(RowValues::Float(f))
    } else {
        Operand::Value(RowValues::Text(token.to_string()))
    }
}

/// Split on commas that are outside quotes and parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (idx, ch) in list.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_set_with_now() {
        let stmt = ParsedStatement::parse("INSERT INTO `tmp` SET `t_id`=?, `t_datetime`= now();").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::Insert {
                table: "tmp".into(),
                assignments: vec![("t_id".into(), Operand::Param), ("t_datetime".into(), Operand::Now)],
            }
        );
        assert_eq!(stmt.param_count(), 1);
    }

    #[test]
    fn parses_insert_values() {
        let stmt = ParsedStatement::parse("insert into users (id, name) values (?, 'it''s, fine')").unwrap();
        let ParsedStatement::Insert { assignments, .. } = stmt else {
            panic!("expected insert");
        };
        assert_eq!(assignments[1].1, Operand::Value(RowValues::Text("it's, fine".into())));
    }

    #[test]
    fn parses_select_where_and_limit() {
        let stmt = ParsedStatement::parse("SELECT * FROM `t` WHERE t_id > ? LIMIT 2").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::Select {
                table: "t".into(),
                condition: Some(Condition::Compare {
                    column: "t_id".into(),
                    op: CompareOp::Gt,
                    operand: Operand::Param,
                }),
                limit: Some(2),
            }
        );
    }

    #[test]
    fn parses_in_and_like() {
        let stmt = ParsedStatement::parse("SELECT * FROM users WHERE id IN (?, ?, 3)").unwrap();
        assert_eq!(stmt.param_count(), 2);
        let stmt = ParsedStatement::parse("select * from users where name like 'J%'").unwrap();
        assert_eq!(stmt.param_count(), 0);
    }

    #[test]
    fn parses_update_and_delete() {
        let stmt = ParsedStatement::parse("UPDATE users SET name = ?, active = 1 WHERE id = ?").unwrap();
        assert_eq!(stmt.param_count(), 2);
        let stmt = ParsedStatement::parse("DELETE FROM users").unwrap();
        assert_eq!(stmt.param_count(), 0);
    }

    #[test]
    fn rejects_unknown_sql() {
        let err = ParsedStatement::parse("CREATE TABLE t (id INT)").unwrap_err();
        assert_eq!(err.code(), Some(UNSUPPORTED_STATEMENT));
    }
}
