mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::CustomDbRow;

/// What a backend returns for one executed statement.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// A row-returning statement, fully materialized.
    Rows(ResultSet),
    /// A statement that returns no rows, with the number of rows it changed.
    Affected(usize),
}

impl QueryOutcome {
    /// Rows of a `Rows` outcome, or `None` for DML.
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Rows(rs) => Some(rs),
            QueryOutcome::Affected(_) => None,
        }
    }

    /// The result set, or `None` for an affected-row count.
    #[must_use]
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryOutcome::Rows(rs) => Some(rs),
            QueryOutcome::Affected(_) => None,
        }
    }

    /// Rows changed by DML; a row-returning statement reports 0.
    #[must_use]
    pub fn affected(&self) -> usize {
        match self {
            QueryOutcome::Rows(_) => 0,
            QueryOutcome::Affected(n) => *n,
        }
    }
}
