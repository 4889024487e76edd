use sql_session::prelude::*;
use sql_session::standard_escape;

fn literal_session() -> Result<Session<MemoryBackend>, SqlSessionError> {
    let mut backend = MemoryBackend::without_native_binding();
    backend.seed(
        "users",
        vec![
            vec![("id", RowValues::Int(1)), ("name", RowValues::from("John"))],
            vec![("id", RowValues::Int(2)), ("name", RowValues::from("Jane"))],
            vec![("id", RowValues::Int(3)), ("name", RowValues::from("Bob"))],
        ],
    );
    Session::with_backend(backend, SessionOptions::default())
}

#[test]
fn auto_mode_inlines_when_the_backend_cannot_bind() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    let sql = "SELECT * FROM users WHERE id > ?";
    let mut names = Vec::new();
    while let Some(row) = db.fetch(sql, vec![RowValues::Int(1)])? {
        names.push(row.get("name").and_then(RowValues::as_text).unwrap().to_owned());
    }
    assert_eq!(names, vec!["Jane", "Bob"]);
    assert_eq!(db.backend().prepare_count(), 0);
    assert_eq!(
        db.backend().executed_sql(),
        &["SELECT * FROM users WHERE id > '1'".to_string()]
    );
    Ok(())
}

#[test]
fn quotes_are_doubled_and_percent_survives() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    db.query(
        "INSERT INTO users SET id = ?, name = ?, note = '100%'",
        vec![RowValues::Int(4), RowValues::from("O'Reilly")],
    )?;
    let executed = db.backend().executed_sql().last().cloned().unwrap();
    assert_eq!(
        executed,
        "INSERT INTO users SET id = '4', name = 'O''Reilly', note = '100%'"
    );

    let row = db
        .fetch_one("SELECT * FROM users WHERE name = :name", NamedParams::new().with("name", "O'Reilly"))?
        .expect("inserted row");
    assert_eq!(row.get("note"), Some(&RowValues::from("100%")));
    Ok(())
}

#[test]
fn raw_placeholder_is_unquoted() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    let rows = db.fetch_all(
        "SELECT * FROM users WHERE id IN (??, ??) LIMIT ??",
        vec![RowValues::Int(1), RowValues::Int(3), RowValues::Int(5)],
    )?;
    assert_eq!(rows.len(), 2);
    assert_eq!(
        db.backend().executed_sql().last().map(String::as_str),
        Some("SELECT * FROM users WHERE id IN (1, 3) LIMIT 5")
    );
    Ok(())
}

#[test]
fn missing_names_and_values_become_empty_strings() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    let rows = db.fetch_all("SELECT * FROM users WHERE name = :nobody", NamedParams::new())?;
    assert!(rows.is_empty());
    assert_eq!(
        db.backend().executed_sql().last().map(String::as_str),
        Some("SELECT * FROM users WHERE name = ''")
    );

    db.fetch_all("SELECT * FROM users WHERE name = ?", ())?;
    assert_eq!(
        db.backend().executed_sql().last().map(String::as_str),
        Some("SELECT * FROM users WHERE name = ''")
    );
    Ok(())
}

#[test]
fn positional_count_mismatch_is_invalid_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    let err = db
        .query("SELECT * FROM users WHERE id = ?", vec![RowValues::Int(1), RowValues::Int(2)])
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));
    assert!(db.backend().executed_sql().is_empty());
    Ok(())
}

#[test]
fn forcing_native_mode_on_a_literal_backend_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Session::with_backend(
        MemoryBackend::without_native_binding(),
        SessionOptions::default().with_binding_mode(BindingMode::Native),
    )?;
    let err = db.query("SELECT * FROM users WHERE id = ?", vec![RowValues::Int(1)]).unwrap_err();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));
    Ok(())
}

#[test]
fn literal_mode_can_be_forced_on_a_binding_backend() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = MemoryBackend::new();
    backend.seed("t", vec![vec![("id", RowValues::Int(7))]]);
    let mut db = Session::with_backend(
        backend,
        SessionOptions::default().with_binding_mode(BindingMode::Literal),
    )?;
    assert_eq!(db.binding_mode(), BindingMode::Literal);
    let row = db.fetch_one("SELECT * FROM t WHERE id = ?", vec![RowValues::Int(7)])?;
    assert!(row.is_some());
    assert_eq!(db.cached_statement_count(), 0);
    assert_eq!(db.backend().prepare_count(), 0);
    Ok(())
}

#[test]
fn hand_built_clauses_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = literal_session()?;
    let changes = NamedParams::new().with("name", "D'Arcy").with("0", "ignored");
    let sql = format!("UPDATE users SET {} WHERE id = 2", db.set_clause(&changes).join(", "));
    assert_eq!(db.query(&sql, ())?.affected(), 1);

    let ids = db.quote_list(&[RowValues::Int(2), RowValues::Int(3)]).join(", ");
    let rows = db.fetch_all(&format!("SELECT * FROM users WHERE id IN ({ids})"), ())?;
    let names: Vec<_> = rows.iter().filter_map(|r| r.get("name").cloned()).collect();
    assert_eq!(names, vec![RowValues::from("D'Arcy"), RowValues::from("Bob")]);
    assert_eq!(db.escape_values(&[RowValues::from("D'Arcy")]), vec!["D''Arcy"]);
    Ok(())
}

/// Accepts anything, records the SQL it is handed and treats backslashes as MySQL does.
#[derive(Default)]
struct BackslashBackend {
    seen: Vec<(String, Vec<RowValues>)>,
}

impl Backend for BackslashBackend {
    type Statement = String;

    fn connect(_options: &ConnectOptions) -> Result<Self, SqlSessionError> {
        Ok(Self::default())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn supports_native_binding(&self) -> bool {
        true
    }

    fn execute_raw(&mut self, sql: &str) -> Result<QueryOutcome, SqlSessionError> {
        self.seen.push((sql.to_owned(), Vec::new()));
        Ok(QueryOutcome::Affected(0))
    }

    fn prepare(&mut self, sql: &str) -> Result<String, SqlSessionError> {
        Ok(sql.to_owned())
    }

    fn execute_prepared(
        &mut self,
        statement: &String,
        values: &[RowValues],
    ) -> Result<QueryOutcome, SqlSessionError> {
        self.seen.push((statement.clone(), values.to_vec()));
        Ok(QueryOutcome::Affected(0))
    }

    fn returns_rows(&mut self, _sql: &str) -> Result<bool, SqlSessionError> {
        Ok(false)
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn escape(&self, value: &RowValues) -> String {
        standard_escape(value).replace('\\', "\\\\")
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>, SqlSessionError> {
        Ok(None)
    }

    fn close(self) -> Result<(), SqlSessionError> {
        Ok(())
    }
}

#[test]
fn backslash_dialect_keeps_literals_whole() -> Result<(), Box<dyn std::error::Error>> {
    let sql = r"UPDATE t SET a = 'x\'y ?', b = ? WHERE c = ':c'";
    let mut db = Session::with_backend(BackslashBackend::default(), SessionOptions::default())?;
    db.query(sql, vec![RowValues::Int(5)])?;
    assert_eq!(db.backend().seen, vec![(sql.to_owned(), vec![RowValues::Int(5)])]);

    let mut db = Session::with_backend(
        BackslashBackend::default(),
        SessionOptions::default().with_binding_mode(BindingMode::Literal),
    )?;
    db.query(sql, vec![RowValues::from(r"C:\")])?;
    assert_eq!(
        db.backend().seen[0].0,
        r"UPDATE t SET a = 'x\'y ?', b = 'C:\\' WHERE c = ':c'"
    );
    Ok(())
}
