use sql_session::prelude::*;

fn session() -> Result<Session<MemoryBackend>, SqlSessionError> {
    let mut backend = MemoryBackend::new();
    backend.seed(
        "items",
        vec![
            vec![("id", RowValues::Int(1)), ("price", RowValues::Float(2.5))],
            vec![("id", RowValues::Int(2)), ("price", RowValues::Float(10.0))],
        ],
    );
    Session::with_backend(backend, SessionOptions::default())
}

#[test]
fn tags_coerce_values_before_binding() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    db.bind_param("isd", vec!["3".into(), RowValues::Int(7), "1.25".into()])?
        .query("INSERT INTO items SET id = ?, label = ?, price = ?")?;

    let row = db
        .fetch_one("SELECT * FROM items WHERE id = ?", vec![RowValues::Int(3)])?
        .expect("inserted row");
    assert_eq!(row.get("id"), Some(&RowValues::Int(3)));
    assert_eq!(row.get("label"), Some(&RowValues::from("7")));
    assert_eq!(row.get("price"), Some(&RowValues::Float(1.25)));
    assert_eq!(db.last_insert_id()?, Some(3));
    Ok(())
}

#[test]
fn binding_is_consumed_by_one_call() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    let rows = db
        .bind_param(vec![BindType::Float], vec![RowValues::Int(5)])?
        .fetch_all("SELECT * FROM items WHERE price > ?")?;
    assert_eq!(rows.len(), 1);

    // the next call infers its own tags again
    let rows = db.fetch_all("SELECT * FROM items WHERE price > ?", vec![RowValues::Int(0)])?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[test]
fn fetch_one_returns_the_first_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    let row = db
        .bind_param("i", vec![RowValues::from("0")])?
        .fetch_one("SELECT * FROM items WHERE id > ?")?;
    assert_eq!(row.and_then(|r| r.get("id").cloned()), Some(RowValues::Int(1)));
    assert_eq!(db.cached_statement_count(), 0);
    Ok(())
}

#[test]
fn tag_count_must_match_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    let err = db.bind_param("ii", vec![RowValues::Int(1)]).err().unwrap();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));

    let err = db.bind_param("x", vec![RowValues::Int(1)]).err().unwrap();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));

    let err = db.bind_param("i", vec![RowValues::from("seven")]).err().unwrap();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));
    assert!(db.backend().executed_sql().is_empty());
    Ok(())
}

#[test]
fn site_count_mismatch_fails_before_preparing() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    let sql = "UPDATE items SET price = ? WHERE id = ?";
    let err = db
        .bind_param("d", vec![RowValues::Float(3.0)])?
        .query(sql)
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::InvalidInput(_)));
    assert_eq!(db.backend().prepare_count(), 0);

    let outcome = db
        .bind_param("di", vec![RowValues::Float(3.0), RowValues::Int(2)])?
        .query(sql)?;
    assert_eq!(outcome.affected(), 1);
    assert_eq!(db.cached_statement_count(), 1);
    assert_eq!(db.backend().prepare_count(), 1);
    Ok(())
}

#[test]
fn null_passes_through_every_tag() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = session()?;
    let call = db.bind_param("sib", vec![RowValues::Null, RowValues::Null, RowValues::Null])?;
    assert_eq!(call.spec().values, vec![RowValues::Null; 3]);
    assert_eq!(call.spec().types, vec![BindType::String, BindType::Int, BindType::Blob]);
    Ok(())
}
