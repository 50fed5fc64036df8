//! Database interface consumed by the repositories.

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, QueryResult, Statement, Value,
};

use crate::server::error::data::DataError;

/// Executes parameterized SQL and returns raw rows.
///
/// Statements use numbered placeholders (`$1`, `$2`, ...) in order of appearance.
#[async_trait]
pub trait Database: Send + Sync {
    async fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<QueryResult>, DataError>;

    /// Executes a statement and returns the number of affected rows
    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<u64, DataError>;
}

#[async_trait]
impl Database for DatabaseConnection {
    async fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<QueryResult>, DataError> {
        let stmt = Statement::from_sql_and_values(self.get_database_backend(), sql, values);

        Ok(ConnectionTrait::query_all_raw(self, stmt).await?)
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<u64, DataError> {
        let stmt = Statement::from_sql_and_values(self.get_database_backend(), sql, values);
        let result = ConnectionTrait::execute_raw(self, stmt).await?;

        Ok(result.rows_affected())
    }
}

/// Decodes exactly one row.
///
/// # Returns
/// - `Ok(T)` - The decoded row
/// - `Err(DataError::NotFound)` - The query matched no rows
/// - `Err(DataError::QueryError)` - More than one row matched or the row failed to decode
pub fn collect_one<T: FromQueryResult>(rows: Vec<QueryResult>) -> Result<T, DataError> {
    let mut rows = rows.into_iter();

    let Some(row) = rows.next() else {
        return Err(DataError::NotFound(entity_name::<T>().to_string()));
    };

    let extra = rows.count();
    if extra > 0 {
        return Err(DataError::QueryError(format!(
            "expected one {} row, found {}",
            entity_name::<T>(),
            extra + 1
        )));
    }

    Ok(T::from_query_result(&row, "")?)
}

/// Decodes every row, preserving the order returned by the query
pub fn collect_all<T: FromQueryResult>(rows: Vec<QueryResult>) -> Result<Vec<T>, DataError> {
    rows.iter()
        .map(|row| T::from_query_result(row, "").map_err(DataError::from))
        .collect()
}

fn entity_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

/// Id returned by `INSERT ... RETURNING id`
#[derive(Debug, FromQueryResult)]
pub(crate) struct InsertedId {
    pub id: i64,
}

/// Runs an insert returning the new row id
pub(crate) async fn insert_returning_id(
    db: &dyn Database,
    sql: &str,
    values: Vec<Value>,
) -> Result<i64, DataError> {
    let rows = db.query(sql, values).await?;
    let inserted: InsertedId = collect_one(rows)?;

    Ok(inserted.id)
}
