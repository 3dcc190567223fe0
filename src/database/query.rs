use tokio_postgres::types::ToSql;
use uuid::Uuid;

pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Positional parameters for a statement assembled at runtime.
///
/// Every value handed to `push` becomes a `$n` placeholder; values are never
/// spliced into the SQL text.
#[derive(Default)]
pub struct SqlParams {
    values: Vec<SqlParam>,
}

impl SqlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder
    pub fn push<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.values.push(Box::new(value));
        format!("${}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

/// AND-joined list of conditions
#[derive(Default)]
pub struct WhereClause {
    conditions: Vec<String>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// `UPDATE ... SET` over only the columns that were supplied
pub struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<String>,
    trailing: Vec<&'static str>,
    guards: Vec<String>,
    params: SqlParams,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            trailing: Vec::new(),
            guards: Vec::new(),
            params: SqlParams::new(),
        }
    }

    /// Assign `column` when `value` is present
    pub fn set<T: ToSql + Sync + Send + 'static>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            let placeholder = self.params.push(value);
            self.assignments.push(format!("{} = {}", column, placeholder));
        }
        self
    }

    /// Bind a value for use inside a custom assignment expression
    pub fn bind<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.params.push(value)
    }

    /// Add an assignment expression built from placeholders returned by `bind`
    pub fn set_expr(&mut self, assignment: impl Into<String>) -> &mut Self {
        self.assignments.push(assignment.into());
        self
    }

    /// Bookkeeping assignment (e.g. `updated_at = NOW()`) that does not count
    /// as a change on its own
    pub fn touch(&mut self, assignment: &'static str) -> &mut Self {
        self.trailing.push(assignment);
        self
    }

    /// Extra condition the row must still meet when the UPDATE runs
    pub fn guard(&mut self, condition: impl Into<String>) -> &mut Self {
        self.guards.push(condition.into());
        self
    }

    pub fn has_changes(&self) -> bool {
        !self.assignments.is_empty()
    }

    /// Finish the statement, targeting the row whose `id` matches
    pub fn build(mut self, id: Uuid, returning: Option<&str>) -> (String, SqlParams) {
        let id_placeholder = self.params.push(id);
        let mut set_list = self.assignments;
        set_list.extend(self.trailing.iter().map(|s| s.to_string()));

        let mut sql = format!(
            "UPDATE {} SET {} WHERE id = {}",
            self.table,
            set_list.join(", "),
            id_placeholder
        );
        for guard in &self.guards {
            sql.push_str(" AND ");
            sql.push_str(guard);
        }
        if let Some(returning) = returning {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }
        (sql, self.params)
    }
}
