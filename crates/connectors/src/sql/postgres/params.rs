use model::records::{activity::FIELD_COUNT, binding::BindingRow};
use tokio_postgres::types::ToSql;

/// Borrowed bind parameters for one insert batch, laid out as the
/// statement from [`insert_batch`](super::query::insert_batch) expects them.
pub struct PgBatchParams<'a> {
    params: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> PgBatchParams<'a> {
    pub fn new(import_id: &'a Option<i64>, rows: &'a [BindingRow]) -> Self {
        let mut params: Vec<&'a (dyn ToSql + Sync)> =
            Vec::with_capacity(1 + rows.len() * FIELD_COUNT);
        params.push(import_id);
        for row in rows {
            params.extend(row.columns().map(|value| value as &(dyn ToSql + Sync)));
        }
        Self { params }
    }

    pub fn as_refs(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.params
    }
}
