use model::records::activity::FIELD_COUNT;

/// Postgres accepts at most this many bind parameters per statement.
pub const MAX_PARAMS: usize = u16::MAX as usize;

/// Largest batch that fits a single insert: one shared import id plus
/// [`FIELD_COUNT`] parameters per row.
pub const MAX_ROWS_PER_STATEMENT: usize = (MAX_PARAMS - 1) / FIELD_COUNT;

pub const IMPORT_ID_COLUMN: &str = "_dw_last_import_id";

/// Column that carries the uniqueness constraint used for conflict suppression.
pub const CONFLICT_COLUMN: &str = "marketoguid";

/// Destination columns for the record values, in binding order, with the
/// cast applied to each text parameter.
pub const RECORD_COLUMNS: [(&str, &str); FIELD_COUNT] = [
    ("marketoguid", "bigint"),
    ("leadid", "bigint"),
    ("activitydate", "timestamptz"),
    ("activitytypeid", "bigint"),
    ("campaignid", "bigint"),
    ("primaryattributevalueid", "bigint"),
    ("primaryattributevalue", "text"),
    ("attributes", "jsonb"),
];

/// Builds the conflict-tolerant insert for `rows` rows into `table`.
///
/// `$1` is the import id and is shared by every row. Record values are
/// bound as text and cast to their column type, so `NULL` stays `NULL`.
/// The statement returns a single `bigint`: the number of rows inserted.
///
/// `table` is spliced into the SQL as is and must already be validated.
pub fn insert_batch(table: &str, rows: usize) -> String {
    let columns = std::iter::once(IMPORT_ID_COLUMN)
        .chain(RECORD_COLUMNS.iter().map(|(name, _)| *name))
        .collect::<Vec<_>>()
        .join(", ");

    let values = (0..rows)
        .map(row_placeholders)
        .collect::<Vec<_>>()
        .join(",\n        ");

    format!(
        "WITH inserted AS (
    INSERT INTO {table} ({columns})
    VALUES {values}
    ON CONFLICT ({CONFLICT_COLUMN}) DO NOTHING
    RETURNING 1
)
SELECT COUNT(*) FROM inserted"
    )
}

fn row_placeholders(row: usize) -> String {
    let first = 2 + row * FIELD_COUNT;
    let values = std::iter::once("$1::bigint".to_string())
        .chain(
            RECORD_COLUMNS
                .iter()
                .enumerate()
                .map(|(i, (_, ty))| cast_text_param(first + i, ty)),
        )
        .collect::<Vec<_>>()
        .join(", ");
    format!("({values})")
}

fn cast_text_param(index: usize, ty: &str) -> String {
    if ty == "text" {
        format!("${index}::text")
    } else {
        format!("${index}::text::{ty}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_statement() {
        let sql = insert_batch("marketo.activities", 1);

        assert!(sql.starts_with("WITH inserted AS ("));
        assert!(sql.contains(
            "INSERT INTO marketo.activities (_dw_last_import_id, marketoguid, leadid, activitydate, \
             activitytypeid, campaignid, primaryattributevalueid, primaryattributevalue, attributes)"
        ));
        assert!(sql.contains(
            "($1::bigint, $2::text::bigint, $3::text::bigint, $4::text::timestamptz, \
             $5::text::bigint, $6::text::bigint, $7::text::bigint, $8::text, $9::text::jsonb)"
        ));
        assert!(sql.contains("ON CONFLICT (marketoguid) DO NOTHING"));
        assert!(sql.trim_end().ends_with("SELECT COUNT(*) FROM inserted"));
    }

    #[test]
    fn rows_share_the_import_id_and_number_on() {
        let sql = insert_batch("activities", 3);

        assert_eq!(sql.matches("$1::bigint").count(), 3);
        assert!(sql.contains("($1::bigint, $10::text::bigint,"));
        assert!(sql.contains("($1::bigint, $18::text::bigint,"));
        assert!(sql.contains("$25::text::jsonb)"));
        assert!(!sql.contains("$26"));
    }

    #[test]
    fn largest_batch_stays_within_parameter_limit() {
        assert_eq!(MAX_ROWS_PER_STATEMENT, 8191);
        assert!(1 + MAX_ROWS_PER_STATEMENT * FIELD_COUNT <= MAX_PARAMS);
        assert!(1 + (MAX_ROWS_PER_STATEMENT + 1) * FIELD_COUNT > MAX_PARAMS);
    }
}
