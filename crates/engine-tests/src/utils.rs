#![allow(dead_code)]

use crate::{pg_client, test_config};
use connectors::{
    file::csv::{input::open_input, source::ActivityCsvSource},
    sql::postgres::session::PgSessionFactory,
};
use engine_config::settings::IngestSettings;
use engine_runtime::{error::IngestError, execution::executor};
use flate2::{Compression, write::GzEncoder};
use model::records::tally::Tally;
use std::{io::Write, path::Path, sync::Arc};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

pub const HEADER: &str = "marketoGUID,leadId,activityDate,activityTypeId,campaignId,primaryAttributeValueId,primaryAttributeValue,attributes\n";

/// Same shape as the warehouse table the loader writes to.
pub fn activity_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE EXTENSION IF NOT EXISTS citext;
        CREATE SCHEMA IF NOT EXISTS pload_test;
        DROP TABLE IF EXISTS {table};
        CREATE TABLE {table} (
            _dw_last_import_id bigint,
            marketoguid bigint NOT NULL UNIQUE,
            leadid bigint,
            activitydate timestamptz,
            activitytypeid bigint,
            campaignid bigint,
            primaryattributevalueid bigint,
            primaryattributevalue citext,
            attributes jsonb
        );
        "#
    )
}

/// One well-formed export row.
pub fn csv_row(guid: u64) -> String {
    format!(
        "{guid},{lead},2017-06-01T12:00:00Z,2,null,77,Signup Form,\"[{{\"\"name\"\":\"\"Source\"\",\"\"value\"\":\"\"web\"\"}}]\"\n",
        lead = 1000 + guid
    )
}

/// Export text with rows for `guids`.
pub fn export(guids: impl IntoIterator<Item = u64>) -> String {
    let mut text = HEADER.to_string();
    for guid in guids {
        text.push_str(&csv_row(guid));
    }
    text
}

pub fn write_plain(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(text.as_bytes()).expect("write temp file");
    file
}

pub fn write_gzip(text: &str) -> NamedTempFile {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("compress");
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(&encoder.finish().expect("finish gzip"))
        .expect("write temp file");
    file
}

/// Loads `path` into `table` the way the binary does.
pub async fn load_file(
    path: &Path,
    table: &str,
    settings: IngestSettings,
) -> Result<Tally, IngestError> {
    let settings = settings.with_table(table);
    let input = open_input(Some(path)).expect("open export");
    let factory = Arc::new(PgSessionFactory::new(
        test_config(),
        table,
        settings.import_id,
    ));
    executor::run(
        &settings,
        factory,
        ActivityCsvSource::new(input),
        &CancellationToken::new(),
    )
    .await
}

pub async fn get_row_count(table: &str) -> i64 {
    let client = pg_client().await;
    client
        .query_one(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .await
        .expect("count rows")
        .get(0)
}

pub async fn fetch_guids(table: &str) -> Vec<i64> {
    let client = pg_client().await;
    client
        .query(&format!("SELECT marketoguid FROM {table} ORDER BY marketoguid"), &[])
        .await
        .expect("fetch guids")
        .iter()
        .map(|row| row.get(0))
        .collect()
}

pub async fn execute(sql: &str) {
    let client = pg_client().await;
    client.batch_execute(sql).await.expect("execute sql");
}
