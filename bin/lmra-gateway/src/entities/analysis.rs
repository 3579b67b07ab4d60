use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::entities::dao::{AnalysisRecord, AnalysisStatus, AnalysisUpdate, NewAnalysis};
use crate::entities::SqliteStore;

pub trait AnalysisStore: Send + Sync + 'static {
    /// Insert an `in_progress` run and return its id.
    fn start_analysis(
        &self,
        run: NewAnalysis,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Apply a partial update in one statement.
    fn update_analysis(
        &self,
        id: i64,
        update: AnalysisUpdate,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Mark the run failed unless it already reached a terminal state.
    /// Returns whether a row changed.
    fn fail_if_in_progress(
        &self,
        id: i64,
        message: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn get_analysis(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<AnalysisRecord>, sqlx::Error>> + Send;

    /// Newest first, without `result_data`.
    fn list_analyses(
        &self,
        limit: i64,
        offset: i64,
        analysis_type: Option<&str>,
    ) -> impl Future<Output = Result<Vec<AnalysisRecord>, sqlx::Error>> + Send;
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: i64,
    repository_url: Option<String>,
    branch: Option<String>,
    analysis_type: String,
    language: Option<String>,
    files_analyzed: Option<i64>,
    status: String,
    modernization_score: Option<i64>,
    overall_severity: Option<String>,
    query_parameters: Option<String>,
    result_data: Option<String>,
    processed_files: Option<String>,
    error_message: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

const LIST_COLUMNS: &str = "id, repository_url, branch, analysis_type, language, files_analyzed, \
     status, modernization_score, overall_severity, query_parameters, NULL AS result_data, \
     processed_files, error_message, created_at, completed_at";

const FULL_COLUMNS: &str = "id, repository_url, branch, analysis_type, language, files_analyzed, \
     status, modernization_score, overall_severity, query_parameters, result_data, \
     processed_files, error_message, created_at, completed_at";

fn timestamp(ts: DateTime<Utc>) -> String {
    // Fixed width keeps lexical order equal to chronological order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_json(raw: Option<String>, column: &str, id: i64) -> Option<serde_json::Value> {
    raw.and_then(|s| match serde_json::from_str(&s) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(id, column, error = %e, "stored JSON column is unreadable; returning raw text");
            Some(serde_json::Value::String(s))
        }
    })
}

impl From<AnalysisRow> for AnalysisRecord {
    fn from(row: AnalysisRow) -> Self {
        let id = row.id;
        let status = row.status.parse().unwrap_or_else(|_| {
            tracing::warn!(id, raw = %row.status, "unknown analysis status; treating as failed");
            AnalysisStatus::Failed
        });
        let processed_files = row
            .processed_files
            .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok());

        AnalysisRecord {
            id,
            repository_url: row.repository_url,
            branch: row.branch,
            analysis_type: row.analysis_type,
            language: row.language,
            files_analyzed: row.files_analyzed,
            status,
            modernization_score: row.modernization_score,
            overall_severity: row.overall_severity,
            query_parameters: parse_json(row.query_parameters, "query_parameters", id),
            result_data: parse_json(row.result_data, "result_data", id),
            processed_files,
            error_message: row.error_message,
            created_at: row.created_at.parse().unwrap_or_else(|e: chrono::ParseError| {
                tracing::warn!(raw = %row.created_at, error = %e, "failed to parse analysis created_at; using now");
                Utc::now()
            }),
            completed_at: row.completed_at.and_then(|s| s.parse().ok()),
        }
    }
}

impl AnalysisStore for SqliteStore {
    async fn start_analysis(&self, run: NewAnalysis) -> Result<i64, sqlx::Error> {
        let created_at = timestamp(Utc::now());
        let query_parameters = run.query_parameters.map(|v| v.to_string());
        let result = sqlx::query(
            "INSERT INTO analysis_history \
             (repository_url, branch, analysis_type, language, query_parameters, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&run.repository_url)
        .bind(&run.branch)
        .bind(run.kind.as_ref())
        .bind(&run.language)
        .bind(&query_parameters)
        .bind(AnalysisStatus::InProgress.as_ref())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_analysis(&self, id: i64, update: AnalysisUpdate) -> Result<(), sqlx::Error> {
        if update.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE analysis_history SET ");
        let mut set = qb.separated(", ");
        if let Some(branch) = update.branch {
            set.push("branch = ").push_bind_unseparated(branch);
        }
        if let Some(n) = update.files_analyzed {
            set.push("files_analyzed = ").push_bind_unseparated(n);
        }
        if let Some(files) = update.processed_files {
            let encoded = serde_json::to_string(&files).unwrap_or_else(|_| "[]".to_owned());
            set.push("processed_files = ").push_bind_unseparated(encoded);
        }
        if let Some(status) = update.status {
            set.push("status = ").push_bind_unseparated(status.as_ref().to_owned());
            if status.is_terminal() {
                set.push("completed_at = ").push_bind_unseparated(timestamp(Utc::now()));
            }
        }
        if let Some(score) = update.modernization_score {
            set.push("modernization_score = ").push_bind_unseparated(score);
        }
        if let Some(severity) = update.overall_severity {
            set.push("overall_severity = ").push_bind_unseparated(severity);
        }
        if let Some(result) = update.result_data {
            set.push("result_data = ").push_bind_unseparated(result.to_string());
        }
        if let Some(message) = update.error_message {
            set.push("error_message = ").push_bind_unseparated(message);
        }
        qb.push(" WHERE id = ").push_bind(id);

        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn fail_if_in_progress(&self, id: i64, message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE analysis_history SET status = ?1, error_message = ?2, completed_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(AnalysisStatus::Failed.as_ref())
        .bind(message)
        .bind(timestamp(Utc::now()))
        .bind(id)
        .bind(AnalysisStatus::InProgress.as_ref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let sql = format!("SELECT {FULL_COLUMNS} FROM analysis_history WHERE id = ?1");
        let row: Option<AnalysisRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AnalysisRecord::from))
    }

    async fn list_analyses(
        &self,
        limit: i64,
        offset: i64,
        analysis_type: Option<&str>,
    ) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
        let rows: Vec<AnalysisRow> = if let Some(kind) = analysis_type {
            let sql = format!(
                "SELECT {LIST_COLUMNS} FROM analysis_history WHERE analysis_type = ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            );
            sqlx::query_as(&sql)
                .bind(kind)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT {LIST_COLUMNS} FROM analysis_history \
                 ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
            );
            sqlx::query_as(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(AnalysisRecord::from).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::AnalysisKind;
    use serde_json::json;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_run(kind: AnalysisKind) -> NewAnalysis {
        NewAnalysis {
            repository_url: Some("https://github.com/octo/legacy".into()),
            branch: None,
            kind,
            language: Some("python".into()),
            query_parameters: Some(json!({ "maxFiles": 10 })),
        }
    }

    #[tokio::test]
    async fn new_run_is_in_progress_without_completed_at() {
        let store = store().await;
        let id = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        let rec = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(rec.status, AnalysisStatus::InProgress);
        assert!(rec.completed_at.is_none());
        assert_eq!(rec.query_parameters, Some(json!({ "maxFiles": 10 })));
    }

    #[tokio::test]
    async fn terminal_status_stamps_completed_at() {
        let store = store().await;
        let id = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();

        store
            .update_analysis(
                id,
                AnalysisUpdate {
                    files_analyzed: Some(2),
                    processed_files: Some(vec!["a.py".into(), "b.py".into()]),
                    ..AnalysisUpdate::default()
                },
            )
            .await
            .unwrap();
        let mid = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(mid.status, AnalysisStatus::InProgress);
        assert!(mid.completed_at.is_none());

        store
            .update_analysis(
                id,
                AnalysisUpdate {
                    status: Some(AnalysisStatus::Completed),
                    result_data: Some(json!({ "success": true })),
                    ..AnalysisUpdate::default()
                },
            )
            .await
            .unwrap();
        let done = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(done.status, AnalysisStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.files_analyzed, Some(2));
        assert_eq!(
            done.processed_files,
            Some(vec!["a.py".to_string(), "b.py".to_string()])
        );
        assert_eq!(done.result_data, Some(json!({ "success": true })));
    }

    #[tokio::test]
    async fn failure_records_message() {
        let store = store().await;
        let id = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        store
            .update_analysis(id, AnalysisUpdate::failed("boom"))
            .await
            .unwrap();
        let rec = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(rec.status, AnalysisStatus::Failed);
        assert_eq!(rec.error_message.as_deref(), Some("boom"));
        assert!(rec.completed_at.is_some());
    }

    #[tokio::test]
    async fn conditional_failure_skips_finished_runs() {
        let store = store().await;
        let open = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        let done = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        store
            .update_analysis(
                done,
                AnalysisUpdate {
                    status: Some(AnalysisStatus::Completed),
                    result_data: Some(json!({ "success": true })),
                    ..AnalysisUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(store.fail_if_in_progress(open, "client disconnected").await.unwrap());
        assert!(!store.fail_if_in_progress(done, "client disconnected").await.unwrap());

        let open = store.get_analysis(open).await.unwrap().unwrap();
        assert_eq!(open.status, AnalysisStatus::Failed);
        assert_eq!(open.error_message.as_deref(), Some("client disconnected"));
        assert!(open.completed_at.is_some());

        let done = store.get_analysis(done).await.unwrap().unwrap();
        assert_eq!(done.status, AnalysisStatus::Completed);
        assert_eq!(done.result_data, Some(json!({ "success": true })));
    }

    #[tokio::test]
    async fn list_filters_by_type_and_omits_payload() {
        let store = store().await;
        let a = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        store.start_analysis(new_run(AnalysisKind::Dependencies)).await.unwrap();
        store
            .update_analysis(
                a,
                AnalysisUpdate {
                    status: Some(AnalysisStatus::Completed),
                    result_data: Some(json!({ "big": "payload" })),
                    ..AnalysisUpdate::default()
                },
            )
            .await
            .unwrap();

        let all = store.list_analyses(50, 0, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.result_data.is_none()));

        let codebase = store.list_analyses(50, 0, Some("codebase")).await.unwrap();
        assert_eq!(codebase.len(), 1);
        assert_eq!(codebase[0].id, a);

        let paged = store.list_analyses(1, 1, None).await.unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[tokio::test]
    async fn reads_do_not_mutate() {
        let store = store().await;
        let id = store.start_analysis(new_run(AnalysisKind::Codebase)).await.unwrap();
        store
            .update_analysis(
                id,
                AnalysisUpdate {
                    status: Some(AnalysisStatus::Completed),
                    result_data: Some(json!({ "modernizationScore": 70 })),
                    ..AnalysisUpdate::default()
                },
            )
            .await
            .unwrap();

        let first = store.get_analysis(id).await.unwrap().unwrap();
        let second = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(first.result_data, second.result_data);
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(first.status, second.status);
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let store = store().await;
        assert!(store.get_analysis(999).await.unwrap().is_none());
    }
}
