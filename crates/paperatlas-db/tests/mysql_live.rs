//! Tests against a live MySQL server. Run with:
//! `PAPERATLAS_MYSQL_HOST=... cargo test -p paperatlas-db -- --ignored`

use paperatlas_common::{CandidateSource, ConceptRecord, PaperMetadata, PaperRecord};
use paperatlas_config::Config;
use paperatlas_db::{MySqlPaperStore, PaperStore};

async fn connect() -> MySqlPaperStore {
    let mut cfg = Config::default();
    cfg.apply_env_overrides(|k| std::env::var(k).ok()).unwrap();
    MySqlPaperStore::connect(&cfg.mysql).await.expect("MySQL must be reachable")
}

#[tokio::test]
#[ignore]
async fn test_paper_upsert_and_fetch() {
    let store = connect().await;
    let mut meta = PaperMetadata::new("Live Test Paper", "test");
    meta.arxiv_id = Some("0000.00001".into());
    meta.abstract_text = Some("abstract".into());
    let record = PaperRecord::new(meta, Some("raw".into()));

    store.save_paper(&record).await.unwrap();
    store.save_paper(&record).await.unwrap();

    let row = store.fetch_paper_by_id("arxiv:0000.00001").await.unwrap().unwrap();
    assert_eq!(row.title, "Live Test Paper");
    assert_eq!(row.abstract_text.as_deref(), Some("abstract"));
}

#[tokio::test]
#[ignore]
async fn test_concept_upsert_is_idempotent() {
    let store = connect().await;
    let records = vec![ConceptRecord {
        concept_id: "concept:000000000000".into(),
        paper_id: "arxiv:0000.00001".into(),
        name: "Live Concept".into(),
        summary: "s".into(),
        bullets: vec!["a".into(), "b".into(), "c".into()],
        source: CandidateSource::Llm,
    }];
    store.save_concepts(&records).await.unwrap();
    store.save_concepts(&records).await.unwrap();

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM concepts WHERE paper_id = ? AND concept_id = ?",
    )
    .bind("arxiv:0000.00001")
    .bind("concept:000000000000")
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}
