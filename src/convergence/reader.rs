// src/convergence/reader.rs

use std::marker::PhantomData;
use std::sync::Arc;

use crate::common::error::AppError;
use crate::convergence::normalize::Normalize;
use crate::store::StoreReader;

/// Per-entity convergent read path: try the SQL-backed primary, treat a
/// throw, a malformed response or an empty get-all result as a *soft*
/// failure, and recover by reading the spreadsheet fallback. Only a fallback
/// failure is hard. Rows from either source pass through the same
/// normalization, so callers cannot tell which source answered except by the
/// presence of `rowIndex`.
pub struct ConvergentReader<T: Normalize> {
    primary: Option<Arc<dyn StoreReader>>,
    fallback: Arc<dyn StoreReader>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Normalize> Clone for ConvergentReader<T> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            fallback: self.fallback.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Normalize> ConvergentReader<T> {
    pub fn new(primary: Option<Arc<dyn StoreReader>>, fallback: Arc<dyn StoreReader>) -> Self {
        Self { primary, fallback, _entity: PhantomData }
    }

    /// `force_fallback` must be set whenever the caller is about to address a
    /// record by spreadsheet row index: row indices are only meaningful
    /// against the sheet's current layout, so the read skips the primary
    /// source *and* drops any cached fallback read first.
    pub async fn fetch_all(&self, force_fallback: bool) -> Result<Vec<T>, AppError> {
        if force_fallback {
            self.fallback.invalidate(T::ENTITY).await;
        } else if let Some(primary) = &self.primary {
            match primary.get_all().await {
                Ok(rows) if !rows.is_empty() => {
                    return Ok(rows.iter().map(T::normalize).collect());
                }
                // An empty get-all is presumed "not yet synchronized", not
                // "genuinely zero records": the sync-lag heuristic.
                Ok(_) => {
                    tracing::debug!(entity = T::ENTITY, "primary returned empty, using fallback")
                }
                Err(e) => {
                    tracing::warn!(entity = T::ENTITY, error = %e, "primary source failed, using fallback")
                }
            }
        }

        let rows = self
            .fallback
            .get_all()
            .await
            .map_err(|source| AppError::SourceUnavailable { entity: T::ENTITY, source })?;
        Ok(rows.iter().map(T::normalize).collect())
    }

    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<T>, AppError> {
        if let Some(primary) = &self.primary {
            match primary.get_by_id(id).await {
                Ok(Some(raw)) => return Ok(Some(T::normalize(&raw))),
                // Miss or unsupported point lookup: fall through to the scan.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(entity = T::ENTITY, error = %e, "primary point lookup failed")
                }
            }
        }
        let all = self.fetch_all(false).await?;
        Ok(all.into_iter().find(|record| record.key() == id))
    }

    /// Best-effort cache invalidation on both sources after a successful
    /// mutation. Never fatal.
    pub async fn invalidate(&self) {
        if let Some(primary) = &self.primary {
            primary.invalidate(T::ENTITY).await;
        }
        self.fallback.invalidate(T::ENTITY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::company::Company;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn company_rows(count: usize) -> Vec<serde_json::Value> {
        (0..count)
            .map(|i| json!({ "companyId": format!("COMP_{}", i), "companyName": format!("公司{}", i) }))
            .collect()
    }

    fn reader(
        primary: Option<Arc<MemoryStore>>,
        fallback: Arc<MemoryStore>,
    ) -> ConvergentReader<Company> {
        ConvergentReader::new(
            primary.map(|p| p as Arc<dyn StoreReader>),
            fallback as Arc<dyn StoreReader>,
        )
    }

    #[tokio::test]
    async fn primary_data_wins_and_fallback_is_never_invoked() {
        let primary = Arc::new(MemoryStore::new());
        primary.seed("", company_rows(3));
        let fallback = Arc::new(MemoryStore::new());
        fallback.seed("", company_rows(10));

        let companies = reader(Some(primary), fallback.clone()).fetch_all(false).await.unwrap();
        assert_eq!(companies.len(), 3);
        assert_eq!(fallback.get_all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_error_is_soft_and_recovered_by_fallback() {
        let primary = Arc::new(MemoryStore::new());
        primary.fail_reads(true);
        let fallback = Arc::new(MemoryStore::new());
        fallback.seed("", company_rows(2));

        let companies = reader(Some(primary), fallback).fetch_all(false).await.unwrap();
        assert_eq!(companies.len(), 2);
    }

    #[tokio::test]
    async fn empty_primary_is_treated_as_sync_lag() {
        let primary = Arc::new(MemoryStore::new());
        let fallback = Arc::new(MemoryStore::new());
        fallback.seed("", company_rows(10));

        let companies = reader(Some(primary), fallback).fetch_all(false).await.unwrap();
        assert_eq!(companies.len(), 10);
    }

    #[tokio::test]
    async fn fallback_failure_is_hard() {
        let primary = Arc::new(MemoryStore::new());
        primary.fail_reads(true);
        let fallback = Arc::new(MemoryStore::new());
        fallback.fail_reads(true);

        let err = reader(Some(primary), fallback).fetch_all(false).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable { entity: "companies", .. }));
    }

    #[tokio::test]
    async fn forced_fallback_skips_primary_and_drops_the_cache() {
        let primary = Arc::new(MemoryStore::new());
        primary.seed("", company_rows(3));
        let fallback = Arc::new(MemoryStore::new());
        fallback.seed("", company_rows(1));

        let companies = reader(Some(primary.clone()), fallback.clone())
            .fetch_all(true)
            .await
            .unwrap();
        assert_eq!(companies.len(), 1);
        assert!(companies[0].row_index.is_some());
        assert_eq!(primary.get_all_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback.invalidations(), vec!["companies"]);
    }

    #[tokio::test]
    async fn fetch_by_id_scans_the_converged_list() {
        let fallback = Arc::new(MemoryStore::new());
        fallback.seed("", company_rows(5));

        let reader = reader(None, fallback);
        let company = reader.fetch_by_id("COMP_3").await.unwrap().unwrap();
        assert_eq!(company.company_name, "公司3");
        assert!(reader.fetch_by_id("COMP_99").await.unwrap().is_none());
    }
}
