//! HTTP validator storage for conditional downloads.

use crate::{Error, Result};

use super::{Database, HttpValidators};

impl Database {
    /// Stored validators for `url`, if it was ever fetched
    pub async fn http_validators(&self, url: &str) -> Result<Option<HttpValidators>> {
        sqlx::query_as::<_, HttpValidators>(
            "SELECT etag, last_modified FROM mdl_http_downloads WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)
    }

    /// Record the validators from a full response, replacing earlier ones
    pub async fn store_http_validators(&self, url: &str, validators: &HttpValidators) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO mdl_http_downloads (url, etag, last_modified) VALUES (?, ?, ?)",
        )
        .bind(url)
        .bind(&validators.etag)
        .bind(&validators.last_modified)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(())
    }

    /// Drop the validators for `url` so the next fetch is unconditional
    ///
    /// Returns true if a row was removed.
    pub async fn forget_http_validators(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mdl_http_downloads WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
