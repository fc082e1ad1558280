use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::database::error::DatabaseError;

const PROVIDER_COLUMNS: &str = "provider_id, role, display_name, payout_currency, verified, \
     payable, gateway_customer_id, created_at, updated_at";

/// Provider account as the settlement core sees it. The verified-and-payable
/// pair gates gateway initiation and payout release.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderAccount {
    pub provider_id: String,
    pub role: String,
    pub display_name: String,
    pub payout_currency: String,
    pub verified: bool,
    pub payable: bool,
    pub gateway_customer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderAccount {
    pub fn is_payable(&self) -> bool {
        self.verified && self.payable
    }
}

pub struct ProviderRepository {
    pool: PgPool,
}

impl ProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, provider_id: &str) -> Result<Option<ProviderAccount>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM provider_accounts WHERE provider_id = $1",
            PROVIDER_COLUMNS
        );

        sqlx::query_as::<_, ProviderAccount>(&sql)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn set_verified(
        &self,
        provider_id: &str,
        verified: bool,
    ) -> Result<ProviderAccount, DatabaseError> {
        let sql = format!(
            "UPDATE provider_accounts SET verified = $2, updated_at = NOW() \
             WHERE provider_id = $1 \
             RETURNING {}",
            PROVIDER_COLUMNS
        );

        sqlx::query_as::<_, ProviderAccount>(&sql)
            .bind(provider_id)
            .bind(verified)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn set_gateway_customer(
        &self,
        provider_id: &str,
        gateway_customer_id: i64,
    ) -> Result<ProviderAccount, DatabaseError> {
        let sql = format!(
            "UPDATE provider_accounts SET gateway_customer_id = $2, updated_at = NOW() \
             WHERE provider_id = $1 \
             RETURNING {}",
            PROVIDER_COLUMNS
        );

        sqlx::query_as::<_, ProviderAccount>(&sql)
            .bind(provider_id)
            .bind(gateway_customer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payable_requires_both_flags() {
        let mut account = ProviderAccount {
            provider_id: "prov_1".to_string(),
            role: "doctor".to_string(),
            display_name: "Dr Awa Diop".to_string(),
            payout_currency: "XOF".to_string(),
            verified: true,
            payable: true,
            gateway_customer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(account.is_payable());

        account.verified = false;
        assert!(!account.is_payable());

        account.verified = true;
        account.payable = false;
        assert!(!account.is_payable());
    }
}
