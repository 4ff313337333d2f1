use serde::Serialize;
use sqlx::PgPool;

use super::Pagination;
use crate::domain::PaymentStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InitialPayment {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub amount_centavos: i64,
    pub status: String,
    pub kind: String,
    pub transaction_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Payment joined with its request and post, the purchases listing shape.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PurchaseRecord {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub buyer_username: String,
    pub target_user_id: i64,
    pub target_username: String,
    pub amount_centavos: i64,
    pub status: String,
    pub kind: String,
    pub post_id: Option<i64>,
    pub post_title: Option<String>,
    pub post_images: Option<Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One request with its attached payments, serialized as nested JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RequestWithPayments {
    pub request_id: i64,
    pub request_content: String,
    pub request_status: String,
    pub payments: Vec<InitialPayment>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalesReportRow {
    pub month: chrono::DateTime<chrono::Utc>,
    pub payments: i64,
    pub total_centavos: i64,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub request_id: i64,
    pub user_id: i64,
    pub amount_centavos: i64,
    pub kind: String,
}

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, payment: NewPayment) -> Result<InitialPayment, sqlx::Error> {
        sqlx::query_as::<_, InitialPayment>(
            r#"
            INSERT INTO initial_payments (request_id, user_id, amount_centavos, kind)
            VALUES ($1, $2, $3, $4)
            RETURNING id, request_id, user_id, amount_centavos, status, kind,
                      transaction_id, created_at
            "#,
        )
        .bind(payment.request_id)
        .bind(payment.user_id)
        .bind(payment.amount_centavos)
        .bind(&payment.kind)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<InitialPayment>, sqlx::Error> {
        sqlx::query_as::<_, InitialPayment>(
            r#"
            SELECT id, request_id, user_id, amount_centavos, status, kind,
                   transaction_id, created_at
            FROM initial_payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// The down payment attached to a request, if any.
    pub async fn find_by_request(
        &self,
        request_id: i64,
        kind: &str,
    ) -> Result<Option<InitialPayment>, sqlx::Error> {
        sqlx::query_as::<_, InitialPayment>(
            r#"
            SELECT id, request_id, user_id, amount_centavos, status, kind,
                   transaction_id, created_at
            FROM initial_payments
            WHERE request_id = $1 AND kind = $2
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<InitialPayment>, sqlx::Error> {
        sqlx::query_as::<_, InitialPayment>(
            r#"
            SELECT id, request_id, user_id, amount_centavos, status, kind,
                   transaction_id, created_at
            FROM initial_payments
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Guarded status update; re-checks the stored status in the WHERE.
    pub async fn set_status(
        &self,
        id: i64,
        from: &str,
        to: PaymentStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE initial_payments SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_amount_and_transaction(
        &self,
        id: i64,
        amount_centavos: i64,
        transaction_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE initial_payments SET amount_centavos = $2, transaction_id = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(amount_centavos)
        .bind(transaction_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Payments made by the user or addressed to them through a request.
    pub async fn purchases_for_user(&self, user_id: i64) -> Result<Vec<PurchaseRecord>, sqlx::Error> {
        sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT ip.id, ip.request_id, ip.user_id, bu.username AS buyer_username,
                   wr.target_user_id, tu.username AS target_username,
                   ip.amount_centavos, ip.status, ip.kind,
                   wr.post_id, p.title AS post_title, p.images AS post_images,
                   ip.created_at
            FROM initial_payments ip
            JOIN work_requests wr ON wr.id = ip.request_id
            JOIN users bu ON bu.id = ip.user_id
            JOIN users tu ON tu.id = wr.target_user_id
            LEFT JOIN posts p ON p.id = wr.post_id
            WHERE ip.user_id = $1 OR wr.target_user_id = $1
            ORDER BY ip.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Admin view of all payments.
    pub async fn list_all(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<PurchaseRecord>, i64), sqlx::Error> {
        let rows = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT ip.id, ip.request_id, ip.user_id, bu.username AS buyer_username,
                   wr.target_user_id, tu.username AS target_username,
                   ip.amount_centavos, ip.status, ip.kind,
                   wr.post_id, p.title AS post_title, p.images AS post_images,
                   ip.created_at
            FROM initial_payments ip
            JOIN work_requests wr ON wr.id = ip.request_id
            JOIN users bu ON bu.id = ip.user_id
            JOIN users tu ON tu.id = wr.target_user_id
            LEFT JOIN posts p ON p.id = wr.post_id
            ORDER BY ip.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM initial_payments")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Requests involving the user, each with its payments attached.
    pub async fn requests_with_payments(
        &self,
        user_id: i64,
    ) -> Result<Vec<RequestWithPayments>, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct RequestRow {
            id: i64,
            request_content: String,
            status: String,
        }

        let requests = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, request_content, status
            FROM work_requests
            WHERE user_id = $1 OR target_user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            let payments = sqlx::query_as::<_, InitialPayment>(
                r#"
                SELECT id, request_id, user_id, amount_centavos, status, kind,
                       transaction_id, created_at
                FROM initial_payments
                WHERE request_id = $1
                ORDER BY created_at
                "#,
            )
            .bind(request.id)
            .fetch_all(&self.pool)
            .await?;

            out.push(RequestWithPayments {
                request_id: request.id,
                request_content: request.request_content,
                request_status: request.status,
                payments,
            });
        }
        Ok(out)
    }

    /// Monthly totals of paid payments addressed to the provider.
    pub async fn sales_report(&self, provider_id: i64) -> Result<Vec<SalesReportRow>, sqlx::Error> {
        sqlx::query_as::<_, SalesReportRow>(
            r#"
            SELECT date_trunc('month', ip.created_at) AS month,
                   COUNT(*) AS payments,
                   COALESCE(SUM(ip.amount_centavos), 0) AS total_centavos
            FROM initial_payments ip
            JOIN work_requests wr ON wr.id = ip.request_id
            WHERE wr.target_user_id = $1 AND ip.status = 'paid'
            GROUP BY 1
            ORDER BY 1 DESC
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
    }
}
