//! PostgreSQL implementation of BillingRepository.
//!
//! Status updates run as a single `UPDATE ... FROM (SELECT ... FOR UPDATE)`
//! statement that locks the newest matching row, checks the state machine
//! in SQL, and returns the previous status alongside the updated row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::billing::{
    GatewayRefs, NewPayment, Payment, PaymentStatus, PaymentTarget, Plan, StatusChange, User,
};
use crate::domain::foundation::{
    CorrelationId, DomainError, ErrorCode, PlanId, Timestamp, UserId,
};
use crate::ports::{BillingRepository, RECENT_PAYMENTS_SCAN};

/// Partial unique index allowing one live subscription per user.
const ONE_ACTIVE_PER_USER: &str = "payments_one_active_per_user";

const PAYMENT_COLUMNS: &str = "p.idx, p.id, p.plan_id, p.amount::float8 AS amount, p.currency, \
     p.status, p.description, p.dlo_payment_id, p.dlocal_plan_id, p.plan_token, \
     p.correlation_id, p.created_at";

/// PostgreSQL implementation of the BillingRepository port.
pub struct PostgresBillingRepository {
    pool: PgPool,
}

impl PostgresBillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    plan_id: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::new(row.id).map_err(corrupt_row)?,
            name: row.name,
            email: row.email,
            plan_id: row.plan_id.map(PlanId::new).transpose().map_err(corrupt_row)?,
            updated_at: row.updated_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: String,
    plan_name: String,
    description: Option<String>,
    price: f64,
    currency: String,
    frequency_type: String,
    frequency_value: i32,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: PlanId::new(row.id).map_err(corrupt_row)?,
            plan_name: row.plan_name,
            description: row.description,
            price: row.price,
            currency: row.currency,
            frequency_type: row.frequency_type.parse().map_err(corrupt_row)?,
            frequency_value: row.frequency_value,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    idx: i64,
    id: String,
    plan_id: String,
    amount: f64,
    currency: String,
    status: String,
    description: Option<String>,
    dlo_payment_id: String,
    dlocal_plan_id: Option<String>,
    plan_token: Option<String>,
    correlation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            idx: row.idx,
            user_id: UserId::new(row.id).map_err(corrupt_row)?,
            plan_id: PlanId::new(row.plan_id).map_err(corrupt_row)?,
            amount: row.amount,
            currency: row.currency,
            status: parse_status(&row.status)?,
            description: row.description,
            dlo_payment_id: row.dlo_payment_id,
            dlocal_plan_id: row.dlocal_plan_id,
            plan_token: row.plan_token,
            correlation_id: row.correlation_id.map(CorrelationId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChangedRow {
    #[sqlx(flatten)]
    payment: PaymentRow,
    previous_status: String,
}

impl TryFrom<ChangedRow> for StatusChange {
    type Error = DomainError;

    fn try_from(row: ChangedRow) -> Result<Self, Self::Error> {
        Ok(StatusChange {
            previous: parse_status(&row.previous_status)?,
            payment: Payment::try_from(row.payment)?,
        })
    }
}

fn parse_status(s: &str) -> Result<PaymentStatus, DomainError> {
    s.parse().map_err(corrupt_row)
}

fn corrupt_row(err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored value: {}", err))
}

/// Maps driver errors, turning the live-subscription index violation into a conflict.
fn map_write_error(context: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(ONE_ACTIVE_PER_USER) {
            return DomainError::new(
                ErrorCode::ActiveSubscriptionExists,
                "User already has an active subscription",
            );
        }
    }
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

fn status_strings(statuses: Vec<PaymentStatus>) -> Vec<String> {
    statuses.into_iter().map(|s| s.as_str().to_string()).collect()
}

/// How a status update finds its row.
#[derive(Debug, Clone, Copy)]
enum Locator<'a> {
    ExternalId(&'a str),
    PlanToken(&'a str),
    Correlation(&'a CorrelationId),
    Idx(i64),
    Owner(&'a UserId),
    NewestPending,
}

impl<'a> Locator<'a> {
    /// WHERE clause; the locator's own value, if any, is bound as `$param`.
    fn predicate(&self, param: usize) -> String {
        match self {
            Locator::ExternalId(_) => format!("dlo_payment_id = ${}", param),
            Locator::PlanToken(_) => format!("(plan_token = ${0} OR dlo_payment_id = ${0})", param),
            Locator::Correlation(_) => format!("correlation_id = ${}", param),
            Locator::Idx(_) => format!("idx = ${}", param),
            Locator::Owner(_) => format!("id = ${}", param),
            Locator::NewestPending => "status = 'Pending'".to_string(),
        }
    }

    fn ordering(&self) -> &'static str {
        match self {
            Locator::Owner(_) => {
                "(status IN ('Completed', 'Active')) DESC, created_at DESC, idx DESC"
            }
            _ => "created_at DESC, idx DESC",
        }
    }

    /// Concurrent fallbacks skip rows another transaction is already stamping.
    fn lock_clause(&self) -> &'static str {
        match self {
            Locator::NewestPending => "FOR UPDATE SKIP LOCKED",
            _ => "FOR UPDATE",
        }
    }

    fn bind<'q, O>(
        &self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments>
    where
        'a: 'q,
    {
        match *self {
            Locator::ExternalId(value) | Locator::PlanToken(value) => query.bind(value),
            Locator::Correlation(id) => query.bind(*id.as_uuid()),
            Locator::Idx(idx) => query.bind(idx),
            Locator::Owner(user_id) => query.bind(user_id.as_str()),
            Locator::NewestPending => query,
        }
    }
}

impl PostgresBillingRepository {
    /// Moves the newest row matching `locator` to `status`, if the state machine allows it.
    async fn transition(
        &self,
        locator: Locator<'_>,
        stamp_external_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let sql = format!(
            r#"
            WITH target AS (
                SELECT idx, status AS previous_status
                FROM payments
                WHERE {predicate}
                ORDER BY {ordering}
                LIMIT 1
                {lock}
            )
            UPDATE payments p
            SET status = $1,
                dlo_payment_id = COALESCE($2, p.dlo_payment_id)
            FROM target
            WHERE p.idx = target.idx
              AND target.previous_status = ANY($3)
            RETURNING {columns}, target.previous_status
            "#,
            predicate = locator.predicate(4),
            ordering = locator.ordering(),
            lock = locator.lock_clause(),
            columns = PAYMENT_COLUMNS,
        );

        let query = sqlx::query_as::<_, ChangedRow>(&sql)
            .bind(status.as_str())
            .bind(stamp_external_id)
            .bind(status_strings(status.accepted_sources()));

        let changed = locator
            .bind(query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error("Failed to update payment status", e))?;

        match changed {
            Some(row) => {
                let change = StatusChange::try_from(row)?;
                tracing::debug!(
                    idx = change.payment.idx,
                    previous = %change.previous,
                    status = %change.payment.status,
                    "payment status updated"
                );
                Ok(change)
            }
            None => Err(self.explain_missed_update(locator, status).await?),
        }
    }

    /// Distinguishes "no such row" from "row exists but the move is forbidden".
    async fn explain_missed_update(
        &self,
        locator: Locator<'_>,
        status: PaymentStatus,
    ) -> Result<DomainError, DomainError> {
        let sql = format!(
            "SELECT idx, status FROM payments WHERE {} ORDER BY {} LIMIT 1",
            locator.predicate(1),
            locator.ordering(),
        );

        let existing = locator
            .bind(sqlx::query_as::<_, (i64, String)>(&sql))
            .fetch_optional(&self.pool)
            .await
            .map_err(DomainError::database)?;

        Ok(match existing {
            None => DomainError::new(
                ErrorCode::PaymentNotFound,
                "No payment matches the given identifier",
            ),
            Some((idx, current)) => DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move payment {} from {} to {}", idx, current, status),
            ),
        })
    }
}

#[async_trait]
impl BillingRepository for PostgresBillingRepository {
    async fn get_user(&self, user_id: &UserId) -> Result<User, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, plan_id, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to load user: {}", e))
        })?;

        row.map(User::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::new(ErrorCode::UserNotFound, "User not found"))
    }

    async fn get_plan(&self, plan_id: &PlanId) -> Result<Plan, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, plan_name, description, price::float8 AS price, currency,
                   frequency_type, frequency_value
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to load plan: {}", e))
        })?;

        row.map(Plan::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::new(ErrorCode::PlanNotFound, "Plan not found"))
    }

    async fn active_subscription(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments p WHERE p.id = $1 AND p.status IN ('Completed', 'Active') \
             ORDER BY p.created_at DESC, p.idx DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to check active subscription: {}", e),
                )
            })?;

        row.map(Payment::try_from).transpose()
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DomainError> {
        if self.has_active_subscription(&payment.user_id).await? {
            return Err(DomainError::new(
                ErrorCode::ActiveSubscriptionExists,
                "User already has an active subscription",
            ));
        }

        let now = Timestamp::now();
        let sql = format!(
            r#"
            INSERT INTO payments AS p (
                id, plan_id, amount, currency, status, description,
                dlo_payment_id, dlocal_plan_id, plan_token, correlation_id, created_at
            ) VALUES ($1, $2, $3::numeric, $4, 'Pending', $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let row: PaymentRow = sqlx::query_as(&sql)
            .bind(payment.user_id.as_str())
            .bind(payment.plan_id.as_str())
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(payment.description_or_default())
            .bind(payment.external_id_or_placeholder(&now))
            .bind(&payment.dlocal_plan_id)
            .bind(&payment.plan_token)
            .bind(payment.correlation_id.map(|id| *id.as_uuid()))
            .bind(now.as_datetime())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error("Failed to create payment", e))?;

        Payment::try_from(row)
    }

    async fn update_payment_status(
        &self,
        dlo_payment_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        self.transition(Locator::ExternalId(dlo_payment_id), None, status)
            .await
    }

    async fn update_payment_by_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        self.transition(Locator::ExternalId(subscription_id), None, status)
            .await
    }

    async fn update_payment_by_plan_token(
        &self,
        plan_token: &str,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        self.transition(Locator::PlanToken(plan_token), subscription_id, status)
            .await
    }

    async fn update_payment_by_correlation(
        &self,
        correlation_id: &CorrelationId,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        self.transition(Locator::Correlation(correlation_id), subscription_id, status)
            .await
    }

    async fn update_pending_payment_with_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        self.transition(Locator::NewestPending, Some(subscription_id), status)
            .await
    }

    async fn get_active_payment_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments p WHERE p.id = $1 AND p.status IN ('Completed', 'Active') \
             ORDER BY (p.status = 'Completed') DESC, p.created_at DESC, p.idx DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to load active payment: {}", e),
                )
            })?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_plan_and_subscription_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<GatewayRefs, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments p WHERE p.id = $1 AND p.status IN ('Completed', 'Active') \
             ORDER BY p.created_at DESC, p.idx DESC LIMIT $2",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .bind(RECENT_PAYMENTS_SCAN)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to scan recent payments: {}", e),
                )
            })?;

        let payments = rows
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GatewayRefs::collect(&payments))
    }

    async fn set_payment_status_by_idx_or_user(
        &self,
        target: &PaymentTarget,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let locator = match target {
            PaymentTarget::Idx(idx) => Locator::Idx(*idx),
            PaymentTarget::User(user_id) => Locator::Owner(user_id),
        };
        self.transition(locator, None, status).await
    }

    async fn update_user_plan(
        &self,
        user_id: &UserId,
        plan_id: Option<&PlanId>,
    ) -> Result<User, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE users SET plan_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, plan_id, updated_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(plan_id.map(PlanId::as_str))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update user plan: {}", e))
        })?;

        row.map(User::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::new(ErrorCode::UserNotFound, "User not found"))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DomainError::database)?;
        Ok(())
    }
}
