//! # Party Repository
//!
//! Customers and suppliers: the other side of sales and purchases.
//!
//! Reports only ever need a customer's name and phone, fetched in one batch
//! for the ids present in the sales being ranked. A missing customer is not
//! an error there; the report renders it without contact details.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use super::{new_id, push_id_list};
use crate::error::{DbError, DbResult};
use bazaar_core::analytics::CustomerContact;
use bazaar_core::validation::validate_name;
use bazaar_core::{Customer, NewCustomer, NewSupplier, Supplier};

/// Repository for customer and supplier records.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    /// Creates a new PartyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn insert_customer(&self, input: &NewCustomer) -> DbResult<Customer> {
        validate_name("name", &input.name)?;

        let customer = Customer {
            id: new_id(),
            name: input.name.trim().to_string(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            address: input.address.clone(),
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, address, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, address, notes, created_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Whether a customer exists, on a caller's connection.
    pub async fn customer_exists_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = ?1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }

    pub async fn count_customers(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Name and phone for each known id; unknown ids are left out.
    pub async fn customer_contacts(&self, ids: &[String]) -> DbResult<Vec<CustomerContact>> {
        let mut conn = self.pool.acquire().await?;
        Self::customer_contacts_in(&mut conn, ids).await
    }

    /// [`customer_contacts`](Self::customer_contacts) on a caller's connection.
    pub async fn customer_contacts_in(
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> DbResult<Vec<CustomerContact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name, phone FROM customers WHERE id IN ");
        push_id_list(&mut builder, ids);

        let contacts = builder
            .build_query_as::<CustomerContact>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(contacts)
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    /// Inserts a supplier. Phone numbers are unique among suppliers.
    pub async fn insert_supplier(&self, input: &NewSupplier) -> DbResult<Supplier> {
        validate_name("name", &input.name)?;

        let supplier = Supplier {
            id: new_id(),
            name: input.name.trim().to_string(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            company: input.company.clone(),
            address: input.address.clone(),
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };

        debug!(id = %supplier.id, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, email, company, address, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.company)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, supplier.phone.clone().unwrap_or_default())
            }
            other => other,
        })?;

        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT id, name, phone, email, company, address, notes, created_at
            FROM suppliers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    /// Whether a supplier exists, on a caller's connection.
    pub async fn supplier_exists_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = ?1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }

    pub async fn count_suppliers(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_customer_roundtrip_and_contacts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ayesha = db
            .parties()
            .insert_customer(&NewCustomer {
                name: " Ayesha Khan ".to_string(),
                phone: Some("0300-1234567".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(ayesha.name, "Ayesha Khan");
        let stored = db.parties().get_customer(&ayesha.id).await.unwrap().unwrap();
        assert_eq!(stored, ayesha);
        assert_eq!(db.parties().count_customers().await.unwrap(), 1);

        let contacts = db
            .parties()
            .customer_contacts(&[ayesha.id.clone(), "gone".to_string()])
            .await
            .unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].phone.as_deref(), Some("0300-1234567"));
    }

    #[tokio::test]
    async fn test_supplier_phone_is_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let input = NewSupplier {
            name: "Lahore Textiles".to_string(),
            phone: Some("042-111-222".to_string()),
            ..Default::default()
        };

        let supplier = db.parties().insert_supplier(&input).await.unwrap();
        assert!(db.parties().get_supplier(&supplier.id).await.unwrap().is_some());

        let err = db.parties().insert_supplier(&input).await.unwrap_err();
        assert!(err.is_unique_violation_on("suppliers.phone"));
        assert_eq!(db.parties().count_suppliers().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .parties()
            .insert_customer(&NewCustomer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }
}
