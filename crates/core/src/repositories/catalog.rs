//! Medicine and lab test catalogs.

use crate::actor::{Actor, Role};
use crate::db::Database;
use crate::error::{is_unique_violation, HmsError, HmsResult};
use crate::money::Money;
use crate::validation;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    #[sqlx(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub stock_quantity: i64,
}

#[derive(Clone, Debug)]
pub struct NewMedicine {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub unit_price: Money,
    pub stock_quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LabTest {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "cost_cents")]
    pub cost: Money,
}

#[derive(Clone, Debug)]
pub struct NewLabTest {
    pub name: String,
    pub description: String,
    pub cost: Money,
}

#[derive(Clone, Debug)]
pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Adds a medicine. Names are unique across the catalog.
    pub async fn add_medicine(&self, actor: &Actor, new: NewMedicine) -> HmsResult<Medicine> {
        actor.require(Role::Admin, "manage medicines")?;
        let name = validation::required_text(&new.name, "Medicine name")?;
        if new.stock_quantity < 0 {
            return Err(HmsError::Validation("Stock quantity cannot be negative.".into()));
        }

        let medicine = sqlx::query_as::<_, Medicine>(
            "INSERT INTO medicines (name, description, manufacturer, unit_price_cents, stock_quantity) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, name, description, manufacturer, unit_price_cents, stock_quantity",
        )
        .bind(name.as_str())
        .bind(new.description.trim())
        .bind(new.manufacturer.trim())
        .bind(new.unit_price)
        .bind(new.stock_quantity)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| duplicate_name(e, "A medicine with this name already exists."))?;

        tracing::info!(medicine_id = medicine.id, "medicine added");
        Ok(medicine)
    }

    /// All medicines by name. Readable by admins and pharmacists.
    pub async fn list_medicines(&self, actor: &Actor) -> HmsResult<Vec<Medicine>> {
        if !(actor.is(Role::Admin) || actor.is(Role::Pharmacist)) {
            return Err(HmsError::NotAuthorized("view medicines".into()));
        }
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT id, name, description, manufacturer, unit_price_cents, stock_quantity \
             FROM medicines ORDER BY name",
        )
        .fetch_all(self.db.pool())
        .await?)
    }

    pub async fn add_lab_test(&self, actor: &Actor, new: NewLabTest) -> HmsResult<LabTest> {
        actor.require(Role::Admin, "manage lab tests")?;
        let name = validation::required_text(&new.name, "Lab test name")?;

        let test = sqlx::query_as::<_, LabTest>(
            "INSERT INTO lab_tests (name, description, cost_cents) VALUES (?, ?, ?) \
             RETURNING id, name, description, cost_cents",
        )
        .bind(name.as_str())
        .bind(new.description.trim())
        .bind(new.cost)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| duplicate_name(e, "A lab test with this name already exists."))?;

        tracing::info!(lab_test_id = test.id, "lab test added");
        Ok(test)
    }

    /// All lab tests by name. Readable by admins and lab workers.
    pub async fn list_lab_tests(&self, actor: &Actor) -> HmsResult<Vec<LabTest>> {
        if !(actor.is(Role::Admin) || actor.is(Role::LabWorker)) {
            return Err(HmsError::NotAuthorized("view lab tests".into()));
        }
        Ok(sqlx::query_as::<_, LabTest>(
            "SELECT id, name, description, cost_cents FROM lab_tests ORDER BY name",
        )
        .fetch_all(self.db.pool())
        .await?)
    }
}

fn duplicate_name(err: sqlx::Error, message: &str) -> HmsError {
    if is_unique_violation(&err) {
        HmsError::Validation(message.to_string())
    } else {
        HmsError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::Fixture;

    fn aspirin() -> NewMedicine {
        NewMedicine {
            name: "Aspirin".into(),
            description: "Pain relief".into(),
            manufacturer: "Bayer".into(),
            unit_price: Money::from_cents(499),
            stock_quantity: 100,
        }
    }

    #[tokio::test]
    async fn medicines_are_unique_and_sorted() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let svc = CatalogService::new(fx.db.clone());

        svc.add_medicine(&admin, aspirin()).await.unwrap();
        svc.add_medicine(
            &admin,
            NewMedicine {
                name: "Amoxicillin".into(),
                ..aspirin()
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            svc.add_medicine(&admin, aspirin()).await,
            Err(HmsError::Validation(_))
        ));

        let names: Vec<_> = svc
            .list_medicines(&admin)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Amoxicillin", "Aspirin"]);
    }

    #[tokio::test]
    async fn catalog_reads_follow_roles() {
        let fx = Fixture::new().await;
        let admin = fx.admin().await;
        let pharmacist = fx.staff(Role::Pharmacist, "ph").await;
        let lab = fx.staff(Role::LabWorker, "lw").await;
        let svc = CatalogService::new(fx.db.clone());

        svc.add_lab_test(
            &admin,
            NewLabTest {
                name: "CBC".into(),
                description: String::new(),
                cost: Money::from_cents(2500),
            },
        )
        .await
        .unwrap();

        assert!(svc.list_medicines(&pharmacist).await.is_ok());
        assert!(matches!(
            svc.list_medicines(&lab).await,
            Err(HmsError::NotAuthorized(_))
        ));
        let tests = svc.list_lab_tests(&lab).await.unwrap();
        assert_eq!(tests[0].cost.to_string(), "25.00");
        assert!(matches!(
            svc.add_lab_test(
                &lab,
                NewLabTest {
                    name: "X".into(),
                    description: String::new(),
                    cost: Money::ZERO,
                },
            )
            .await,
            Err(HmsError::NotAuthorized(_))
        ));
    }
}
