use chrono::NaiveDate;

/// One row of the pre-loaded bulk index.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegistryRecord {
    pub identifier: String,
    pub display_name: String,
    pub form: String,
    pub registration_date: NaiveDate,
    pub deregistration_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub address: Option<String>,
}

impl RegistryRecord {
    pub fn is_active(&self) -> bool {
        self.deregistration_date.is_none()
    }
}
