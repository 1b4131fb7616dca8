use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{LookupFuture, NamesFuture, RecordStore, RecordStoreError};
use crate::models::{LabValues, PatientRecord};

const CREATE_PATIENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    patient_name TEXT NOT NULL,
    date_of_birth TEXT,
    gender TEXT,
    admission_date TEXT,
    discharge_date TEXT NOT NULL,
    primary_diagnosis TEXT NOT NULL,
    secondary_diagnoses TEXT,
    medications TEXT,
    lab_values TEXT,
    dietary_restrictions TEXT,
    follow_up TEXT,
    warning_signs TEXT,
    discharge_instructions TEXT,
    attending_physician TEXT
)";

const SELECT_PATIENT: &str = "SELECT patient_id, patient_name, date_of_birth, gender,
        admission_date, discharge_date, primary_diagnosis, secondary_diagnoses, medications,
        lab_values, dietary_restrictions, follow_up, warning_signs, discharge_instructions,
        attending_physician
     FROM patients";

const CREATE_NAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients (patient_name)";

#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), RecordStoreError> {
        sqlx::query(CREATE_PATIENTS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_NAME_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_record(&self, record: &PatientRecord) -> Result<(), RecordStoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO patients (
                patient_id, patient_name, date_of_birth, gender, admission_date,
                discharge_date, primary_diagnosis, secondary_diagnoses, medications,
                lab_values, dietary_restrictions, follow_up, warning_signs,
                discharge_instructions, attending_physician
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.patient_id)
        .bind(&record.patient_name)
        .bind(&record.date_of_birth)
        .bind(&record.gender)
        .bind(&record.admission_date)
        .bind(&record.discharge_date)
        .bind(&record.primary_diagnosis)
        .bind(encode_json(&record.secondary_diagnoses)?)
        .bind(encode_json(&record.medications)?)
        .bind(encode_json(&record.lab_values)?)
        .bind(&record.dietary_restrictions)
        .bind(&record.follow_up)
        .bind(&record.warning_signs)
        .bind(&record.discharge_instructions)
        .bind(&record.attending_physician)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Trimmed, case-insensitive match. SQLite's `NOCASE` only folds ASCII, so names
    /// with other characters are compared with Rust's lowercasing instead.
    async fn fetch_by_name(&self, name: &str) -> Result<Option<PatientRecord>, RecordStoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if !name.is_ascii() {
            return self.fetch_by_folded_name(name).await;
        }

        let row = sqlx::query(&format!(
            "{SELECT_PATIENT} WHERE TRIM(patient_name) = ? COLLATE NOCASE LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn fetch_by_folded_name(
        &self,
        name: &str,
    ) -> Result<Option<PatientRecord>, RecordStoreError> {
        let needle = name.to_lowercase();
        let rows = sqlx::query("SELECT patient_id, patient_name FROM patients ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut matched = None;
        for row in &rows {
            let candidate: String = row.try_get("patient_name")?;
            if candidate.trim().to_lowercase() == needle {
                matched = Some(row.try_get::<String, _>("patient_id")?);
                break;
            }
        }
        let Some(patient_id) = matched else {
            return Ok(None);
        };

        let row = sqlx::query(&format!("{SELECT_PATIENT} WHERE patient_id = ?"))
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn fetch_names(&self) -> Result<Vec<String>, RecordStoreError> {
        let rows = sqlx::query("SELECT patient_name FROM patients ORDER BY patient_name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("patient_name").map_err(Into::into))
            .collect()
    }
}

impl RecordStore for SqliteRecordStore {
    fn lookup<'a>(&'a self, name: &'a str) -> LookupFuture<'a> {
        Box::pin(async move { self.fetch_by_name(name).await })
    }

    fn list_names(&self) -> NamesFuture<'_> {
        Box::pin(async move { self.fetch_names().await })
    }
}

fn row_to_record(row: &SqliteRow) -> Result<PatientRecord, RecordStoreError> {
    Ok(PatientRecord {
        patient_id: row.try_get("patient_id")?,
        patient_name: row.try_get("patient_name")?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.try_get("gender")?,
        admission_date: row.try_get("admission_date")?,
        discharge_date: row.try_get("discharge_date")?,
        primary_diagnosis: row.try_get("primary_diagnosis")?,
        secondary_diagnoses: decode_json_column(row, "secondary_diagnoses")?,
        medications: decode_json_column(row, "medications")?,
        lab_values: decode_json_column::<LabValues>(row, "lab_values")?,
        dietary_restrictions: row.try_get("dietary_restrictions")?,
        follow_up: row.try_get("follow_up")?,
        warning_signs: row.try_get("warning_signs")?,
        discharge_instructions: row.try_get("discharge_instructions")?,
        attending_physician: row.try_get("attending_physician")?,
    })
}

fn decode_json_column<T>(row: &SqliteRow, column: &str) -> Result<T, RecordStoreError>
where
    T: DeserializeOwned + Default,
{
    let raw: Option<String> = row.try_get(column)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| RecordStoreError::InvalidData(format!("{column}: {err}"))),
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RecordStoreError> {
    serde_json::to_string(value).map_err(|err| RecordStoreError::InvalidData(err.to_string()))
}
