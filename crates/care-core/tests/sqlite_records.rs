use care_core::models::PatientRecord;
use care_core::records::{RecordStore, RecordStoreError, SqliteRecordStore};
use serde_json::json;

async fn seeded_store() -> SqliteRecordStore {
    let store = SqliteRecordStore::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database should open");
    store.ensure_schema().await.expect("schema should apply");

    for (id, name, diagnosis) in [
        ("P0002", "Zoe Park", "Nephrotic Syndrome"),
        ("P0001", "Adam King", "Chronic Kidney Disease Stage 3"),
        ("P0003", "Maria Adams", "Acute Kidney Injury"),
    ] {
        store
            .insert_record(&record(id, name, diagnosis))
            .await
            .expect("record should insert");
    }
    store
}

fn record(id: &str, name: &str, diagnosis: &str) -> PatientRecord {
    serde_json::from_value(json!({
        "patient_id": id,
        "patient_name": name,
        "date_of_birth": "1956-03-14",
        "gender": "M",
        "discharge_date": "2024-10-15",
        "primary_diagnosis": diagnosis,
        "secondary_diagnoses": ["Hypertension", "Anemia of CKD"],
        "medications": ["Lisinopril 10mg daily"],
        "lab_values": {"creatinine": 2.1, "egfr": 45, "potassium": 4.8},
        "follow_up": "Nephrology clinic in 2 weeks"
    }))
    .expect("record should deserialize")
}

#[tokio::test]
async fn lookup_round_trips_json_columns_case_insensitively() {
    let store = seeded_store().await;

    let found = store
        .lookup("  ADAM king ")
        .await
        .expect("lookup should succeed")
        .expect("record should exist");

    assert_eq!(found.patient_id, "P0001");
    assert_eq!(found.secondary_diagnoses, vec!["Hypertension", "Anemia of CKD"]);
    assert_eq!(found.lab_values.potassium, Some(4.8));
    assert_eq!(found.follow_up.as_deref(), Some("Nephrology clinic in 2 weeks"));
    assert!(found.warning_signs.is_none());

    let missing = store
        .lookup("Adam")
        .await
        .expect("lookup should succeed");
    assert!(missing.is_none());
}

#[tokio::test]
async fn lookup_trims_stored_names_and_folds_non_ascii_case() {
    let store = seeded_store().await;
    for (id, name) in [
        ("P0004", "  Élodie Durand "),
        ("P0005", "Søren Ålund"),
        ("P0006", "  Omar Diaz "),
    ] {
        store
            .insert_record(&record(id, name, "Polycystic Kidney Disease"))
            .await
            .expect("record should insert");
    }

    let padded = store
        .lookup("elodie durand")
        .await
        .expect("lookup should succeed");
    assert!(padded.is_none(), "accents are not stripped");

    let accented = store
        .lookup("ÉLODIE DURAND")
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(accented.patient_id, "P0004");

    let folded = store
        .lookup(" søren ålund ")
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(folded.patient_id, "P0005");

    let trimmed = store
        .lookup("OMAR diaz")
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(trimmed.patient_id, "P0006");
}

#[tokio::test]
async fn list_names_orders_by_name() {
    let store = seeded_store().await;

    let names = store.list_names().await.expect("names should list");

    assert_eq!(names, vec!["Adam King", "Maria Adams", "Zoe Park"]);
}

#[tokio::test]
async fn corrupt_json_column_is_invalid_data() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("scratch database should open");
    let scratch = SqliteRecordStore::from_pool(pool.clone());
    scratch.ensure_schema().await.expect("schema should apply");
    sqlx::query(
        "INSERT INTO patients (patient_id, patient_name, discharge_date, primary_diagnosis, medications)
         VALUES ('P0010', 'Corrupt Row', '2024-10-15', 'Unknown', 'not json')",
    )
    .execute(&pool)
    .await
    .expect("raw insert should succeed");

    let err = scratch
        .lookup("Corrupt Row")
        .await
        .expect_err("corrupt column should fail");
    assert!(matches!(err, RecordStoreError::InvalidData(detail) if detail.starts_with("medications")));
}
