use std::sync::Arc;

use docket::backend::{HybridBackend, KeyValueBackend, PartitionedBackend};
use docket::errors::DocketResult;
use docket::property::Property;
use docket::schema::DocumentType;
use docket::store::DocumentStore;
use docket::{Docket, Document};

#[ctor::ctor]
fn init_logger() {
    let _ = colog::default_builder().try_init();
}

pub const BACKEND_IDS: [&str; 3] = ["kv", "dyn", "hy"];

/// A fresh database with one backend of every storage strategy.
pub fn test_docket() -> DocketResult<Docket> {
    Docket::builder()
        .with_backend(Arc::new(KeyValueBackend::new("kv")))
        .with_backend(Arc::new(PartitionedBackend::new("dyn")))
        .with_backend(Arc::new(HybridBackend::new("hy")))
        .open_or_create()
}

pub fn student_type() -> DocumentType {
    DocumentType::builder("Student")
        .property("name", Property::char().required().unique())
        .property("slug", Property::slug().unique())
        .property("city", Property::char().global_index())
        .property("email", Property::email())
        .property("gpa", Property::float())
        .build()
        .expect("student type builds")
}

/// Registers the student type on the given backend and seeds it.
pub fn student_store(docket: &Docket, backend_id: &str) -> DocketResult<DocumentStore> {
    docket.register_type_on(student_type(), backend_id)
}

pub fn save_student(
    store: &DocumentStore,
    name: &str,
    city: &str,
    gpa: f64,
) -> DocketResult<Document> {
    let mut doc = store.new_document();
    doc.set("name", name)?;
    doc.set("slug", name.to_lowercase())?;
    doc.set("city", city)?;
    doc.set("gpa", gpa)?;
    store.save(&mut doc)?;
    Ok(doc)
}

pub fn seed_students(store: &DocumentStore, rows: &[(&str, &str, f64)]) -> DocketResult<()> {
    for (name, city, gpa) in rows {
        save_student(store, name, city, *gpa)?;
    }
    Ok(())
}
