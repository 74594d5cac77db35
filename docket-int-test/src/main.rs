use docket::errors::DocketResult;
use docket::filter::FilterSpec;
use docket_int_test::test_util::{student_store, test_docket};

fn main() -> DocketResult<()> {
    println!("Starting stress test...");
    let docket = test_docket()?;
    let store = student_store(&docket, "kv")?;

    let count = 100_000;
    let start = std::time::Instant::now();
    for i in 0..count {
        let mut doc = store.new_document();
        doc.set("name", format!("student-{}", i))?;
        doc.set("city", if i % 2 == 0 { "Durham" } else { "Raleigh" })?;
        doc.set("gpa", (i % 40) as f64 / 10.0)?;
        store.save(&mut doc)?;
    }
    let elapsed = start.elapsed();
    println!("Saved {} documents in {:?}", count, elapsed);

    let start = std::time::Instant::now();
    let in_durham = store.filter(FilterSpec::new().eq("city", "Durham").gte("gpa", 2.0))?;
    let matched = in_durham.count()?;
    let elapsed = start.elapsed();
    println!("Matched {} documents in {:?}", matched, elapsed);

    docket.flush_all()?;
    Ok(())
}
