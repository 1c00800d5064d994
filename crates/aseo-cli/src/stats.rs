//! # Stats Subcommand
//!
//! Lifetime totals from the admin view: usage records, imported students,
//! and courses.

use anyhow::Result;

use aseo_store::{Roster, UsageLog};

pub async fn run<S>(store: &S) -> Result<()>
where
    S: UsageLog + Roster + Sync,
{
    let usages = store.count_records().await?;
    let students = store.count_students().await?;
    let courses = store.count_courses().await?;

    println!("total usages:      {usages}");
    println!("imported students: {students}");
    println!("courses:           {courses}");
    Ok(())
}
