//! Synthetic dataset for trying the classifier without real data.
//!
//! Columns deliberately span every sensitivity level: names and contact
//! details (PII), revenue and card/bank fragments (Finance-critical),
//! internal identifiers, and harmless reference data.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::Table;

pub const DEFAULT_ROWS: usize = 100;

const HEADERS: [&str; 19] = [
    "user_id",
    "first_name",
    "last_name",
    "email_address",
    "phone_number",
    "street_address",
    "date_of_birth",
    "credit_card_number_masked",
    "revenue_usd",
    "employee_id",
    "department",
    "product_code",
    "ip_address",
    "internal_project_id",
    "customer_segment",
    "is_active_customer",
    "transaction_id",
    "bank_account_last_4",
    "social_security_number_masked",
];

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "Aisha", "Mateo", "Yuki", "Priya", "Lars", "Fatima",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Nguyen", "Kowalski", "Okafor", "Tanaka", "Schmidt",
];
const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Pine Rd", "Maple Dr", "Cedar Ln", "Elm St", "Lakeview Blvd",
];
const CITIES: &[(&str, &str)] = &[
    ("Springfield", "IL"),
    ("Riverside", "CA"),
    ("Franklin", "TN"),
    ("Greenville", "SC"),
    ("Madison", "WI"),
];
const MAIL_DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "corp.example"];
const DEPARTMENTS: &[&str] = &["Sales", "Marketing", "Engineering", "HR", "Finance"];
const SEGMENTS: &[&str] = &["Gold", "Silver", "Bronze"];

/// Generate `rows` rows of synthetic data. The same seed always yields the same table.
pub fn generate(rows: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let table_rows = (0..rows).map(|i| fake_row(&mut rng, i)).collect();
    Table {
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: table_rows,
    }
}

/// Write a table as CSV.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn fake_row(rng: &mut StdRng, index: usize) -> Vec<String> {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let (city, state) = CITIES.choose(rng).copied().unwrap_or(("Springfield", "IL"));

    vec![
        (index + 1).to_string(),
        first.to_string(),
        last.to_string(),
        format!(
            "{}.{}{}@{}",
            first.to_lowercase(),
            last.to_lowercase(),
            rng.gen_range(1..100),
            pick(rng, MAIL_DOMAINS)
        ),
        format!(
            "+1-{}-{:03}-{:04}",
            rng.gen_range(200..999),
            rng.gen_range(0..1000),
            rng.gen_range(0..10000)
        ),
        format!(
            "{} {}, {}, {} {:05}",
            rng.gen_range(1..9999),
            pick(rng, STREETS),
            city,
            state,
            rng.gen_range(10000..99999)
        ),
        date_of_birth(rng),
        format!("{:*>16}", format!("{:04}", rng.gen_range(0..10000))),
        format!("{:.2}", rng.gen_range(1000.0..100000.0)),
        format!("EMP-{}", 1000 + index),
        pick(rng, DEPARTMENTS).to_string(),
        format!("PROD-{}", rng.gen_range(100..=999)),
        format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..=223),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(1..=254)
        ),
        format!("INTPROJ-{}", rng.gen_range(1..=5)),
        pick(rng, SEGMENTS).to_string(),
        rng.gen_bool(0.5).to_string(),
        uuid_v4(rng),
        rng.gen_range(1000..=9999).to_string(),
        format!("***-**-{}", rng.gen_range(1000..=9999)),
    ]
}

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

/// Birth date for an adult aged 18 to 90 relative to a fixed reference day.
fn date_of_birth(rng: &mut StdRng) -> String {
    let reference = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let age_days = rng.gen_range(18 * 365..90 * 365);
    (reference - Duration::days(age_days)).format("%Y-%m-%d").to_string()
}

/// Random (version 4) UUID drawn from the seeded generator.
fn uuid_v4(rng: &mut StdRng) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .to_string()
}
