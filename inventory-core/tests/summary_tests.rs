// tests/summary_tests.rs
// Dashboard summary reducer.

use anyhow::Result;
use serde_json::{Value, json};

use inventory_core::config::ConditionFallback;
use inventory_core::services::aggregator::{
    SummaryOptions, effective_value, normalize_condition, normalize_status, summarize,
    summarize_with,
};
use inventory_core::services::record::Record;
use inventory_core::services::store::RecordStore;

fn rec(v: Value) -> Record {
    Record::try_from(v).unwrap_or_default()
}

fn names(buckets: &[inventory_core::services::aggregator::Bucket]) -> Vec<&str> {
    buckets.iter().map(|b| b.name.as_str()).collect()
}

#[test]
fn empty_input_is_all_zero() {
    let s = summarize(&[]);
    assert_eq!(s.total_value, 0.0);
    assert_eq!(s.total_count, 0);
    assert_eq!(s.depreciation, 0.0);
    assert_eq!(s.high_value_assets, 0);
    assert!(s.category_data.is_empty());
    assert!(s.status_data.is_empty());
    assert!(s.condition_data.is_empty());
    assert_eq!(s.average_value(), 0.0);
}

#[test]
fn effective_value_falls_back_to_purchase_cost() {
    assert_eq!(effective_value(&rec(json!({ "current_value": 5, "purchase_cost": 9 }))), 5.0);
    assert_eq!(effective_value(&rec(json!({ "current_value": null, "purchase_cost": 9 }))), 9.0);
    assert_eq!(effective_value(&rec(json!({ "current_value": "n/a", "purchase_cost": "12.5" }))), 12.5);
    assert_eq!(effective_value(&rec(json!({ "name": "bare" }))), 0.0);
}

#[test]
fn totals_and_depreciation() {
    let records = vec![
        rec(json!({ "purchase_cost": 1000, "current_value": 600 })),
        rec(json!({ "purchase_cost": 1000, "current_value": 900 })),
        rec(json!({ "purchase_cost": 500 })),
    ];
    let s = summarize(&records);
    assert_eq!(s.total_count, 3);
    assert_eq!(s.total_value, 2000.0);
    assert!((s.depreciation - 0.2).abs() < 1e-12);
}

#[test]
fn depreciation_without_purchase_data_is_zero() {
    let records = vec![rec(json!({ "current_value": 100 })), rec(json!({ "purchase_cost": 0 }))];
    let s = summarize(&records);
    assert_eq!(s.depreciation, 0.0);
    assert!(s.depreciation.is_finite());
}

#[test]
fn category_counts_cover_only_categorised_records() {
    let records = vec![
        rec(json!({ "category": "Electronics", "current_value": 10 })),
        rec(json!({ "category": "Furniture", "current_value": 5 })),
        rec(json!({ "category": "Electronics", "purchase_cost": 7 })),
        rec(json!({ "category": "" })),
        rec(json!({ "category": null })),
        rec(json!({})),
    ];
    let s = summarize(&records);
    let categorised = 3;
    let total: usize = s.category_data.iter().map(|b| b.count).sum();
    assert_eq!(total, categorised);
    assert_eq!(names(&s.category_data), vec!["Electronics", "Furniture"]);
    assert_eq!(s.category_data[0].count, 2);
    assert_eq!(s.category_data[0].value, Some(17.0));
    assert_eq!(s.total_count, 6);
}

#[test]
fn status_variants_collapse_into_one_bucket() {
    let records = vec![
        rec(json!({ "status": "in_maintenance" })),
        rec(json!({ "status": "In_Maintenance" })),
        rec(json!({ "status": "IN MAINTENANCE" })),
        rec(json!({ "status": "in_use" })),
    ];
    let s = summarize(&records);
    assert_eq!(names(&s.status_data), vec!["In Maintenance", "In Use"]);
    assert_eq!(s.status_data[0].count, 3);
    assert_eq!(s.status_data[0].value, None);
}

#[test]
fn status_normalisation_rules() {
    assert_eq!(normalize_status("  in  maintenance "), "In Maintenance");
    assert_eq!(normalize_status("RETIRED"), "Retired");
    assert_eq!(normalize_status("checked_out"), "Checked Out");
    assert_eq!(normalize_status("non-operational"), "Non-Operational");
    assert_eq!(normalize_status("NON-OPERATIONAL_pending"), "Non-Operational Pending");
}

#[test]
fn high_value_threshold_is_strict() {
    let records: Vec<Record> = [9999, 10000, 10001]
        .into_iter()
        .map(|v| rec(json!({ "current_value": v })))
        .collect();
    assert_eq!(summarize(&records).high_value_assets, 1);

    let opts = SummaryOptions {
        high_value_threshold: 9998.0,
        ..SummaryOptions::default()
    };
    assert_eq!(summarize_with(&records, &opts).high_value_assets, 3);
}

#[test]
fn condition_normalisation() {
    let fb = ConditionFallback::Unclassified;
    assert_eq!(normalize_condition("EXCELLENT", fb), "Excellent");
    assert_eq!(normalize_condition("xcellent", fb), "Excellent");
    assert_eq!(normalize_condition(" xc ", fb), "Excellent");
    assert_eq!(normalize_condition("Good", fb), "Good");
    assert_eq!(normalize_condition("poor ", fb), "Poor");
    assert_eq!(normalize_condition("damaged", fb), "Unclassified");
    assert_eq!(
        normalize_condition("damaged", ConditionFallback::TitleCase),
        "Damaged"
    );
}

#[test]
fn condition_buckets_put_good_fair_poor_last() {
    let records = vec![
        rec(json!({ "condition": "poor" })),
        rec(json!({ "condition": "good" })),
        rec(json!({ "condition": "broken" })),
        rec(json!({ "condition": "fair" })),
        rec(json!({ "condition": "excellent" })),
        rec(json!({ "condition": "Good" })),
    ];
    let s = summarize(&records);
    assert_eq!(
        names(&s.condition_data),
        vec!["Unclassified", "Excellent", "Good", "Fair", "Poor"]
    );
    assert_eq!(s.condition_data[2].count, 2);

    let title = summarize_with(
        &records,
        &SummaryOptions {
            condition_fallback: ConditionFallback::TitleCase,
            ..SummaryOptions::default()
        },
    );
    assert_eq!(
        names(&title.condition_data),
        vec!["Broken", "Excellent", "Good", "Fair", "Poor"]
    );
}

#[test]
fn seeded_store_summary() -> Result<()> {
    let store = RecordStore::in_memory();
    let rows = store.table("assets").select().execute().into_result()?;
    let s = summarize(&rows);

    assert_eq!(s.total_count, 3);
    assert_eq!(s.total_value, 20800.0);
    assert_eq!(s.high_value_assets, 1);
    assert!((s.depreciation - (24700.0 - 20800.0) / 24700.0).abs() < 1e-12);
    assert_eq!(names(&s.category_data), vec!["Electronics", "Furniture"]);
    assert_eq!(names(&s.status_data), vec!["In Use"]);
    assert_eq!(names(&s.condition_data), vec!["Excellent", "Good"]);
    Ok(())
}

#[test]
fn summary_serialises_with_dashboard_field_names() -> Result<()> {
    let s = summarize(&[rec(json!({ "category": "Tools", "status": "in_use", "current_value": 3 }))]);
    let v = serde_json::to_value(&s)?;
    for key in [
        "totalValue",
        "totalCount",
        "depreciation",
        "highValueAssets",
        "categoryData",
        "statusData",
        "conditionData",
    ] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    assert_eq!(v["categoryData"][0]["value"], json!(3.0));
    assert!(v["statusData"][0].get("value").is_none());
    Ok(())
}
