// tests/history_tests.rs
// Asset history export parsing and CSV export.

use anyhow::Result;

use inventory_core::services::history::{
    EMPTY_VALUE, HistoryEntry, RawHistoryRow, history_from_csv, parse_history, split_timestamp,
    to_csv, unique_assets, unique_users,
};
use inventory_core::services::ingestor::parse_line;

const RAW: &str = r#"[
  {"Id":"017a","Asset.Name":"Max 11 Dehumidifier","Asset.Name__c":"AST-0002","CreatedDate":"2025-07-17T07:49:16.000+0000","Field":"User__c","NewValue":"Adam Bernia","OldValue":"Warehouse Warehouse"},
  {"Id":"017b","Asset.Name":"Max 11 Dehumidifier","Asset.Name__c":"AST-0002","CreatedDate":"2025-07-17T07:49:16.000+0000","Field":"User__c","NewValue":"0054G00000CSjRvQAL","OldValue":"0052500000BIlUGAA1"},
  {"Id":"017c","Asset.Name":"Vacuum BOSCH","Asset.Name__c":"AST-0014","CreatedDate":"2025-01-20T15:36:40.000+0000","Field":"User__c","NewValue":"Warehouse Warehouse","OldValue":null},
  {"Id":"017d","Asset.Name":"Protimeter \"s12\"","Asset.Name__c":"AST-0011","CreatedDate":"not a date","Field":"User__c","NewValue":"Test Engineer","OldValue":""}
]"#;

fn entries() -> Result<Vec<HistoryEntry>> {
    let rows: Vec<RawHistoryRow> = serde_json::from_str(RAW)?;
    Ok(parse_history(rows))
}

#[test]
fn user_id_rows_are_dropped_and_blanks_marked() -> Result<()> {
    let e = entries()?;
    let ids: Vec<&str> = e.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["017a", "017c", "017d"]);
    assert_eq!(e[1].old_value, EMPTY_VALUE);
    assert_eq!(e[2].old_value, EMPTY_VALUE);
    assert_eq!(e[0].asset_code, "AST-0002");
    Ok(())
}

#[test]
fn unique_assets_and_users_are_sorted() -> Result<()> {
    let mut e = entries()?;
    let mut unnamed = e[0].clone();
    unnamed.id = "017e".to_string();
    unnamed.asset_name = "  ".to_string();
    e.push(unnamed);
    assert_eq!(
        unique_assets(&e),
        vec!["Max 11 Dehumidifier", "Protimeter \"s12\"", "Vacuum BOSCH"]
    );
    assert_eq!(
        unique_users(&e),
        vec!["Adam Bernia", "Test Engineer", "Warehouse Warehouse"]
    );
    Ok(())
}

#[test]
fn timestamps_split_into_date_and_time() {
    assert_eq!(
        split_timestamp("2025-07-17T07:49:16.000+0000"),
        ("17 Jul 2025".to_string(), "07:49".to_string())
    );
    assert_eq!(
        split_timestamp("2024-12-30T14:01:59Z"),
        ("30 Dec 2024".to_string(), "14:01".to_string())
    );
    assert_eq!(
        split_timestamp("yesterday"),
        ("yesterday".to_string(), String::new())
    );
}

#[test]
fn csv_export_escapes_quotes_and_reparses() -> Result<()> {
    let csv = to_csv(&entries()?);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Date,Time,Asset Name,Asset Code,From,To");
    assert_eq!(
        lines[1],
        r#"17 Jul 2025,07:49,"Max 11 Dehumidifier",AST-0002,"Warehouse Warehouse","Adam Bernia""#
    );
    assert_eq!(lines.len(), 4);

    let fields = parse_line(lines[3]);
    assert_eq!(fields[2], "Protimeter \"s12\"");
    assert_eq!(fields[4], EMPTY_VALUE);
    Ok(())
}

#[test]
fn csv_form_of_the_export_parses_the_same() -> Result<()> {
    let csv = "\
Id,Asset.Name,Asset.Name__c,CreatedDate,Field,OldValue,NewValue
017a,Max 11 Dehumidifier,AST-0002,2025-07-17T07:49:16.000+0000,User__c,Warehouse Warehouse,Adam Bernia
017b,Max 11 Dehumidifier,AST-0002,2025-07-17T07:49:16.000+0000,User__c,0052500000BIlUGAA1,0054G00000CSjRvQAL
,Orphan,AST-9,2025-01-01T00:00:00Z,User__c,a,b
017c,Vacuum BOSCH,AST-0014,2025-01-20T15:36:40.000+0000,User__c,,Warehouse Warehouse
";
    let from_csv = history_from_csv(csv);
    let from_json = entries()?;
    assert_eq!(from_csv.len(), 2);
    assert_eq!(from_csv[0], from_json[0]);
    assert_eq!(from_csv[1], from_json[1]);
    Ok(())
}
