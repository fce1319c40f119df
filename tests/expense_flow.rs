use cfo_agent::{aggregate, CategoryMap, ExtractedReceipt, IntakeService, RawFile};
use chrono::NaiveDate;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn raw(name: &str, media_type: &str) -> RawFile {
    RawFile {
        name: name.to_string(),
        media_type: media_type.to_string(),
        bytes: b"fixture".to_vec(),
    }
}

fn receipt(code: &str, total: f64) -> ExtractedReceipt {
    ExtractedReceipt {
        date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
        total,
        category_code: code.to_string(),
    }
}

#[test]
fn intake_to_dashboard_flow() {
    init_tracing();

    let mut intake = IntakeService::new();
    let outcome = intake.submit(vec![
        raw("taxi.jpg", "image/jpeg"),
        raw("lunch.png", "image/png"),
        raw("licenses.pdf", "application/pdf"),
        raw("notes.txt", "text/plain"),
    ]);

    assert_eq!(outcome.accepted.len(), 3);
    assert!(outcome.rejection_notice.is_some());
    assert_eq!(intake.files().len(), 3);

    // One extraction result per accepted file, amounts from the prototype
    // sample data.
    let receipts = vec![
        receipt("6251", 4200.0),
        receipt("6257", 1850.0),
        receipt("651", 2600.0),
    ];

    let breakdown = aggregate(&receipts, &CategoryMap::default());
    assert_eq!(breakdown.grand_total, 8650.0);
    assert_eq!(breakdown.formatted_total(), "€8,650");

    let rows = breakdown.rows();
    let percentages: Vec<u32> = rows.iter().map(|r| r.percentage).collect();
    assert_eq!(percentages, vec![49, 21, 30]);
    assert_eq!(rows[0].formatted_amount, "€4,200");
    assert_eq!(rows[0].color, "#7C3AED");
}

#[test]
fn submission_partition_covers_the_whole_input() {
    init_tracing();

    let mut intake = IntakeService::new();
    let input = vec![
        raw("a.pdf", "application/pdf"),
        raw("b.gif", "image/gif"),
        raw("c.webp", "image/webp"),
        raw("d.bmp", "image/bmp"),
    ];
    let input_len = input.len();
    let outcome = intake.submit(input);

    // accepted ∪ rejected = input and the sets are disjoint; rejections are
    // visible only through the aggregate notice.
    assert_eq!(outcome.accepted.len(), 2);
    assert!(outcome.rejection_notice.is_some());
    assert_eq!(intake.files().len(), input_len - 2);
}

#[test]
fn resubmitting_the_same_file_duplicates_it() {
    init_tracing();

    let mut intake = IntakeService::new();
    intake.submit(vec![raw("same.jpg", "image/jpeg")]);
    intake.submit(vec![raw("same.jpg", "image/jpeg")]);

    assert_eq!(intake.files().len(), 2);
    assert_eq!(intake.files()[0].name, intake.files()[1].name);
    assert_eq!(intake.files()[0].size_bytes, intake.files()[1].size_bytes);
}

#[test]
fn clear_then_query_is_empty_and_noticeless() {
    init_tracing();

    let mut intake = IntakeService::new();
    intake.submit(vec![raw("a.jpg", "image/jpeg"), raw("b.txt", "text/plain")]);
    intake.clear();

    assert!(intake.files().is_empty());
    assert!(intake.rejection_notice().is_none());
}

#[test]
fn empty_aggregate_has_zero_total_and_no_percentages() {
    init_tracing();

    let breakdown = aggregate(&[], &CategoryMap::default());
    assert!(breakdown.data.is_empty());
    assert_eq!(breakdown.grand_total, 0.0);
    assert_eq!(breakdown.percentage(0.0), 0);
    assert_eq!(breakdown.formatted_total(), "€0");
}

#[test]
fn open_category_set_accepts_custom_buckets() {
    init_tracing();

    let map = CategoryMap {
        categories: vec![cfo_agent::ExpenseCategory {
            name: "Hardware".to_string(),
            color: "#4C1D95".to_string(),
            codes: vec!["2183".to_string()],
        }],
        fallback: cfo_agent::ExpenseCategory {
            name: "Other".to_string(),
            color: "#E4E4E7".to_string(),
            codes: Vec::new(),
        },
    };

    let receipts = vec![receipt("2183", 999.0), receipt("6251", 80.0)];
    let breakdown = aggregate(&receipts, &map);

    assert_eq!(breakdown.data.len(), 2);
    assert_eq!(breakdown.data[0].category, "Hardware");
    assert_eq!(breakdown.data[1].category, "Other");
    assert_eq!(breakdown.grand_total, 1079.0);
}
