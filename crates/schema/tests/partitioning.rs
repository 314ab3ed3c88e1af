use serde_json::{Value, json};
use tankobon_schema::{validate_chapters, validate_comics, validate_users};

fn comic(i: usize) -> Value {
    json!({"title": format!("Comic {i}"), "slug": format!("comic-{i}"), "description": "d"})
}

#[test]
fn test_every_record_lands_in_exactly_one_partition() {
    // Every third record is broken in a different way.
    let records: Vec<Value> = (0..12)
        .map(|i| match i % 3 {
            0 => comic(i),
            1 => json!({"title": format!("Comic {i}"), "description": "d"}),
            _ => {
                let mut c = comic(i);
                c["unexpected"] = json!(true);
                c
            },
        })
        .collect();
    let validated = validate_comics(&records);
    assert_eq!(validated.total(), records.len());
    assert_eq!(validated.valid.len(), 4);
    assert_eq!(validated.invalid.len(), 8);
    let slugs: Vec<_> = validated.valid.iter().map(|c| c.slug.as_str()).collect();
    assert_eq!(slugs, vec!["comic-0", "comic-3", "comic-6", "comic-9"]);
    let indices: Vec<_> = validated.invalid.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![1, 2, 4, 5, 7, 8, 10, 11]);
}

#[test]
fn test_non_object_records_are_invalid() {
    let validated = validate_users(&[json!("a@example.com"), json!(null), json!({"email": "a@example.com", "name": "A"})]);
    assert_eq!(validated.valid.len(), 1);
    assert_eq!(validated.invalid.len(), 2);
    assert_eq!(validated.invalid[0].errors.get("").unwrap(), ["expected an object"]);
}

#[test]
fn test_chapters_partition() {
    let validated = validate_chapters(&[
        json!({"title": "1", "chapterNumber": 1, "comic": {"title": "T", "slug": "t"}}),
        json!({"title": "2", "chapterNumber": 0, "comic": {"title": "T", "slug": "t"}}),
    ]);
    assert_eq!(validated.valid.len(), 1);
    assert_eq!(validated.invalid[0].index, 1);
}
