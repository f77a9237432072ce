use rcsent::{load_progress, month_from_archive_name, parse_listing, save_progress, CatalogEntry};
use std::fs;

const LISTING: &str = r#"
<html><body>
<table>
  <tr><th>Name</th><th>Size</th></tr>
  <tr><td><a href="RC_2019-12.zst">RC_2019-12.zst</a></td><td>17 GB</td></tr>
  <tr><td><a href="RC_2020-01.zst">RC_2020-01.zst</a></td><td>18 GB</td></tr>
  <tr><td><a href="RS_2020-01.zst">RS_2020-01.zst</a></td><td>4 GB</td></tr>
  <tr><td><a href="sha256sums.txt">sha256sums.txt</a></td><td>2 KB</td></tr>
  <tr><td><a href="RC_bogus.zst">RC_bogus.zst</a></td><td>1 KB</td></tr>
</table>
</body></html>
"#;

#[test]
fn listing_keeps_only_comment_archives_in_order() {
    let entries = parse_listing(LISTING, "https://files.example.org/reddit/comments/");
    let months: Vec<&str> = entries.iter().map(|e| e.month.as_str()).collect();
    assert_eq!(months, ["2019-12", "2020-01"]);
    assert_eq!(
        entries[0].link,
        "https://files.example.org/reddit/comments/RC_2019-12.zst"
    );
    assert!(entries.iter().all(|e| !e.downloaded));
    assert!(entries.iter().all(|e| e.size_in_bytes == 0 && e.comment_count == 0));
}

#[test]
fn archive_name_month_extraction() {
    assert_eq!(month_from_archive_name("RC_2020-01.zst"), Some("2020-01".to_string()));
    assert_eq!(month_from_archive_name("RC_2006-12.bz2"), Some("2006-12".to_string()));
    assert_eq!(month_from_archive_name("RS_2020-01.zst"), None);
    assert_eq!(month_from_archive_name("RC_bogus.zst"), None);
    assert_eq!(month_from_archive_name("RC_2020-13.zst"), None);
    assert_eq!(month_from_archive_name("readme.txt"), None);
}

#[test]
fn progress_table_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.tsv");
    let entries = vec![
        CatalogEntry {
            month: "2019-12".to_string(),
            link: "https://files.example.org/reddit/comments/RC_2019-12.zst".to_string(),
            downloaded: true,
            size_in_bytes: 123_456,
            comment_count: 42,
        },
        CatalogEntry {
            month: "2020-01".to_string(),
            link: "https://files.example.org/reddit/comments/RC_2020-01.zst".to_string(),
            downloaded: false,
            size_in_bytes: 0,
            comment_count: 0,
        },
    ];

    save_progress(&path, &entries).unwrap();
    let loaded = load_progress(&path).unwrap();
    assert_eq!(loaded, entries);
}

#[test]
fn progress_table_rejects_unknown_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.tsv");
    fs::write(&path, "month,link,downloaded\n2020-01,x,false\n").unwrap();
    assert!(load_progress(&path).is_err());
}

#[test]
fn progress_table_rejects_short_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.tsv");
    fs::write(
        &path,
        "month\tlink\tdownloaded\tsize_in_bytes\tcomment_count\n2020-01\thttp://x\ttrue\n",
    )
    .unwrap();
    assert!(load_progress(&path).is_err());
}
