//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: YAML job → HTTP requests → JSONL/CSV/JSON output

use pretty_assertions::assert_eq;
use solidafy_scrape::cli::{RunOptions, Runner};
use solidafy_scrape::engine::{CancelFlag, StopReason};
use solidafy_scrape::loader::load_job_from_str;
use solidafy_scrape::JobDefinition;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Fixtures
// ============================================================================

fn quotes_page(quotes: &[(&str, &str)], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><div class=\"col-md-8\">");
    for (text, author) in quotes {
        html.push_str(&format!(
            "<div class=\"quote\"><span class=\"text\">{text}</span>\
             <span>by <small class=\"author\">{author}</small></span></div>"
        ));
    }
    if let Some(href) = next {
        html.push_str(&format!(
            "<nav><ul class=\"pager\"><li class=\"next\"><a href=\"{href}\">Next</a></li></ul></nav>"
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn license_table(rows: &[&[&str]]) -> String {
    let mut html = String::from(
        "<html><body><table><tr><th>License</th><th>Name</th><th>Status</th></tr>",
    );
    for row in rows {
        html.push_str("<tr>");
        for cell in *row {
            html.push_str(&format!("<td> {cell} </td>"));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table></body></html>");
    html
}

fn book_page(title: &str, next: Option<&str>) -> String {
    let pager = next
        .map(|href| format!("<ul class=\"pager\"><li class=\"next\"><a href=\"{href}\">next</a></li></ul>"))
        .unwrap_or_default();
    format!(
        "<html><body><ol class=\"row\"><li><article class=\"product_pod\">\
         <h3><a href=\"../../a/index.html\" title=\"{title}\">{title}...</a></h3>\
         <p class=\"price_color\">£10.00</p></article></li></ol>{pager}</body></html>"
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn quotes_job(server: &MockServer) -> JobDefinition {
    load_job_from_str(&format!(
        r"
name: quotes
start:
  url: {uri}/
pagination:
  strategy:
    type: next_link
    selector: li.next a
  delay_ms: 0
retry:
  initial_backoff_ms: 1
  max_backoff_ms: 5
extract:
  rows: div.quote
  fields:
    - name: text
      selector: span.text
    - name: author
      selector: small.author
    - name: pageUrl
      source: page_url
output:
  jsonl: quotes.jsonl
  csv: quotes.csv
",
        uri = server.uri()
    ))
    .unwrap()
}

async fn mount_quotes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(quotes_page(
            &[("Q1", "A1"), ("Q2", "A2")],
            Some("/page/2/"),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/2/"))
        .respond_with(html(quotes_page(
            &[("Q3", "A3"), ("Q4", "A4")],
            Some("/page/3/"),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/3/"))
        .respond_with(html(quotes_page(&[("Q5", "A5"), ("Q6", "A6")], None)))
        .mount(server)
        .await;
}

fn options(dir: &Path) -> RunOptions {
    RunOptions {
        output_dir: dir.to_path_buf(),
        ..RunOptions::default()
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

// ============================================================================
// Cursor-link Pagination
// ============================================================================

#[tokio::test]
async fn test_next_link_job_end_to_end() {
    let server = MockServer::start().await;
    mount_quotes(&server).await;
    let dir = tempdir().unwrap();

    let job = quotes_job(&server);
    let summary = Runner::run_job(&job, &options(dir.path()), CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.run.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.run.total_pages(), 3);
    assert_eq!(summary.run.total_records(), 6);
    assert!(summary.run.cursor.is_none());

    let jsonl = lines(&dir.path().join("quotes.jsonl"));
    assert_eq!(jsonl.len(), 6);
    let first: serde_json::Value = serde_json::from_str(&jsonl[0]).unwrap();
    assert_eq!(first["text"], "Q1");
    assert_eq!(first["author"], "A1");
    assert_eq!(first["pageUrl"], format!("{}/", server.uri()));
    let last: serde_json::Value = serde_json::from_str(&jsonl[5]).unwrap();
    assert_eq!(last["pageUrl"], format!("{}/page/3/", server.uri()));

    let csv = std::fs::read(dir.path().join("quotes.csv")).unwrap();
    assert!(csv.starts_with(b"\xEF\xBB\xBF"));
    let csv = String::from_utf8(csv[3..].to_vec()).unwrap();
    let mut rows = csv.lines();
    assert_eq!(rows.next(), Some("text,author,pageUrl"));
    assert_eq!(rows.count(), 6);

    assert_eq!(
        summary.outputs,
        vec![dir.path().join("quotes.jsonl"), dir.path().join("quotes.csv")]
    );
}

#[tokio::test]
async fn test_fetch_failure_keeps_sunk_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(quotes_page(
            &[("Q1", "A1"), ("Q2", "A2")],
            Some("/missing/"),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();

    let job = quotes_job(&server);
    let result = Runner::run_job(&job, &options(dir.path()), CancelFlag::new()).await;

    assert!(result.is_err());
    assert_eq!(lines(&dir.path().join("quotes.jsonl")).len(), 2);
    assert!(!dir.path().join("quotes.csv").exists());
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(quotes_page(&[("Q1", "A1")], None)))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();

    let job = quotes_job(&server);
    let summary = Runner::run_job(&job, &options(dir.path()), CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.run.stats.retries, 1);
    assert_eq!(summary.run.total_records(), 1);
}

#[tokio::test]
async fn test_resume_continues_from_checkpoint() {
    let server = MockServer::start().await;
    mount_quotes(&server).await;
    let dir = tempdir().unwrap();
    let job = quotes_job(&server);

    let first = RunOptions {
        max_pages: Some(1),
        ..options(dir.path())
    };
    let summary = Runner::run_job(&job, &first, CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.run.stop_reason, StopReason::PageLimit);
    assert_eq!(summary.run.total_records(), 2);
    assert!(dir.path().join("quotes.checkpoint.json").exists());

    let second = RunOptions {
        resume: true,
        ..options(dir.path())
    };
    let summary = Runner::run_job(&job, &second, CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.run.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.run.total_pages(), 2);
    assert_eq!(summary.run.total_records(), 4);

    let jsonl = lines(&dir.path().join("quotes.jsonl"));
    assert_eq!(jsonl.len(), 6);
    assert!(jsonl[2].contains("\"Q3\""));

    // the export covers both invocations
    let csv = std::fs::read_to_string(dir.path().join("quotes.csv")).unwrap();
    assert_eq!(csv.lines().count(), 7);
}

#[tokio::test]
async fn test_resume_after_completed_run_starts_fresh() {
    let server = MockServer::start().await;
    mount_quotes(&server).await;
    let dir = tempdir().unwrap();
    let mut job = quotes_job(&server);
    job.output.csv_append = Some("quotes-rows.csv".to_string());

    let summary = Runner::run_job(&job, &options(dir.path()), CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.run.stop_reason, StopReason::Exhausted);

    let again = RunOptions {
        resume: true,
        ..options(dir.path())
    };
    let summary = Runner::run_job(&job, &again, CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.run.total_pages(), 3);
    assert_eq!(summary.run.total_records(), 6);

    assert_eq!(lines(&dir.path().join("quotes.jsonl")).len(), 6);
    assert_eq!(lines(&dir.path().join("quotes-rows.csv")).len(), 7);
    let csv = std::fs::read_to_string(dir.path().join("quotes.csv")).unwrap();
    assert_eq!(csv.lines().count(), 7);
}

#[tokio::test]
async fn test_cancelled_run_still_exports() {
    let server = MockServer::start().await;
    mount_quotes(&server).await;
    let dir = tempdir().unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let job = quotes_job(&server);
    let summary = Runner::run_job(&job, &options(dir.path()), cancel)
        .await
        .unwrap();

    assert!(summary.run.cancelled());
    assert_eq!(summary.run.total_pages(), 0);
    assert!(lines(&dir.path().join("quotes.jsonl")).is_empty());
    assert!(!dir.path().join("quotes.csv").exists());
}

// ============================================================================
// Offset Pagination (POST form)
// ============================================================================

#[tokio::test]
async fn test_offset_post_job_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains("offset=0"))
        .and(body_string_contains("LicenseStatus=All"))
        .respond_with(html(license_table(&[
            &["V1", "Name 1", "Active"],
            &["V2", "Name 2", "Active"],
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains("offset=2"))
        .respond_with(html(license_table(&[
            &["V2", "Name 2", "Active"],
            &["V3", "Name   3"],
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains("offset=4"))
        .respond_with(html(license_table(&[])))
        .mount(&server)
        .await;

    let job = load_job_from_str(&format!(
        r"
name: vets
start:
  offset: 0
request:
  url: {uri}/search
  method: POST
  params:
    LicenseStatus: All
pagination:
  strategy:
    type: offset
    step: 2
  delay_ms: 0
extract:
  rows: table tr
  fields:
    - name: licenseNumber
      cell: 0
    - name: name
      cell: 1
    - name: status
      cell: 2
      optional: true
output:
  jsonl: vets.jsonl
  csv_append: vets-rows.csv
  dedup_key: licenseNumber
",
        uri = server.uri()
    ))
    .unwrap();
    let dir = tempdir().unwrap();

    let summary = Runner::run_job(&job, &options(dir.path()), CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.run.stop_reason, StopReason::EmptyBatch);
    assert_eq!(summary.run.total_pages(), 3);
    assert_eq!(summary.run.total_records(), 3);
    assert_eq!(summary.run.stats.duplicates, 1);

    let last = &summary.run.records[2];
    assert_eq!(last.get("licenseNumber"), Some("V3"));
    assert_eq!(last.get("name"), Some("Name 3"));
    assert_eq!(last.get("status"), None);

    let rows = lines(&dir.path().join("vets-rows.csv"));
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], "licenseNumber,name,status");
    assert_eq!(rows[1], "V1,Name 1,Active");
}

// ============================================================================
// Category Tree
// ============================================================================

#[tokio::test]
async fn test_category_tree_job_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "<html><body><div class=\"side_categories\"><ul><li><a href=\"/\">Books</a><ul>\
             <li><a href=\"catalogue/category/books/travel_2/index.html\"> Travel </a></li>\
             <li><a href=\"catalogue/category/books/mystery_3/index.html\">\n Mystery\n</a></li>\
             </ul></li></ul></div></body></html>"
                .to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/travel_2/index.html"))
        .respond_with(html(book_page("It's Only the Himalayas", Some("page-2.html"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/travel_2/page-2.html"))
        .respond_with(html(book_page("Full Moon over Noah's Ark", None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/mystery_3/index.html"))
        .respond_with(html(book_page("Sharp Objects", None)))
        .mount(&server)
        .await;

    let job = load_job_from_str(&format!(
        r"
name: books
start:
  url: {uri}/
seeds:
  selector: div.side_categories ul li ul li a
pagination:
  strategy:
    type: next_link
    selector: li.next a
  delay_ms: 0
extract:
  rows: article.product_pod
  fields:
    - name: title
      selector: h3 a
      attribute: title
    - name: category
      source: seed
    - name: price
      selector: p.price_color
output:
  jsonl: books.jsonl
  json: books.json
",
        uri = server.uri()
    ))
    .unwrap();
    let dir = tempdir().unwrap();

    let summary = Runner::run_job(&job, &options(dir.path()), CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.run.stats.seeds_completed, 2);
    assert_eq!(summary.run.total_pages(), 3);
    let categories: Vec<_> = summary
        .run
        .records
        .iter()
        .map(|r| r.get("category").unwrap_or_default().to_string())
        .collect();
    assert_eq!(categories, vec!["Travel", "Travel", "Mystery"]);
    assert_eq!(summary.run.records[0].get("price"), Some("£10.00"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("books.json")).unwrap())
            .unwrap();
    let books = json.as_array().unwrap();
    assert_eq!(books.len(), 3);
    assert_eq!(books[2]["title"], "Sharp Objects");
    assert_eq!(books[2]["category"], "Mystery");
}
