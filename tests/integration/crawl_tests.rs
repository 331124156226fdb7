//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! index → group → leaf cycle end-to-end through the HTTP renderer and the
//! selector-driven extractor.

use roster_harvest::config::{
    load_config_with_hash, Config, CrawlerConfig, FieldSelectors, OutputConfig, SelectorConfig,
    SourceConfig, UnitEntry, UserAgentConfig,
};
use roster_harvest::crawler::crawl;
use roster_harvest::storage::{
    lock, open_storage, shared, FetchLedger, RecordQuery, RecordStore, RunLog, SharedStorage,
    SqliteStorage,
};
use roster_harvest::{CrawlState, FetchStatus, Orchestrator};
use std::io::Write;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = r#"
<html><body>
    <a class="team" href="/team/1">Tokyo Hawks</a>
    <a class="team" href="/team/2">Osaka Owls</a>
</body></html>
"#;

const HAWKS: &str = r#"
<html><body>
<table id="roster"><tbody>
    <tr>
        <td class="name"><a href="/player/7">Jane Doe</a></td>
        <td class="height">201cm</td>
        <td class="pos">F</td>
        <td class="nat"><img alt="Canadian" src="/flags/ca.png"></td>
    </tr>
    <tr>
        <td class="name"><a href="/player/8">John Roe</a></td>
        <td class="height">6'2"</td>
        <td class="pos">Guard</td>
        <td class="nat"><img alt="Japanese" src="/flags/jp.png"></td>
    </tr>
</tbody></table>
</body></html>
"#;

const OWLS: &str = r#"
<html><body>
<table id="roster"><tbody>
    <tr>
        <td class="name"><a href="/player/9">Ken Sato</a></td>
        <td class="height">190 cm</td>
        <td class="pos">C</td>
    </tr>
</tbody></table>
</body></html>
"#;

const JANE: &str = r#"
<html><body>
    <div class="details"><span class="weight">Weight: 95 kg</span></div>
    <span class="dob">1990-01-15</span>
</body></html>
"#;

const JOHN: &str = r#"
<html><body>
    <div class="details"><span class="weight">210 lbs</span></div>
</body></html>
"#;

const KEN: &str = r#"
<html><body>
    <div class="details"><span class="weight">102 kg</span></div>
</body></html>
"#;

/// Creates a test configuration with one source rooted at `base_url`
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_retries: 3,
            backoff_base_ms: 10, // Very short for testing
            request_timeout_secs: 5,
            leaf_delay_ms: 0,
            group_delay_ms: 0,
            enrich_leaves: true,
            refetch_window_hours: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        sources: vec![SourceConfig {
            id: "demo-league".to_string(),
            category: "Basketball".to_string(),
            units: vec![UnitEntry {
                label: "Japan".to_string(),
                url: format!("{}/japan", base_url),
            }],
            selectors: SelectorConfig {
                group_link: "a.team".to_string(),
                record_row: Some("table#roster tbody tr".to_string()),
                leaf_link: None,
                row: FieldSelectors {
                    name: Some("td.name a".to_string()),
                    link: Some("td.name a@href".to_string()),
                    height: Some("td.height".to_string()),
                    role: Some("td.pos".to_string()),
                    country: Some("td.nat img@alt".to_string()),
                    ..Default::default()
                },
                detail: FieldSelectors {
                    weight: Some("div.details .weight".to_string()),
                    birth_date: Some("span.dob".to_string()),
                    ..Default::default()
                },
            },
        }],
    }
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts the whole demo site
async fn mount_site(server: &MockServer) {
    mount_page(server, "/japan", INDEX).await;
    mount_page(server, "/team/1", HAWKS).await;
    mount_page(server, "/team/2", OWLS).await;
    mount_page(server, "/player/7", JANE).await;
    mount_page(server, "/player/8", JOHN).await;
    mount_page(server, "/player/9", KEN).await;
}

fn memory_storage() -> SharedStorage {
    shared(SqliteStorage::open_in_memory().expect("Failed to create in-memory storage"))
}

#[tokio::test]
async fn test_full_crawl_single_source() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let config = create_test_config(&base_url, ":memory:");
    let storage = memory_storage();
    let orchestrator = Orchestrator::from_config(&config, storage.clone(), "test-hash")
        .expect("Failed to create orchestrator");

    let state = orchestrator.run().await.expect("Crawl should start");
    assert_eq!(state, CrawlState::Completed);

    let progress = orchestrator.status();
    assert_eq!(progress.state, CrawlState::Completed);
    assert!(!progress.is_running);
    assert_eq!(progress.processed_count, 3);
    assert!(progress.recent_errors.is_empty(), "{:?}", progress.recent_errors);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_records().unwrap(), 3);

    let jane = storage
        .get_record(&format!("{}/player/7", base_url))
        .unwrap()
        .expect("Jane should be stored");
    assert_eq!(jane.record.name, "Jane Doe");
    assert_eq!(jane.record.height.as_deref(), Some("6'7\""));
    assert_eq!(jane.record.weight.as_deref(), Some("95"));
    assert_eq!(jane.record.role.as_deref(), Some("Forward"));
    assert_eq!(jane.record.country.as_deref(), Some("Canada"));
    assert_eq!(jane.record.group.as_deref(), Some("Tokyo Hawks"));
    assert_eq!(jane.record.category, "Basketball");
    assert_eq!(jane.record.source_id, "demo-league");
    assert!(jane.record.age.is_some());

    let john = storage
        .get_record(&format!("{}/player/8", base_url))
        .unwrap()
        .expect("John should be stored");
    assert_eq!(john.record.height.as_deref(), Some("6'2\""));
    assert_eq!(john.record.weight.as_deref(), Some("210"));
    assert_eq!(john.record.country.as_deref(), Some("Japan"));
    assert_eq!(john.record.age, None);

    // Every fetched page has exactly one ledger entry
    assert_eq!(storage.count_fetch_entries(None).unwrap(), 6);
    assert_eq!(storage.count_fetch_entries(Some(FetchStatus::Failed)).unwrap(), 0);

    let run = storage.latest_run().unwrap().expect("Run should be recorded");
    assert_eq!(run.status, CrawlState::Completed);
    assert_eq!(run.processed_count, 3);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_crawl_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/japan"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let storage = memory_storage();
    let state = crawl(&config, storage.clone(), "hash").await.unwrap();

    // An index page without group links is a recovered failure
    assert_eq!(state, CrawlState::Completed);
    let storage = lock(&storage).unwrap();
    let errors = storage.recent_error_log(10).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("index"));
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // First request to the team page fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/team/1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_site(&mock_server).await;

    let config = create_test_config(&base_url, ":memory:");
    let storage = memory_storage();
    let state = crawl(&config, storage.clone(), "hash").await.unwrap();
    assert_eq!(state, CrawlState::Completed);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_records().unwrap(), 3);

    let entry = storage
        .get_fetch_entry(&format!("{}/team/1", base_url))
        .unwrap()
        .expect("Team page should be in the ledger");
    assert_eq!(entry.last_status, FetchStatus::Success);
    assert_eq!(entry.last_error, None);
}

#[tokio::test]
async fn test_failed_enrichment_keeps_inline_record() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/player/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    mount_site(&mock_server).await;

    let config = create_test_config(&base_url, ":memory:");
    let storage = memory_storage();
    let orchestrator = Orchestrator::from_config(&config, storage.clone(), "hash").unwrap();
    let state = orchestrator.run().await.unwrap();

    // A failed leaf does not abort the run
    assert_eq!(state, CrawlState::Completed);
    assert_eq!(orchestrator.status().recent_errors.len(), 1);

    let storage = lock(&storage).unwrap();
    let player_url = format!("{}/player/7", base_url);

    let jane = storage.get_record(&player_url).unwrap().expect("Inline record kept");
    assert_eq!(jane.record.height.as_deref(), Some("6'7\""));
    assert_eq!(jane.record.weight, None);

    let entry = storage.get_fetch_entry(&player_url).unwrap().unwrap();
    assert_eq!(entry.last_status, FetchStatus::Failed);
    assert_eq!(entry.last_error.as_deref(), Some("HTTP 404"));

    let errors = storage.recent_error_log(10).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].url.as_deref(), Some(player_url.as_str()));
}

#[tokio::test]
async fn test_recrawl_merges_without_losing_data() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let config = create_test_config(&base_url, ":memory:");
    let storage = memory_storage();
    crawl(&config, storage.clone(), "hash").await.unwrap();

    // The second pass cannot reach the player pages
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/player/7"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/japan", INDEX).await;
    mount_page(&mock_server, "/team/1", HAWKS).await;
    mount_page(&mock_server, "/team/2", OWLS).await;
    mount_page(&mock_server, "/player/8", JOHN).await;
    mount_page(&mock_server, "/player/9", KEN).await;

    crawl(&config, storage.clone(), "hash").await.unwrap();

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_records().unwrap(), 3);

    let jane = storage
        .get_record(&format!("{}/player/7", base_url))
        .unwrap()
        .unwrap();
    assert_eq!(jane.record.weight.as_deref(), Some("95"));
    assert!(jane.record.age.is_some());
    assert!(jane.updated_at >= jane.created_at);
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("players.db");
    let config_path = dir.path().join("harvest.toml");

    let toml = format!(
        r#"
[crawler]
backoff-base-ms = 10
leaf-delay-ms = 0
group-delay-ms = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[output]
database-path = "{db}"

[[source]]
id = "demo-league"
category = "Basketball"
units = [{{ label = "Japan", url = "{base}/japan" }}]

[source.selectors]
group-link = "a.team"
record-row = "table#roster tbody tr"

[source.selectors.row]
name = "td.name a"
link = "td.name a@href"
height = "td.height"
role = "td.pos"

[source.selectors.detail]
weight = "div.details .weight"
"#,
        db = db_path.display(),
        base = base_url
    );
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(toml.as_bytes()).unwrap();

    let (config, hash) = load_config_with_hash(&config_path).expect("Config should load");
    assert_eq!(hash.len(), 64);

    let storage = shared(open_storage(&db_path).unwrap());
    let state = crawl(&config, storage, &hash).await.unwrap();
    assert_eq!(state, CrawlState::Completed);

    // Reopen the on-disk database
    let storage = open_storage(&db_path).unwrap();
    let page = storage
        .query_records(&RecordQuery {
            role: Some("Center".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].record.name, "Ken Sato");
    assert_eq!(page.records[0].record.height.as_deref(), Some("6'3\""));
    assert_eq!(page.records[0].record.weight.as_deref(), Some("102"));
    assert_eq!(page.records[0].record.group.as_deref(), Some("Osaka Owls"));

    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.config_hash, hash);
}

#[tokio::test]
async fn test_stop_cancels_background_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_site(&mock_server).await;

    let config = create_test_config(&base_url, ":memory:");
    let storage = memory_storage();
    let orchestrator = Orchestrator::from_config(&config, storage.clone(), "hash").unwrap();

    // The spawned run cannot make progress before the first await below
    let handle = orchestrator.start().unwrap();
    assert!(orchestrator.is_running());
    assert!(orchestrator.start().is_err());

    assert!(orchestrator.stop());
    let state = handle.await.unwrap();

    assert_eq!(state, CrawlState::Cancelled);
    assert_eq!(orchestrator.status().state, CrawlState::Cancelled);
    assert!(!orchestrator.is_running());
    assert_eq!(lock(&storage).unwrap().count_records().unwrap(), 0);
}
