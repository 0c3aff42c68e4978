use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct CreateHabitResponse {
    success: bool,
    habit_id: u64,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("habit_tracker_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_habit_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn create_habit(client: &Client, base_url: &str, name: &str, period: &str) -> u64 {
    let start = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    let response = client
        .post(format!("{base_url}/api/habits"))
        .json(&json!({
            "name": name,
            "frequency": 1,
            "period": period,
            "goal": "1 month",
            "start_date": start,
            "notes": "integration",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: CreateHabitResponse = response.json().await.unwrap();
    assert!(created.success);
    created.habit_id
}

async fn get_json(client: &Client, url: String) -> (StatusCode, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn http_habit_lifecycle() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let habit_id = create_habit(&client, base, "lifecycle", "daily").await;

    let (status, detail) = get_json(&client, format!("{base}/api/habits/{habit_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["habit"]["name"], "lifecycle");
    assert!(detail["streak"].is_object());
    assert_eq!(detail["streak"]["current_streak"], 0);
    let first_task = detail["tasks"][0]["id"].as_u64().unwrap();
    assert_eq!(detail["tasks"][0]["status"], "Pending");

    let response = client
        .post(format!("{base}/api/tasks/complete"))
        .json(&json!({ "task_id": first_task, "habit_id": habit_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let completed: Value = response.json().await.unwrap();
    assert_eq!(completed["streak"]["current_streak"], 1);
    assert_eq!(completed["streak"]["longest_streak"], 1);
    assert_eq!(completed["achievement"]["streak_length"], 1);

    let again = client
        .post(format!("{base}/api/tasks/complete"))
        .json(&json!({ "task_id": first_task }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let body: Value = again.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already resolved"));

    let (_, detail) = get_json(&client, format!("{base}/api/habits/{habit_id}")).await;
    assert_eq!(detail["streak"]["num_of_completed_tasks"], 1);
    assert_eq!(detail["achievements"].as_array().unwrap().len(), 1);

    let deleted = client
        .delete(format!("{base}/api/habits/{habit_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let (status, _) = get_json(&client, format!("{base}/api/habits/{habit_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let deleted_again = client
        .delete(format!("{base}/api/habits/{habit_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted_again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_create_habit_reports_field_errors() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/habits", server.base_url))
        .json(&json!({ "name": "  ", "frequency": 0, "period": "daily", "goal": "1 month" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Validation failed");
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["frequency"].is_array());
    assert!(body["errors"]["start_date"].is_array());

    let response = client
        .post(format!("{}/api/habits", server.base_url))
        .json(&json!({
            "name": "yearly thing",
            "frequency": 1,
            "period": "annual",
            "goal": "1 year",
            "start_date": "2024-01-01",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_task_queries_and_notes() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let habit_id = create_habit(&client, base, "weekly review", "weekly").await;

    let (status, active) = get_json(&client, format!("{base}/api/tasks?type=active&period=weekly")).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = active["tasks"].as_array().unwrap();
    assert!(tasks.iter().any(|task| task["habit"]["id"] == habit_id));

    let (status, upcoming) = get_json(&client, format!("{base}/api/tasks?type=upcoming")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(upcoming["tasks"].as_array().unwrap().len() >= 1);

    let (status, _) = get_json(&client, format!("{base}/api/tasks?type=someday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = client
        .patch(format!("{base}/api/habits/{habit_id}/notes"))
        .json(&json!({ "notes": "sunday evening" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["notes"], "sunday evening");
}

#[tokio::test]
async fn http_analysis_endpoints() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;

    let habit_id = create_habit(&client, base, "analysis", "monthly").await;

    let (status, report) = get_json(&client, format!("{base}/api/analysis?window_days=7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["window_days"], 7);
    assert!(report["monthly_habits"]
        .as_array()
        .unwrap()
        .iter()
        .any(|habit| habit["id"] == habit_id));
    assert_eq!(report["activity"]["last_7_days"].as_array().unwrap().len(), 7);

    let (status, struggled) =
        get_json(&client, format!("{base}/api/analysis/struggled?period=monthly")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(struggled.is_null());

    let (status, _) = get_json(&client, format!("{base}/api/analysis/struggled")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, habit) = get_json(&client, format!("{base}/api/analysis/habits/{habit_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(habit["streak"]["longest_streak"], 0);
}
