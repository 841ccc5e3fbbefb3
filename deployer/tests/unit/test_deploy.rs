//! End-to-end deployment tests against the mock endpoint

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rundeploy::package::artifact::{Artifact, Payload};
use rundeploy::{DeployArgs, DeployError, DeployRequest, Deployer, ExecutionMode, JobStatus};

use crate::support::{
    test_deployer, test_options, CancellingSleeper, MockRemote, RecordingSleeper, API_KEY,
    ENDPOINT_ID,
};

fn submitted_payload(remote: &MockRemote, index: usize) -> Payload {
    let body = remote.submissions()[index].body.clone().unwrap();
    serde_json::from_value(body["input"].clone()).unwrap()
}

fn archive_names(artifact: &Artifact) -> Vec<String> {
    let bytes = STANDARD.decode(artifact.content()).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_sync_single_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"status": "COMPLETED", "output": {"result": "hi"}}))],
        vec![],
    )
    .await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync)
        .with_entrypoint("hello.py");
    let result = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.output.as_ref().unwrap()["result"], "hi");
    assert!(result.sync);
    assert_eq!(result.job_id, "sync-job");
    assert_eq!(result.endpoint_id, ENDPOINT_ID);

    // Synchronous deploys never poll.
    assert!(remote.status_calls().is_empty());
    assert!(sleeper.waits().is_empty());

    let submissions = remote.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].path, "/v2/ep-test/runsync");
    assert_eq!(
        submissions[0].authorization.as_deref(),
        Some(format!("Bearer {API_KEY}").as_str())
    );

    let payload = submitted_payload(&remote, 0);
    assert_eq!(
        payload.artifact,
        Artifact::SingleFile {
            file: "print(\"hi\")".to_string(),
            filename: "hello.py".to_string(),
        }
    );
    assert_eq!(payload.entrypoint.as_deref(), Some("hello.py"));
}

#[tokio::test]
async fn test_async_directory_polls_until_complete() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("worker");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("main.py"), "import helper").unwrap();
    fs::write(root.join("helper.py"), "def run(): return 1").unwrap();
    fs::write(root.join(".secrets"), "token=abc").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-42", "status": "IN_QUEUE"}))],
        vec![
            (200, json!({"id": "job-42", "status": "IN_PROGRESS"})),
            (200, json!({"id": "job-42", "status": "COMPLETED", "output": {"ok": true}})),
        ],
    )
    .await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &root, ExecutionMode::Async)
        .with_entrypoint("main.py")
        .with_env(HashMap::from([("MODE".to_string(), "test".to_string())]));
    let result = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.job_id, "job-42");
    assert_eq!(result.output, Some(json!({"ok": true})));
    assert!(!result.sync);

    let status_calls = remote.status_calls();
    assert_eq!(status_calls.len(), 2);
    assert!(status_calls
        .iter()
        .all(|c| c.path == "/v2/ep-test/status/job-42"));
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(2)]);

    let submissions = remote.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].path, "/v2/ep-test/run");

    let payload = submitted_payload(&remote, 0);
    assert_eq!(archive_names(&payload.artifact), vec!["helper.py", "main.py"]);
    assert_eq!(payload.env.get("MODE").map(String::as_str), Some("test"));
    match payload.artifact {
        Artifact::Archive { workdir, .. } => assert_eq!(workdir, "worker"),
        other => panic!("expected archive, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limited_twice_then_accepted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![
            (429, json!({"error": "too many requests"})),
            (429, json!({"error": "too many requests"})),
            (200, json!({"id": "sync-7", "status": "COMPLETED", "output": 3})),
        ],
        vec![],
    )
    .await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync);
    let result = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.job_id, "sync-7");
    assert_eq!(remote.submissions().len(), 3);
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );

    // Every attempt carries the same payload.
    let first = submitted_payload(&remote, 0);
    assert_eq!(submitted_payload(&remote, 2), first);
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(vec![(429, json!({})); 5], vec![]).await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::RateLimitExhausted { attempts: 5 }));
    assert_eq!(remote.submissions().len(), 5);
    assert!(remote.status_calls().is_empty());
    assert_eq!(
        sleeper.waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );
}

#[tokio::test]
async fn test_oversized_payload_never_reaches_network() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.txt");
    fs::write(&path, "a".repeat(11 * 1024 * 1024)).unwrap();

    let remote = MockRemote::start(vec![(200, json!({"id": "job-1"}))], vec![]).await;
    let deployer = test_deployer(&remote.base_url, Arc::new(RecordingSleeper::default()));

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::PayloadTooLarge { mode: "async", .. }));
    assert!(err.to_string().contains("exceeds 10.0MiB limit"));
    assert_eq!(remote.request_count(), 0);
}

#[tokio::test]
async fn test_missing_credential_never_reaches_network() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(vec![(200, json!({}))], vec![]).await;
    let mut options = test_options(&remote.base_url);
    options.client.api_key = None;
    let deployer = Deployer::new(options).unwrap();

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::MissingCredential));
    assert_eq!(remote.request_count(), 0);
}

#[tokio::test]
async fn test_missing_source_path() {
    let remote = MockRemote::start(vec![], vec![]).await;
    let deployer = test_deployer(&remote.base_url, Arc::new(RecordingSleeper::default()));

    let request = DeployRequest::new(ENDPOINT_ID, "/nonexistent/project", ExecutionMode::Sync);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::PathRead { .. }));
    assert!(err.to_string().contains("/nonexistent/project"));
    assert_eq!(remote.request_count(), 0);
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(vec![(500, json!({"error": "worker crashed"}))], vec![]).await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        DeployError::Http { status, body } => {
            assert_eq!(*status, 500);
            assert!(body.contains("worker crashed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(remote.submissions().len(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_poll_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-9", "status": "IN_QUEUE"}))],
        vec![(404, json!({"error": "job not found"}))],
    )
    .await;
    let sleeper = Arc::new(RecordingSleeper::default());
    let deployer = test_deployer(&remote.base_url, sleeper.clone());

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::PollFailed { status: 404, .. }));
    assert!(err.to_string().contains("job not found"));
    assert_eq!(remote.status_calls().len(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_failed_job_is_a_result() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crash.py");
    fs::write(&path, "1/0").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-5", "status": "IN_QUEUE"}))],
        vec![(
            200,
            json!({"id": "job-5", "status": "FAILED", "error": "ZeroDivisionError: division by zero"}),
        )],
    )
    .await;
    let deployer = test_deployer(&remote.base_url, Arc::new(RecordingSleeper::default()));

    let args = DeployArgs {
        endpoint_id: ENDPOINT_ID.to_string(),
        workdir_or_file: path.to_string_lossy().into_owned(),
        entrypoint: Some("crash.py".to_string()),
        env: HashMap::new(),
        sync: false,
    };
    let result = deployer
        .deploy_args(args, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("ZeroDivisionError: division by zero")
    );
    assert!(result.output.is_none());
}

#[tokio::test]
async fn test_timeout_names_endpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote =
        MockRemote::start_slow(vec![(200, json!({"status": "COMPLETED"}))], Duration::from_secs(3))
            .await;
    let mut options = test_options(&remote.base_url);
    options.client.request_timeout = Duration::from_millis(200);
    let deployer = Deployer::new(options).unwrap();

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        DeployError::Timeout { endpoint_id } => assert_eq!(endpoint_id, ENDPOINT_ID),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains(ENDPOINT_ID));
}

#[tokio::test]
async fn test_cancel_while_polling() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-3", "status": "IN_QUEUE"}))],
        vec![(200, json!({"id": "job-3", "status": "IN_PROGRESS"}))],
    )
    .await;

    let cancel = CancellationToken::new();
    let deployer = test_deployer(
        &remote.base_url,
        Arc::new(CancellingSleeper {
            token: cancel.clone(),
        }),
    );

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = deployer.deploy(&request, &cancel).await.unwrap_err();

    assert!(matches!(err, DeployError::Cancelled));
    assert_eq!(remote.status_calls().len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_submission() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(vec![(200, json!({"status": "COMPLETED"}))], vec![]).await;
    let deployer = test_deployer(&remote.base_url, Arc::new(RecordingSleeper::default()));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Sync);
    let err = deployer.deploy(&request, &cancel).await.unwrap_err();

    assert!(matches!(err, DeployError::Cancelled));
    assert_eq!(remote.request_count(), 0);
}

#[tokio::test]
async fn test_poll_deadline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-8", "status": "IN_QUEUE"}))],
        vec![(200, json!({"id": "job-8", "status": "IN_QUEUE"}))],
    )
    .await;
    let mut options = test_options(&remote.base_url);
    options.polling.deadline = Some(Duration::ZERO);
    let deployer = Deployer::new(options)
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::default()));

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        DeployError::DeadlineExceeded { job_id } => assert_eq!(job_id, "job-8"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(remote.status_calls().len(), 1);
}

#[tokio::test]
async fn test_concurrent_deploys_are_independent() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("one.py");
    let second = dir.path().join("two.py");
    fs::write(&first, "print(1)").unwrap();
    fs::write(&second, "print(2)").unwrap();

    let remote = MockRemote::start(
        vec![
            (200, json!({"status": "COMPLETED"})),
            (200, json!({"status": "COMPLETED"})),
        ],
        vec![],
    )
    .await;
    let deployer = test_deployer(&remote.base_url, Arc::new(RecordingSleeper::default()));
    let cancel = CancellationToken::new();

    let request_one = DeployRequest::new(ENDPOINT_ID, &first, ExecutionMode::Sync);
    let request_two = DeployRequest::new("ep-other", &second, ExecutionMode::Sync);
    let (one, two) = tokio::join!(
        deployer.deploy(&request_one, &cancel),
        deployer.deploy(&request_two, &cancel)
    );

    assert_eq!(one.unwrap().endpoint_id, ENDPOINT_ID);
    assert_eq!(two.unwrap().endpoint_id, "ep-other");

    let mut paths: Vec<String> = remote.submissions().into_iter().map(|s| s.path).collect();
    paths.sort();
    assert_eq!(paths, vec!["/v2/ep-other/runsync", "/v2/ep-test/runsync"]);
}

#[tokio::test]
async fn test_async_duration_includes_poll_wait() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-11", "status": "IN_QUEUE"}))],
        vec![
            (200, json!({"id": "job-11", "status": "IN_PROGRESS"})),
            (200, json!({"id": "job-11", "status": "COMPLETED", "output": "done"})),
        ],
    )
    .await;
    let interval = Duration::from_millis(250);
    let mut options = test_options(&remote.base_url);
    options.polling.interval = interval;
    // Real timer between polls.
    let deployer = Deployer::new(options).unwrap();

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let result = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(remote.status_calls().len(), 2);
    assert!(
        result.duration >= interval,
        "duration {:?} is shorter than the poll interval",
        result.duration
    );
}

#[tokio::test]
async fn test_deadline_cuts_poll_wait_short() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.py");
    fs::write(&path, "print(\"hi\")").unwrap();

    let remote = MockRemote::start(
        vec![(200, json!({"id": "job-12", "status": "IN_QUEUE"}))],
        vec![(200, json!({"id": "job-12", "status": "IN_PROGRESS"}))],
    )
    .await;
    let mut options = test_options(&remote.base_url);
    options.polling.interval = Duration::from_secs(60);
    options.polling.deadline = Some(Duration::from_millis(300));
    let deployer = Deployer::new(options).unwrap();

    let request = DeployRequest::new(ENDPOINT_ID, &path, ExecutionMode::Async);
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        deployer.deploy(&request, &CancellationToken::new()),
    )
    .await
    .expect("deadline should end the wait before the next poll")
    .unwrap_err();

    match &err {
        DeployError::DeadlineExceeded { job_id } => assert_eq!(job_id, "job-12"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(remote.status_calls().len(), 1);
}
