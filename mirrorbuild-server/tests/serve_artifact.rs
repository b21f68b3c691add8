use std::fs;

use mirrorbuild_server::{serve, ServerError, HEALTH_PATH};
use tempfile::TempDir;

/// Blocking GET from a worker thread, so the server keeps running.
async fn get(url: String) -> (u16, String) {
    tokio::task::spawn_blocking(move || match ureq::get(&url).call() {
        Ok(resp) => {
            let status = resp.status();
            (status, resp.into_string().expect("body"))
        }
        Err(ureq::Error::Status(code, resp)) => (code, resp.into_string().unwrap_or_default()),
        Err(err) => panic!("request to {url} failed: {err}"),
    })
    .await
    .expect("join")
}

fn artifact() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    fs::create_dir_all(tmp.path().join("static/chunks")).expect("mkdir");
    fs::write(tmp.path().join("index.html"), "<h1>checkout</h1>").expect("write");
    fs::write(tmp.path().join("static/chunks/app.js"), "console.log(1)").expect("write");
    tmp
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_artifact_files_and_index() {
    let dir = artifact();
    let server = serve(dir.path(), 0).await.expect("serve");

    let (status, body) = get(format!("{}/", server.url())).await;
    assert_eq!(status, 200);
    assert_eq!(body, "<h1>checkout</h1>");

    let (status, body) = get(format!("{}/static/chunks/app.js", server.url())).await;
    assert_eq!(status, 200);
    assert_eq!(body, "console.log(1)");

    let (status, _) = get(format!("{}/nope.js", server.url())).await;
    assert_eq!(status, 404);

    let (status, body) = get(format!("{}{HEALTH_PATH}", server.url())).await;
    assert_eq!((status, body.as_str()), (200, "ok"));

    server.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn port_is_released_after_shutdown() {
    let dir = artifact();
    let server = serve(dir.path(), 0).await.expect("serve");
    let port = server.port();
    server.shutdown().await.expect("shutdown");

    let again = serve(dir.path(), port).await.expect("rebind same port");
    assert_eq!(again.port(), port);
    again.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_port_is_a_bind_error() {
    let dir = artifact();
    let first = serve(dir.path(), 0).await.expect("serve");

    let err = serve(dir.path(), first.port()).await.unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }), "got: {err}");
    first.shutdown().await.expect("shutdown");
}
