use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use catalog_core::builder::build_index_set;
use catalog_core::persist::{save_index_set, IndexPaths};
use catalog_core::{Corpus, Document, Review};
use catalog_server::{build_app, ServerOptions};
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn product(key: &str, title: &str, description: &str, ratings: &[f64]) -> Document {
    Document {
        key: Some(key.into()),
        title: title.into(),
        description: description.into(),
        reviews: ratings.iter().map(|&rating| Review { rating, text: String::new() }).collect(),
        ..Default::default()
    }
}

fn write_index(dir: &Path, docs: Vec<Document>) {
    let set = build_index_set(&Corpus::from_documents(docs));
    save_index_set(&IndexPaths::new(dir), &set, "2024-01-01T00:00:00Z".into()).unwrap();
}

fn build_tiny_index(dir: &Path) {
    write_index(
        dir,
        vec![
            product("/p/1", "Red Shoes", "comfortable red shoes", &[5.0]),
            product("/p/2", "Blue Shoes", "blue shoes for running", &[]),
            product("/p/3", "Trainer", "lightweight trainer", &[3.0, 4.0]),
        ],
    );
}

fn app(dir: &Path, token: Option<&str>) -> Router {
    let synonyms = dir.join("synonyms.json");
    fs::write(&synonyms, r#"{"sneaker": ["trainer"]}"#).unwrap();
    build_app(ServerOptions {
        index_dir: dir.to_path_buf(),
        synonyms: Some(synonyms),
        admin_token: token.map(str::to_string),
    })
    .unwrap()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path(), None), "/search?q=red%20shoes").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_documents"], 3);
    assert_eq!(json["filtered_documents"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["url"], "/p/1");
    assert_eq!(arr[0]["title"], "Red Shoes");
    assert_eq!(arr[1]["url"], "/p/2");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn synonyms_are_loaded_at_startup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (_, body) = get(app(dir.path(), None), "/search?q=sneaker").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["url"], "/p/3");
}

#[tokio::test]
async fn empty_query_has_no_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = get(app(dir.path(), None), "/search?q=").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["filtered_documents"], 0);
    assert_eq!(json["results"], serde_json::json!([]));
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), None);
    for uri in ["/search?q=shoes&k1=0", "/search?q=shoes&b=2", "/search?q=shoes&fields=price", "/search?q=shoes&filter=color"] {
        let (status, _) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn match_all_and_limit() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), None);
    let (_, body) = get(app.clone(), "/search?q=blue%20shoes&match_all=true").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["filtered_documents"], 1);

    let (_, body) = get(app, "/search?q=shoes&limit=1").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["filtered_documents"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn doc_lookup_by_key() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), None);
    let (status, body) = get(app.clone(), "/doc?key=%2Fp%2F3").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "Trainer");
    assert_eq!(json["reviews"]["total_reviews"], 2);
    assert_eq!(json["reviews"]["average_rating"], 3.5);

    let (status, _) = get(app, "/doc?key=%2Fp%2F404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn startup_fails_without_core_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    fs::remove_file(dir.path().join("title_index.json")).unwrap();
    assert!(build_app(ServerOptions::new(dir.path())).is_err());
}

#[tokio::test]
async fn reload_swaps_in_rebuilt_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path(), Some("secret"));

    let reload = || Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), Request::post("/admin/reload").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    write_index(dir.path(), vec![product("/p/9", "Green Hat", "wool hat", &[])]);
    let (status, body) = call(app.clone(), reload()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["num_docs"], 1);

    let (_, body) = get(app.clone(), "/search?q=hat").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["url"], "/p/9");

    // a broken directory leaves the current snapshot serving
    fs::write(dir.path().join("doc_lengths.json"), "[").unwrap();
    let (status, _) = call(app.clone(), reload()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (_, body) = get(app, "/search?q=hat").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_documents"], 1);
}
