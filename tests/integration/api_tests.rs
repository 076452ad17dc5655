use super::*;
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_root_reports_running() -> anyhow::Result<()> {
    let state = create_test_app_state(ScriptedBrowser::default()).await?;
    let (status, body) = make_request(state, Method::GET, "/", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("API is running..."));
    Ok(())
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let state = create_test_app_state(ScriptedBrowser::default()).await?;
    let (status, body) = make_request(state, Method::GET, "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "catalog");
    Ok(())
}

#[tokio::test]
async fn test_search_requires_query() -> anyhow::Result<()> {
    let state = create_test_app_state(ScriptedBrowser::default()).await?;

    for payload in [json!({ "query": "" }), json!({})] {
        let (status, body) =
            make_request(state.clone(), Method::POST, "/api/search", Some(payload)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query is required");
    }
    Ok(())
}

#[tokio::test]
async fn test_search_scrapes_then_lists() -> anyhow::Result<()> {
    let browser = ScriptedBrowser::new(catalog_pages(MarketplaceSource::Kaspi, 3));
    let state = create_test_app_state(browser.clone()).await?;

    let (status, body) = make_request(
        state.clone(),
        Method::POST,
        "/api/search",
        Some(json!({ "query": "Phone Case" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().expect("search returns a list");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["source"], "Kaspi");
    assert_eq!(results[0]["query"], QUERY);
    assert!(results[0]["imageSrc"].as_str().unwrap().starts_with("https://kaspi.test/"));

    let (status, body) = make_request(state.clone(), Method::GET, "/api/products", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = make_request(state.clone(), Method::GET, "/api/popular", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    // Served from the catalog the second time.
    let visits = browser.visits().len();
    let (status, _) = make_request(
        state,
        Method::POST,
        "/api/search",
        Some(json!({ "query": "phone case" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(browser.visits().len(), visits);
    Ok(())
}

#[tokio::test]
async fn test_search_with_no_results_returns_empty_list() -> anyhow::Result<()> {
    let state = create_test_app_state(ScriptedBrowser::default()).await?;
    let (status, body) = make_request(
        state,
        Method::POST,
        "/api/search",
        Some(json!({ "query": "unobtainium" })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_security_headers_on_api_routes() -> anyhow::Result<()> {
    let state = create_test_app_state(ScriptedBrowser::default()).await?;
    let response = create_router(state)
        .oneshot(Request::builder().uri("/api/products").body(Body::empty())?)
        .await?;

    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    Ok(())
}
