//! End-to-end pip resolution over a mocked PyPI registry, covering the
//! `flask==2.0.0` scenario: transitive deps resolve, the flat package list
//! has no version conflicts, and each package's artifact URL is populated.

use std::sync::Arc;

use depot::cache::metadata_cache::MetadataCache;
use depot::fetchers::http_client::build_client;
use depot::fetchers::pypi::PypiFetcher;
use depot::options::ResolveOptions;
use depot::resolvers::{self, pip::PipResolver};

fn package_body(requires_dist: &[&str], version: &str, download_url: &str) -> serde_json::Value {
    serde_json::json!({
        "info": {"requires_dist": requires_dist},
        "releases": {
            version: [{
                "filename": format!("pkg-{version}-py3-none-any.whl"),
                "url": download_url,
                "python_version": "py3",
                "yanked": false,
                "digests": {"sha256": format!("sha-{version}")}
            }]
        }
    })
}

#[tokio::test]
async fn resolves_flask_with_its_declared_dependencies() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let mocks = vec![
        server
            .mock("GET", "/pypi/flask/json")
            .with_status(200)
            .with_body(package_body(&["Werkzeug>=2.0", "Jinja2>=3.0", "itsdangerous>=2.0", "click>=7.1"], "2.0.0", &format!("{base}/flask.whl")).to_string())
            .create_async()
            .await,
        server.mock("GET", "/pypi/Werkzeug/json").with_status(200).with_body(package_body(&[], "2.0.0", &format!("{base}/werkzeug.whl")).to_string()).create_async().await,
        server.mock("GET", "/pypi/Jinja2/json").with_status(200).with_body(package_body(&[], "3.0.0", &format!("{base}/jinja2.whl")).to_string()).create_async().await,
        server.mock("GET", "/pypi/itsdangerous/json").with_status(200).with_body(package_body(&[], "2.0.0", &format!("{base}/itsdangerous.whl")).to_string()).create_async().await,
        server.mock("GET", "/pypi/click/json").with_status(200).with_body(package_body(&[], "7.1.0", &format!("{base}/click.whl")).to_string()).create_async().await,
    ];

    let client = build_client(4);
    let cache = Arc::new(MetadataCache::new(None, 32));
    let fetcher = PypiFetcher::new(client, cache).with_registry(&base);
    let options = ResolveOptions::default();
    let resolver = PipResolver::new(fetcher, &options);

    let result = resolvers::resolve(&resolver, &[("flask".to_string(), String::new())], &options).await.unwrap();

    assert!(result.conflicts.is_empty());
    assert!(result.failed.is_empty());
    assert!(result.packages.len() >= 4, "expected at least 4 resolved packages, got {}", result.packages.len());
    assert!(result.packages.iter().all(|p| p.url.is_some()));

    for mock in mocks {
        mock.assert_async().await;
    }
}
