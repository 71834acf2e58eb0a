//! Shared helpers: a local upstream serving canned series files.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, http::Uri, Router};
use climate_store::{ClimateStore, SqliteStore};
use importer::{FetchConfig, Importer, MetOfficeFetcher};

/// One row, 17 records: the canonical UK maximum temperature example.
pub const UK_TMAX: &str = "\
Mean Temperature (°C) for region UK
Areal series, starting from 1884
Monthly, seasonal and annual values
year  jan  feb  mar  apr  may  jun  jul  aug  sep  oct  nov  dec  win  spr  sum  aut  ann
1990  1.0  2.0  3.0  4.0  5.0  6.0  7.0  8.0  9.0 10.0 11.0 12.0  1.5  4.0  7.0 10.0  5.9
";

/// Two years, the second still in progress.
pub const UK_TMAX_TWO_YEARS: &str = "\
Mean Temperature (°C) for region UK
Areal series, starting from 1884
year  jan  feb  mar  apr  may  jun  jul  aug  sep  oct  nov  dec  win  spr  sum  aut  ann
1990  1.0  2.0  3.0  4.0  5.0  6.0  7.0  8.0  9.0 10.0 11.0 12.0  1.5  4.0  7.0 10.0  5.9
1991  1.1  2.1  3.1  4.1   ---  ---  ---  ---  ---  ---  ---  ---  1.6  ---  ---  ---  ---
";

pub const SCOTLAND_RAINFALL: &str = "\
Rainfall (mm) for Scotland
Areal series, starting from 1836
year  jan  feb  mar  apr  may  jun  jul  aug  sep  oct  nov  dec  win  spr  sum  aut  ann
2000 201.3 150.2 120.0  98.1  80.4  85.0  90.2 110.3 140.8 190.6 210.0 220.7 560.1 298.5 285.5 541.4 1697.6
";

/// A file with no table header.
pub const NO_TABLE: &str = "\
Mean Temperature (°C) for region UK
This dataset has been withdrawn. Please see the new location for this series.
";

pub fn series_path(parameter: &str, region: &str) -> String {
    format!("/datasets/{}/date/{}.txt", parameter, region)
}

#[derive(Default)]
struct Routes {
    responses: HashMap<String, VecDeque<(StatusCode, String)>>,
    hits: HashMap<String, usize>,
}

/// Local HTTP server standing in for the Met Office.
///
/// Each path answers with a queue of responses; the last one repeats.
/// Unknown paths get an empty 404.
pub struct MockUpstream {
    base_url: String,
    routes: Arc<Mutex<Routes>>,
}

async fn serve(
    Extension(routes): Extension<Arc<Mutex<Routes>>>,
    uri: Uri,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    let mut routes = routes.lock().unwrap();
    *routes.hits.entry(path.clone()).or_default() += 1;

    match routes.responses.get_mut(&path) {
        Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
        Some(queue) => queue.front().cloned().unwrap(),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

impl MockUpstream {
    pub async fn start() -> Self {
        let routes = Arc::new(Mutex::new(Routes::default()));
        let app = Router::new()
            .fallback(serve)
            .layer(Extension(routes.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/datasets/", addr),
            routes,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn respond(&self, parameter: &str, region: &str, status: StatusCode, body: &str) {
        self.respond_sequence(parameter, region, vec![(status, body)]);
    }

    pub fn respond_sequence(&self, parameter: &str, region: &str, responses: Vec<(StatusCode, &str)>) {
        let queue = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();
        self.routes
            .lock()
            .unwrap()
            .responses
            .insert(series_path(parameter, region), queue);
    }

    pub fn hits(&self, parameter: &str, region: &str) -> usize {
        self.routes
            .lock()
            .unwrap()
            .hits
            .get(&series_path(parameter, region))
            .copied()
            .unwrap_or(0)
    }
}

pub fn fetch_config(base_url: &str, max_retries: u32, retry_delay: Duration) -> FetchConfig {
    FetchConfig {
        base_url: base_url.to_string(),
        max_retries,
        retry_delay,
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

pub async fn memory_store() -> Arc<dyn ClimateStore> {
    Arc::new(SqliteStore::open_memory().await.unwrap())
}

/// Importer with a single attempt per file.
pub fn test_importer(upstream: &MockUpstream, store: Arc<dyn ClimateStore>) -> Importer {
    let fetcher =
        MetOfficeFetcher::new(fetch_config(upstream.base_url(), 1, Duration::from_millis(1)))
            .unwrap();
    Importer::new(fetcher, store)
}
