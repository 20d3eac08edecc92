use chrono::Utc;
use donasiin_server::server::config::{BackendConfig, MerchantConfig, UserConfig};
use donasiin_server::{backend, server};
use donasiin_shared::api::{self, rest};
use donasiin_shared::week::{WeekWindow, local_date};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;

const ADMIN_EMAIL: &str = "admin@example.org";
const ADMIN_PASSWORD: &str = "rahasia123";
const VIEWER_EMAIL: &str = "relawan@example.org";
const VIEWER_PASSWORD: &str = "relawan123";

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let (addr, handle) = match start_server(dir.path()).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            tempdir: dir,
        })
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let body = self
            .request_expect(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
                StatusCode::OK,
            )
            .await;
        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .expect("access_token missing from login response")
    }

    /// Objects written to a storage bucket on disk.
    fn stored_objects(&self, bucket: &str) -> usize {
        std::fs::read_dir(self.tempdir.path().join("files").join(bucket))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    async fn admin(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        decode(req.send().await.unwrap()).await
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }

    async fn multipart(&self, path: &str, token: Option<&str>, form: Form) -> (StatusCode, Value) {
        let mut req = self
            .client
            .post(format!("{}{}", self.base, path))
            .multipart(form);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        decode(req.send().await.unwrap()).await
    }

    async fn submit(&self, name: &str, phone: &str, amount: i64, proof: Option<Part>) -> (StatusCode, Value) {
        let mut form = Form::new()
            .text("donor_name", name.to_string())
            .text("phone_number", phone.to_string())
            .text("amount", amount.to_string());
        if let Some(p) = proof {
            form = form.part("payment_proof", p);
        }
        self.multipart("/api/v1/donations", None, form).await
    }

    /// Submits a valid donation and returns its id.
    async fn donate(&self, name: &str, phone: &str, amount: i64) -> String {
        let (status, body) = self.submit(name, phone, amount, Some(png("bukti.png"))).await;
        assert_eq!(status, StatusCode::CREATED, "submit returned {body:?}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn approve(&self, token: &str, id: &str) -> Value {
        self.request_expect(
            "POST",
            &format!("/api/v1/admin/donations/{id}/approve"),
            Some(token),
            None,
            StatusCode::OK,
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn decode(resp: reqwest::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let text = resp.text().await.unwrap();
    let val = if text.is_empty() {
        json!(null)
    } else {
        serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
    };
    (status, val)
}

fn png(name: &str) -> Part {
    Part::bytes(b"\x89PNG\r\n\x1a\nfake image body".to_vec())
        .file_name(name.to_string())
        .mime_str("image/png")
        .unwrap()
}

async fn start_server(
    root: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let admin_hash = bcrypt::hash(ADMIN_PASSWORD, 4).unwrap();
    let viewer_hash = bcrypt::hash(VIEWER_PASSWORD, 4).unwrap();
    let config = server::AppConfig {
        listen_port: None,
        dev_cors_origin: None,
        timezone: chrono_tz::Asia::Jakarta,
        min_donation: 1_000,
        max_proof_bytes: 1024 * 1024,
        fallback_target: 1_000_000,
        request_timeout_secs: 5,
        jwt_secret: Some("testsecret".into()),
        admin_emails: vec![ADMIN_EMAIL.into()],
        merchant: MerchantConfig {
            name: "DONASI JUMAT BERKAH".into(),
            city: "JAKARTA".into(),
            postal_code: Some("10110".into()),
            merchant_id: "936000000000000001".into(),
            acquirer_guid: "ID.CO.QRIS.WWW".into(),
            category_code: "8398".into(),
            nmid: None,
        },
        backend: BackendConfig::Sqlite {
            db_path: root.join("test.db").to_string_lossy().into_owned(),
            files_dir: root.join("files"),
            public_base_url: None,
        },
        users: vec![
            UserConfig {
                email: ADMIN_EMAIL.into(),
                password_hash: admin_hash,
            },
            UserConfig {
                email: VIEWER_EMAIL.into(),
                password_hash: viewer_hash,
            },
        ],
    };

    let backend = backend::connect(&config).await.expect("backend");
    let state = server::AppState::new(config, backend);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server
        .request_expect("GET", "/healthz", None, None, StatusCode::OK)
        .await;
    let version = rest::server_version(&server.base).await.unwrap();
    assert!(!version.version.is_empty());

    let summary = rest::ledger_summary(&server.base).await.unwrap();
    assert_eq!(summary.total_income, 0);
    assert_eq!(summary.balance, 0);

    let progress = rest::progress(&server.base).await.unwrap();
    assert_eq!(progress.target_amount, 1_000_000);
    assert_eq!(progress.current_amount, 0);
    assert_eq!(progress.percentage, 0.0);
    assert_eq!(progress.remaining_amount, 1_000_000);
}

#[tokio::test]
async fn payment_code_carries_amount_and_checksum() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let code = rest::payment_code(
        &server.base,
        &api::PaymentCodeReq {
            donor_name: "Siti".into(),
            phone_number: "081234567890".into(),
            amount: 25_000,
        },
    )
    .await
    .unwrap();
    assert_eq!(code.amount, 25_000);
    assert!(code.payload.starts_with("000201"));
    assert!(code.payload.contains("540525000"));
    let crc_at = code.payload.len() - 8;
    assert_eq!(&code.payload[crc_at..crc_at + 4], "6304");
    assert!(code.qr_image.starts_with("data:image/svg+xml;base64,"));

    let body = server
        .request_expect(
            "POST",
            "/api/v1/donations/payment-code",
            None,
            Some(json!({"donor_name": "Siti", "phone_number": "0812", "amount": 500})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(body["error"], "minimum donation is Rp 1000");
}

#[tokio::test]
async fn invalid_submissions_store_nothing() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let text = Part::bytes(b"hello".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .unwrap();
    let cases = [
        server.submit("Siti", "0812345", 25_000, Some(text)).await,
        server.submit("Siti", "0812345", 25_000, None).await,
        server.submit("Siti", "0812345", 999, Some(png("a.png"))).await,
        server.submit("  ", "0812345", 25_000, Some(png("a.png"))).await,
    ];
    for (status, body) in cases {
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert!(body["error"].as_str().is_some());
    }
    assert_eq!(server.stored_objects("payment-proofs"), 0);

    let token = server.admin().await;
    let list = rest::admin_donations(&server.base, &token, api::ReviewView::All)
        .await
        .unwrap();
    assert_eq!(list.stats.total_donations, 0);
}

#[tokio::test]
async fn oversized_proof_is_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    // Fits the request body limit but not the per-image limit
    let big = Part::bytes(vec![0u8; 1024 * 1024 + 10 * 1024])
        .file_name("big.png")
        .mime_str("image/png")
        .unwrap();
    let (status, _) = server.submit("Siti", "0812345", 25_000, Some(big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(server.stored_objects("payment-proofs"), 0);

    server.donate("Siti", "0812345", 25_000).await;
    assert_eq!(server.stored_objects("payment-proofs"), 1);
}

#[tokio::test]
async fn donation_review_flow() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let id = server.donate("Siti Aminah", "081234567890", 25_000).await;

    // Pending donations stay out of the public ledger
    let ledger = rest::ledger_donations(&server.base, &api::LedgerQuery::default())
        .await
        .unwrap();
    assert!(ledger.is_empty());
    assert_eq!(rest::ledger_summary(&server.base).await.unwrap().total_income, 0);

    let token = server.admin().await;
    let pending = rest::admin_donations(&server.base, &token, api::ReviewView::Pending)
        .await
        .unwrap();
    assert_eq!(pending.stats.pending_donations, 1);
    assert_eq!(pending.donations.len(), 1);
    let row = &pending.donations[0];
    assert_eq!(row.phone_number, "081234567890");
    let proof_url = row.payment_proof_url.clone().expect("proof url");
    let proof = server
        .client
        .get(format!("{}{}", server.base, proof_url))
        .send()
        .await
        .unwrap();
    assert_eq!(proof.status(), StatusCode::OK);

    let after = server.approve(&token, &id).await;
    assert_eq!(after["view"], "all");
    assert_eq!(after["donations"][0]["status"], "success");
    assert!(after["donations"][0]["verified_at"].is_string());
    assert_eq!(after["stats"]["total_amount"], 25_000);

    let ledger = rest::ledger_donations(&server.base, &api::LedgerQuery::default())
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].phone_masked, "08xxxxxxx890");
    let summary = rest::ledger_summary(&server.base).await.unwrap();
    assert_eq!(summary.total_income, 25_000);
    assert_eq!(summary.total_donors, 1);

    // A decided donation cannot be decided again
    server
        .request_expect(
            "POST",
            &format!("/api/v1/admin/donations/{id}/reject"),
            Some(&token),
            None,
            StatusCode::CONFLICT,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/v1/admin/donations/does-not-exist/approve",
            Some(&token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn ledger_filters_by_name_and_phone() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    for (name, phone) in [("Siti Aminah", "081111111111"), ("Budi", "082222222222")] {
        let id = server.donate(name, phone, 10_000).await;
        server.approve(&token, &id).await;
    }
    let by_name = rest::ledger_donations(
        &server.base,
        &api::LedgerQuery {
            q: Some("siti".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].donor_name, "Siti Aminah");

    let by_phone = rest::ledger_donations(
        &server.base,
        &api::LedgerQuery {
            q: Some("0822".into()),
            period: Some(donasiin_shared::period::Period::Today),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(by_phone.len(), 1);
    assert_eq!(by_phone[0].donor_name, "Budi");
}

#[tokio::test]
async fn admin_routes_require_an_admin_session() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases: Vec<(&str, &str, Option<Value>)> = vec![
        ("GET", "/api/v1/admin/donations", None),
        ("POST", "/api/v1/admin/donations/x/approve", None),
        ("POST", "/api/v1/admin/donations/x/reject", None),
        (
            "PUT",
            "/api/v1/admin/weekly-targets",
            Some(json!({"week_start":"2026-10-10","week_end":"2026-10-16","target_amount":1})),
        ),
        ("GET", "/api/v1/auth/session", None),
        ("POST", "/api/v1/auth/logout", None),
    ];
    for (method, path, body) in cases.iter() {
        server
            .request_expect(method, path, None, body.clone(), StatusCode::UNAUTHORIZED)
            .await;
        server
            .request_expect(
                method,
                path,
                Some("not-a-token"),
                body.clone(),
                StatusCode::UNAUTHORIZED,
            )
            .await;
    }

    let viewer = server.login(VIEWER_EMAIL, VIEWER_PASSWORD).await;
    let me = rest::session(&server.base, &viewer).await.unwrap();
    assert_eq!(me.role, donasiin_shared::auth::Role::Viewer);
    for (method, path, body) in cases.iter().take(4) {
        server
            .request_expect(method, path, Some(&viewer), body.clone(), StatusCode::FORBIDDEN)
            .await;
    }

    server
        .request_expect(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"email": ADMIN_EMAIL, "password": "wrong"})),
            StatusCode::UNAUTHORIZED,
        )
        .await;
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    let me = rest::session(&server.base, &token).await.unwrap();
    assert_eq!(me.email, ADMIN_EMAIL);
    assert_eq!(me.role, donasiin_shared::auth::Role::Admin);

    rest::logout(&server.base, &token).await.unwrap();
    server
        .request_expect(
            "GET",
            "/api/v1/auth/session",
            Some(&token),
            None,
            StatusCode::UNAUTHORIZED,
        )
        .await;
}

#[tokio::test]
async fn csv_export_quotes_fields() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    let id = server.donate("Budi, \"Bos\"", "081234567890", 50_000).await;
    server.approve(&token, &id).await;

    let resp = server
        .client
        .get(format!("{}/api/v1/ledger/donations/export", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let disposition = headers["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"donations_"));
    let body = resp.text().await.unwrap();
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("Tanggal,Nama Donatur,Nomor HP,Jumlah,Status")
    );
    let row = lines.next().unwrap();
    assert!(row.contains(r#""Budi, ""Bos""""#), "row {row}");
    assert!(row.ends_with(",08xxxxxxx890,50000,success"), "row {row}");
}

#[tokio::test]
async fn expenses_reduce_the_balance() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    let id = server.donate("Siti", "081234567890", 100_000).await;
    server.approve(&token, &id).await;

    let form = Form::new()
        .text("amount", "30000")
        .text("description", "Nasi kotak")
        .text("location", "Masjid Al-Ikhlas")
        .part("receipt", png("struk.png"));
    let (status, body) = server
        .multipart("/api/v1/admin/expenses", Some(&token), form)
        .await;
    assert_eq!(status, StatusCode::CREATED, "body {body:?}");
    assert!(
        body["receipt_url"]
            .as_str()
            .unwrap()
            .starts_with("/files/receipts/")
    );

    let (status, _) = server
        .multipart(
            "/api/v1/admin/expenses",
            Some(&token),
            Form::new().text("amount", "0").text("description", "x"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let summary = rest::ledger_summary(&server.base).await.unwrap();
    assert_eq!(summary.total_income, 100_000);
    assert_eq!(summary.total_expense, 30_000);
    assert_eq!(summary.balance, 70_000);

    let found = rest::ledger_expenses(
        &server.base,
        &api::LedgerQuery {
            q: Some("ikhlas".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn weekly_target_drives_progress() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    let window = WeekWindow::containing(local_date(&chrono_tz::Asia::Jakarta, Utc::now()));
    let saved = rest::put_weekly_target(
        &server.base,
        &token,
        &api::WeeklyTargetReq {
            week_start: window.start.to_string(),
            week_end: window.end.to_string(),
            target_amount: 100_000,
        },
    )
    .await
    .unwrap();
    assert_eq!(saved.target_amount, 100_000);

    for (name, amount) in [("Siti", 20_000), ("Budi", 5_000), ("Siti", 10_000)] {
        let id = server.donate(name, "081234567890", amount).await;
        server.approve(&token, &id).await;
    }
    // Pending donations do not count
    server.donate("Ani", "089999999999", 50_000).await;

    let progress = rest::progress(&server.base).await.unwrap();
    assert_eq!(progress.week_start, window.start.to_string());
    assert_eq!(progress.target_amount, 100_000);
    assert_eq!(progress.current_amount, 35_000);
    assert_eq!(progress.donor_count, 2);
    assert!((progress.percentage - 35.0).abs() < 1e-9);
    assert_eq!(progress.remaining_amount, 65_000);

    let history = rest::progress_history(&server.base).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].current_amount, 35_000);

    server
        .request_expect(
            "PUT",
            "/api/v1/admin/weekly-targets",
            Some(&token),
            Some(json!({"week_start":"16/10/2026","week_end":"2026-10-16","target_amount":1})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "PUT",
            "/api/v1/admin/weekly-targets",
            Some(&token),
            Some(json!({"week_start":"2026-10-16","week_end":"2026-10-10","target_amount":1})),
            StatusCode::BAD_REQUEST,
        )
        .await;
}

#[tokio::test]
async fn activities_expose_image_preview() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.admin().await;
    let today = local_date(&chrono_tz::Asia::Jakarta, Utc::now());
    let mut form = Form::new()
        .text("title", "Jumat Berkah")
        .text("description", "Pembagian nasi kotak")
        .text("location", "Masjid Al-Ikhlas")
        .text("activity_date", today.to_string())
        .text("participant_count", "40");
    for i in 0..6 {
        form = form.part("images", png(&format!("foto-{i}.png")));
    }
    let (status, body) = server
        .multipart("/api/v1/admin/activities", Some(&token), form)
        .await;
    assert_eq!(status, StatusCode::CREATED, "body {body:?}");
    assert_eq!(body["image_urls"].as_array().unwrap().len(), 6);
    assert_eq!(body["preview_images"].as_array().unwrap().len(), 4);
    assert_eq!(body["extra_image_count"], 2);

    let (status, _) = server
        .multipart(
            "/api/v1/admin/activities",
            Some(&token),
            Form::new().text("title", "Tanpa tanggal"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let today_only = rest::activities(
        &server.base,
        &api::TimelineQuery {
            period: Some(donasiin_shared::period::Period::Today),
        },
    )
    .await
    .unwrap();
    assert_eq!(today_only.len(), 1);
    assert_eq!(today_only[0].participant_count, Some(40));
    assert_eq!(today_only[0].activity_date, today.to_string());
}
