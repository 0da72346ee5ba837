//! Mock bank API server for testing
//!
//! Serves the three endpoints the client uses with generated data:
//! - GET /personal/client-info returns the client profile with accounts
//! - GET /personal/statement/{account}/{from}/{to} returns statement items
//! - GET /bank/currency returns the public rate table (no token needed)

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::json;

/// Mock bank server for testing
pub struct MockMonobankServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Configuration for mock data generation
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub num_accounts: usize,
    pub num_transactions_per_account: usize,
    /// Reject every authorized call with 401
    pub fail_auth: bool,
    /// Answer authorized calls with 429
    pub rate_limit: bool,
    /// Return a body that does not decode
    pub malformed_body: bool,
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            num_accounts: 2,
            num_transactions_per_account: 10,
            fail_auth: false,
            rate_limit: false,
            malformed_body: false,
            delay_ms: 0,
        }
    }
}

impl MockMonobankServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));

        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        requests_clone.fetch_add(1, Ordering::SeqCst);
                        let cfg = config.clone();
                        thread::spawn(move || handle_connection(stream, &cfg));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Connections accepted so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockMonobankServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig) {
    // Accepted sockets inherit non-blocking mode on some platforms.
    let _ = stream.set_nonblocking(false);
    let mut buffer = [0; 4096];
    let n = match stream.read(&mut buffer) {
        Ok(n) => n,
        Err(_) => return,
    };
    let request = String::from_utf8_lossy(&buffer[..n]);

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"errorDescription": "bad request"}"#);
        return;
    }
    if parts[0] != "GET" {
        send_response(&mut stream, 405, "Method Not Allowed", r#"{"errorDescription": "method"}"#);
        return;
    }

    let path = parts[1].split('?').next().unwrap_or(parts[1]);

    if path == "/bank/currency" {
        send_response(&mut stream, 200, "OK", &currency_table().to_string());
        return;
    }

    if !path.starts_with("/personal/") {
        send_response(&mut stream, 404, "Not Found", r#"{"errorDescription": "not found"}"#);
        return;
    }

    let has_valid_auth = request.to_lowercase().contains("x-token: valid_");
    if config.fail_auth || !has_valid_auth {
        send_response(
            &mut stream,
            401,
            "Unauthorized",
            r#"{"errorDescription": "Unknown 'X-Token'"}"#,
        );
        return;
    }
    if config.rate_limit {
        send_response(
            &mut stream,
            429,
            "Too Many Requests",
            r#"{"errorDescription": "Too many requests"}"#,
        );
        return;
    }
    if config.malformed_body {
        send_response(&mut stream, 200, "OK", r#"{"accounts": "nope"}"#);
        return;
    }

    if path == "/personal/client-info" {
        send_response(&mut stream, 200, "OK", &client_info(config.num_accounts).to_string());
    } else if let Some(rest) = path.strip_prefix("/personal/statement/") {
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() != 3 {
            send_response(&mut stream, 400, "Bad Request", r#"{"errorDescription": "bad path"}"#);
            return;
        }
        let to: i64 = segments[2].parse().unwrap_or(0);
        let body = statement(segments[0], to, config.num_transactions_per_account);
        send_response(&mut stream, 200, "OK", &body.to_string());
    } else {
        send_response(&mut stream, 404, "Not Found", r#"{"errorDescription": "not found"}"#);
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn client_info(count: usize) -> serde_json::Value {
    let kinds = [("black", 980), ("white", 840), ("fop", 978)];
    let accounts: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            let (kind, currency) = kinds[i % kinds.len()];
            json!({
                "id": format!("acc_{}", i + 1),
                "balance": 100_000 * (i as i64 + 1),
                "creditLimit": 0,
                "type": kind,
                "currencyCode": currency,
                "cashbackType": "UAH",
                "maskedPan": [format!("537541******{:04}", i + 1)],
                "iban": format!("UA2132200100000262012345678{:02}", i + 1)
            })
        })
        .collect();

    json!({ "clientId": "mock", "name": "Mock Client", "accounts": accounts })
}

fn statement(account_id: &str, to: i64, count: usize) -> serde_json::Value {
    let merchants = [
        ("Silpo", 5411, -45_023),
        ("Uber", 4121, -12_050),
        ("Netflix", 4899, -9_999),
        ("Salary", 0, 3_500_000),
    ];
    let mut balance = 1_000_000i64;
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            let (description, mcc, amount) = merchants[i % merchants.len()];
            balance += amount;
            json!({
                "id": format!("{}_{}", account_id, i + 1),
                "time": to - (i as i64 + 1) * 3600,
                "description": description,
                "mcc": mcc,
                "hold": i == 0,
                "amount": amount,
                "operationAmount": amount,
                "currencyCode": 980,
                "commissionRate": 0,
                "cashbackAmount": 0,
                "balance": balance
            })
        })
        .collect();
    serde_json::Value::Array(items)
}

fn currency_table() -> serde_json::Value {
    json!([
        {"currencyCodeA": 840, "currencyCodeB": 980, "date": 1_700_000_000, "rateBuy": 41.1, "rateSell": 41.6558},
        {"currencyCodeA": 978, "currencyCodeB": 980, "date": 1_700_000_000, "rateBuy": 44.5, "rateSell": 45.3},
        {"currencyCodeA": 985, "currencyCodeB": 980, "date": 1_700_000_000, "rateCross": 10.4211},
        {"currencyCodeA": 978, "currencyCodeB": 840, "date": 1_700_000_000, "rateBuy": 1.07, "rateSell": 1.09}
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_server_starts() {
        let server = MockMonobankServer::start(MockConfig::default()).unwrap();
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn test_generated_statement_is_ordered_newest_first() {
        let items = statement("acc_1", 1_000_000, 3);
        let times: Vec<i64> = items
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["time"].as_i64().unwrap())
            .collect();
        assert_eq!(times, vec![996_400, 992_800, 989_200]);
    }
}
