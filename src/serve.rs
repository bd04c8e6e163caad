//! HTTP server for the interactive form UI
//!
//! `pachilog serve` → starts the server, opens the browser, shows the wizard.
//!
//! Interaction is strictly synchronous: each request is one user action,
//! applied to completion before the next is read (single writer, single
//! reader, no locking). Every successful mutating action overwrites the
//! snapshot file before the response goes out.

use crate::border::MachineSpec;
use crate::history::{Database, StoredSession};
use crate::ledger;
use crate::session::{Action, MachineInfo, Page, RowDraft, RowRecord, Session};
use crate::snapshot;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use tiny_http::{Header, Method, Request, Response, Server};

// Embed the UI directly in the binary
const UI_HTML: &str = include_str!("ui.html");

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    fn failure(error: String) -> Self {
        Self { ok: false, data: None, error: Some(error) }
    }
}

/// Everything the UI needs to draw the current screen
#[derive(Serialize)]
struct StateView<'a> {
    page: Page,
    is_active: bool,
    machine_info: &'a MachineInfo,
    records: &'a [RowRecord],
    draft: &'a RowDraft,
    hit_entries: &'a [crate::session::HitEntry],
    metrics: Metrics,
}

/// Dashboard aggregates, recomputed per request
#[derive(Serialize)]
struct Metrics {
    total_invest: u32,
    current_balls: u32,
    loanable_yen: u32,
    avg_spin_rate: f64,
    can_loan: bool,
    loan_unit_yen: u32,
    loan_balls: u32,
}

impl<'a> StateView<'a> {
    fn from_session(session: &'a Session) -> Self {
        let info = &session.machine_info;
        Self {
            page: session.page,
            is_active: session.is_active,
            machine_info: info,
            records: &session.records,
            draft: &session.draft,
            hit_entries: &session.hit_entries,
            metrics: Metrics {
                total_invest: info.total_invest,
                current_balls: info.current_balls,
                loanable_yen: info.loanable_yen,
                avg_spin_rate: ledger::round2(session.avg_spin_rate()),
                can_loan: info.loanable_yen >= info.rate.loan_unit_yen(),
                loan_unit_yen: info.rate.loan_unit_yen(),
                loan_balls: info.rate.loan_balls(),
            },
        }
    }
}

/// Border computation result plus any distribution warnings
#[derive(Serialize)]
struct BorderReport {
    result: crate::border::BorderResult,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

/// Flat form-encoded action, for HTML form posts without JS. Numeric fields
/// arrive as strings and parse leniently (blank or junk reads as zero).
#[derive(Deserialize, Debug)]
struct FormAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    shop_name: Option<String>,
    #[serde(default)]
    table_number: Option<String>,
    #[serde(default)]
    rate: Option<String>,
    #[serde(default)]
    opening_balls: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    edit_index: Option<String>,
    #[serde(default)]
    balls: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    rounds: Option<String>,
}

fn num(field: &Option<String>) -> u32 {
    field
        .as_deref()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

impl FormAction {
    fn into_action(self) -> Option<Action> {
        let action = match self.kind.as_str() {
            "start" => Action::Start {
                shop_name: self.shop_name.clone().unwrap_or_default(),
                table_number: num(&self.table_number),
                rate: match self.rate.as_deref() {
                    Some("one_yen") | Some("1yen") => crate::ledger::Rate::OneYen,
                    _ => crate::ledger::Rate::FourYen,
                },
                opening_balls: num(&self.opening_balls),
            },
            "add_funds" => Action::AddFunds { amount: num(&self.amount) },
            "begin_row" => Action::BeginRow {
                edit_index: self
                    .edit_index
                    .as_deref()
                    .and_then(|s| s.trim().parse().ok()),
            },
            "loan" => Action::Loan,
            "set_remaining" => Action::SetRemaining { balls: num(&self.balls) },
            "set_spins" => Action::SetSpins { start: num(&self.start), end: num(&self.end) },
            "begin_hits" => Action::BeginHits,
            "add_hit" => Action::AddHit { rounds: num(&self.rounds), balls: num(&self.balls) },
            "confirm_hits" => Action::ConfirmHits,
            "confirm_row" => Action::ConfirmRow,
            "cancel_row" => Action::CancelRow,
            "end_session" => Action::EndSession,
            _ => return None,
        };
        Some(action)
    }
}

/// Start server, open browser, serve UI
pub fn start(port: u16, snapshot_path: PathBuf, open_browser: bool) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    // Read the snapshot exactly once at startup
    let mut session = snapshot::Snapshot::into_session(snapshot::load(&snapshot_path));

    let url = format!("http://localhost:{}", port);
    eprintln!("\n\x1b[1;32m🎰 PachiLog\x1b[0m");
    eprintln!("   {}", url);
    if session.is_active {
        eprintln!(
            "   Resuming session at {} (table {}, {} rows)\n",
            session.machine_info.shop_name,
            session.machine_info.table_number,
            session.records.len()
        );
    } else {
        eprintln!("   Snapshot: {}\n", snapshot_path.display());
    }

    if open_browser {
        let _ = open::that(&url);
    }

    // Handle requests, one state transition at a time
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &mut session, &snapshot_path) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(
    mut request: Request,
    session: &mut Session,
    snapshot_path: &PathBuf,
) -> std::io::Result<()> {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");
    let method = request.method().clone();

    match (&method, path) {
        // Serve embedded UI
        (&Method::Get, "/") => {
            let response = Response::from_string(UI_HTML)
                .with_header(Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap());
            request.respond(response)
        }

        // API: current state
        (&Method::Get, "/api/state") => {
            let json = serde_json::to_string(&ApiResponse::success(StateView::from_session(session)))?;
            respond_json(request, json)
        }

        // API: apply one state transition
        (&Method::Post, "/api/action") => {
            let action = match parse_action(&mut request)? {
                Some(action) => action,
                None => {
                    let json = serde_json::to_string(&ApiResponse::<()>::failure(
                        "Unrecognized action".to_string(),
                    ))?;
                    return respond_json(request, json);
                }
            };

            eprintln!("→ {:?}", action);
            // Ending the session clears the records; keep them for the ledger
            let rows_before = if matches!(action, Action::EndSession) {
                session.records.clone()
            } else {
                Vec::new()
            };
            match session.apply(action) {
                Ok(summary) => {
                    // A completed session goes to the history ledger, best-effort
                    if let Some(summary) = summary {
                        match Database::open() {
                            Ok(db) => {
                                if let Err(e) = db.insert_session(&summary, &rows_before) {
                                    eprintln!("\x1b[33mWarning: history not saved: {}\x1b[0m", e);
                                }
                            }
                            Err(e) => {
                                eprintln!("\x1b[33mWarning: history db unavailable: {}\x1b[0m", e)
                            }
                        }
                    }

                    // Whole-state overwrite; a failed write is a warning, not a stop
                    if let Err(e) = snapshot::save(snapshot_path, session) {
                        eprintln!("\x1b[33mWarning: snapshot not saved: {}\x1b[0m", e);
                    }

                    let json = serde_json::to_string(&ApiResponse::success(
                        StateView::from_session(session),
                    ))?;
                    respond_json(request, json)
                }
                Err(e) => {
                    // Invalid input blocks the transition; state is untouched
                    let json = serde_json::to_string(&ApiResponse::<()>::failure(e.to_string()))?;
                    respond_json(request, json)
                }
            }
        }

        // API: border-line calculation
        (&Method::Post, "/api/border") => {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body)?;

            let json = match serde_json::from_str::<MachineSpec>(&body) {
                Ok(spec) => {
                    let (result, warnings) = spec.compute();
                    serde_json::to_string(&ApiResponse::success(BorderReport { result, warnings }))?
                }
                Err(e) => serde_json::to_string(&ApiResponse::<()>::failure(format!(
                    "Bad machine spec: {}",
                    e
                )))?,
            };
            respond_json(request, json)
        }

        // API: completed-session history
        (&Method::Get, "/api/history") => {
            let params = url
                .split('?')
                .nth(1)
                .and_then(|q| serde_urlencoded::from_str::<HistoryParams>(q).ok())
                .unwrap_or(HistoryParams { limit: default_history_limit() });

            let json = match Database::open().and_then(|db| db.recent_sessions(params.limit)) {
                Ok(sessions) => {
                    serde_json::to_string(&ApiResponse::<Vec<StoredSession>>::success(sessions))?
                }
                Err(e) => serde_json::to_string(&ApiResponse::<()>::failure(e.to_string()))?,
            };
            respond_json(request, json)
        }

        // 404
        _ => {
            let response = Response::from_string("Not found").with_status_code(404);
            request.respond(response)
        }
    }
}

/// Parse an action from a JSON body, falling back to a form-encoded body
fn parse_action(request: &mut Request) -> std::io::Result<Option<Action>> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;

    if let Ok(action) = serde_json::from_str::<Action>(&body) {
        return Ok(Some(action));
    }

    if let Ok(form) = serde_urlencoded::from_str::<FormAction>(&body) {
        return Ok(form.into_action());
    }

    Ok(None)
}

fn respond_json(request: Request, json: String) -> std::io::Result<()> {
    let response = Response::from_string(json).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
    );
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Rate;

    // ==========================================================================
    // FORM-ACTION FALLBACK TESTS
    // ==========================================================================
    //
    // HTML form posts arrive urlencoded with every field as a string; the
    // flat FormAction bridges them into the typed Action enum.
    // ==========================================================================

    #[test]
    fn test_form_action_start() {
        let form: FormAction = serde_urlencoded::from_str(
            "type=start&shop_name=Marion&table_number=123&rate=one_yen&opening_balls=500",
        )
        .unwrap();
        match form.into_action() {
            Some(Action::Start { shop_name, table_number, rate, opening_balls }) => {
                assert_eq!(shop_name, "Marion");
                assert_eq!(table_number, 123);
                assert_eq!(rate, Rate::OneYen);
                assert_eq!(opening_balls, 500);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_form_action_flat_variants() {
        let form: FormAction = serde_urlencoded::from_str("type=loan").unwrap();
        assert!(matches!(form.into_action(), Some(Action::Loan)));

        let form: FormAction = serde_urlencoded::from_str("type=add_funds&amount=1000").unwrap();
        assert!(matches!(form.into_action(), Some(Action::AddFunds { amount: 1000 })));

        let form: FormAction = serde_urlencoded::from_str("type=begin_row").unwrap();
        assert!(matches!(form.into_action(), Some(Action::BeginRow { edit_index: None })));

        let form: FormAction =
            serde_urlencoded::from_str("type=begin_row&edit_index=2").unwrap();
        assert!(matches!(form.into_action(), Some(Action::BeginRow { edit_index: Some(2) })));
    }

    #[test]
    fn test_form_action_unknown_type() {
        let form: FormAction = serde_urlencoded::from_str("type=reboot").unwrap();
        assert!(form.into_action().is_none());
    }

    #[test]
    fn test_state_view_metrics() {
        let mut s = Session::new();
        s.start("Marion", 123, Rate::FourYen, 1000).unwrap();
        s.add_funds(500).unwrap();

        let view = StateView::from_session(&s);
        assert_eq!(view.metrics.total_invest, 500);
        assert_eq!(view.metrics.loanable_yen, 500);
        assert!(view.metrics.can_loan);
        assert_eq!(view.metrics.loan_balls, 125);
        assert_eq!(view.metrics.avg_spin_rate, 0.0);
    }

    #[test]
    fn test_api_response_shape() {
        let ok = ApiResponse::success(1);
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"ok\":true"));

        let err = ApiResponse::<()>::failure("nope".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"ok\":false"));
        assert!(json.contains("nope"));
    }
}
